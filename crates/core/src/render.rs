//! Subject and body template rendering.
//!
//! Backed by `minijinja`, so templates use the familiar `{{ user.firstName }}`
//! syntax. The rendering locale is an explicit per-call parameter rather than
//! ambient state; the effective locale is exposed to templates as `locale`.

use minijinja::Environment;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::TemplateError;

/// Stateless template renderer.
pub struct TemplateRenderer {
    env: Environment<'static>,
    default_locale: String,
}

impl TemplateRenderer {
    /// Create a renderer with the given default locale.
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            env: Environment::new(),
            default_locale: default_locale.into(),
        }
    }

    /// The locale used when a render call passes none.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Render a template string against the given variables.
    ///
    /// `locale` overrides the default locale for this call only; there is no
    /// ambient locale to restore afterwards.
    pub fn render(
        &self,
        template: &str,
        variables: &Map<String, Value>,
        locale: Option<&str>,
    ) -> Result<String, TemplateError> {
        let effective = locale.unwrap_or(&self.default_locale);
        debug!(locale = effective, "rendering template");

        let mut context = variables.clone();
        context.insert("locale".into(), Value::String(effective.to_string()));

        self.env
            .render_str(template, Value::Object(context))
            .map_err(|e| TemplateError::Render(e.to_string()))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new("en")
    }
}
