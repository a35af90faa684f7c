//! POP-before-SMTP support.
//!
//! Some providers unlock SMTP relaying for an IP only after a successful POP
//! login. [`authorize`] performs that login (USER/PASS/QUIT over a plain TCP
//! session); [`PopSmtpMailer`] runs it at configuration time and then sends
//! over a regular SMTP transport with the same settings.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::config::MailSettings;
use crate::errors::{DispatchError, TransportError};

use super::smtp::SmtpMailer;
use super::{Mailer, OutgoingMail};

/// Perform a POP3 authorization handshake against `host:port`.
///
/// `verbose` logs each server response; kept for diagnosing provider
/// handshakes in development setups.
pub fn authorize(
    host: &str,
    port: u16,
    timeout: Duration,
    username: &str,
    password: &str,
    verbose: bool,
) -> Result<(), TransportError> {
    let fail = |detail: String| TransportError::PopAuthorization {
        host: host.to_string(),
        port,
        detail,
    };

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| fail(format!("address resolution failed: {}", e)))?
        .next()
        .ok_or_else(|| fail("address resolution returned no candidates".into()))?;

    debug!(host, port, "opening POP authorization session");

    let mut stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| fail(format!("connect failed: {}", e)))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|e| fail(e.to_string()))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|e| fail(e.to_string()))?;

    let mut reader = BufReader::new(stream.try_clone().map_err(|e| fail(e.to_string()))?);

    expect_ok(&mut reader, "greeting", verbose).map_err(fail)?;

    stream
        .write_all(format!("USER {}\r\n", username).as_bytes())
        .map_err(|e| fail(e.to_string()))?;
    expect_ok(&mut reader, "USER", verbose).map_err(fail)?;

    stream
        .write_all(format!("PASS {}\r\n", password).as_bytes())
        .map_err(|e| fail(e.to_string()))?;
    expect_ok(&mut reader, "PASS", verbose).map_err(fail)?;

    // The session has served its purpose; close it politely and ignore
    // whatever the server says on the way out.
    let _ = stream.write_all(b"QUIT\r\n");

    debug!(host, port, "POP authorization succeeded");
    Ok(())
}

/// Read one response line and require a `+OK` status.
fn expect_ok(
    reader: &mut BufReader<TcpStream>,
    stage: &str,
    verbose: bool,
) -> Result<(), String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| format!("read failed after {}: {}", stage, e))?;

    if line.is_empty() {
        return Err(format!("connection closed after {}", stage));
    }
    if verbose {
        debug!(stage, response = line.trim_end(), "pop server response");
    }
    if !line.starts_with("+OK") {
        return Err(format!("server rejected {}: {}", stage, line.trim_end()));
    }
    Ok(())
}

/// SMTP mailer gated behind a POP authorization handshake.
pub struct PopSmtpMailer {
    smtp: SmtpMailer,
}

impl PopSmtpMailer {
    /// Authorize against the POP server and configure the SMTP transport.
    ///
    /// Host, port, username, and password must all be configured and
    /// non-empty. The handshake happens here, once, before any send.
    pub fn from_settings(settings: &MailSettings, verbose: bool) -> Result<Self, DispatchError> {
        let host = MailSettings::require(&settings.host, "host")?;
        let port = settings.require_port()?;
        let username = MailSettings::require(&settings.username, "username")?;
        let password = MailSettings::require(&settings.password, "password")?;
        let timeout = Duration::from_secs(settings.timeout_secs());

        authorize(host, port, timeout, username, password, verbose)?;

        Ok(Self {
            smtp: SmtpMailer::from_settings(settings)?,
        })
    }
}

impl Mailer for PopSmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        self.smtp.send(mail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// Minimal scripted POP server for one session.
    fn spawn_pop_server(replies: Vec<&'static str>) -> (std::net::SocketAddr, std::thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            stream.write_all(b"+OK POP3 ready\r\n").unwrap();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).is_err() || line.is_empty() {
                    return;
                }
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });
        (addr, handle)
    }

    #[test]
    fn test_authorize_happy_path() {
        let (addr, handle) = spawn_pop_server(vec!["+OK\r\n", "+OK logged in\r\n", "+OK bye\r\n"]);

        let result = authorize(
            "127.0.0.1",
            addr.port(),
            Duration::from_secs(2),
            "user",
            "secret",
            true,
        );
        assert!(result.is_ok(), "authorize failed: {:?}", result);
        handle.join().unwrap();
    }

    #[test]
    fn test_authorize_rejected_password() {
        let (addr, handle) = spawn_pop_server(vec!["+OK\r\n", "-ERR invalid password\r\n"]);

        let result = authorize(
            "127.0.0.1",
            addr.port(),
            Duration::from_secs(2),
            "user",
            "wrong",
            false,
        );
        assert!(matches!(
            result,
            Err(TransportError::PopAuthorization { ref detail, .. })
                if detail.contains("PASS")
        ));
        handle.join().unwrap();
    }

    #[test]
    fn test_authorize_connection_refused() {
        // Bind and drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = authorize(
            "127.0.0.1",
            port,
            Duration::from_millis(500),
            "user",
            "pw",
            false,
        );
        assert!(matches!(
            result,
            Err(TransportError::PopAuthorization { .. })
        ));
    }

    #[test]
    fn test_from_settings_validates_required_fields() {
        let settings = MailSettings {
            host: Some("pop.example.com".into()),
            port: Some(110),
            username: Some("user".into()),
            password: None,
            ..Default::default()
        };
        let result = PopSmtpMailer::from_settings(&settings, false);
        assert!(matches!(
            result,
            Err(DispatchError::Config(crate::errors::ConfigError::MissingField { ref field }))
                if field == "password"
        ));
    }
}
