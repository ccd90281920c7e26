use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::{Mailer, MailerError, OutboundEmail};
use crate::config::{SenderIdentity, SmtpSettings};

/// Blocking SMTP client.
///
/// The configured timeout is a deadline for the whole conversation, not only for a
/// single socket read. The exchange runs on its own thread and `send` gives up with
/// [`MailerError::TimedOut`] once the deadline passes; the abandoned thread finishes on
/// the per-command socket timeout.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
    deadline: Duration,
}

impl SmtpMailer {
    pub fn new(
        settings: &SmtpSettings,
        sender: &SenderIdentity,
        timeout: Duration,
    ) -> Result<Self, MailerError> {
        let builder = if settings.implicit_tls {
            SmtpTransport::relay(&settings.host)
        } else {
            SmtpTransport::starttls_relay(&settings.host)
        }
        .map_err(|err| MailerError::Unavailable(err.to_string()))?;

        let credentials = Credentials::new(
            settings.username.clone(),
            settings.password.expose_secret().to_string(),
        );
        let transport = builder
            .port(settings.port)
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        Ok(Self::with_transport(
            transport,
            sender_mailbox(sender)?,
            timeout,
        ))
    }

    fn with_transport(transport: SmtpTransport, from: Mailbox, deadline: Duration) -> Self {
        Self {
            transport,
            from,
            deadline,
        }
    }

    fn deliver(&self, message: Message) -> Result<(), MailerError> {
        let transport = self.transport.clone();
        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("smtp-send".to_string())
            .spawn(move || {
                let _ = tx.send(transport.send(&message));
            })
            .map_err(|err| MailerError::Unavailable(err.to_string()))?;

        match rx.recv_timeout(self.deadline) {
            Ok(Ok(response)) => {
                debug!(code = %response.code(), "smtp relay accepted message");
                Ok(())
            }
            Ok(Err(err)) => Err(MailerError::Transport(err.to_string())),
            Err(RecvTimeoutError::Timeout) => {
                warn!(deadline_ms = self.deadline.as_millis() as u64, "smtp send abandoned");
                Err(MailerError::TimedOut(self.deadline))
            }
            Err(RecvTimeoutError::Disconnected) => Err(MailerError::Transport(
                "smtp send thread exited without a result".to_string(),
            )),
        }
    }
}

fn sender_mailbox(sender: &SenderIdentity) -> Result<Mailbox, MailerError> {
    let address: Address = sender
        .email
        .parse()
        .map_err(|_| MailerError::InvalidAddress(sender.email.clone()))?;
    Ok(Mailbox::new(sender.name.clone(), address))
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.email.to_string())
            .finish_non_exhaustive()
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| MailerError::InvalidAddress(email.to.clone()))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone());

        let message = match &email.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                html.clone(),
            )),
            None => builder.singlepart(SinglePart::plain(email.text_body.clone())),
        }
        .map_err(|err| MailerError::Build(err.to_string()))?;

        self.deliver(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::time::Instant;

    /// Relay that answers every command, but only after `delay`.
    fn sluggish_relay(delay: Duration) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind relay");
        let port = listener.local_addr().expect("relay addr").port();
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut writer = stream.try_clone().expect("clone stream");
            let mut reader = BufReader::new(stream);
            thread::sleep(delay);
            if writer.write_all(b"220 relay.test ESMTP\r\n").is_err() {
                return;
            }
            let mut line = String::new();
            while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                thread::sleep(delay);
                if writer.write_all(b"250 ok\r\n").is_err() {
                    return;
                }
                line.clear();
            }
        });
        port
    }

    #[test]
    fn slow_relay_is_cut_off_at_the_deadline() {
        let deadline = Duration::from_secs(1);
        let port = sluggish_relay(Duration::from_millis(600));
        let transport = SmtpTransport::builder_dangerous("127.0.0.1")
            .port(port)
            .timeout(Some(deadline))
            .build();
        let mailer = SmtpMailer::with_transport(
            transport,
            sender_mailbox(&SenderIdentity {
                email: "desk@example.com".to_string(),
                name: None,
            })
            .expect("valid sender"),
            deadline,
        );

        let started = Instant::now();
        let result = mailer.send(&OutboundEmail {
            to: "alice@example.com".to_string(),
            subject: "Hello".to_string(),
            text_body: "Body".to_string(),
            html_body: None,
        });
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(MailerError::TimedOut(d)) if d == deadline));
        assert!(elapsed < Duration::from_millis(1800), "took {elapsed:?}");
    }

    #[test]
    fn sender_mailbox_keeps_display_name() {
        let mailbox = sender_mailbox(&SenderIdentity {
            email: "desk@example.com".to_string(),
            name: Some("County Desk".to_string()),
        })
        .expect("valid sender");
        assert_eq!(mailbox.name.as_deref(), Some("County Desk"));
        assert_eq!(mailbox.email.to_string(), "desk@example.com");
    }

    #[test]
    fn sender_mailbox_rejects_malformed_address() {
        let result = sender_mailbox(&SenderIdentity {
            email: "not an address".to_string(),
            name: None,
        });
        assert!(matches!(result, Err(MailerError::InvalidAddress(_))));
    }
}
