use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{render_digest_html, Digest, Notifier};

/// SMTP digest channel. Configured entirely from the environment; missing
/// configuration disables the channel rather than failing startup.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        let user = std::env::var("SMTP_USER").ok()?;
        let pass = std::env::var("SMTP_PASS").ok()?;
        let from_addr = std::env::var("NOTIFY_EMAIL_FROM").ok()?;
        let to_addr = std::env::var("NOTIFY_EMAIL_TO").ok()?;

        let creds = Credentials::new(user, pass);
        let mailer = match AsyncSmtpTransport::<Tokio1Executor>::relay(&host) {
            Ok(builder) => builder.credentials(creds).build(),
            Err(e) => {
                tracing::warn!(error = ?e, "invalid SMTP_HOST, email channel disabled");
                return None;
            }
        };

        let from: Mailbox = match from_addr.parse() {
            Ok(mb) => mb,
            Err(e) => {
                tracing::warn!(error = ?e, "invalid NOTIFY_EMAIL_FROM, email channel disabled");
                return None;
            }
        };
        let to: Mailbox = match to_addr.parse() {
            Ok(mb) => mb,
            Err(e) => {
                tracing::warn!(error = ?e, "invalid NOTIFY_EMAIL_TO, email channel disabled");
                return None;
            }
        };

        Some(Self { mailer, from, to })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let subject = format!(
            "[NewsTracker] {} fresh item(s) in last {}h",
            digest.items.len(),
            digest.window_hours
        );
        let body = render_digest_html(digest);

        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .body(body)
            .context("build digest email")?;

        self.mailer.send(msg).await.context("send digest email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
