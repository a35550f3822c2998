use axum::async_trait;
use tracing::info;

/// Outbound email side-channel.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, email: &str, name: &str, link: &str) -> anyhow::Result<()>;
}

/// Writes the message to the log instead of delivering it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &str, name: &str, link: &str) -> anyhow::Result<()> {
        info!(%email, %name, %link, "verification email");
        Ok(())
    }
}

pub fn verification_link(api_url: &str, token: &str) -> String {
    format!(
        "{}/api/auth/confirmed_email/{}",
        api_url.trim_end_matches('/'),
        token
    )
}
