use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::auth::repo::User;
use crate::auth::token;
use crate::state::AppState;

/// Outbound email delivery. Implementations must be safe to share across
/// handlers; delivery failures are reported, never retried here.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Delivers mail through an HTTP mail API (JSON body, bearer auth).
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_token: String, from: String) -> anyhow::Result<Self> {
        // A stuck mail API must not hold a delivery task forever.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_url,
            api_token,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        self.http
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Fallback mailer for environments without mail credentials. Logs the
/// delivery instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        info!(recipient = %to, subject = %subject, "mail API not configured, logging email instead");
        Ok(())
    }
}

/// The two account emails we send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

impl EmailKind {
    pub fn subject(self) -> &'static str {
        match self {
            EmailKind::Verification => "Verify your email",
            EmailKind::PasswordReset => "Reset your password",
        }
    }

    fn link_path(self) -> &'static str {
        match self {
            EmailKind::Verification => "verifyemail",
            EmailKind::PasswordReset => "resetpassword",
        }
    }

    fn action(self) -> &'static str {
        match self {
            EmailKind::Verification => "verify your email",
            EmailKind::PasswordReset => "reset your password",
        }
    }
}

fn build_link(domain: &str, kind: EmailKind, token: &str) -> String {
    format!(
        "{}/{}?token={}",
        domain.trim_end_matches('/'),
        kind.link_path(),
        token
    )
}

fn build_html(kind: EmailKind, link: &str) -> String {
    format!(
        r#"<p>Click <a href="{link}">here</a> to {} or copy and paste the link below in your browser. <br> {link}</p>"#,
        kind.action()
    )
}

/// Issue a one-time token for the user, persist it, and hand the email off
/// for delivery. Persistence is awaited so the link is live before we
/// return; delivery runs in the background and only ever logs on failure.
pub async fn send_account_email(
    state: &AppState,
    user: &User,
    kind: EmailKind,
) -> anyhow::Result<()> {
    let (token, expires_at) = token::issue(user.id);
    match kind {
        EmailKind::Verification => {
            User::set_verify_token(&state.db, user.id, &token, expires_at).await?
        }
        EmailKind::PasswordReset => {
            User::set_reset_token(&state.db, user.id, &token, expires_at).await?
        }
    }

    let link = build_link(&state.config.domain, kind, &token);
    let html = build_html(kind, &link);
    let subject = kind.subject();
    let to = user.email.clone();
    let mailer = state.mailer.clone();

    tokio::spawn(async move {
        if let Err(err) = mailer.send(&to, subject, &html).await {
            warn!(recipient = %to, error = %err, "account email delivery failed");
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_delivers() {
        let mailer = LogMailer;
        assert!(mailer
            .send("ada@example.com", "Verify your email", "<p>hi</p>")
            .await
            .is_ok());
    }

    #[test]
    fn verification_link_targets_the_verify_page() {
        let link = build_link("http://localhost:8080", EmailKind::Verification, "tok123");
        assert_eq!(link, "http://localhost:8080/verifyemail?token=tok123");
    }

    #[test]
    fn reset_link_targets_the_reset_page() {
        let link = build_link("https://app.example.com", EmailKind::PasswordReset, "tok123");
        assert_eq!(link, "https://app.example.com/resetpassword?token=tok123");
    }

    #[test]
    fn trailing_slash_in_domain_does_not_double_up() {
        let link = build_link("http://localhost:8080/", EmailKind::Verification, "t");
        assert_eq!(link, "http://localhost:8080/verifyemail?token=t");
    }

    #[test]
    fn html_body_embeds_the_link_and_action() {
        let link = build_link("http://localhost:8080", EmailKind::Verification, "tok");
        let html = build_html(EmailKind::Verification, &link);
        assert_eq!(html.matches(&link).count(), 2);
        assert!(html.contains("verify your email"));

        let html = build_html(EmailKind::PasswordReset, &link);
        assert!(html.contains("reset your password"));
    }
}
