use serde::Deserialize;

/// Outbound mail transport settings. When `api_url`/`api_token` are absent
/// the service falls back to log-only delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Symmetric secret for session tokens. Rotating it invalidates every
    /// outstanding session.
    pub token_secret: String,
    /// Public base URL used in email links, e.g. "https://accounts.example.com".
    pub domain: String,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let token_secret = std::env::var("TOKEN_SECRET")?;
        let domain =
            std::env::var("DOMAIN").unwrap_or_else(|_| "http://localhost:8080".into());
        let mail = MailConfig {
            api_url: std::env::var("MAIL_API_URL").ok(),
            api_token: std::env::var("MAIL_API_TOKEN").ok(),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@gatehouse.local".into()),
        };
        Ok(Self {
            database_url,
            token_secret,
            domain,
            mail,
        })
    }
}
