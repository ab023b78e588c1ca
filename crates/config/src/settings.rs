use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub transcript: TranscriptSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

/// Verification parameters for tokens minted by the identity provider.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: Option<String>,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptSettings {
    /// Partial-event inactivity before a pending stream is auto-finalized.
    pub quiet_period_ms: u64,
    /// "finalize-and-switch" or "reject".
    pub takeover_policy: String,
    /// "finalize" or "discard" for a stream still pending when the call ends.
    pub end_policy: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("FINADVISE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "finadvise")?
            .set_default("auth.secret", "change-me-in-production")?
            .set_default("auth.issuer", "finadvise")?
            .set_default("auth.audience", None::<String>)?
            .set_default("auth.token_ttl_secs", 3600)?
            .set_default("transcript.quiet_period_ms", 2000)?
            .set_default("transcript.takeover_policy", "finalize-and-switch")?
            .set_default("transcript.end_policy", "finalize")?
            .build()?;

        config.try_deserialize()
    }
}
