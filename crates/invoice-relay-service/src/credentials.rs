//! Secret material loaded from the process environment.
//!
//! Secrets never travel through the layered file configuration; they come
//! exclusively from environment variables so they stay out of config files
//! and their diffs. Any missing variable is fatal at startup, before the
//! server binds.

use tracing::debug;

/// Environment variable names, one per secret.
pub const SIGNING_SECRET_VAR: &str = "SLACK_SIGNING_SECRET";
pub const BOT_TOKEN_VAR: &str = "SLACK_BOT_TOKEN";
pub const BOT_USER_ID_VAR: &str = "SLACK_BOT_USER_ID";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const LEDGER_API_KEY_VAR: &str = "REQ_API_KEY";

/// A required secret is absent or empty.
#[derive(Debug, Clone, thiserror::Error)]
#[error("required environment variable {name} is not set")]
pub struct MissingCredential {
    pub name: &'static str,
}

/// All secret material the service needs, resolved at startup.
pub struct Credentials {
    /// HMAC secret for inbound request signatures.
    pub signing_secret: String,

    /// Bearer token for the outbound chat API.
    pub bot_token: String,

    /// The bot's own user ID, used to strip mention tokens.
    pub bot_user_id: String,

    /// API key for the extraction oracle.
    pub openai_api_key: String,

    /// API key for the invoicing ledger.
    pub ledger_api_key: String,
}

impl Credentials {
    /// Load every credential from the environment.
    ///
    /// Fails on the first missing variable; the error names it so the
    /// operator knows exactly what to set.
    pub fn from_env() -> Result<Self, MissingCredential> {
        let credentials = Self {
            signing_secret: require_var(SIGNING_SECRET_VAR)?,
            bot_token: require_var(BOT_TOKEN_VAR)?,
            bot_user_id: require_var(BOT_USER_ID_VAR)?,
            openai_api_key: require_var(OPENAI_API_KEY_VAR)?,
            ledger_api_key: require_var(LEDGER_API_KEY_VAR)?,
        };
        debug!("All credentials loaded from environment");
        Ok(credentials)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("signing_secret", &"<REDACTED>")
            .field("bot_token", &"<REDACTED>")
            .field("bot_user_id", &self.bot_user_id)
            .field("openai_api_key", &"<REDACTED>")
            .field("ledger_api_key", &"<REDACTED>")
            .finish()
    }
}

/// Read one environment variable, treating empty as absent.
fn require_var(name: &'static str) -> Result<String, MissingCredential> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(MissingCredential { name }),
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
