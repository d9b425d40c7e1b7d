//! Client configuration

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `STRIDE__IDENTITY__REALM`
pub const ENV_PREFIX: &str = "STRIDE";

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrideConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub init: InitOptions,
    #[serde(default)]
    pub renewal: RenewalPolicy,
}

/// Where the identity provider lives and who we are to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Provider base URL
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Where the provider sends the browser back to; defaults to the current page
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Where the provider sends the browser after logout; defaults to `redirect_uri`
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_url() -> String {
    "http://localhost:8181".to_string()
}

fn default_realm() -> String {
    "fitness-oauth2".to_string()
}

fn default_client_id() -> String {
    "oauth2-pkce-client".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string()]
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            realm: default_realm(),
            client_id: default_client_id(),
            redirect_uri: None,
            post_logout_redirect_uri: None,
            scopes: default_scopes(),
        }
    }
}

/// What `initialize` does when the page loads without a callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnLoad {
    /// Look for an existing provider session without user interaction
    #[default]
    CheckSso,
    /// Send the user to the login page straight away
    LoginRequired,
}

/// PKCE code challenge method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    #[default]
    S256,
}

impl PkceMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

/// Options for the initial handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitOptions {
    #[serde(default)]
    pub on_load: OnLoad,
    #[serde(default)]
    pub pkce_method: PkceMethod,
    /// Iframe-based session polling; kept off to avoid cross-frame restrictions
    #[serde(default)]
    pub check_login_iframe: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            on_load: OnLoad::CheckSso,
            pkce_method: PkceMethod::S256,
            check_login_iframe: false,
        }
    }
}

/// When and how tokens are renewed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalPolicy {
    /// Remaining validity accepted without renewing
    #[serde(default = "default_min_validity_secs")]
    pub min_validity_secs: u64,
    /// How long before expiry the client raises an expiry notice
    #[serde(default = "default_expiry_leeway_secs")]
    pub expiry_leeway_secs: u64,
    /// How often the browser glue polls for expiry
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u32,
}

fn default_min_validity_secs() -> u64 {
    30
}

fn default_expiry_leeway_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u32 {
    5_000
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            min_validity_secs: default_min_validity_secs(),
            expiry_leeway_secs: default_expiry_leeway_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl RenewalPolicy {
    pub fn min_validity(&self) -> Duration {
        Duration::from_secs(self.min_validity_secs)
    }

    pub fn expiry_leeway(&self) -> Duration {
        Duration::from_secs(self.expiry_leeway_secs)
    }

    /// Expiry notices must arrive while less than `min_validity` remains
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expiry_leeway_secs >= self.min_validity_secs {
            return Err(ConfigError::Message(format!(
                "renewal.expiry_leeway_secs ({}) must be below renewal.min_validity_secs ({})",
                self.expiry_leeway_secs, self.min_validity_secs
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "renewal.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl StrideConfig {
    /// Defaults overridden by `STRIDE__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::finish(Self::builder(None, None)?)
    }

    /// Defaults, then a TOML document, then environment variables
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::finish(Self::builder(Some(toml), None)?)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.renewal.validate()?;
        Ok(config)
    }

    fn builder(
        toml: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(toml) = toml {
            builder = builder.add_source(File::from_str(toml, FileFormat::Toml));
        }

        Ok(builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        ))
    }
}
