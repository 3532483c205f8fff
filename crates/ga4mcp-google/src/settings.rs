//! Environment-backed settings.
//!
//! `GA4_CLIENT_ID` and `GA4_CLIENT_SECRET` are required, but only when they
//! are actually read: a partial configuration fails at the first operation
//! that needs the missing value, not at startup. `GA4_PROPERTY_ID` is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use ga4mcp_core::{Ga4Error, Ga4Result};

/// Environment variable holding the OAuth client ID.
pub const ENV_CLIENT_ID: &str = "GA4_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "GA4_CLIENT_SECRET";
/// Environment variable holding the default GA4 property ID.
pub const ENV_PROPERTY_ID: &str = "GA4_PROPERTY_ID";

/// Google OAuth authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Fixed loopback redirect URI registered for the OAuth client.
pub const OAUTH_REDIRECT_URI: &str = "http://localhost:8080";

/// OAuth scopes requested for GA4 access.
pub const GA4_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/analytics.readonly",
    "https://www.googleapis.com/auth/analytics.manage.users.readonly",
];

/// Returns [`GA4_SCOPES`] as owned strings.
pub fn ga4_scopes() -> Vec<String> {
    GA4_SCOPES.iter().map(|s| s.to_string()).collect()
}

/// OAuth client configuration in Google's client secrets layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub web: WebClientConfig,
}

/// The `web` section of an OAuth client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uris: Vec<String>,
}

impl WebClientConfig {
    /// Returns the first registered redirect URI, or the fixed loopback URI.
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OAUTH_REDIRECT_URI)
    }

    /// Builds the Google consent URL for a PKCE S256 challenge.
    ///
    /// Offline access and a forced consent prompt are requested so Google
    /// always hands out a refresh token.
    pub fn consent_url(
        &self,
        scopes: &[String],
        code_challenge: &str,
        state: &str,
    ) -> Ga4Result<String> {
        let scope = scopes.join(" ");
        let url = Url::parse_with_params(
            &self.auth_uri,
            [
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| {
            Ga4Error::configuration(format!("invalid authorization URI {}: {}", self.auth_uri, e))
                .with_source(e)
        })?;
        Ok(url.into())
    }
}

/// GA4 settings read from the environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    client_id: Option<String>,
    client_secret: Option<String>,
    property_id: Option<String>,
}

impl Settings {
    /// Creates settings from explicit values. Empty strings count as unset.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        property_id: Option<String>,
    ) -> Self {
        Self {
            client_id: client_id.filter(|s| !s.is_empty()),
            client_secret: client_secret.filter(|s| !s.is_empty()),
            property_id: property_id.filter(|s| !s.is_empty()),
        }
    }

    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(ENV_CLIENT_ID).ok(),
            std::env::var(ENV_CLIENT_SECRET).ok(),
            std::env::var(ENV_PROPERTY_ID).ok(),
        )
    }

    /// Returns the OAuth client ID.
    pub fn client_id(&self) -> Ga4Result<&str> {
        self.client_id.as_deref().ok_or_else(|| missing(&[ENV_CLIENT_ID]))
    }

    /// Returns the OAuth client secret.
    pub fn client_secret(&self) -> Ga4Result<&str> {
        self.client_secret
            .as_deref()
            .ok_or_else(|| missing(&[ENV_CLIENT_SECRET]))
    }

    /// Returns the default property ID, if configured.
    pub fn property_id(&self) -> Option<&str> {
        self.property_id.as_deref()
    }

    /// Returns true if both the client ID and secret are set.
    pub fn has_required_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Returns the names of the required variables that are unset.
    pub fn missing_variables(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.client_id.is_none() {
            names.push(ENV_CLIENT_ID);
        }
        if self.client_secret.is_none() {
            names.push(ENV_CLIENT_SECRET);
        }
        names
    }

    /// Fails with a configuration error naming every missing variable.
    pub fn require_credentials(&self) -> Ga4Result<()> {
        let names = self.missing_variables();
        if names.is_empty() {
            Ok(())
        } else {
            Err(missing(&names))
        }
    }

    /// Builds the OAuth client configuration.
    pub fn oauth_client_config(&self) -> Ga4Result<OAuthClientConfig> {
        self.require_credentials()?;
        Ok(OAuthClientConfig {
            web: WebClientConfig {
                client_id: self.client_id()?.to_string(),
                client_secret: self.client_secret()?.to_string(),
                auth_uri: GOOGLE_AUTH_URI.to_string(),
                token_uri: GOOGLE_TOKEN_URI.to_string(),
                redirect_uris: vec![OAUTH_REDIRECT_URI.to_string()],
            },
        })
    }

    /// Returns a snapshot of the configuration that is safe to display.
    pub fn debug_info(&self) -> DebugInfo {
        let status = |value: &Option<String>| {
            if value.is_some() { "[SET]" } else { "[NOT SET]" }.to_string()
        };

        DebugInfo {
            env_file_exists: Path::new(".env").exists(),
            variables: VariablesInfo {
                client_id: status(&self.client_id),
                client_secret: status(&self.client_secret),
                property_id: self
                    .property_id
                    .clone()
                    .unwrap_or_else(|| "[NOT SET]".to_string()),
            },
            client_id_preview: self
                .client_id
                .as_ref()
                .map(|id| format!("{}...", id.chars().take(10).collect::<String>())),
        }
    }
}

fn missing(names: &[&str]) -> Ga4Error {
    let (noun, pronoun) = if names.len() == 1 {
        ("environment variable is", "it")
    } else {
        ("environment variables are", "them")
    };
    Ga4Error::configuration(format!(
        "{} {} required. Please set {} in your .env file or environment.",
        names.join(" and "),
        noun,
        pronoun
    ))
}

/// Configuration snapshot with secrets masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugInfo {
    pub env_file_exists: bool,
    pub variables: VariablesInfo,
    #[serde(rename = "GA4_CLIENT_ID_preview")]
    pub client_id_preview: Option<String>,
}

/// Per-variable status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariablesInfo {
    #[serde(rename = "GA4_CLIENT_ID")]
    pub client_id: String,
    #[serde(rename = "GA4_CLIENT_SECRET")]
    pub client_secret: String,
    #[serde(rename = "GA4_PROPERTY_ID")]
    pub property_id: String,
}
