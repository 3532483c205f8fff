//! OAuth 2.0 authorization code flow for GA4.
//!
//! The flow is split in two steps so it can be driven by separate tool calls:
//!
//! 1. [`OAuthManager::start`] builds the Google consent URL and persists a
//!    [`FlowState`] file holding the client configuration, the anti-forgery
//!    `state` token and the PKCE code verifier.
//! 2. [`OAuthManager::complete`] takes the authorization code (or the whole
//!    redirect URL the browser landed on), exchanges it for tokens and saves
//!    the resulting credential.
//!
//! Only one flow can be pending at a time. Starting a new flow overwrites the
//! previous state file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use url::Url;

use ga4mcp_core::{Ga4Error, Ga4Result};

use crate::credentials::{Credential, CredentialsInfo, CredentialsManager, write_private_file};
use crate::settings::{OAuthClientConfig, Settings, ga4_scopes};

/// Default location of the pending flow state file.
pub const OAUTH_FLOW_STATE_FILE: &str = ".oauth_flow_state.json";

/// PKCE code verifier length in bytes, before base64 encoding.
const CODE_VERIFIER_LENGTH: usize = 32;
/// Anti-forgery `state` length in bytes, before base64 encoding.
const STATE_LENGTH: usize = 16;

/// Token lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

const NOT_AUTHENTICATED: &str =
    "Not authenticated. Use start_oauth_flow or load_saved_credentials first.";
const CREDENTIALS_EXPIRED: &str =
    "Credentials expired. Please re-authenticate using start_oauth_flow.";
const AUTHENTICATED: &str = "Authenticated and ready to access Google Analytics 4 data.";

/// A PKCE code verifier and its S256 challenge (RFC 7636).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generates a fresh random verifier.
    pub fn generate() -> Self {
        Self::from_verifier(random_token(CODE_VERIFIER_LENGTH))
    }

    /// Derives the challenge of a known verifier.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Returns `len` random bytes, base64url encoded.
fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Data persisted between [`OAuthManager::start`] and [`OAuthManager::complete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub client_config: OAuthClientConfig,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Space-separated granted scopes.
    #[serde(default)]
    scope: Option<String>,
}

/// Authentication details exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthInfo {
    pub authenticated: bool,
    pub status: String,
    pub credentials_info: CredentialsInfo,
    pub required_scopes: Vec<String>,
    pub has_required_config: bool,
}

/// Drives the two-step authorization flow and owns the credential store.
#[derive(Debug)]
pub struct OAuthManager {
    settings: Settings,
    credentials: CredentialsManager,
    flow_state_path: PathBuf,
    http_client: reqwest::Client,
}

impl OAuthManager {
    /// Creates a manager using the default flow state file.
    pub fn new(
        settings: Settings,
        credentials: CredentialsManager,
        timeout: Duration,
    ) -> Ga4Result<Self> {
        Ok(Self {
            settings,
            credentials,
            flow_state_path: PathBuf::from(OAUTH_FLOW_STATE_FILE),
            http_client: build_http_client(timeout)?,
        })
    }

    /// Sets the flow state file location.
    pub fn with_flow_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.flow_state_path = path.into();
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the credential store.
    pub fn credentials(&self) -> &CredentialsManager {
        &self.credentials
    }

    /// Returns the pending flow state file location.
    pub fn flow_state_path(&self) -> &Path {
        &self.flow_state_path
    }

    /// Returns true if a flow was started and not yet completed or reset.
    pub fn has_pending_flow(&self) -> bool {
        self.flow_state_path.exists()
    }

    /// Starts a new authorization flow and returns the consent URL.
    pub fn start(&self) -> Ga4Result<String> {
        self.settings.require_credentials()?;
        let client_config = self.settings.oauth_client_config()?;

        let pkce = PkcePair::generate();
        let state = random_token(STATE_LENGTH);
        let auth_url = client_config
            .web
            .consent_url(&ga4_scopes(), &pkce.challenge, &state)?;

        let flow_state = FlowState {
            client_config,
            state,
            code_verifier: Some(pkce.verifier),
        };

        let content = serde_json::to_string_pretty(&flow_state).map_err(|e| {
            Ga4Error::authentication(format!("failed to start OAuth flow: {}", e)).with_source(e)
        })?;
        write_private_file(&self.flow_state_path, &content).map_err(|e| {
            error!("failed to write flow state {:?}: {}", self.flow_state_path, e);
            Ga4Error::authentication(format!("failed to start OAuth flow: {}", e)).with_source(e)
        })?;

        info!("OAuth flow started");
        debug!("authorization URL: {}", auth_url);
        Ok(auth_url)
    }

    /// Completes the pending flow with an authorization code or redirect URL.
    pub async fn complete(&mut self, authorization_response: &str) -> Ga4Result<Credential> {
        let flow_state = self.read_flow_state()?;
        let code = parse_authorization_response(authorization_response, &flow_state.state)?;

        let credential = exchange_code(&self.http_client, &flow_state, &code).await?;

        self.credentials.save(credential.clone()).map_err(|e| {
            Ga4Error::authentication(format!("failed to complete OAuth flow: {}", e))
                .with_source(e)
        })?;

        if let Err(e) = self.remove_flow_state() {
            warn!("failed to clean up flow state: {}", e);
        }

        info!("OAuth flow completed");
        Ok(credential)
    }

    /// Loads previously saved credentials.
    pub fn load_saved(&mut self) -> Ga4Result<Credential> {
        self.credentials.load().map_err(|e| {
            error!("failed to load saved credentials: {}", e);
            Ga4Error::authentication(format!("failed to load saved credentials: {}", e))
                .with_source(e)
        })
    }

    /// Refreshes the access token of a credential in memory.
    pub async fn refresh(&self, credential: &mut Credential) -> Ga4Result<()> {
        refresh_access_token(&self.http_client, credential).await
    }

    /// Returns whether a usable credential is held, with a status message.
    pub fn check_status(&self) -> (bool, &'static str) {
        credential_status(self.credentials.credential())
    }

    /// Returns the authentication details of the stored credential.
    pub fn auth_info(&self) -> AuthInfo {
        self.auth_info_for(self.credentials.credential())
    }

    /// Returns the authentication details of `credential`.
    ///
    /// Used when a newer copy of the credential lives elsewhere, such as a
    /// client that refreshed its access token.
    pub fn auth_info_for(&self, credential: Option<&Credential>) -> AuthInfo {
        let (authenticated, status) = credential_status(credential);
        AuthInfo {
            authenticated,
            status: status.to_string(),
            credentials_info: CredentialsInfo::of(credential),
            required_scopes: ga4_scopes(),
            has_required_config: self.settings.has_required_credentials(),
        }
    }

    /// Clears saved credentials and any pending flow.
    ///
    /// Both removals are attempted; the first failure is reported.
    pub fn reset(&mut self) -> Ga4Result<()> {
        let cleared = self.credentials.clear();
        let flow_removed = self
            .remove_flow_state()
            .map_err(|e| Ga4Error::credentials(e.to_string()).with_source(e));

        cleared.and(flow_removed).map_err(|e| {
            error!("failed to reset authentication: {}", e);
            Ga4Error::authentication(format!("failed to reset authentication: {}", e))
                .with_source(e)
        })?;

        info!("authentication reset");
        Ok(())
    }

    fn read_flow_state(&self) -> Ga4Result<FlowState> {
        if !self.flow_state_path.exists() {
            return Err(Ga4Error::authentication(
                "no OAuth flow state found. Please start OAuth flow first.",
            ));
        }

        let content = fs::read_to_string(&self.flow_state_path).map_err(|e| {
            Ga4Error::authentication(format!("failed to read flow state: {}", e)).with_source(e)
        })?;

        serde_json::from_str(&content).map_err(|e| {
            error!("invalid flow state file: {}", e);
            Ga4Error::authentication(format!("invalid flow state file: {}", e)).with_source(e)
        })
    }

    fn remove_flow_state(&self) -> io::Result<()> {
        match fs::remove_file(&self.flow_state_path) {
            Ok(()) => {
                debug!("OAuth flow state cleaned up");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Returns whether `credential` is usable, with a status message.
pub fn credential_status(credential: Option<&Credential>) -> (bool, &'static str) {
    match credential {
        None => (false, NOT_AUTHENTICATED),
        Some(credential) if credential.is_expired() => (false, CREDENTIALS_EXPIRED),
        Some(_) => (true, AUTHENTICATED),
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Ga4Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            Ga4Error::configuration(format!("failed to create HTTP client: {}", e)).with_source(e)
        })
}

/// Extracts the authorization code from what the user pasted.
///
/// A bare code is returned as is. A redirect URL must carry a `state` equal
/// to `expected_state`; an `error` parameter means the user denied access.
pub fn parse_authorization_response(input: &str, expected_state: &str) -> Ga4Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Ga4Error::authentication("authorization code cannot be empty"));
    }

    if !(input.starts_with("http://") || input.starts_with("https://")) {
        return Ok(input.to_string());
    }

    let url = Url::parse(input).map_err(|e| {
        Ga4Error::authentication(format!("invalid redirect URL: {}", e)).with_source(e)
    })?;

    let mut code = None;
    let mut state = None;
    let mut denied = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => denied = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = denied {
        return Err(Ga4Error::authentication(format!(
            "authorization denied: {}",
            reason
        )));
    }

    if state.as_deref() != Some(expected_state) {
        warn!("OAuth state mismatch in redirect URL");
        return Err(Ga4Error::authentication(
            "OAuth state mismatch - possible CSRF attack",
        ));
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| Ga4Error::authentication("missing authorization code in redirect URL"))
}

async fn exchange_code(
    http_client: &reqwest::Client,
    flow_state: &FlowState,
    code: &str,
) -> Ga4Result<Credential> {
    let client = &flow_state.client_config.web;
    let mut params = vec![
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", client.redirect_uri()),
    ];
    if let Some(verifier) = &flow_state.code_verifier {
        params.push(("code_verifier", verifier.as_str()));
    }

    info!("exchanging authorization code for tokens");
    let token = post_token_request(http_client, &client.token_uri, &params, "token exchange").await?;

    let scopes = token
        .scope
        .as_deref()
        .map(|s| s.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(ga4_scopes);

    Ok(Credential::new(
        token.access_token,
        token.refresh_token,
        Some(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)),
        client.token_uri.clone(),
        client.client_id.clone(),
        client.client_secret.clone(),
        scopes,
    ))
}

/// Exchanges the credential's refresh token for a new access token.
///
/// The refreshed token is kept in memory only.
pub async fn refresh_access_token(
    http_client: &reqwest::Client,
    credential: &mut Credential,
) -> Ga4Result<()> {
    let Some(refresh_token) = credential.refresh_token.clone() else {
        return Err(Ga4Error::authentication(
            "credentials cannot be refreshed: no refresh token",
        ));
    };

    let params = [
        ("client_id", credential.client_id.as_str()),
        ("client_secret", credential.client_secret.as_str()),
        ("refresh_token", refresh_token.as_str()),
        ("grant_type", "refresh_token"),
    ];

    let token =
        post_token_request(http_client, &credential.token_uri, &params, "token refresh").await?;

    credential.update_access_token(
        token.access_token,
        token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
    );
    info!("successfully refreshed access token");
    Ok(())
}

async fn post_token_request(
    http_client: &reqwest::Client,
    token_uri: &str,
    params: &[(&str, &str)],
    what: &str,
) -> Ga4Result<TokenResponse> {
    let response = http_client
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(|e| {
            Ga4Error::authentication(format!("{} request failed: {}", what, e)).with_source(e)
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        Ga4Error::authentication(format!("failed to read {} response: {}", what, e)).with_source(e)
    })?;

    if !status.is_success() {
        error!("{} failed ({})", what, status);
        return Err(Ga4Error::authentication(format!(
            "{} failed ({}): {}",
            what, status, body
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        Ga4Error::authentication(format!("invalid {} response: {}", what, e)).with_source(e)
    })
}
