//! OAuth credential storage.
//!
//! A single credential set is kept in memory and persisted as plaintext JSON
//! in a local file. The file holds exactly six keys:
//! `token`, `refresh_token`, `token_uri`, `client_id`, `client_secret`, `scopes`.
//! The access token expiry is tracked in memory only, so a credential loaded
//! from disk has an unknown expiry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use ga4mcp_core::{Ga4Error, Ga4Result};

/// Default location of the credentials file, relative to the working directory.
pub const GA4_CREDENTIALS_FILE: &str = ".ga4_credentials.json";

/// Safety margin subtracted from the token lifetime reported by Google.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// An OAuth2 credential set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token presented to GA4 APIs.
    #[serde(rename = "token")]
    pub access_token: String,

    /// The refresh token, when Google granted one.
    ///
    /// The key must be present in the file; `null` means no refresh token.
    #[serde(deserialize_with = "Option::deserialize")]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refreshing.
    pub token_uri: String,

    pub client_id: String,
    pub client_secret: String,

    /// Granted OAuth scopes.
    pub scopes: Vec<String>,

    /// When the access token expires. Not persisted.
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential from a token endpoint response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        token_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_uri: token_uri.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
            expires_at: expires_in_secs.map(expiry_from_lifetime),
        }
    }

    /// Returns true if the access token is known to be expired.
    ///
    /// A credential with an unknown expiry is not considered expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Replaces the access token after a refresh.
    pub fn update_access_token(&mut self, access_token: impl Into<String>, expires_in_secs: i64) {
        self.access_token = access_token.into();
        self.expires_at = Some(expiry_from_lifetime(expires_in_secs));
    }
}

fn expiry_from_lifetime(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_BUFFER_SECS)
}

/// Diagnostic view of the current credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialsInfo {
    pub authenticated: bool,
    pub expired: bool,
    pub scopes: Vec<String>,
    pub client_id: Option<String>,
    pub has_refresh_token: bool,
}

impl CredentialsInfo {
    /// Describes the given credential, or the absence of one.
    pub fn of(credential: Option<&Credential>) -> Self {
        match credential {
            None => Self {
                authenticated: false,
                expired: true,
                scopes: Vec::new(),
                client_id: None,
                has_refresh_token: false,
            },
            Some(credential) => Self {
                authenticated: true,
                expired: credential.is_expired(),
                scopes: credential.scopes.clone(),
                client_id: Some(credential.client_id.clone()),
                has_refresh_token: credential.refresh_token.is_some(),
            },
        }
    }
}

/// File-backed storage for one credential set.
#[derive(Debug)]
pub struct CredentialsManager {
    path: PathBuf,
    credential: Option<Credential>,
}

impl Default for CredentialsManager {
    fn default() -> Self {
        Self::new(GA4_CREDENTIALS_FILE)
    }
}

impl CredentialsManager {
    /// Creates a manager backed by the given file. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            credential: None,
        }
    }

    /// Returns the credentials file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the credential to disk, replacing any previous file, and keeps
    /// it in memory.
    pub fn save(&mut self, credential: Credential) -> Ga4Result<()> {
        let content = serde_json::to_string_pretty(&credential).map_err(|e| {
            Ga4Error::credentials(format!("failed to serialize credentials: {}", e)).with_source(e)
        })?;

        write_private_file(&self.path, &content).map_err(|e| {
            error!("failed to save credentials to {:?}: {}", self.path, e);
            Ga4Error::credentials(format!("failed to save credentials: {}", e)).with_source(e)
        })?;

        self.credential = Some(credential);
        info!("credentials saved to {:?}", self.path);
        Ok(())
    }

    /// Loads the credential from disk and caches it.
    pub fn load(&mut self) -> Ga4Result<Credential> {
        if !self.path.exists() {
            return Err(Ga4Error::credentials(
                "no saved credentials found. Please authenticate first.",
            ));
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            Ga4Error::credentials(format!("failed to load credentials: {}", e)).with_source(e)
        })?;

        let credential: Credential = serde_json::from_str(&content).map_err(|e| {
            error!("invalid credentials file format: {}", e);
            Ga4Error::credentials(format!("invalid format of credentials file: {}", e))
                .with_source(e)
        })?;

        info!("credentials loaded from {:?}", self.path);
        self.credential = Some(credential.clone());
        Ok(credential)
    }

    /// Returns the in-memory credential, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Returns true if a credential is loaded and not expired.
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some() && !self.is_expired()
    }

    /// Returns true if no credential is loaded or it is expired.
    pub fn is_expired(&self) -> bool {
        self.credential.as_ref().is_none_or(Credential::is_expired)
    }

    /// Drops the in-memory credential and deletes the file if it exists.
    pub fn clear(&mut self) -> Ga4Result<()> {
        self.credential = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("credentials cleared from {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no credentials file to clear at {:?}", self.path);
                Ok(())
            }
            Err(e) => {
                error!("failed to remove credentials file: {}", e);
                Err(Ga4Error::credentials(format!("failed to clear credentials: {}", e))
                    .with_source(e))
            }
        }
    }

    /// Returns a diagnostic view of the current credential.
    pub fn info(&self) -> CredentialsInfo {
        CredentialsInfo::of(self.credential.as_ref())
    }
}

/// Writes a file readable only by the current user.
///
/// Content goes to a temp file first and is renamed into place.
pub(crate) fn write_private_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let written = fs::write(&temp_path, content)
        .and_then(|()| restrict_to_owner(&temp_path))
        .and_then(|()| fs::rename(&temp_path, path));

    if written.is_err()
        && let Err(e) = fs::remove_file(&temp_path)
        && e.kind() != io::ErrorKind::NotFound
    {
        debug!("failed to remove temp file {:?}: {}", temp_path, e);
    }
    written
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> io::Result<()> {
    Ok(())
}
