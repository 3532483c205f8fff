//! Process-wide state shared by the tool handlers.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use ga4mcp_core::Ga4Result;
use ga4mcp_google::{
    ADMIN_API_BASE, AuthInfo, Credential, CredentialsManager, DATA_API_BASE,
    GA4_CREDENTIALS_FILE, Ga4Client, OAUTH_FLOW_STATE_FILE, OAuthManager, Settings,
};

/// Default timeout for calls to Google.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// File locations and network settings of a [`Ga4Context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub credentials_path: PathBuf,
    pub flow_state_path: PathBuf,
    pub timeout: Duration,
    pub data_api_base: String,
    pub admin_api_base: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(GA4_CREDENTIALS_FILE),
            flow_state_path: PathBuf::from(OAUTH_FLOW_STATE_FILE),
            timeout: DEFAULT_TIMEOUT,
            data_api_base: DATA_API_BASE.to_string(),
            admin_api_base: ADMIN_API_BASE.to_string(),
        }
    }
}

impl ContextOptions {
    /// Sets the credentials file location.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Sets the pending flow state file location.
    pub fn with_flow_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.flow_state_path = path.into();
        self
    }

    /// Sets the timeout of every call to Google.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Settings, the OAuth manager and the GA4 client once one is bound.
#[derive(Debug)]
pub struct Ga4Context {
    oauth: OAuthManager,
    client: Option<Ga4Client>,
    options: ContextOptions,
}

impl Ga4Context {
    /// Creates a context with no client bound. Nothing is read from disk.
    pub fn new(settings: Settings, options: ContextOptions) -> Ga4Result<Self> {
        let credentials = CredentialsManager::new(&options.credentials_path);
        let oauth = OAuthManager::new(settings, credentials, options.timeout)?
            .with_flow_state_path(&options.flow_state_path);

        Ok(Self {
            oauth,
            client: None,
            options,
        })
    }

    /// Returns the environment settings.
    pub fn settings(&self) -> &Settings {
        self.oauth.settings()
    }

    /// Returns the OAuth manager, which owns the credential store.
    pub fn oauth(&self) -> &OAuthManager {
        &self.oauth
    }

    /// Mutable access to the OAuth manager, for the flow and reset tools.
    pub fn oauth_mut(&mut self) -> &mut OAuthManager {
        &mut self.oauth
    }

    /// Returns the authentication details.
    ///
    /// A bound client may have refreshed its access token since the credential
    /// was stored, so its copy wins over the credential store's.
    pub async fn auth_info(&self) -> AuthInfo {
        match &self.client {
            Some(client) => {
                let credential = client.credential().await;
                self.oauth.auth_info_for(Some(&credential))
            }
            None => self.oauth.auth_info(),
        }
    }

    /// Returns the bound GA4 client, if authenticated.
    pub fn client(&self) -> Option<&Ga4Client> {
        self.client.as_ref()
    }

    /// Binds a GA4 client to the given credential, replacing any previous one.
    pub fn bind_client(&mut self, credential: Credential) -> Ga4Result<()> {
        let client = Ga4Client::new(credential, self.options.timeout)?
            .with_data_api_base(&self.options.data_api_base)
            .with_admin_api_base(&self.options.admin_api_base);
        self.client = Some(client);
        info!("GA4 client ready");
        Ok(())
    }

    /// Drops the bound client, if any.
    pub fn unbind_client(&mut self) {
        self.client = None;
    }

    /// Binds a client from the saved credentials file, if there is one.
    ///
    /// Returns true when a client is bound afterwards.
    pub fn restore_session(&mut self) -> bool {
        if self.client.is_some() {
            return true;
        }
        if !self.options.credentials_path.exists() {
            debug!("no saved credentials to restore");
            return false;
        }

        match self
            .oauth
            .load_saved()
            .and_then(|credential| self.bind_client(credential))
        {
            Ok(()) => true,
            Err(e) => {
                debug!("could not restore saved session: {}", e);
                false
            }
        }
    }
}
