//! Google OAuth2 credential lifecycle and the GA4 Data/Admin API client.
//!
//! - [`settings`]: environment-backed client configuration
//! - [`credentials`]: the persisted credential file
//! - [`oauth`]: the two-step authorization code flow and token refresh
//! - [`client`]: report and property listing calls

pub mod client;
pub mod credentials;
pub mod oauth;
pub mod settings;

pub use client::{ADMIN_API_BASE, DATA_API_BASE, Ga4Client};
pub use credentials::{Credential, CredentialsInfo, CredentialsManager, GA4_CREDENTIALS_FILE};
pub use oauth::{
    AuthInfo, FlowState, OAUTH_FLOW_STATE_FILE, OAuthManager, PkcePair, credential_status,
};
pub use settings::{DebugInfo, GA4_SCOPES, OAuthClientConfig, Settings, WebClientConfig};
