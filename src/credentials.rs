//! Open API credentials and their storage in the system keychain.
//!
//! [`Credentials`] is the immutable quadruple a connection authenticates
//! with. At startup, [`populate_env_from_keychain`] copies any stored
//! credentials into environment variables so the config flow in
//! [`crate::config`] picks them up transparently.

use std::fmt;

use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Keychain service name used for all stored credentials.
const SERVICE: &str = "ctrader-feed";

/// Everything needed to authenticate the application and one account.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    pub access_token: Zeroizing<String>,
    pub ctid_trader_account_id: i64,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        access_token: impl Into<String>,
        ctid_trader_account_id: i64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Zeroizing::new(client_secret.into()),
            access_token: Zeroizing::new(access_token.into()),
            ctid_trader_account_id,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("ctid_trader_account_id", &self.ctid_trader_account_id)
            .finish()
    }
}

/// Known credential keys managed by this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKey {
    ClientId,
    ClientSecret,
    AccessToken,
    AccountId,
}

impl CredentialKey {
    /// Returns the keychain entry identifier.
    pub fn keyring_id(self) -> &'static str {
        match self {
            Self::ClientId => "client_id",
            Self::ClientSecret => "client_secret",
            Self::AccessToken => "access_token",
            Self::AccountId => "account_id",
        }
    }

    /// Returns the environment variable name for this credential.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::ClientId => "CTRADER_CLIENT_ID",
            Self::ClientSecret => "CTRADER_CLIENT_SECRET",
            Self::AccessToken => "CTRADER_ACCESS_TOKEN",
            Self::AccountId => "CTRADER_ACCOUNT_ID",
        }
    }

    /// All credential keys.
    pub const ALL: [CredentialKey; 4] = [
        Self::ClientId,
        Self::ClientSecret,
        Self::AccessToken,
        Self::AccountId,
    ];
}

/// Loads a credential from the keychain, returning `None` if not set.
pub fn load(key: CredentialKey) -> Option<Zeroizing<String>> {
    let entry = keyring::Entry::new(SERVICE, key.keyring_id()).ok()?;
    match entry.get_password() {
        Ok(password) => Some(Zeroizing::new(password)),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key = key.keyring_id(), error = %e, "failed to read keychain entry");
            None
        }
    }
}

/// Populates environment variables from the keychain for any
/// credentials not already set in the environment.
///
/// Call this at startup before [`crate::config::fetch_config`], while the
/// process is still single-threaded: the binary does so before building its
/// runtime.
pub fn populate_env_from_keychain() {
    for key in CredentialKey::ALL {
        if std::env::var(key.env_var()).is_err()
            && let Some(value) = load(key)
        {
            debug!(key = key.env_var(), "loaded credential from keychain");
            // SAFETY: callers run this before any other thread exists
            unsafe {
                std::env::set_var(key.env_var(), value.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let credentials = Credentials::new("id-1", "s3cret", "t0ken", 42);
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("id-1"));
        assert!(rendered.contains("42"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("t0ken"));
    }

    #[test]
    fn env_var_names_are_prefixed() {
        for key in CredentialKey::ALL {
            assert!(key.env_var().starts_with("CTRADER_"));
        }
    }
}
