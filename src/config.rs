//! Application configuration loaded from environment variables.
//!
//! Credentials **must** be provided via environment variables (or the
//! keychain, see [`crate::credentials::populate_env_from_keychain`]):
//! - `CTRADER_CLIENT_ID` / `CTRADER_CLIENT_SECRET`: application credentials
//! - `CTRADER_ACCESS_TOKEN`: OAuth access token of the trading user
//! - `CTRADER_ACCOUNT_ID`: numeric ctid trader account id
//!
//! Optional flags: `CTRADER_LIVE` (default `false`), `CTRADER_DEBUG`
//! (default `false`), `CTRADER_AUTO_RECONNECT` (default `true`). An optional
//! `CTRADER_WEBSOCKET_URL` overrides the endpoint selected by `CTRADER_LIVE`.

use crate::credentials::{CredentialKey, Credentials};

/// Demo environment JSON WebSocket endpoint.
pub const DEMO_WEBSOCKET_URL: &str = "wss://demo.ctraderapi.com:5036";

/// Live environment JSON WebSocket endpoint.
pub const LIVE_WEBSOCKET_URL: &str = "wss://live.ctraderapi.com:5036";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub ctrader: CTraderConfig,
}

/// Connection and client behavior settings.
#[derive(Debug)]
pub struct CTraderConfig {
    /// Connect to the live environment instead of demo.
    pub live: bool,
    pub websocket_url: String,
    pub credentials: Credentials,
    /// Enables verbose per-heartbeat logging.
    pub debug: bool,
    /// Restart the connection when the server goes silent.
    pub auto_reconnect: bool,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`FeedError::Config`](crate::FeedError::Config) if a credential is
/// missing, the account id is not a number, or a flag is not a boolean.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let live = bool_var("CTRADER_LIVE", false)?;
    let debug = debug_enabled()?;
    let auto_reconnect = bool_var("CTRADER_AUTO_RECONNECT", true)?;

    let websocket_url = non_empty_var("CTRADER_WEBSOCKET_URL").unwrap_or_else(|| {
        if live {
            LIVE_WEBSOCKET_URL.to_string()
        } else {
            DEMO_WEBSOCKET_URL.to_string()
        }
    });

    let client_id = required_var(CredentialKey::ClientId)?;
    let client_secret = required_var(CredentialKey::ClientSecret)?;
    let access_token = required_var(CredentialKey::AccessToken)?;
    let account_id = required_var(CredentialKey::AccountId)?;
    let account_id: i64 = account_id.trim().parse().map_err(|_| {
        crate::FeedError::Config(format!(
            "{} must be a number",
            CredentialKey::AccountId.env_var()
        ))
    })?;

    Ok(AppConfig {
        ctrader: CTraderConfig {
            live,
            websocket_url,
            credentials: Credentials::new(client_id, client_secret, access_token, account_id),
            debug,
            auto_reconnect,
        },
    })
}

/// Reads only the `CTRADER_DEBUG` flag, for setting up logging before the
/// rest of the configuration is loaded.
///
/// # Errors
///
/// Returns [`FeedError::Config`](crate::FeedError::Config) if the flag is not
/// a boolean.
pub fn debug_enabled() -> crate::Result<bool> {
    bool_var("CTRADER_DEBUG", false)
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn required_var(key: CredentialKey) -> crate::Result<String> {
    non_empty_var(key.env_var())
        .ok_or_else(|| crate::FeedError::Config(format!("{} is missing", key.env_var())))
}

fn bool_var(name: &str, default: bool) -> crate::Result<bool> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(crate::FeedError::Config(format!(
                "{name} must be a boolean, got `{value}`"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    const CREDENTIALS: [(&str, Option<&str>); 4] = [
        ("CTRADER_CLIENT_ID", Some("client-id")),
        ("CTRADER_CLIENT_SECRET", Some("client-secret")),
        ("CTRADER_ACCESS_TOKEN", Some("access-token")),
        ("CTRADER_ACCOUNT_ID", Some("1234567")),
    ];

    /// Helper that temporarily sets env vars, runs `f`, then restores originals.
    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock();
        let originals: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();

        for (k, v) in vars {
            // SAFETY: env access is serialized by ENV_LOCK.
            unsafe {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values under the same lock.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    fn vars<'a>(extra: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, Option<&'a str>)> {
        let mut vars = vec![
            ("CTRADER_LIVE", None),
            ("CTRADER_DEBUG", None),
            ("CTRADER_AUTO_RECONNECT", None),
            ("CTRADER_WEBSOCKET_URL", None),
        ];
        vars.extend_from_slice(&CREDENTIALS);
        for (k, v) in extra {
            match vars.iter_mut().find(|(name, _)| name == k) {
                Some(entry) => entry.1 = *v,
                None => vars.push((k, *v)),
            }
        }
        vars
    }

    #[test]
    fn defaults_with_credentials() {
        with_env(&vars(&[]), || {
            let config = fetch_config().unwrap();
            assert_eq!(config.ctrader.websocket_url, DEMO_WEBSOCKET_URL);
            assert!(!config.ctrader.live);
            assert!(!config.ctrader.debug);
            assert!(config.ctrader.auto_reconnect);
            assert_eq!(config.ctrader.credentials.client_id, "client-id");
            assert_eq!(config.ctrader.credentials.client_secret.as_str(), "client-secret");
            assert_eq!(config.ctrader.credentials.access_token.as_str(), "access-token");
            assert_eq!(config.ctrader.credentials.ctid_trader_account_id, 1_234_567);
        });
    }

    #[test]
    fn live_flag_selects_live_endpoint() {
        with_env(&vars(&[("CTRADER_LIVE", Some("true"))]), || {
            let config = fetch_config().unwrap();
            assert!(config.ctrader.live);
            assert_eq!(config.ctrader.websocket_url, LIVE_WEBSOCKET_URL);
        });
    }

    #[test]
    fn custom_websocket_url_wins() {
        with_env(
            &vars(&[
                ("CTRADER_LIVE", Some("1")),
                ("CTRADER_WEBSOCKET_URL", Some("wss://custom.example.com")),
            ]),
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.ctrader.websocket_url, "wss://custom.example.com");
            },
        );
    }

    #[test]
    fn flags_parse_booleans() {
        with_env(
            &vars(&[
                ("CTRADER_DEBUG", Some("yes")),
                ("CTRADER_AUTO_RECONNECT", Some("false")),
            ]),
            || {
                let config = fetch_config().unwrap();
                assert!(config.ctrader.debug);
                assert!(!config.ctrader.auto_reconnect);
            },
        );

        with_env(&vars(&[("CTRADER_DEBUG", Some("maybe"))]), || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("CTRADER_DEBUG must be a boolean"));
        });
    }

    #[test]
    fn debug_flag_reads_without_credentials() {
        with_env(
            &[
                ("CTRADER_DEBUG", Some("on")),
                ("CTRADER_CLIENT_ID", None),
            ],
            || {
                assert!(debug_enabled().unwrap());
                assert!(fetch_config().is_err());
            },
        );
        with_env(&[("CTRADER_DEBUG", None)], || {
            assert!(!debug_enabled().unwrap());
        });
    }

    #[test]
    fn rejects_missing_credential() {
        with_env(&vars(&[("CTRADER_ACCESS_TOKEN", None)]), || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("CTRADER_ACCESS_TOKEN is missing"));
        });
    }

    #[test]
    fn rejects_non_numeric_account_id() {
        with_env(&vars(&[("CTRADER_ACCOUNT_ID", Some("abc"))]), || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("CTRADER_ACCOUNT_ID must be a number"));
        });
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &vars(&[
                ("CTRADER_CLIENT_ID", Some("")),
                ("CTRADER_WEBSOCKET_URL", Some("")),
            ]),
            || {
                let err = fetch_config().unwrap_err();
                assert!(err.to_string().contains("CTRADER_CLIENT_ID is missing"));
            },
        );
    }
}
