//! Authentication request payloads.

use std::fmt;

use serde::Serialize;

/// Authorizes the application (client id / secret) on the connection.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAuthReq {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ApplicationAuthReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationAuthReq")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Authorizes one trading account with the user's access token.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAuthReq {
    pub ctid_trader_account_id: i64,
    pub access_token: String,
}

impl fmt::Debug for AccountAuthReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountAuthReq")
            .field("ctid_trader_account_id", &self.ctid_trader_account_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
