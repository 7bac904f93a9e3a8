//! Open API authentication.
//!
//! A fresh connection must authenticate twice before it may subscribe:
//! first the application (client id and secret), then the trading account
//! (access token for a ctid trader account id). Both steps are one
//! request/response exchange each.

use tracing::{error, info};

use crate::Result;
use crate::credentials::Credentials;
use crate::models::{AccountAuthReq, ApplicationAuthReq, Request};
use crate::upstream::Connection;

/// Authenticates the application identified by `credentials.client_id`.
///
/// # Errors
///
/// Returns [`FeedError::ApplicationAuthentication`](crate::FeedError::ApplicationAuthentication)
/// wrapping the cause if the request fails or the server rejects it.
pub async fn authenticate_app<C>(connection: &C, credentials: &Credentials) -> Result<()>
where
    C: Connection + ?Sized,
{
    let request = Request::ApplicationAuth(ApplicationAuthReq {
        client_id: credentials.client_id.clone(),
        client_secret: credentials.client_secret.as_str().to_owned(),
    });

    match connection.send_command(request).await {
        Ok(_) => {
            info!(client_id = %credentials.client_id, "Application authenticated");
            Ok(())
        }
        Err(e) => {
            error!(client_id = %credentials.client_id, error = %e, "Application authentication failed");
            Err(crate::FeedError::ApplicationAuthentication(e.to_string()))
        }
    }
}

/// Authenticates the trading account of `credentials`.
///
/// Must follow a successful [`authenticate_app`] on the same connection.
///
/// # Errors
///
/// Returns [`FeedError::UserAuthentication`](crate::FeedError::UserAuthentication)
/// wrapping the cause if the request fails or the server rejects it.
pub async fn authenticate_user<C>(connection: &C, credentials: &Credentials) -> Result<()>
where
    C: Connection + ?Sized,
{
    let account_id = credentials.ctid_trader_account_id;
    let request = Request::AccountAuth(AccountAuthReq {
        ctid_trader_account_id: account_id,
        access_token: credentials.access_token.as_str().to_owned(),
    });

    match connection.send_command(request).await {
        Ok(_) => {
            info!(account_id, "Account authenticated");
            Ok(())
        }
        Err(e) => {
            error!(account_id, error = %e, "Account authentication failed");
            Err(crate::FeedError::UserAuthentication(e.to_string()))
        }
    }
}
