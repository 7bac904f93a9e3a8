//! Symbol lookup and historical trendbars.
//!
//! [`SymbolCatalog`] answers the one-shot questions a live bar consumer
//! usually asks first: which symbols exist, what their price precision is,
//! and what the recent closed bars look like.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::FeedError;
use crate::models::{
    Candle, GetTrendbarsRes, Request, SymbolByIdReq, SymbolByIdRes, SymbolInfo, SymbolsListReq,
    SymbolsListRes, TrendbarsQuery,
};
use crate::upstream::{Connection, Response};

/// Symbol and history requests for one account.
pub struct SymbolCatalog<C: ?Sized> {
    connection: Arc<C>,
    account_id: i64,
}

impl<C> SymbolCatalog<C>
where
    C: Connection + ?Sized,
{
    pub fn new(connection: Arc<C>, account_id: i64) -> Self {
        Self {
            connection,
            account_id,
        }
    }

    /// Lists the account's symbols merged with their trading details.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::GetSymbolsList`] if the list request fails, or
    /// [`FeedError::GetSymbolsDetails`] if the follow-up details request
    /// does.
    pub async fn symbols_list(&self, include_archived: bool) -> Result<Vec<SymbolInfo>> {
        let request = Request::SymbolsList(SymbolsListReq {
            ctid_trader_account_id: self.account_id,
            include_archived_symbols: include_archived.then_some(true),
        });
        let list: SymbolsListRes = self
            .send(request)
            .await
            .map_err(|e| FeedError::GetSymbolsList {
                source: Box::new(e),
            })?;
        debug!(
            symbols = list.symbol.len(),
            archived = list.archived_symbol.len(),
            "Symbols list received"
        );

        let ids: Vec<i64> = list.symbol.iter().map(|s| s.symbol_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let details = self.symbol_details(&ids).await?;

        let mut listing = list.symbol;
        let symbols = details
            .symbol
            .into_iter()
            .map(|details| {
                let entry = listing
                    .iter()
                    .position(|s| s.symbol_id == details.symbol_id)
                    .map(|idx| listing.swap_remove(idx));
                SymbolInfo {
                    details,
                    listing: entry,
                }
            })
            .collect::<Vec<_>>();

        info!(count = symbols.len(), "Symbols listed");
        Ok(symbols)
    }

    /// Fetches the trading details of `symbol_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::GetSymbolsDetails`] if the request fails.
    pub async fn symbol_details(&self, symbol_ids: &[i64]) -> Result<SymbolByIdRes> {
        let request = Request::SymbolById(SymbolByIdReq {
            ctid_trader_account_id: self.account_id,
            symbol_id: symbol_ids.to_vec(),
        });
        let details: SymbolByIdRes =
            self.send(request)
                .await
                .map_err(|e| FeedError::GetSymbolsDetails {
                    symbol_ids: symbol_ids.to_vec(),
                    source: Box::new(e),
                })?;
        debug!(
            requested = symbol_ids.len(),
            found = details.symbol.len(),
            "Symbol details received"
        );
        Ok(details)
    }

    /// Fetches closed bars and converts them to candles rounded to the
    /// symbol's precision, oldest first.
    ///
    /// Bars the server sends without a low price or start time are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::GetTrendBars`] if the request fails or the symbol
    /// has no details, or [`FeedError::GetSymbolsDetails`] if the precision
    /// lookup fails.
    pub async fn trend_bars(&self, query: TrendbarsQuery) -> Result<Vec<Candle>> {
        let TrendbarsQuery {
            symbol_id, period, ..
        } = query;
        let bars_failed = |e: FeedError| FeedError::GetTrendBars {
            symbol_id,
            period,
            source: Box::new(e),
        };

        let response: GetTrendbarsRes = self
            .send(Request::GetTrendbars(query.into_request(self.account_id)))
            .await
            .map_err(bars_failed)?;

        let details = self.symbol_details(&[symbol_id]).await?;
        let Some(symbol) = details.symbol.iter().find(|s| s.symbol_id == symbol_id) else {
            return Err(bars_failed(FeedError::MalformedMessage(format!(
                "no details for symbol {symbol_id}"
            ))));
        };

        let received = response.trendbar.len();
        let mut candles: Vec<Candle> = response
            .trendbar
            .iter()
            .filter_map(|bar| bar.to_candle())
            .map(|candle| candle.round_dp(symbol.digits))
            .collect();
        candles.sort_by_key(|candle| candle.time);

        if candles.len() != received {
            warn!(
                symbol_id,
                %period,
                skipped = received - candles.len(),
                "Skipped incomplete trendbars"
            );
        }
        info!(
            symbol_id,
            %period,
            count = candles.len(),
            has_more = response.has_more.unwrap_or(false),
            "Trendbars received"
        );
        Ok(candles)
    }

    async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let name = request.name();
        let Response {
            payload_type,
            payload,
        } = self.connection.send_command(request).await?;
        serde_json::from_value(payload).map_err(|e| {
            FeedError::MalformedMessage(format!(
                "{name} answered with payload type {}: {e}",
                payload_type.as_u32()
            ))
        })
    }
}
