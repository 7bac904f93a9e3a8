//! High-level client.
//!
//! A [`Client`] owns one connection, one set of credentials, one subscriber
//! registry and one supervisor. Live bar and symbol operations are only
//! available while the connection is [`ConnectionState::Ready`].

use std::sync::Arc;

use crate::Result;
use crate::config::CTraderConfig;
use crate::coordinator::SubscriptionCoordinator;
use crate::credentials::Credentials;
use crate::models::{Candle, SymbolByIdRes, SymbolInfo, TrendbarPeriod, TrendbarsQuery};
use crate::stream::LiveBarStream;
use crate::supervisor::{ConnectionHealthSupervisor, ConnectionState, SupervisorConfig};
use crate::symbols::SymbolCatalog;
use crate::upstream::Connection;
use crate::websocket::WsConnection;

/// Live bars client for one trading account.
pub struct Client<C: ?Sized> {
    coordinator: Arc<SubscriptionCoordinator<C>>,
    supervisor: Arc<ConnectionHealthSupervisor<C>>,
    symbols: SymbolCatalog<C>,
}

impl<C> Client<C>
where
    C: Connection + ?Sized + 'static,
{
    pub fn new(connection: Arc<C>, credentials: Credentials, config: SupervisorConfig) -> Self {
        let credentials = Arc::new(credentials);
        let coordinator = Arc::new(SubscriptionCoordinator::new(
            connection.clone(),
            credentials.ctid_trader_account_id,
        ));
        let symbols = SymbolCatalog::new(connection.clone(), credentials.ctid_trader_account_id);
        let supervisor = Arc::new(ConnectionHealthSupervisor::new(
            connection,
            credentials,
            coordinator.clone(),
            config,
        ));
        Self {
            coordinator,
            supervisor,
            symbols,
        }
    }

    /// Connects and authenticates. Does nothing when already connected.
    ///
    /// # Errors
    ///
    /// See [`ConnectionHealthSupervisor::connect`].
    pub async fn connect(&self) -> Result<()> {
        self.supervisor.connect().await
    }

    /// Closes the connection and ends every live bar stream.
    pub async fn disconnect(&self) {
        self.supervisor.disconnect().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Number of automatic restarts performed so far.
    pub fn reconnect_count(&self) -> u64 {
        self.supervisor.reconnect_count()
    }

    /// Returns the live bar manager.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// unless the connection is ready.
    pub fn live_bars(&self) -> Result<&SubscriptionCoordinator<C>> {
        if !self.is_ready() {
            return Err(crate::FeedError::ClientNotReady);
        }
        Ok(&self.coordinator)
    }

    /// Returns the symbol catalog.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// unless the connection is ready.
    pub fn symbols(&self) -> Result<&SymbolCatalog<C>> {
        if !self.is_ready() {
            return Err(crate::FeedError::ClientNotReady);
        }
        Ok(&self.symbols)
    }

    /// Shorthand for [`SymbolCatalog::symbols_list`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// or a symbol request error.
    pub async fn symbols_list(&self, include_archived: bool) -> Result<Vec<SymbolInfo>> {
        self.symbols()?.symbols_list(include_archived).await
    }

    /// Shorthand for [`SymbolCatalog::symbol_details`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// or [`FeedError::GetSymbolsDetails`](crate::FeedError::GetSymbolsDetails).
    pub async fn symbol_details(&self, symbol_ids: &[i64]) -> Result<SymbolByIdRes> {
        self.symbols()?.symbol_details(symbol_ids).await
    }

    /// Shorthand for [`SymbolCatalog::trend_bars`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// or a trendbar request error.
    pub async fn trend_bars(&self, query: TrendbarsQuery) -> Result<Vec<Candle>> {
        self.symbols()?.trend_bars(query).await
    }

    /// Shorthand for [`SubscriptionCoordinator::subscribe_live_bars`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// or a subscription error.
    pub async fn subscribe_live_bars(
        &self,
        symbol_id: i64,
        period: TrendbarPeriod,
    ) -> Result<LiveBarStream> {
        self.live_bars()?
            .subscribe_live_bars(symbol_id, period)
            .await
    }

    /// Shorthand for [`SubscriptionCoordinator::unsubscribe_live_bars`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// or [`FeedError::UnsubscribeBar`](crate::FeedError::UnsubscribeBar).
    pub async fn unsubscribe_live_bars(&self, symbol_id: i64, period: TrendbarPeriod) -> Result<()> {
        self.live_bars()?
            .unsubscribe_live_bars(symbol_id, period)
            .await
    }

    /// Shorthand for [`SubscriptionCoordinator::unsubscribe_spots`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::ClientNotReady`](crate::FeedError::ClientNotReady)
    /// or [`FeedError::UnsubscribeTick`](crate::FeedError::UnsubscribeTick).
    pub async fn unsubscribe_spots(&self, symbol_id: i64) -> Result<()> {
        self.live_bars()?.unsubscribe_spots(symbol_id).await
    }
}

impl Client<WsConnection> {
    /// Builds a client speaking JSON over WebSocket to the configured
    /// endpoint.
    pub fn from_config(config: &CTraderConfig) -> Self {
        let connection = Arc::new(WsConnection::new(config.websocket_url.clone()));
        Self::new(
            connection,
            config.credentials.clone(),
            SupervisorConfig::from(config),
        )
    }
}
