//! Upstream subscription lifecycle and tick routing.
//!
//! Many logical live bar subscribers share one upstream spot feed per symbol
//! and one upstream live trendbar feed per (symbol, period). The
//! [`SubscriptionCoordinator`] keeps track of which upstream feeds are open
//! on the current connection, opens them on first use, closes the trendbar
//! feed when its last subscriber leaves, and fans every inbound spot event
//! out to the subscribers of its symbol.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};

use crate::Result;
use crate::models::{
    PushEvent, Request, SpotEvent, SubscribeLiveTrendbarReq, SubscribeSpotsReq, TrendbarPeriod,
    UnsubscribeLiveTrendbarReq, UnsubscribeSpotsReq,
};
use crate::registry::{PeriodFilter, SubscriberRegistry};
use crate::stream::{self, LiveBarStream};
use crate::upstream::Connection;

/// Upstream feeds currently open on the connection.
#[derive(Debug, Default)]
struct UpstreamState {
    spots: HashSet<i64>,
    trendbars: HashSet<(i64, TrendbarPeriod)>,
}

/// Reference-counts upstream subscriptions and routes ticks to subscribers.
pub struct SubscriptionCoordinator<C: ?Sized> {
    connection: Arc<C>,
    account_id: i64,
    registry: SubscriberRegistry,
    /// Held across upstream calls so each feed is opened or closed once.
    upstream: Mutex<UpstreamState>,
}

impl<C> SubscriptionCoordinator<C>
where
    C: Connection + ?Sized,
{
    pub fn new(connection: Arc<C>, account_id: i64) -> Self {
        Self {
            connection,
            account_id,
            registry: SubscriberRegistry::new(),
            upstream: Mutex::new(UpstreamState::default()),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Starts a live bar subscription for `symbol_id` and `period`.
    ///
    /// A previous subscription for the same key is superseded. The upstream
    /// spot and trendbar feeds are opened if this connection has not opened
    /// them yet; a server answer of `ALREADY_SUBSCRIBED` counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SubscribeTick`](crate::FeedError::SubscribeTick)
    /// or [`FeedError::SubscribeBar`](crate::FeedError::SubscribeBar) if an
    /// upstream subscription fails. The new subscriber is removed again
    /// in that case.
    pub async fn subscribe_live_bars(
        &self,
        symbol_id: i64,
        period: TrendbarPeriod,
    ) -> Result<LiveBarStream> {
        let (sink, stream) = stream::channel();
        let subscriber = self.registry.add(symbol_id, period, sink);

        let mut upstream = self.upstream.lock().await;

        if let Err(e) = self.ensure_spots(&mut upstream, symbol_id).await {
            self.registry.remove_subscriber(&subscriber);
            return Err(crate::FeedError::SubscribeTick {
                symbol_id,
                source: Box::new(e),
            });
        }

        if let Err(e) = self.ensure_trendbar(&mut upstream, symbol_id, period).await {
            self.registry.remove_subscriber(&subscriber);
            return Err(crate::FeedError::SubscribeBar {
                symbol_id,
                period,
                source: Box::new(e),
            });
        }

        info!(symbol_id, %period, "Subscribed to live bars");
        Ok(stream)
    }

    /// Ends the live bar subscription for `symbol_id` and `period`.
    ///
    /// The upstream trendbar feed is closed once nothing subscribes to the
    /// key anymore. The symbol's spot feed stays open, see
    /// [`Self::unsubscribe_spots`].
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnsubscribeBar`](crate::FeedError::UnsubscribeBar)
    /// if the upstream unsubscription fails.
    pub async fn unsubscribe_live_bars(&self, symbol_id: i64, period: TrendbarPeriod) -> Result<()> {
        let removed = self.registry.remove(symbol_id, PeriodFilter::Exact(period));
        if removed.is_empty() {
            debug!(symbol_id, %period, "No live bar subscriber to remove");
        }

        let mut upstream = self.upstream.lock().await;
        if self.registry.contains(symbol_id, period)
            || !upstream.trendbars.contains(&(symbol_id, period))
        {
            return Ok(());
        }

        let request = Request::UnsubscribeLiveTrendbar(UnsubscribeLiveTrendbarReq::new(
            self.account_id,
            symbol_id,
            period,
        ));
        match self.connection.send_command(request).await {
            Ok(_) => {
                upstream.trendbars.remove(&(symbol_id, period));
                info!(symbol_id, %period, "Unsubscribed from live bars");
                Ok(())
            }
            Err(e) => Err(crate::FeedError::UnsubscribeBar {
                symbol_id,
                period,
                source: Box::new(e),
            }),
        }
    }

    /// Closes the upstream spot feed of `symbol_id` if no live bar
    /// subscriber of that symbol remains.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnsubscribeTick`](crate::FeedError::UnsubscribeTick)
    /// if the upstream unsubscription fails.
    pub async fn unsubscribe_spots(&self, symbol_id: i64) -> Result<()> {
        let mut upstream = self.upstream.lock().await;

        if self.registry.snapshot().group(symbol_id).is_some() {
            debug!(symbol_id, "Symbol still has live bar subscribers, keeping spots");
            return Ok(());
        }
        if !upstream.spots.contains(&symbol_id) {
            return Ok(());
        }

        let request =
            Request::UnsubscribeSpots(UnsubscribeSpotsReq::new(self.account_id, symbol_id));
        match self.connection.send_command(request).await {
            Ok(_) => {
                upstream.spots.remove(&symbol_id);
                info!(symbol_id, "Unsubscribed from spots");
                Ok(())
            }
            Err(e) => Err(crate::FeedError::UnsubscribeTick {
                symbol_id,
                source: Box::new(e),
            }),
        }
    }

    /// Folds a spot event into every subscriber of its symbol.
    ///
    /// Returns the number of bars delivered. Events for symbols nobody
    /// subscribes to are dropped.
    pub fn route(&self, tick: &SpotEvent) -> usize {
        let Some(group) = self.registry.group_for(tick.symbol_id) else {
            return 0;
        };

        group
            .subscribers()
            .iter()
            .filter(|subscriber| subscriber.on_tick(tick))
            .count()
    }

    /// Routes spot events from `events` until the channel closes or the
    /// task is aborted.
    pub async fn run_router(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<PushEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                PushEvent::Spot(tick) => {
                    self.route(&tick);
                }
                other => trace!(kind = other.kind().as_str(), "Ignoring non-spot event"),
            }
        }
        debug!("Spot router stopped");
    }

    /// Replays every registered subscription on a fresh connection.
    ///
    /// Forgets which upstream feeds were open, resets every subscriber's
    /// aggregation state and re-opens the feeds in registry order. Failures
    /// are logged and the replay continues. Returns how many keys were
    /// restored.
    pub async fn resubscribe_all(&self) -> usize {
        let mut upstream = self.upstream.lock().await;
        *upstream = UpstreamState::default();
        self.registry.reset_aggregation();

        let entries = self.registry.entries();
        let mut restored = 0;
        for &(symbol_id, period) in &entries {
            if let Err(e) = self.ensure_spots(&mut upstream, symbol_id).await {
                warn!(symbol_id, error = %e, "Failed to resubscribe to spots");
                continue;
            }
            if let Err(e) = self.ensure_trendbar(&mut upstream, symbol_id, period).await {
                warn!(symbol_id, %period, error = %e, "Failed to resubscribe to live bars");
                continue;
            }
            restored += 1;
        }

        info!(restored, total = entries.len(), "Resubscribed live bars");
        restored
    }

    /// Forgets every open upstream feed, for a connection that was closed.
    pub async fn forget_upstream(&self) {
        *self.upstream.lock().await = UpstreamState::default();
    }

    async fn ensure_spots(&self, upstream: &mut UpstreamState, symbol_id: i64) -> Result<()> {
        if upstream.spots.contains(&symbol_id) {
            return Ok(());
        }

        let request = Request::SubscribeSpots(SubscribeSpotsReq::new(self.account_id, symbol_id));
        accept_already_subscribed(self.connection.send_command(request).await)?;
        upstream.spots.insert(symbol_id);
        debug!(symbol_id, "Spot subscription opened");
        Ok(())
    }

    async fn ensure_trendbar(
        &self,
        upstream: &mut UpstreamState,
        symbol_id: i64,
        period: TrendbarPeriod,
    ) -> Result<()> {
        if upstream.trendbars.contains(&(symbol_id, period)) {
            return Ok(());
        }

        let request = Request::SubscribeLiveTrendbar(SubscribeLiveTrendbarReq::new(
            self.account_id,
            symbol_id,
            period,
        ));
        accept_already_subscribed(self.connection.send_command(request).await)?;
        upstream.trendbars.insert((symbol_id, period));
        debug!(symbol_id, %period, "Live trendbar subscription opened");
        Ok(())
    }
}

fn accept_already_subscribed<T>(result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_already_subscribed() => {
            debug!("Upstream reports subscription already open");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
