//! Registry of live bar subscribers.
//!
//! Subscribers are grouped by symbol because one upstream spot feed per
//! symbol serves every period of that symbol. The registry is
//! copy-on-write: each mutation builds a new [`RegistrySnapshot`] and
//! publishes it atomically, so the tick router always iterates a consistent
//! snapshot while subscribe/unsubscribe calls run concurrently.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::aggregator::BarAggregator;
use crate::models::{LiveBar, SpotEvent, TrendbarPeriod};
use crate::stream::{LiveBarSink, StreamEnd};

/// One logical live bar subscription.
#[derive(Debug)]
pub struct Subscriber {
    symbol_id: i64,
    period: TrendbarPeriod,
    sink: LiveBarSink,
    aggregator: Mutex<BarAggregator>,
}

impl Subscriber {
    fn new(symbol_id: i64, period: TrendbarPeriod, sink: LiveBarSink) -> Self {
        Self {
            symbol_id,
            period,
            sink,
            aggregator: Mutex::new(BarAggregator::new()),
        }
    }

    pub fn symbol_id(&self) -> i64 {
        self.symbol_id
    }

    pub fn period(&self) -> TrendbarPeriod {
        self.period
    }

    pub fn sink(&self) -> &LiveBarSink {
        &self.sink
    }

    /// Returns `true` once the subscriber has produced a candle.
    pub fn is_initialized(&self) -> bool {
        self.aggregator.lock().is_initialized()
    }

    /// Aggregates `tick` and pushes the resulting candle, if any.
    ///
    /// Returns `true` if a bar was delivered.
    pub fn on_tick(&self, tick: &SpotEvent) -> bool {
        let Some(candle) = self.aggregator.lock().advance(tick, self.period) else {
            return false;
        };
        self.sink.push(LiveBar {
            symbol_id: self.symbol_id,
            period: self.period,
            candle,
        })
    }

    /// Returns the aggregation state to uninitialized.
    pub fn reset(&self) {
        self.aggregator.lock().reset();
    }
}

/// All subscribers of one symbol, in subscription order.
#[derive(Debug, Clone)]
pub struct SymbolGroup {
    symbol_id: i64,
    subscribers: Vec<Arc<Subscriber>>,
}

impl SymbolGroup {
    pub fn symbol_id(&self) -> i64 {
        self.symbol_id
    }

    pub fn subscribers(&self) -> &[Arc<Subscriber>] {
        &self.subscribers
    }

    pub fn subscriber(&self, period: TrendbarPeriod) -> Option<&Arc<Subscriber>> {
        self.subscribers.iter().find(|s| s.period == period)
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    groups: Vec<SymbolGroup>,
}

impl RegistrySnapshot {
    pub fn groups(&self) -> &[SymbolGroup] {
        &self.groups
    }

    pub fn group(&self, symbol_id: i64) -> Option<&SymbolGroup> {
        self.groups.iter().find(|g| g.symbol_id == symbol_id)
    }

    pub fn contains(&self, symbol_id: i64, period: TrendbarPeriod) -> bool {
        self.group(symbol_id)
            .is_some_and(|g| g.subscriber(period).is_some())
    }

    /// Every (symbol, period) key in subscription order.
    pub fn entries(&self) -> Vec<(i64, TrendbarPeriod)> {
        self.groups
            .iter()
            .flat_map(|g| g.subscribers.iter().map(|s| (s.symbol_id, s.period)))
            .collect()
    }

    /// Number of subscribers across all symbols.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.subscribers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn group_index(&self, symbol_id: i64) -> Option<usize> {
        self.groups.iter().position(|g| g.symbol_id == symbol_id)
    }
}

/// Which periods of a symbol a removal applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFilter {
    Exact(TrendbarPeriod),
    Any,
}

impl PeriodFilter {
    fn matches(&self, period: TrendbarPeriod) -> bool {
        match self {
            PeriodFilter::Exact(p) => *p == period,
            PeriodFilter::Any => true,
        }
    }
}

/// Connection-scoped table of live bar subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    /// Applies `f` to a copy of the current snapshot and publishes the copy.
    fn update<R>(&self, f: impl FnOnce(&mut RegistrySnapshot) -> R) -> R {
        let mut current = self.current.write();
        let mut next = RegistrySnapshot::clone(&current);
        let result = f(&mut next);
        *current = Arc::new(next);
        result
    }

    /// Installs a subscriber for (`symbol_id`, `period`).
    ///
    /// An existing subscriber for the same key is completed with
    /// [`StreamEnd::Superseded`] and replaced in place by a fresh,
    /// uninitialized one.
    pub fn add(&self, symbol_id: i64, period: TrendbarPeriod, sink: LiveBarSink) -> Arc<Subscriber> {
        let subscriber = Arc::new(Subscriber::new(symbol_id, period, sink));

        self.update(|snapshot| match snapshot.group_index(symbol_id) {
            Some(idx) => {
                let group = &mut snapshot.groups[idx];
                match group.subscribers.iter().position(|s| s.period == period) {
                    Some(pos) => {
                        warn!(
                            symbol_id,
                            %period,
                            "Completing previous subscriber in favor of new subscriber"
                        );
                        group.subscribers[pos].sink.complete(StreamEnd::Superseded);
                        group.subscribers[pos] = subscriber.clone();
                    }
                    None => group.subscribers.push(subscriber.clone()),
                }
            }
            None => snapshot.groups.push(SymbolGroup {
                symbol_id,
                subscribers: vec![subscriber.clone()],
            }),
        });

        debug!(symbol_id, %period, "Subscriber registered");
        subscriber
    }

    /// Completes and removes the subscribers of `symbol_id` matching
    /// `filter`. Drops the symbol's group once it is empty.
    pub fn remove(&self, symbol_id: i64, filter: PeriodFilter) -> Vec<Arc<Subscriber>> {
        self.update(|snapshot| {
            let Some(idx) = snapshot.group_index(symbol_id) else {
                return Vec::new();
            };
            let (removed, kept) = snapshot.groups[idx]
                .subscribers
                .drain(..)
                .partition::<Vec<_>, _>(|s| filter.matches(s.period));
            snapshot.groups[idx].subscribers = kept;
            if snapshot.groups[idx].is_empty() {
                snapshot.groups.remove(idx);
            }

            for subscriber in &removed {
                subscriber.sink.complete(StreamEnd::Completed);
                debug!(symbol_id, period = %subscriber.period, "Subscriber removed");
            }
            removed
        })
    }

    /// Completes and removes exactly `subscriber`, leaving any newer
    /// subscriber for the same key in place. Returns `true` if it was found.
    pub fn remove_subscriber(&self, subscriber: &Arc<Subscriber>) -> bool {
        subscriber.sink.complete(StreamEnd::Completed);

        self.update(|snapshot| {
            let Some(idx) = snapshot.group_index(subscriber.symbol_id) else {
                return false;
            };
            let group = &mut snapshot.groups[idx];
            let before = group.subscribers.len();
            group.subscribers.retain(|s| !Arc::ptr_eq(s, subscriber));
            let found = group.subscribers.len() != before;
            if group.is_empty() {
                snapshot.groups.remove(idx);
            }
            found
        })
    }

    /// Looks up the group of `symbol_id` for the tick router.
    ///
    /// A tick for a symbol nothing tracks is tolerated and only logged.
    pub fn group_for(&self, symbol_id: i64) -> Option<SymbolGroup> {
        let group = self.snapshot().group(symbol_id).cloned();
        if group.is_none() {
            warn!(symbol_id, "No live bar subscriber found for symbol");
        }
        group
    }

    pub fn contains(&self, symbol_id: i64, period: TrendbarPeriod) -> bool {
        self.snapshot().contains(symbol_id, period)
    }

    /// Every (symbol, period) key in subscription order.
    pub fn entries(&self) -> Vec<(i64, TrendbarPeriod)> {
        self.snapshot().entries()
    }

    /// Resets every subscriber's aggregation state.
    pub fn reset_aggregation(&self) {
        for group in self.snapshot().groups() {
            for subscriber in group.subscribers() {
                subscriber.reset();
            }
        }
    }

    /// Completes and removes every subscriber. Returns how many there were.
    pub fn clear(&self) -> usize {
        self.update(|snapshot| {
            let count = snapshot.len();
            for group in snapshot.groups.drain(..) {
                for subscriber in group.subscribers {
                    subscriber.sink.complete(StreamEnd::Completed);
                }
            }
            count
        })
    }

    /// Number of subscribers across all symbols.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
