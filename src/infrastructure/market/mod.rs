//! Simulated market tick feed
//!
//! Stands in for the external market-data producer: on every interval it
//! publishes one `market_ticks` event per symbol. Prices hover just above
//! 2500.0; there is no pricing model.

use crate::application::ports::EventBus;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{Tick, MARKET_TICKS_TOPIC};
use bytes::Bytes;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 基准价格
pub const BASE_PRICE: f64 = 2500.0;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

// tokio::time::interval 不接受零周期
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

pub const DEFAULT_SYMBOLS: [&str; 5] = ["RELIANCE", "TCS", "INFY", "HDFCBANK", "ICICIBANK"];

pub struct SimulatedTickFeed {
    bus: Arc<dyn EventBus>,
    symbols: Vec<String>,
    interval: Duration,
    rng: StdRng,
}

impl SimulatedTickFeed {
    /// `interval` is clamped to at least 1 ms
    pub fn new(bus: Arc<dyn EventBus>, symbols: Vec<String>, interval: Duration) -> Self {
        Self {
            bus,
            symbols,
            interval: interval.max(MIN_TICK_INTERVAL),
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed seed, for reproducible sequences
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Generates the next tick for `symbol`
    pub fn next_tick(&mut self, symbol: &str) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            price: BASE_PRICE + self.rng.gen_range(0.0..10.0),
            volume: self.rng.gen_range(0..100),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Publishes one round of ticks, one per symbol
    pub async fn publish_round(&mut self) {
        for i in 0..self.symbols.len() {
            let symbol = self.symbols[i].clone();
            let tick = self.next_tick(&symbol);
            let payload = match serde_json::to_vec(&tick) {
                Ok(payload) => Bytes::from(payload),
                Err(e) => {
                    warn!(symbol = %tick.symbol, error = %e, "failed to encode tick");
                    continue;
                }
            };

            if let Err(e) = self.bus.publish(MARKET_TICKS_TOPIC, payload).await {
                METRICS
                    .publish_failures_total
                    .with_label_values(&[MARKET_TICKS_TOPIC])
                    .inc();
                warn!(symbol = %tick.symbol, error = %e, "failed to publish tick");
            }
        }
    }

    /// Publishes a round every interval until shutdown
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(symbols = ?self.symbols, interval_ms = self.interval.as_millis() as u64, "tick feed started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.publish_round().await,
            }
        }
        info!("tick feed stopped");
    }
}
