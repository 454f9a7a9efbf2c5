//! Service wiring
//!
//! Builds the bus, store, lifecycle manager and fan-out hub, starts the
//! background tasks (dispatcher, bus bridge, optional tick feed) and hands
//! out the axum router. Everything is injected; nothing here is global
//! except the Prometheus registry.

use crate::application::{BusError, OrderLifecycleManager, DEFAULT_FILL_LATENCY};
use crate::domain::validation::{OrderValidator, ValidationConfig};
use crate::infrastructure::bus::{InMemoryEventBus, DEFAULT_BUS_CAPACITY};
use crate::infrastructure::hub::FanOutHub;
use crate::infrastructure::market::{SimulatedTickFeed, DEFAULT_SYMBOLS, DEFAULT_TICK_INTERVAL};
use crate::infrastructure::observability::{HealthChecker, HealthStatus};
use crate::infrastructure::store::InMemoryOrderStore;
use crate::interfaces::http::{self, AppState};
use axum::Router;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Startup and serving failures
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("event bus unavailable: {0}")]
    Bus(#[from] BusError),
}

/// 运行时配置
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: IpAddr,
    pub port: u16,
    /// 模拟成交延迟
    pub fill_latency: Duration,
    pub bus_capacity: usize,
    /// 是否启动模拟行情
    pub simulate_ticks: bool,
    pub tick_interval: Duration,
    pub tick_symbols: Vec<String>,
    /// 下单准入限制（合约白名单、数量上限）
    pub validation: ValidationConfig,
}

impl ServiceConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            fill_latency: DEFAULT_FILL_LATENCY,
            bus_capacity: DEFAULT_BUS_CAPACITY,
            simulate_ticks: false,
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            validation: ValidationConfig::default(),
        }
    }
}

/// A running service: shared components plus its background tasks
pub struct ServiceRuntime {
    config: ServiceConfig,
    bus: Arc<InMemoryEventBus>,
    store: Arc<InMemoryOrderStore>,
    manager: OrderLifecycleManager,
    hub: Arc<FanOutHub>,
    health: Arc<HealthChecker>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceRuntime {
    /// Wires the components and starts the background tasks
    ///
    /// The hub's bus subscription is in place when this returns, so every
    /// event published afterwards reaches the streaming clients.
    pub async fn start(config: ServiceConfig) -> Result<Self, ServerError> {
        let bus = Arc::new(InMemoryEventBus::new(config.bus_capacity));
        let store = Arc::new(InMemoryOrderStore::new());
        let manager = OrderLifecycleManager::new(store.clone(), bus.clone())
            .with_validator(OrderValidator::with_config(config.validation.clone()))
            .with_fill_latency(config.fill_latency);
        let hub = Arc::new(FanOutHub::new());
        let health = Arc::new(HealthChecker::default());
        let shutdown = CancellationToken::new();

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(hub.clone().run_dispatcher(shutdown.clone())));

        let bridge = match hub.attach(bus.as_ref(), shutdown.clone()).await {
            Ok(bridge) => bridge,
            Err(e) => {
                shutdown.cancel();
                return Err(e.into());
            }
        };
        tasks.push(tokio::spawn(watch_bridge(
            bridge,
            health.clone(),
            shutdown.clone(),
        )));

        if config.simulate_ticks {
            let feed = SimulatedTickFeed::new(
                bus.clone(),
                config.tick_symbols.clone(),
                config.tick_interval,
            );
            tasks.push(tokio::spawn(feed.run(shutdown.clone())));
        }

        health.set_status(HealthStatus::Healthy);
        info!(
            fill_latency_ms = config.fill_latency.as_millis() as u64,
            bus_capacity = config.bus_capacity,
            simulate_ticks = config.simulate_ticks,
            "service runtime started"
        );

        Ok(Self {
            config,
            bus,
            store,
            manager,
            hub,
            health,
            shutdown,
            tasks,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        http::router(AppState {
            manager: self.manager.clone(),
            hub: self.hub.clone(),
            health: self.health.clone(),
        })
    }

    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        self.bus.clone()
    }

    pub fn store(&self) -> Arc<InMemoryOrderStore> {
        self.store.clone()
    }

    pub fn manager(&self) -> &OrderLifecycleManager {
        &self.manager
    }

    pub fn hub(&self) -> Arc<FanOutHub> {
        self.hub.clone()
    }

    pub fn health(&self) -> Arc<HealthChecker> {
        self.health.clone()
    }

    /// Binds the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serves HTTP on `listener` until `signal` resolves, then shuts down
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "listening");
        }

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await;
        self.shutdown().await;
        result.map_err(ServerError::from)
    }

    /// Stops the background tasks and closes the bus
    ///
    /// In-flight fill tasks are left to finish against the closed bus;
    /// their publishes fail and are logged.
    pub async fn shutdown(self) {
        self.health.set_status(HealthStatus::Unhealthy);
        self.shutdown.cancel();
        self.bus.close();

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!(
            pending_executions = self.manager.executions().in_flight(),
            "service runtime stopped"
        );
    }
}

/// 桥接任务意外结束时把健康状态降级
async fn watch_bridge(bridge: JoinHandle<()>, health: Arc<HealthChecker>, shutdown: CancellationToken) {
    let _ = bridge.await;
    if !shutdown.is_cancelled() {
        warn!("bus bridge ended before shutdown, stream clients will stop receiving events");
        health.set_status(HealthStatus::Degraded);
    }
}
