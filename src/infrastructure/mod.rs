/// Infrastructure Layer - Technical Implementations
///
/// Adapters for the application ports plus the outward-facing pieces that
/// talk to the network.
///
/// The infrastructure layer depends on the domain and application layers;
/// neither of those depends on infrastructure (dependency inversion).
///
/// ## Modules
/// - `store`: in-memory `OrderStore`
/// - `bus`: in-memory topic pub/sub `EventBus`
/// - `hub`: WebSocket connection registry and fan-out
/// - `market`: simulated `market_ticks` producer
/// - `observability`: health checks

pub mod bus;
pub mod hub;
pub mod market;
pub mod observability;
pub mod store;

// Re-export key types
pub use bus::{InMemoryEventBus, DEFAULT_BUS_CAPACITY};
pub use hub::{BroadcastReport, ConnectionError, ConnectionId, FanOutHub, Subscriber};
pub use market::SimulatedTickFeed;
pub use observability::{HealthChecker, HealthStatus};
pub use store::InMemoryOrderStore;
