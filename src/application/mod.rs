/// Application Layer - Use Cases, Ports and Services
///
/// This layer orchestrates domain logic against the external collaborators.
/// It depends on the domain layer and on the `ports` traits only; concrete
/// store/bus adapters are injected by the caller.
///
/// ## Modules
/// - `ports`: `OrderStore` and `EventBus` interfaces
/// - `use_cases`: order lifecycle manager
/// - `services`: execution registry

pub mod ports;
pub mod use_cases;
pub mod services;

// Re-export key types
pub use ports::{BusError, EventBus, OrderStore, StoreError, Subscription};
pub use services::ExecutionRegistry;
pub use use_cases::{OrderError, OrderLifecycleManager, DEFAULT_FILL_LATENCY};
