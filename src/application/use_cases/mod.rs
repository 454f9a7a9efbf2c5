/// Use Cases - High-level business operations
///
/// ## Available Use Cases
/// - `submit_order`: order admission and the simulated PENDING → FILLED
///   execution (the order lifecycle manager)

pub mod submit_order;

// Re-export key types
pub use submit_order::{OrderError, OrderLifecycleManager, DEFAULT_FILL_LATENCY};
