/// Application Services
///
/// Supporting services used by the use cases.
/// - `execution_registry`: tracked simulated-execution tasks keyed by order id

pub mod execution_registry;

pub use execution_registry::ExecutionRegistry;
