/// Domain Layer - Core Business Logic
///
/// Pure order rules with no I/O: admission validation and the order
/// state machine. Everything here can be tested without a runtime.
///
/// ## Modules
/// - `validation`: turns a raw request into a well-formed `OrderTicket`
/// - `order`: admission and the PENDING → FILLED / REJECTED transitions

pub mod order;
pub mod validation;

// Re-export key types
pub use order::TransitionError;
pub use validation::{OrderTicket, OrderValidator, ValidationConfig, ValidationError};
