/// Interfaces Layer - External Entry Points
///
/// ## Modules
/// - `http`: REST order routes, the `/stream` WebSocket, health and metrics
/// - `cli`: command-line interface (main.rs logic)

pub mod cli;
pub mod http;
