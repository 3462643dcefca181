//! HTTP surface: admission gate middleware, request logging, and the server.

pub mod gate;
pub mod logging;
pub mod server;

pub use gate::{admit, AdmissionGate};
pub use logging::with_logging;
pub use server::GateServer;
