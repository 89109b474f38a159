pub mod cleaner;
pub mod config;
pub mod log_ring;
pub mod types;

// Keep the public surface small and intentional.
pub use cleaner::*;
pub use config::*;
pub use log_ring::*;
pub use types::*;
