//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build client/cache/dedup → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received (signals.rs) → Stop accepting → Drain requests → Exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
