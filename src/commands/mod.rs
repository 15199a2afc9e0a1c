//! CLI command implementations
//!
//! Single operations are turned into a binding-layer [`Call`] and executed
//! on the bus, so the command line and scripts share one code path.
//!
//! [`Call`]: gpiblpt_core::binding::Call

mod list;
mod ops;
pub mod run;

pub use list::{list_operations, list_providers};
pub use ops::{operation, run_operation, run_poll};
