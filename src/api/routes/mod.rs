//! Route handlers for the REST API
//!
//! - [`import`] - Trigger and status of registry imports
//! - [`system`] - Health

mod import;
mod system;

pub use import::*;
pub use system::*;
