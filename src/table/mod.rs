//! Record table
//!
//! In-memory observation table plus the loader that enforces its column
//! contract (`Date, Focal Name, Sex, Social Group, Unified Behavior,
//! Percentage`).

mod loader;
mod record;

pub use loader::*;
pub use record::*;
