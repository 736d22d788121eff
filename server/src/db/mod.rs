//! Database module for PostgreSQL persistence.

mod ledger;
mod pool;

pub use ledger::*;
pub use pool::*;
