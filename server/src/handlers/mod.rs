//! Request handlers for sync triggers.

mod run;
mod webhook;

pub use run::*;
pub use webhook::*;
