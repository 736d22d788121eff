//! Request authentication for trigger routes.

mod middleware;

pub use middleware::*;
