//! Handler modules
//!
//! Route-level logic invoked by the dispatcher, plus the scheduled cleanup task.

pub mod cleanup;
pub mod connect;
pub mod disconnect;
pub mod reject;

#[cfg(test)]
mod tests;

pub use cleanup::handle_cleanup;
pub use connect::handle_connect;
pub use disconnect::handle_disconnect;
