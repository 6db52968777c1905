// Resume pipeline: the task state machine, its store, the batch runner and the
// notification feed, plus the HTTP handlers that drive them.

pub mod handlers;
pub mod notifications;
pub mod runner;
pub mod session;
pub mod store;
pub mod task;

#[cfg(test)]
pub mod testing;

pub use session::Session;
