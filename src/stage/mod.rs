//! Stage execution: assignments, per-runner work queues, and the worker handshake.

pub mod assignment;
pub mod callback;
pub(crate) mod queue;
pub(crate) mod runner;
pub mod task;
pub(crate) mod worker;
