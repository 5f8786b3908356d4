//! Scheduler options and the threading-model descriptor.

pub mod opts;
pub mod threading;
