//! Application module
//!
//! The `msgbarrier` binary: reads records from stdin, groups them through a
//! [`MessageBarrierHandler`](crate::barrier::api::MessageBarrierHandler) and
//! prints what gets released or discarded.

pub mod cli;
pub mod records;
pub mod startup;
