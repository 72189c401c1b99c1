//! narrative.message.v1 input schema
//!
//! This module defines the input records accepted by the pipeline: classified
//! messages (streaming or batch) and pre-aggregated daily counts.

mod adapter;
mod message;

pub use adapter::*;
pub use message::*;
