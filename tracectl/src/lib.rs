// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime control of tracing for the LISP node.
//!
//! Every crate declares its log targets with [`trace_target!`]; the declarations
//! are gathered at link time and can be adjusted by tag while the node runs.

pub mod control;
pub mod display;
pub mod targets;

pub use control::{TraceCtlError, TracingControl, get_trace_ctl};
pub use tracing_subscriber::filter::LevelFilter;
