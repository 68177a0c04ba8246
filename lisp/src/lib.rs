// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::module_name_repetitions)]

//! The LISP node proper: mappings and the tables holding them, the map cache and its
//! timers, locator selection, the tunnel output path and the control message handlers.

pub mod control;
pub mod database;
pub mod errors;
pub mod forward;
pub mod locator;
pub mod mapcache;
pub mod mapping;
pub mod nonce;
pub mod select;
mod table;

pub use errors::{
    ControlError, MapCacheError, MappingError, NonceError, OutputError, ReplyError, RequestError,
    SelectError,
};

use tracectl::trace_target;
trace_target!("lisp", LevelFilter::INFO, &["lisp"]);
