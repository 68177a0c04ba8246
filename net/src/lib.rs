// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)] // Validation logic should always be strictly safe
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::module_name_repetitions)]

//! Wire formats for a LISP node: the data plane shim header and its
//! encapsulation, the control messages a Map-Server speaks, and the
//! classification of inner packets into flow tuples.

pub mod checksum;
pub mod ip;
pub mod ipv4;
pub mod ipv6;
pub mod lisp;
pub mod parse;
pub mod tuple;
pub mod udp;

use tracectl::trace_target;
trace_target!("lisp-wire", LevelFilter::INFO, &["lisp", "wire"]);
