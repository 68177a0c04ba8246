// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Longest Prefix Match (LPM) tables keyed by EID prefixes.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::similar_names)]

pub mod prefix;
pub mod sg;
pub mod trie;
