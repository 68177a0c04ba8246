// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub mod udp;
