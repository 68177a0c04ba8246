// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use net::lisp::CONTROL_PORT;
use std::path::{Path, PathBuf};

pub(crate) use clap::Parser;
#[derive(Parser, Debug)]
#[command(name = "lispd")]
#[command(version = "0.1")]
#[command(about = "LISP map-server and xTR control daemon", long_about = None)]
pub(crate) struct CmdArgs {
    #[arg(
        long,
        value_name = "YAML file",
        help = "Node configuration: role, local RLOC, database and static map-cache mappings"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "UDP port",
        default_value_t = CONTROL_PORT.as_u16(),
        help = "Port to receive control messages on"
    )]
    control_port: u16,

    #[arg(
        long,
        default_value_t = false,
        help = "Show the available tracing tags and exit"
    )]
    show_tracing_tags: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show configurable tracing targets and exit"
    )]
    show_tracing_targets: bool,

    #[arg(
        long,
        value_name = "tracing configuration",
        help = "Tracing config string as comma-separated sequence of tag=level, with level one in [off,error,warn,info,debug,trace].
Passing default=level sets the default log-level.
Passing all=level allows setting the log-level of all targets to level.
E.g. default=error,all=info,map-cache=debug will set the default target to error, and all the registered targets to info, but enable debug for the map-cache"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    pub fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
    pub fn control_port(&self) -> u16 {
        self.control_port
    }
    pub fn show_tracing_tags(&self) -> bool {
        self.show_tracing_tags
    }
    pub fn show_tracing_targets(&self) -> bool {
        self.show_tracing_targets
    }
    pub fn tracing(&self) -> Option<&String> {
        self.tracing.as_ref()
    }
}
