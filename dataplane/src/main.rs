// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]
#![allow(rustdoc::missing_crate_level_docs)]

mod args;
mod config;
mod drivers;

use crate::args::{CmdArgs, Parser};
use crate::config::NodeConfig;
use drivers::udp::ControlLoop;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracectl::{get_trace_ctl, trace_target};
use tracing::{error, info};

trace_target!("lispd", LevelFilter::INFO, &[]);

fn main() -> ExitCode {
    /* parse cmd line args */
    let args = CmdArgs::parse();
    let tctl = get_trace_ctl();
    if let Some(tracing) = args.tracing()
        && let Err(e) = tctl.setup_from_string(tracing)
    {
        error!("Invalid tracing configuration: {e}");
        return ExitCode::FAILURE;
    }
    if args.show_tracing_tags() || args.show_tracing_targets() {
        println!("{}", tctl.render());
        return ExitCode::SUCCESS;
    }
    info!("Starting lispd...");

    /* node configuration */
    let config = match args.config() {
        Some(path) => match NodeConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => NodeConfig::empty(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
    };
    let node = match config.build() {
        Ok(node) => node,
        Err(e) => {
            error!("Bad node configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || stop_handler.store(true, Ordering::Relaxed)) {
        error!("Failed to set SIGINT handler: {e}");
        return ExitCode::FAILURE;
    }

    let bind = SocketAddr::new(node.local_rloc, args.control_port());
    let mut control = match ControlLoop::new(node, bind) {
        Ok(control) => control,
        Err(e) => {
            error!("Failed to open control socket at {bind}: {e}");
            return ExitCode::FAILURE;
        }
    };
    control.run(&stop);
    info!("Shutting down lispd");
    ExitCode::SUCCESS
}
