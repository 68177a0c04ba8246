// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display implementations

use crate::control::{TargetCfg, TargetCfgDb};
use std::fmt::{Display, Formatter};

impl Display for TargetCfg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>40} │ {:>6} │ {}",
            self.target,
            self.level,
            self.tags.join(",")
        )
    }
}

pub(crate) struct TargetsByTag<'a>(pub(crate) &'a TargetCfgDb);

impl Display for TargetsByTag<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let db = self.0;
        writeln!(f, " ──────── Tracing targets by tag (default: {}) ────────", db.level)?;
        for (tag, members) in &db.tags {
            writeln!(f, " {tag}:")?;
            for target in members.iter().filter_map(|m| db.targets.get(m)) {
                writeln!(f, "   {target}")?;
            }
        }
        Ok(())
    }
}
