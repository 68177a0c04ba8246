// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use crate::targets::TRACING_TARGETS;
use crate::trace_target;
use ordermap::{OrderMap, OrderSet};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

trace_target!("tracectl", LevelFilter::INFO, &[]);

/// Errors reported while configuring tracing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TraceCtlError {
    /// An item of a configuration string is not of the form `tag=level`.
    #[error("invalid syntax '{0}': expected tag=level")]
    Syntax(String),
    /// The level of a `tag=level` item is not a known level.
    #[error("invalid level '{0}'")]
    Level(String),
    /// The tag is not carried by any registered target.
    #[error("unknown tag '{0}'")]
    UnknownTag(String),
    /// A global subscriber was already installed by someone else.
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Runtime state of a single target.
#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
}

impl TargetCfg {
    /// The module path (or custom name) the target filters on.
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// The current level of the target.
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

#[derive(Debug)]
pub(crate) struct TargetCfgDb {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, OrderSet<&'static str>>,
}

impl TargetCfgDb {
    fn new(level: LevelFilter) -> Self {
        let mut db = Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for declared in TRACING_TARGETS {
            db.register(declared.target, declared.name, declared.level, declared.tags);
        }
        db
    }

    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) {
        // a target is always reachable through its own name
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        for tag in &tags {
            self.tags.entry(*tag).or_default().insert(target);
        }
        let cfg = TargetCfg {
            target,
            name,
            level,
            tags,
        };
        if let Some(previous) = self.targets.insert(target, cfg) {
            warn!("Target {} is declared more than once", previous.target);
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.level.to_string());
        for target in self.targets.values() {
            match format!("{}={}", target.target, target.level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => error!("Bad directive for target {}: {e}", target.target),
            }
        }
        filter
    }

    fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> Result<usize, TraceCtlError> {
        let members = self
            .tags
            .get(tag)
            .ok_or_else(|| TraceCtlError::UnknownTag(tag.to_string()))?;
        let mut changed = 0;
        for member in members {
            if let Some(target) = self.targets.get_mut(member)
                && target.level != level
            {
                target.level = level;
                changed += 1;
            }
        }
        Ok(changed)
    }

    pub(crate) fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.level);
        for target in self.targets.values() {
            out += &format!(",{}={}", target.name, target.level);
        }
        out
    }
}

/// Handle to the installed subscriber and the target database behind it.
#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetCfgDb>,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], installing the subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(|| {
        let (ctl, result) = TracingControl::new();
        if let Err(e) = result {
            eprintln!("{e}");
        }
        ctl
    })
}

impl TracingControl {
    fn new() -> (Self, Result<(), TraceCtlError>) {
        let db = TargetCfgDb::new(LevelFilter::INFO);
        let (filter, reload_filter) = reload::Layer::new(db.env_filter());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_level(true);
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TraceCtlError::Install(e.to_string()));
        let ctl = Self {
            db: Mutex::new(db),
            reload_filter,
        };
        (ctl, installed)
    }

    fn lock(&self) -> MutexGuard<'_, TargetCfgDb> {
        // the database stays consistent even if a holder panicked
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn reload(&self, db: &TargetCfgDb) {
        if let Err(e) = self.reload_filter.reload(db.env_filter()) {
            error!("Failed to reload tracing filter: {e}");
        }
    }

    /// Install the subscriber if not done yet.
    pub fn init() {
        get_trace_ctl();
    }

    /// Set the level of every target carrying `tag`.
    ///
    /// # Errors
    ///
    /// Fails if no target carries `tag`.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut db = self.lock();
        let changed = db.set_tag_level(tag, level)?;
        if changed > 0 {
            self.reload(&db);
        }
        info!("Log level for tag '{tag}' set to {level}, {changed} targets changed");
        Ok(())
    }

    /// Set the level of all targets.
    pub fn set_level_all(&self, level: LevelFilter) {
        let mut db = self.lock();
        for target in db.targets.values_mut() {
            target.level = level;
        }
        self.reload(&db);
    }

    /// Set the level applied to events outside any registered target.
    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.lock();
        if db.level != level {
            db.level = level;
            self.reload(&db);
        }
    }

    /// The level applied to events outside any registered target.
    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.lock().level
    }

    fn parse_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
        let mut config = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (tag, level) = item
                .split_once('=')
                .ok_or_else(|| TraceCtlError::Syntax(item.to_string()))?;
            let level = LevelFilter::from_str(level.trim())
                .map_err(|_| TraceCtlError::Level(level.trim().to_string()))?;
            config.insert(tag.trim().to_string(), level);
        }
        Ok(config)
    }

    /// Apply a comma-separated list of `tag=level` items.
    ///
    /// `default` sets the default level and `all` every target; other tags are applied after
    /// those so that `all=info,lisp=debug` works as expected.
    ///
    /// # Errors
    ///
    /// Fails on malformed input or unknown tags. Nothing is applied if the input is malformed.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let config = Self::parse_config(input)?;
        if let Some(level) = config.get("default") {
            self.set_default_level(*level);
        }
        if let Some(level) = config.get("all") {
            self.set_level_all(*level);
        }
        for (tag, level) in config
            .iter()
            .filter(|(tag, _)| !matches!(tag.as_str(), "default" | "all"))
        {
            self.set_tag_level(tag, *level)?;
        }
        Ok(())
    }

    /// Look up a target by name.
    #[must_use]
    pub fn target(&self, target: &str) -> Option<TargetCfg> {
        self.lock().targets.get(target).cloned()
    }

    /// All targets carrying `tag`.
    #[must_use]
    pub fn targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        let db = self.lock();
        db.tags
            .get(tag)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| db.targets.get(m).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The configuration string that reproduces the current levels.
    #[must_use]
    pub fn as_config_string(&self) -> String {
        self.lock().as_config_string()
    }

    /// Render the target table, grouped by tag.
    #[must_use]
    pub fn render(&self) -> String {
        crate::display::TargetsByTag(&self.lock()).to_string()
    }
}
