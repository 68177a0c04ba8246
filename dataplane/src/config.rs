// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Node configuration, read from YAML and validated into the tables of the node

use ipnet::IpNet;
use lisp::MappingError;
use lisp::control::ControlDevice;
use lisp::control::ms::MapServer;
use lisp::control::xtr::{DEFAULT_RETRY_INTERVAL, MobileNode};
use lisp::database::LocalDb;
use lisp::locator::{Locator, SocketKey};
use lisp::mapcache::MapCache;
use lisp::mapping::{EidKey, Mapping};
use lpm::prefix::Prefix;
use net::ip::Afi;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {err}")]
    Read {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("bad mapping for {eid}: {err}")]
    Mapping {
        eid: IpNet,
        #[source]
        err: MappingError,
    },
    #[error("a mobile node needs a map-resolver to resolve {0}")]
    NoMapResolver(IpNet),
    #[error("map-resolver {resolver} is not reachable from local RLOC {local}")]
    ResolverFamily { resolver: IpAddr, local: IpAddr },
}

/// Control role, as named in the configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    MapServer,
    MapResolver,
    Rtr,
    MobileNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LocatorConfig {
    pub rloc: IpAddr,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_weight")]
    pub weight: u8,
    /// Output interface, for the locators of this node
    #[serde(default)]
    pub interface: Option<String>,
    /// RTRs relaying for a locator behind a NAT
    #[serde(default)]
    pub rtrs: Vec<IpAddr>,
}

fn default_priority() -> u8 {
    1
}

fn default_weight() -> u8 {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MappingConfig {
    /// EID prefix, or source prefix if a group is set
    pub eid: IpNet,
    /// Multicast group prefix
    #[serde(default)]
    pub group: Option<IpNet>,
    #[serde(default)]
    pub instance_id: u32,
    #[serde(default)]
    pub locators: Vec<LocatorConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TimersConfig {
    pub retry_interval_ms: u64,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: u64::try_from(DEFAULT_RETRY_INTERVAL.as_millis()).unwrap_or(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub role: Role,
    pub local_rloc: IpAddr,
    #[serde(default)]
    pub map_resolver: Option<IpAddr>,
    /// EIDs a mobile node resolves at startup
    #[serde(default)]
    pub resolve: Vec<IpNet>,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub database: Vec<MappingConfig>,
    #[serde(default)]
    pub map_cache: Vec<MappingConfig>,
}

/// The validated node: its control role and tables
#[derive(Debug)]
pub struct Node {
    pub local_rloc: IpAddr,
    pub control: ControlDevice,
    pub map_cache: MapCache,
    pub map_resolver: Option<IpAddr>,
    pub resolve: Vec<EidKey>,
}

impl LocatorConfig {
    fn to_locator(&self) -> Result<Locator, MappingError> {
        let mut locator = Locator::new(self.rloc, self.priority, self.weight)?;
        if let Some(interface) = &self.interface {
            locator = locator.with_socket(SocketKey::new(interface, Afi::of(&self.rloc)));
        }
        if !self.rtrs.is_empty() {
            locator = locator.with_rtrs(self.rtrs.clone());
        }
        Ok(locator)
    }
}

impl MappingConfig {
    fn to_mapping(&self) -> Result<Mapping, ConfigError> {
        let err = |err| ConfigError::Mapping { eid: self.eid, err };
        let eid = match self.group {
            None => EidKey::Ip(Prefix::from(self.eid)),
            Some(group) => EidKey::sg(Prefix::from(self.eid), Prefix::from(group)).map_err(err)?,
        };
        let mut mapping = Mapping::new(eid).with_instance_id(self.instance_id);
        for locator in &self.locators {
            mapping.add_locator(locator.to_locator().map_err(err)?);
        }
        Ok(mapping)
    }
}

impl NodeConfig {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid configuration.
    pub fn load(path: &Path) -> Result<NodeConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;
        NodeConfig::from_yaml(&text)
    }

    /// # Errors
    ///
    /// Fails if `text` is not a valid configuration.
    pub fn from_yaml(text: &str) -> Result<NodeConfig, ConfigError> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// A map-server answering for nothing, on the given RLOC
    #[must_use]
    pub fn empty(local_rloc: IpAddr) -> NodeConfig {
        NodeConfig {
            role: Role::default(),
            local_rloc,
            map_resolver: None,
            resolve: Vec::new(),
            timers: TimersConfig::default(),
            database: Vec::new(),
            map_cache: Vec::new(),
        }
    }

    /// Validate the configuration and build the node tables.
    ///
    /// # Errors
    ///
    /// Fails on invalid mappings, and for a mobile node with EIDs to resolve but no usable
    /// map-resolver.
    pub fn build(&self) -> Result<Node, ConfigError> {
        let mut db = LocalDb::new();
        for config in &self.database {
            let mapping = config.to_mapping()?;
            debug!("Local mapping {mapping}");
            db.add(mapping);
        }
        let mut map_cache = MapCache::new();
        for config in &self.map_cache {
            let mapping = config.to_mapping()?;
            debug!("Static map-cache entry {mapping}");
            map_cache.insert_static(mapping);
        }
        if let Some(resolver) = self.map_resolver
            && Afi::of(&resolver) != Afi::of(&self.local_rloc)
        {
            return Err(ConfigError::ResolverFamily {
                resolver,
                local: self.local_rloc,
            });
        }
        let resolve = match (self.role, self.resolve.first(), self.map_resolver) {
            (Role::MobileNode, Some(eid), None) => return Err(ConfigError::NoMapResolver(*eid)),
            (Role::MobileNode, _, _) => self
                .resolve
                .iter()
                .map(|eid| EidKey::Ip(Prefix::from(*eid)))
                .collect(),
            _ => Vec::new(),
        };
        let control = match self.role {
            Role::MapServer => ControlDevice::MapServer(MapServer::new(db)),
            Role::MapResolver => ControlDevice::MapResolver,
            Role::Rtr => ControlDevice::Rtr,
            Role::MobileNode => ControlDevice::MobileNode(MobileNode::new(Duration::from_millis(
                self.timers.retry_interval_ms,
            ))),
        };
        info!(
            "Node {} at {}: {} local mappings, {} static map-cache entries",
            control,
            self.local_rloc,
            self.database.len(),
            map_cache.len()
        );
        Ok(Node {
            local_rloc: self.local_rloc,
            control,
            map_cache,
            map_resolver: self.map_resolver,
            resolve,
        })
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, NodeConfig, Role};
    use lisp::control::ControlDevice;
    use lisp::mapping::EidKey;
    use lpm::prefix::Prefix;
    use net::ip::Afi;
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::time::Duration;

    const MAP_SERVER: &str = r"
role: map-server
local-rloc: 192.0.2.1
database:
  - eid: 10.0.0.0/24
    locators:
      - rloc: 192.0.2.1
        priority: 1
        weight: 100
        interface: eth0
      - rloc: 2001:db8::1
        priority: 2
        weight: 50
  - eid: 10.1.0.0/16
    group: 239.1.0.0/16
    locators:
      - rloc: 192.0.2.1
map-cache:
  - eid: 198.51.100.0/24
    locators:
      - rloc: 203.0.113.1
        rtrs: [203.0.113.254]
";

    #[test]
    fn map_server_config() {
        let config = NodeConfig::from_yaml(MAP_SERVER).unwrap();
        assert_eq!(config.role, Role::MapServer);
        let node = config.build().unwrap();
        let ControlDevice::MapServer(ms) = &node.control else {
            unreachable!("built {}", node.control);
        };
        assert_eq!(ms.db().len(), 2);
        let mapping = ms
            .db()
            .lookup_addr(IpAddr::from([10, 0, 0, 5]))
            .unwrap();
        assert_eq!(mapping.locator_count(), 2);
        assert!(mapping.locators(Afi::Ipv4)[0].socket().is_some());
        assert!(mapping.locators(Afi::Ipv6)[0].socket().is_none());

        let cached = node
            .map_cache
            .lookup_usable(&EidKey::from(IpAddr::from([198, 51, 100, 9])))
            .unwrap();
        assert_eq!(cached.locators(Afi::Ipv4)[0].rtrs().len(), 1);
        assert!(node.resolve.is_empty());
    }

    #[test]
    fn mobile_node_config() {
        let yaml = r"
role: mobile-node
local-rloc: 192.0.2.7
map-resolver: 192.0.2.53
resolve: [10.0.0.0/24]
timers:
  retry-interval-ms: 250
";
        let node = NodeConfig::from_yaml(yaml).unwrap().build().unwrap();
        let ControlDevice::MobileNode(xtr) = &node.control else {
            unreachable!("built {}", node.control);
        };
        assert_eq!(xtr.retry_interval(), Duration::from_millis(250));
        assert_eq!(
            node.resolve,
            vec![EidKey::Ip(Prefix::from_str("10.0.0.0/24").unwrap())]
        );
    }

    #[test]
    fn bad_configs() {
        let no_resolver = "role: mobile-node\nlocal-rloc: 192.0.2.7\nresolve: [10.0.0.0/24]\n";
        assert!(matches!(
            NodeConfig::from_yaml(no_resolver).unwrap().build(),
            Err(ConfigError::NoMapResolver(_))
        ));

        let resolver_family = "local-rloc: 192.0.2.7\nmap-resolver: 2001:db8::53\n";
        assert!(matches!(
            NodeConfig::from_yaml(resolver_family).unwrap().build(),
            Err(ConfigError::ResolverFamily { .. })
        ));

        let heavy = "local-rloc: 192.0.2.1\ndatabase:\n  - eid: 10.0.0.0/24\n    locators:\n      - rloc: 192.0.2.1\n        weight: 101\n";
        assert!(matches!(
            NodeConfig::from_yaml(heavy).unwrap().build(),
            Err(ConfigError::Mapping { .. })
        ));

        let mixed = "local-rloc: 192.0.2.1\ndatabase:\n  - eid: 10.0.0.0/24\n    group: ff0e::/16\n";
        assert!(matches!(
            NodeConfig::from_yaml(mixed).unwrap().build(),
            Err(ConfigError::Mapping { .. })
        ));

        assert!(matches!(
            NodeConfig::from_yaml("local-rloc: 192.0.2.1\nmode: rtr\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn empty_config_is_a_map_server() {
        let node = NodeConfig::empty(IpAddr::from([127, 0, 0, 1])).build().unwrap();
        assert_eq!(node.control.name(), "map-server");
        assert!(node.map_cache.is_empty());
    }
}
