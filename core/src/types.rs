//! Wire DTOs for the HIL node API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! the integration tests catch drift between the two crates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix of the OBM `type` field on the wire.
pub const OBM_SCHEMA_PREFIX: &str = "http://schema.massopencloud.org/haas/v0/obm/";

/// Which nodes `list_nodes` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeFilter {
    /// Nodes not assigned to any project.
    Free,
    #[default]
    All,
}

impl NodeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeFilter::Free => "free",
            NodeFilter::All => "all",
        }
    }
}

impl FromStr for NodeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(NodeFilter::Free),
            "all" => Ok(NodeFilter::All),
            other => Err(format!("unknown node filter '{other}', expected 'free' or 'all'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

/// A NIC as reported by `show_node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NicInfo {
    pub label: String,
    pub macaddr: String,
    /// Attached networks keyed by channel.
    #[serde(default)]
    pub networks: BTreeMap<String, String>,
}

/// A node as reported by `show_node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub free: bool,
    #[serde(default)]
    pub nics: Vec<NicInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerState>,
}

impl NodeInfo {
    pub fn nic(&self, label: &str) -> Option<&NicInfo> {
        self.nics.iter().find(|nic| nic.label == label)
    }
}

/// Out-of-band management drivers the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObmKind {
    Ipmi,
    Mock,
}

impl ObmKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObmKind::Ipmi => "ipmi",
            ObmKind::Mock => "mock",
        }
    }

    pub fn schema_url(&self) -> String {
        format!("{OBM_SCHEMA_PREFIX}{}", self.name())
    }
}

impl fmt::Display for ObmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ipmi" => Ok(ObmKind::Ipmi),
            "mock" => Ok(ObmKind::Mock),
            other => Err(format!("unknown OBM type '{other}', expected 'ipmi' or 'mock'")),
        }
    }
}

/// OBM parameters sent with `register_node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Obm {
    /// Full schema URL, see `ObmKind::schema_url`.
    #[serde(rename = "type")]
    pub obm_type: String,
    pub host: String,
    pub user: String,
    pub password: String,
}

impl Obm {
    pub fn new(kind: ObmKind, host: &str, user: &str, password: &str) -> Self {
        Self {
            obm_type: kind.schema_url(),
            host: host.to_string(),
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

/// Request payload for registering a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterNode {
    pub obm: Obm,
}

/// Request payload for adding a NIC to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNic {
    pub macaddr: String,
}

/// Request payload for attaching a NIC to a network on a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectNetwork {
    pub network: String,
    pub channel: String,
}

/// Request payload for detaching a NIC from a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachNetwork {
    pub network: String,
}
