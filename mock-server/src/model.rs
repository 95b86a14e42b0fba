//! In-memory domain model of a HIL installation.
//!
//! Relationships are held by name: a node's NICs live inside the node, a
//! project lists its headnodes, a network lists the projects that may use it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const OBM_SCHEMA_PREFIX: &str = "http://schema.massopencloud.org/haas/v0/obm/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

/// Out-of-band management driver attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Obm {
    Ipmi {
        host: String,
        user: String,
        password: String,
    },
    /// Power operations always succeed; no hardware behind it.
    Mock {
        host: String,
        user: String,
        password: String,
    },
}

impl Obm {
    /// Build from the wire `type` URL, or `None` for an unknown driver.
    pub fn from_schema(obm_type: &str, host: String, user: String, password: String) -> Option<Self> {
        match obm_type.strip_prefix(OBM_SCHEMA_PREFIX)? {
            "ipmi" => Some(Obm::Ipmi { host, user, password }),
            "mock" => Some(Obm::Mock { host, user, password }),
            _ => None,
        }
    }

    pub fn api_name(&self) -> &'static str {
        match self {
            Obm::Ipmi { .. } => "ipmi",
            Obm::Mock { .. } => "mock",
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Obm::Ipmi { host, .. } | Obm::Mock { host, .. } => host,
        }
    }
}

impl fmt::Display for Obm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.api_name(), self.host())
    }
}

/// A connect (`new_network: Some`) or detach (`None`) waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkingAction {
    pub id: Uuid,
    /// Label of the nic the action applies to.
    pub nic: String,
    pub new_network: Option<String>,
    /// For detach, the network being removed.
    pub old_network: Option<String>,
    pub channel: String,
}

impl NetworkingAction {
    pub fn connect(nic: &Nic, network: &str, channel: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            nic: nic.label.clone(),
            new_network: Some(network.to_string()),
            old_network: None,
            channel: channel.to_string(),
        }
    }

    pub fn detach(nic: &Nic, network: &str, channel: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            nic: nic.label.clone(),
            new_network: None,
            old_network: Some(network.to_string()),
            channel: channel.to_string(),
        }
    }
}

impl fmt::Display for NetworkingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.new_network, &self.old_network) {
            (Some(net), _) => write!(
                f,
                "NetworkingAction({} {} connect {net} on {})",
                self.id, self.nic, self.channel
            ),
            (None, Some(net)) => write!(
                f,
                "NetworkingAction({} {} detach {net} from {})",
                self.id, self.nic, self.channel
            ),
            (None, None) => write!(f, "NetworkingAction({} {} noop on {})", self.id, self.nic, self.channel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nic {
    pub label: String,
    pub macaddr: String,
    /// channel -> network
    pub networks: BTreeMap<String, String>,
    pub pending: Option<NetworkingAction>,
}

impl Nic {
    pub fn new(label: &str, macaddr: &str) -> Self {
        Self {
            label: label.to_string(),
            macaddr: macaddr.to_string(),
            networks: BTreeMap::new(),
            pending: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        !self.networks.is_empty()
    }

    /// Channel the network is attached on, if any.
    pub fn channel_of(&self, network: &str) -> Option<&str> {
        self.networks
            .iter()
            .find(|(_, net)| net.as_str() == network)
            .map(|(channel, _)| channel.as_str())
    }
}

impl fmt::Display for Nic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nic({}, {})", self.label, self.macaddr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub label: String,
    pub obm: Obm,
    pub project: Option<String>,
    pub power: PowerState,
    pub nics: BTreeMap<String, Nic>,
    /// `Some` while console logging is active.
    pub console: Option<Vec<String>>,
}

impl Node {
    pub fn new(label: &str, obm: Obm) -> Self {
        Self {
            label: label.to_string(),
            obm,
            project: None,
            power: PowerState::Off,
            nics: BTreeMap::new(),
            console: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.project.is_none()
    }

    pub fn has_pending_action(&self) -> bool {
        self.nics.values().any(|nic| nic.pending.is_some())
    }

    pub(crate) fn log_console(&mut self, line: String) {
        if let Some(log) = self.console.as_mut() {
            log.push(line);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}, obm={}, nics={})", self.label, self.obm, self.nics.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub label: String,
    /// `None` for admin-created networks.
    pub owner: Option<String>,
    /// Projects allowed to attach nodes. Empty means public.
    pub access: BTreeSet<String>,
    /// Whether `network_id` was allocated by HIL rather than supplied.
    pub allocated: bool,
    pub network_id: String,
}

impl Network {
    pub fn new(owner: Option<&Project>, access: &[&Project], allocated: bool, network_id: &str, label: &str) -> Self {
        Self {
            label: label.to_string(),
            owner: owner.map(|p| p.label.clone()),
            access: access.iter().map(|p| p.label.clone()).collect(),
            allocated,
            network_id: network_id.to_string(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.access.is_empty()
    }

    pub fn accessible_by(&self, project: &str) -> bool {
        self.is_public() || self.access.contains(project)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Network({}, id={}", self.label, self.network_id)?;
        if let Some(owner) = &self.owner {
            write!(f, ", owner={owner}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub label: String,
    pub headnodes: BTreeSet<String>,
}

impl Project {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            headnodes: BTreeSet::new(),
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project({})", self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hnic {
    /// Label of the owning headnode.
    pub headnode: String,
    pub label: String,
}

impl Hnic {
    pub fn new(headnode: &Headnode, label: &str) -> Self {
        Self {
            headnode: headnode.label.clone(),
            label: label.to_string(),
        }
    }
}

impl fmt::Display for Hnic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hnic({}, headnode={})", self.label, self.headnode)
    }
}

/// A VM-backed control node owned by a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headnode {
    pub label: String,
    pub project: String,
    pub base_img: String,
    pub hnics: BTreeMap<String, Hnic>,
}

impl Headnode {
    pub fn new(project: &Project, label: &str, base_img: &str) -> Self {
        Self {
            label: label.to_string(),
            project: project.label.clone(),
            base_img: base_img.to_string(),
            hnics: BTreeMap::new(),
        }
    }
}

impl fmt::Display for Headnode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Headnode({}, project={}, img={})", self.label, self.project, self.base_img)
    }
}
