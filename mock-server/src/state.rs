//! Invariant-enforcing operations over the in-memory model.
//!
//! Handlers in `lib.rs` only translate HTTP to these calls; every rule about
//! what may be connected, removed or deleted lives here.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::error::ServerError;
use crate::model::{Headnode, Hnic, NetworkingAction, Network, Nic, Node, Obm, PowerState, Project};

#[derive(Debug, Default)]
pub struct Hil {
    pub projects: BTreeMap<String, Project>,
    pub nodes: BTreeMap<String, Node>,
    pub networks: BTreeMap<String, Network>,
    pub headnodes: BTreeMap<String, Headnode>,
    next_network_id: u32,
}

fn node_not_found(node: &str) -> ServerError {
    ServerError::NotFound(format!("node '{node}' does not exist"))
}

impl Hil {
    pub fn node(&self, name: &str) -> Result<&Node, ServerError> {
        self.nodes.get(name).ok_or_else(|| node_not_found(name))
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut Node, ServerError> {
        self.nodes.get_mut(name).ok_or_else(|| node_not_found(name))
    }

    fn nic_mut(&mut self, node: &str, nic: &str) -> Result<&mut Nic, ServerError> {
        self.node_mut(node)?
            .nics
            .get_mut(nic)
            .ok_or_else(|| ServerError::NotFound(format!("nic '{nic}' does not exist on node '{node}'")))
    }

    fn network(&self, name: &str) -> Result<&Network, ServerError> {
        self.networks
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("network '{name}' does not exist")))
    }

    fn project(&self, name: &str) -> Result<&Project, ServerError> {
        self.projects
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("project '{name}' does not exist")))
    }

    // -----------------------------------------------------------------------
    // Projects and networks
    // -----------------------------------------------------------------------

    pub fn create_project(&mut self, name: &str) -> Result<(), ServerError> {
        if self.projects.contains_key(name) {
            return Err(ServerError::Duplicate(format!("project '{name}' already exists")));
        }
        self.projects.insert(name.to_string(), Project::new(name));
        Ok(())
    }

    /// Create a network. Without `net_id` one is allocated.
    pub fn create_network(
        &mut self,
        name: &str,
        owner: Option<&str>,
        access: &[String],
        net_id: Option<&str>,
    ) -> Result<(), ServerError> {
        if self.networks.contains_key(name) {
            return Err(ServerError::Duplicate(format!("network '{name}' already exists")));
        }
        let owner = owner.map(|p| self.project(p).cloned()).transpose()?;
        let access = access
            .iter()
            .map(|p| self.project(p).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let in_use: BTreeSet<&str> = self.networks.values().map(|n| n.network_id.as_str()).collect();
        let (allocated, network_id) = match net_id {
            Some(id) if in_use.contains(id) => {
                return Err(ServerError::Duplicate(format!("network id '{id}' is already in use")));
            }
            Some(id) => (false, id.to_string()),
            None => loop {
                self.next_network_id += 1;
                let candidate = (100 + self.next_network_id).to_string();
                if !in_use.contains(candidate.as_str()) {
                    break (true, candidate);
                }
            },
        };
        let access: Vec<&Project> = access.iter().collect();
        let network = Network::new(owner.as_ref(), &access, allocated, &network_id, name);
        self.networks.insert(name.to_string(), network);
        Ok(())
    }

    pub fn connect_node(&mut self, project: &str, node: &str) -> Result<(), ServerError> {
        self.project(project)?;
        let node = self.node_mut(node)?;
        if node.project.as_deref() == Some(project) {
            return Err(ServerError::Duplicate(format!(
                "node '{}' is already in project '{project}'",
                node.label
            )));
        }
        if let Some(owner) = &node.project {
            return Err(ServerError::Blocked(format!(
                "node '{}' is already owned by project '{owner}'",
                node.label
            )));
        }
        node.project = Some(project.to_string());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    pub fn register_node(&mut self, name: &str, obm: Obm) -> Result<(), ServerError> {
        if self.nodes.contains_key(name) {
            return Err(ServerError::Duplicate(format!("node '{name}' already exists")));
        }
        self.nodes.insert(name.to_string(), Node::new(name, obm));
        Ok(())
    }

    pub fn list_nodes(&self, free_only: bool) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| !free_only || node.is_free())
            .map(|node| node.label.clone())
            .collect()
    }

    pub fn delete_node(&mut self, name: &str) -> Result<(), ServerError> {
        let node = self.node(name)?;
        if !node.nics.is_empty() {
            return Err(ServerError::Blocked(format!(
                "node '{name}' still has nics; remove them first"
            )));
        }
        self.nodes.remove(name);
        Ok(())
    }

    /// Power a node through its OBM. The IPMI driver has no reachable
    /// controller here and always fails.
    pub fn set_power(&mut self, name: &str, cycle: bool) -> Result<(), ServerError> {
        let node = self.node_mut(name)?;
        if node.has_pending_action() {
            return Err(ServerError::Blocked(format!(
                "node '{name}' has pending networking operations"
            )));
        }
        if let Obm::Ipmi { host, .. } = &node.obm {
            return Err(ServerError::Obm(format!("could not reach IPMI controller at {host}")));
        }
        let (state, event) = if cycle {
            (PowerState::On, "power cycle")
        } else {
            (PowerState::Off, "power off")
        };
        node.power = state;
        node.log_console(format!("[obm] {event}"));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Nics and networking
    // -----------------------------------------------------------------------

    pub fn add_nic(&mut self, node: &str, nic: &str, macaddr: &str) -> Result<(), ServerError> {
        let node = self.node_mut(node)?;
        if node.nics.contains_key(nic) {
            return Err(ServerError::Duplicate(format!(
                "nic '{nic}' already exists on node '{}'",
                node.label
            )));
        }
        node.nics.insert(nic.to_string(), Nic::new(nic, macaddr));
        Ok(())
    }

    pub fn remove_nic(&mut self, node: &str, nic: &str) -> Result<(), ServerError> {
        let entry = self.nic_mut(node, nic)?;
        if entry.is_attached() || entry.pending.is_some() {
            return Err(ServerError::Blocked(format!(
                "nic '{nic}' is attached to a network; detach it first"
            )));
        }
        self.node_mut(node)?.nics.remove(nic);
        Ok(())
    }

    /// The project the node belongs to, which must be able to use `network`.
    fn check_access(&self, node: &str, network: &str) -> Result<(), ServerError> {
        let owner = self.node(node)?.project.clone().ok_or_else(|| {
            ServerError::ProjectMismatch(format!("node '{node}' is not assigned to a project"))
        })?;
        if !self.network(network)?.accessible_by(&owner) {
            return Err(ServerError::ProjectMismatch(format!(
                "project '{owner}' does not have access to network '{network}'"
            )));
        }
        Ok(())
    }

    /// Queue a connect. Returns the id of the pending action.
    pub fn connect_network(
        &mut self,
        node: &str,
        nic: &str,
        network: &str,
        channel: &str,
    ) -> Result<Uuid, ServerError> {
        self.nic_mut(node, nic)?;
        self.network(network)?;
        self.check_access(node, network)?;

        let entry = self.nic_mut(node, nic)?;
        if entry.pending.is_some() {
            return Err(ServerError::Locked(format!(
                "a networking operation is already pending on nic '{nic}'"
            )));
        }
        if let Some(current) = entry.networks.get(channel) {
            return Err(ServerError::Duplicate(format!(
                "network '{current}' is already attached on channel '{channel}'"
            )));
        }
        if let Some(existing) = entry.channel_of(network) {
            return Err(ServerError::Duplicate(format!(
                "network '{network}' is already attached on channel '{existing}'"
            )));
        }
        let action = NetworkingAction::connect(entry, network, channel);
        let id = action.id;
        entry.pending = Some(action);
        Ok(id)
    }

    /// Queue a detach. Returns the id of the pending action.
    pub fn detach_network(&mut self, node: &str, nic: &str, network: &str) -> Result<Uuid, ServerError> {
        self.nic_mut(node, nic)?;
        self.network(network)?;
        self.check_access(node, network)?;

        let entry = self.nic_mut(node, nic)?;
        if entry.pending.is_some() {
            return Err(ServerError::Locked(format!(
                "a networking operation is already pending on nic '{nic}'"
            )));
        }
        let channel = entry.channel_of(network).map(str::to_string).ok_or_else(|| {
            ServerError::BadArgument(format!("network '{network}' is not attached to nic '{nic}'"))
        })?;
        let action = NetworkingAction::detach(entry, network, &channel);
        let id = action.id;
        entry.pending = Some(action);
        Ok(id)
    }

    /// Apply every queued networking action. Returns how many were applied.
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        for nic in self.nodes.values_mut().flat_map(|node| node.nics.values_mut()) {
            let Some(action) = nic.pending.take() else {
                continue;
            };
            match action.new_network {
                Some(network) => {
                    nic.networks.insert(action.channel, network);
                }
                None => {
                    nic.networks.remove(&action.channel);
                }
            }
            applied += 1;
        }
        applied
    }

    // -----------------------------------------------------------------------
    // Console
    // -----------------------------------------------------------------------

    pub fn start_console(&mut self, node: &str) -> Result<(), ServerError> {
        let node = self.node_mut(node)?;
        if node.console.is_none() {
            node.console = Some(vec![format!("[console] logging started for {}", node.label)]);
        }
        Ok(())
    }

    pub fn stop_console(&mut self, node: &str) -> Result<(), ServerError> {
        let node = self.node_mut(node)?;
        match node.console.take() {
            Some(_) => Ok(()),
            None => Err(ServerError::NotFound(format!(
                "console logging is not active on node '{}'",
                node.label
            ))),
        }
    }

    pub fn show_console(&self, node: &str) -> Result<String, ServerError> {
        let node = self.node(node)?;
        node.console
            .as_ref()
            .map(|lines| lines.join("\n"))
            .ok_or_else(|| {
                ServerError::NotFound(format!("console logging is not active on node '{}'", node.label))
            })
    }

    // -----------------------------------------------------------------------
    // Headnodes
    // -----------------------------------------------------------------------

    pub fn create_headnode(&mut self, name: &str, project: &str, base_img: &str) -> Result<(), ServerError> {
        if self.headnodes.contains_key(name) {
            return Err(ServerError::Duplicate(format!("headnode '{name}' already exists")));
        }
        let headnode = Headnode::new(self.project(project)?, name, base_img);
        if let Some(owner) = self.projects.get_mut(project) {
            owner.headnodes.insert(name.to_string());
        }
        self.headnodes.insert(name.to_string(), headnode);
        Ok(())
    }

    pub fn headnode(&self, name: &str) -> Result<&Headnode, ServerError> {
        self.headnodes
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("headnode '{name}' does not exist")))
    }

    pub fn create_hnic(&mut self, headnode: &str, hnic: &str) -> Result<(), ServerError> {
        let hn = self
            .headnodes
            .get_mut(headnode)
            .ok_or_else(|| ServerError::NotFound(format!("headnode '{headnode}' does not exist")))?;
        if hn.hnics.contains_key(hnic) {
            return Err(ServerError::Duplicate(format!(
                "hnic '{hnic}' already exists on headnode '{headnode}'"
            )));
        }
        let created = Hnic::new(hn, hnic);
        hn.hnics.insert(hnic.to_string(), created);
        Ok(())
    }
}
