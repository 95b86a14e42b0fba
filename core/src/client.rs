//! Stateless HTTP request builder and response parser for the HIL node API.
//!
//! # Design
//! `HilClient` holds only a `base_url`. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. Status interpretation is driven by
//! `Operation::error_for`, a per-operation lookup table: the same status can
//! name different failures depending on what was attempted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{AddNic, ConnectNetwork, DetachNetwork, NodeFilter, NodeInfo, Obm, RegisterNode};

const AUTH_HINT: &str = "Make sure credentials match chosen authentication backend.";
const SERVER_HINT: &str =
    "Operation failed. This is a server-side problem. Contact your HIL administrator.";

/// Every operation the client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListNodes,
    ShowNode,
    RegisterNode,
    DeleteNode,
    PowerCycle,
    PowerOff,
    AddNic,
    RemoveNic,
    ConnectNetwork,
    DetachNetwork,
    StartConsole,
    StopConsole,
    ShowConsole,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::ListNodes,
        Operation::ShowNode,
        Operation::RegisterNode,
        Operation::DeleteNode,
        Operation::PowerCycle,
        Operation::PowerOff,
        Operation::AddNic,
        Operation::RemoveNic,
        Operation::ConnectNetwork,
        Operation::DetachNetwork,
        Operation::StartConsole,
        Operation::StopConsole,
        Operation::ShowConsole,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListNodes => "list_nodes",
            Operation::ShowNode => "show_node",
            Operation::RegisterNode => "register_node",
            Operation::DeleteNode => "delete_node",
            Operation::PowerCycle => "power_cycle",
            Operation::PowerOff => "power_off",
            Operation::AddNic => "add_nic",
            Operation::RemoveNic => "remove_nic",
            Operation::ConnectNetwork => "connect_network",
            Operation::DetachNetwork => "detach_network",
            Operation::StartConsole => "start_console",
            Operation::StopConsole => "stop_console",
            Operation::ShowConsole => "show_console",
        }
    }

    /// Classify a non-2xx status for this operation.
    ///
    /// Returns `None` for statuses the operation has no mapping for; those
    /// surface as `ApiError::UnexpectedStatus`.
    pub fn error_for(&self, status: u16) -> Option<(ErrorKind, &'static str)> {
        use ErrorKind::*;
        use Operation as Op;

        let mapped = match (self, status) {
            (_, 401) => (Authentication, AUTH_HINT),
            (_, 500) => (Server, SERVER_HINT),

            (Op::ShowNode, 404) => (NotFound, "No such node exists."),
            (Op::RegisterNode, 409) => (Duplicate, "A node with this name is already registered."),
            (Op::DeleteNode, 404) => (NotFound, "No such node exists. Nothing to delete."),
            (Op::DeleteNode, 409) => {
                (Blocked, "Make sure all nics are removed before deleting the node.")
            }
            (Op::PowerCycle | Op::PowerOff, 404) => (NotFound, "Node not found."),
            (Op::PowerCycle | Op::PowerOff, 409) => {
                (Blocked, "Operation blocked by other pending operations.")
            }
            (Op::AddNic, 404) => (NotFound, "Nic cannot be added. Node does not exist."),
            (Op::AddNic, 409) => (Duplicate, "Nic already exists."),
            (Op::RemoveNic, 404) => (NotFound, "Nic not found. Nothing to delete."),
            (Op::RemoveNic, 409) => {
                (Blocked, "Cannot delete nic, disconnect it from network first.")
            }
            (Op::ConnectNetwork, 404) => (NotFound, "Resource or relationship does not exist."),
            (Op::ConnectNetwork, 409) => (Duplicate, "A network is already attached."),
            (Op::ConnectNetwork | Op::DetachNetwork, 412) => {
                (ProjectMismatch, "Project does not have access to either resource.")
            }
            (Op::ConnectNetwork | Op::DetachNetwork, 423) => {
                (Blocked, "Networking operations pending on this nic.")
            }
            (Op::DetachNetwork, 400) => (NotFound, "No such network attached to the nic."),
            (Op::DetachNetwork, 404) => (NotFound, "Resource or relationship does not exist."),
            (Op::StartConsole | Op::StopConsole, 404) => (NotFound, "No such node exists."),
            (Op::ShowConsole, 404) => (NotFound, "No console log for this node."),
            _ => return None,
        };
        Some(mapped)
    }
}

/// Error body shape returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: String,
}

/// Synchronous, stateless client for the HIL node API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network. See `Session` for the one-call-per-operation form.
#[derive(Debug, Clone)]
pub struct HilClient {
    base_url: String,
}

impl HilClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join percent-encoded path segments onto the base URL.
    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn bare(&self, method: HttpMethod, segments: &[&str]) -> HttpRequest {
        HttpRequest {
            method,
            path: self.url(segments),
            headers: Vec::new(),
            body: None,
        }
    }

    fn with_json<T: Serialize>(
        &self,
        method: HttpMethod,
        segments: &[&str],
        payload: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            path: self.url(segments),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    pub fn build_list_nodes(&self, filter: NodeFilter) -> HttpRequest {
        self.bare(HttpMethod::Get, &["nodes", filter.as_str()])
    }

    pub fn build_show_node(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Get, &["node", node])
    }

    pub fn build_register_node(&self, node: &str, obm: &Obm) -> Result<HttpRequest, ApiError> {
        let payload = RegisterNode { obm: obm.clone() };
        self.with_json(HttpMethod::Put, &["node", node], &payload)
    }

    pub fn build_delete_node(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["node", node])
    }

    pub fn build_power_cycle(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Post, &["node", node, "power_cycle"])
    }

    pub fn build_power_off(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Post, &["node", node, "power_off"])
    }

    pub fn build_add_nic(&self, node: &str, nic: &str, macaddr: &str) -> Result<HttpRequest, ApiError> {
        let payload = AddNic {
            macaddr: macaddr.to_string(),
        };
        self.with_json(HttpMethod::Put, &["node", node, "nic", nic], &payload)
    }

    pub fn build_remove_nic(&self, node: &str, nic: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["node", node, "nic", nic])
    }

    pub fn build_connect_network(
        &self,
        node: &str,
        nic: &str,
        network: &str,
        channel: &str,
    ) -> Result<HttpRequest, ApiError> {
        let payload = ConnectNetwork {
            network: network.to_string(),
            channel: channel.to_string(),
        };
        self.with_json(
            HttpMethod::Post,
            &["node", node, "nic", nic, "connect_network"],
            &payload,
        )
    }

    pub fn build_detach_network(
        &self,
        node: &str,
        nic: &str,
        network: &str,
    ) -> Result<HttpRequest, ApiError> {
        let payload = DetachNetwork {
            network: network.to_string(),
        };
        self.with_json(
            HttpMethod::Post,
            &["node", node, "nic", nic, "detach_network"],
            &payload,
        )
    }

    pub fn build_start_console(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Put, &["node", node, "console"])
    }

    pub fn build_stop_console(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["node", node, "console"])
    }

    pub fn build_show_console(&self, node: &str) -> HttpRequest {
        self.bare(HttpMethod::Get, &["node", node, "console"])
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    pub fn parse_list_nodes(&self, response: HttpResponse) -> Result<Vec<String>, ApiError> {
        check_status(Operation::ListNodes, &response)?;
        decode(&response)
    }

    pub fn parse_show_node(&self, response: HttpResponse) -> Result<NodeInfo, ApiError> {
        check_status(Operation::ShowNode, &response)?;
        decode(&response)
    }

    pub fn parse_register_node(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::RegisterNode, &response)
    }

    pub fn parse_delete_node(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::DeleteNode, &response)
    }

    pub fn parse_power_cycle(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::PowerCycle, &response)
    }

    pub fn parse_power_off(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::PowerOff, &response)
    }

    pub fn parse_add_nic(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::AddNic, &response)
    }

    pub fn parse_remove_nic(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::RemoveNic, &response)
    }

    pub fn parse_connect_network(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::ConnectNetwork, &response)
    }

    pub fn parse_detach_network(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::DetachNetwork, &response)
    }

    pub fn parse_start_console(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::StartConsole, &response)
    }

    pub fn parse_stop_console(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(Operation::StopConsole, &response)
    }

    /// The console log is returned as raw text.
    pub fn parse_show_console(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(Operation::ShowConsole, &response)?;
        Ok(response.body)
    }
}

/// Map a non-2xx status to the error `op` defines for it.
pub fn check_status(op: Operation, response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    match op.error_for(response.status) {
        Some((kind, hint)) => Err(ApiError::from_kind(kind, describe(hint, &response.body))),
        None => {
            tracing::warn!(
                operation = op.name(),
                status = response.status,
                "unmapped status from HIL"
            );
            Err(ApiError::UnexpectedStatus {
                status: response.status,
                body: response.body.clone(),
            })
        }
    }
}

/// Combine the operation hint with the server's own message, if any.
fn describe(hint: &str, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if !err.msg.is_empty() => format!("{hint} ({})", err.msg),
        _ => hint.to_string(),
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}
