//! In-memory stand-in for the HIL node API.
//!
//! Serves the node/nic/network endpoints the client talks to, plus the
//! project, network and headnode setup calls needed to reach every error
//! path. Networking actions are queued and only take effect once applied.

pub mod config;
pub mod error;
pub mod model;
pub mod state;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock, task::JoinHandle};
use uuid::Uuid;

use crate::error::ServerError;
use crate::model::{Node, Obm, PowerState};
use crate::state::Hil;

pub type Db = Arc<RwLock<Hil>>;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ObmSpec {
    #[serde(rename = "type")]
    pub obm_type: String,
    pub host: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterNode {
    pub obm: ObmSpec,
}

#[derive(Debug, Deserialize)]
pub struct AddNic {
    pub macaddr: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectNetwork {
    pub network: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct DetachNetwork {
    pub network: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectNode {
    pub node: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateNetwork {
    pub owner: Option<String>,
    #[serde(default)]
    pub access: Vec<String>,
    pub net_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateHeadnode {
    pub project: String,
    pub base_img: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NicView {
    pub label: String,
    pub macaddr: String,
    pub networks: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeView {
    pub name: String,
    pub free: bool,
    pub nics: Vec<NicView>,
    pub project: Option<String>,
    pub power: PowerState,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            name: node.label.clone(),
            free: node.is_free(),
            nics: node
                .nics
                .values()
                .map(|nic| NicView {
                    label: nic.label.clone(),
                    macaddr: nic.macaddr.clone(),
                    networks: nic.networks.clone(),
                })
                .collect(),
            project: node.project.clone(),
            power: node.power,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadnodeView {
    pub name: String,
    pub project: String,
    pub base_img: String,
    pub hnics: Vec<String>,
}

/// Body of a 202 for a queued networking action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accepted {
    pub status_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Applied {
    pub applied: usize,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/nodes/{filter}", get(list_nodes))
        .route("/node/{node}", get(show_node).put(register_node).delete(delete_node))
        .route("/node/{node}/power_cycle", post(power_cycle))
        .route("/node/{node}/power_off", post(power_off))
        .route("/node/{node}/nic/{nic}", put(add_nic).delete(remove_nic))
        .route("/node/{node}/nic/{nic}/connect_network", post(connect_network))
        .route("/node/{node}/nic/{nic}/detach_network", post(detach_network))
        .route(
            "/node/{node}/console",
            get(show_console).put(start_console).delete(stop_console),
        )
        .route("/project/{project}", put(create_project))
        .route("/project/{project}/connect_node", post(connect_node))
        .route("/network/{network}", put(create_network))
        .route("/headnode/{headnode}", get(show_headnode).put(create_headnode))
        .route("/headnode/{headnode}/hnic/{hnic}", put(create_hnic))
        .route("/networking/apply", post(apply_networking))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, Db::default()).await
}

pub async fn serve(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

/// Periodically apply queued networking actions, like HIL's deferred worker.
pub fn spawn_applier(db: Db, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let applied = db.write().await.apply_pending();
            if applied > 0 {
                tracing::debug!(applied, "applied networking actions");
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

async fn list_nodes(
    State(db): State<Db>,
    Path(filter): Path<String>,
) -> Result<Json<Vec<String>>, ServerError> {
    let free_only = match filter.as_str() {
        "free" => true,
        "all" => false,
        other => {
            return Err(ServerError::BadArgument(format!(
                "unknown node filter '{other}'"
            )))
        }
    };
    let nodes = db.read().await.list_nodes(free_only);
    Ok(Json(nodes))
}

async fn show_node(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<Json<NodeView>, ServerError> {
    let hil = db.read().await;
    Ok(Json(NodeView::from(hil.node(&node)?)))
}

async fn register_node(
    State(db): State<Db>,
    Path(node): Path<String>,
    Json(input): Json<RegisterNode>,
) -> Result<StatusCode, ServerError> {
    let spec = input.obm;
    let obm = Obm::from_schema(&spec.obm_type, spec.host, spec.user, spec.password)
        .ok_or_else(|| ServerError::BadArgument(format!("unknown OBM type '{}'", spec.obm_type)))?;
    db.write().await.register_node(&node, obm)?;
    tracing::info!(%node, "node registered");
    Ok(StatusCode::OK)
}

async fn delete_node(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<StatusCode, ServerError> {
    db.write().await.delete_node(&node)?;
    tracing::info!(%node, "node deleted");
    Ok(StatusCode::OK)
}

async fn power_cycle(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<StatusCode, ServerError> {
    db.write().await.set_power(&node, true)?;
    Ok(StatusCode::OK)
}

async fn power_off(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<StatusCode, ServerError> {
    db.write().await.set_power(&node, false)?;
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Nics and networking
// ---------------------------------------------------------------------------

async fn add_nic(
    State(db): State<Db>,
    Path((node, nic)): Path<(String, String)>,
    Json(input): Json<AddNic>,
) -> Result<StatusCode, ServerError> {
    db.write().await.add_nic(&node, &nic, &input.macaddr)?;
    Ok(StatusCode::OK)
}

async fn remove_nic(
    State(db): State<Db>,
    Path((node, nic)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    db.write().await.remove_nic(&node, &nic)?;
    Ok(StatusCode::OK)
}

async fn connect_network(
    State(db): State<Db>,
    Path((node, nic)): Path<(String, String)>,
    Json(input): Json<ConnectNetwork>,
) -> Result<(StatusCode, Json<Accepted>), ServerError> {
    let status_id = db
        .write()
        .await
        .connect_network(&node, &nic, &input.network, &input.channel)?;
    tracing::info!(%node, %nic, network = %input.network, %status_id, "connect queued");
    Ok((StatusCode::ACCEPTED, Json(Accepted { status_id })))
}

async fn detach_network(
    State(db): State<Db>,
    Path((node, nic)): Path<(String, String)>,
    Json(input): Json<DetachNetwork>,
) -> Result<(StatusCode, Json<Accepted>), ServerError> {
    let status_id = db.write().await.detach_network(&node, &nic, &input.network)?;
    tracing::info!(%node, %nic, network = %input.network, %status_id, "detach queued");
    Ok((StatusCode::ACCEPTED, Json(Accepted { status_id })))
}

async fn apply_networking(State(db): State<Db>) -> Json<Applied> {
    let applied = db.write().await.apply_pending();
    Json(Applied { applied })
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

async fn start_console(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<StatusCode, ServerError> {
    db.write().await.start_console(&node)?;
    Ok(StatusCode::OK)
}

async fn stop_console(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<StatusCode, ServerError> {
    db.write().await.stop_console(&node)?;
    Ok(StatusCode::OK)
}

async fn show_console(
    State(db): State<Db>,
    Path(node): Path<String>,
) -> Result<String, ServerError> {
    let log = db.read().await.show_console(&node)?;
    Ok(log)
}

// ---------------------------------------------------------------------------
// Setup: projects, networks, headnodes
// ---------------------------------------------------------------------------

async fn create_project(
    State(db): State<Db>,
    Path(project): Path<String>,
) -> Result<StatusCode, ServerError> {
    db.write().await.create_project(&project)?;
    Ok(StatusCode::OK)
}

async fn connect_node(
    State(db): State<Db>,
    Path(project): Path<String>,
    Json(input): Json<ConnectNode>,
) -> Result<StatusCode, ServerError> {
    db.write().await.connect_node(&project, &input.node)?;
    Ok(StatusCode::OK)
}

async fn create_network(
    State(db): State<Db>,
    Path(network): Path<String>,
    Json(input): Json<CreateNetwork>,
) -> Result<StatusCode, ServerError> {
    db.write().await.create_network(
        &network,
        input.owner.as_deref(),
        &input.access,
        input.net_id.as_deref(),
    )?;
    Ok(StatusCode::OK)
}

async fn create_headnode(
    State(db): State<Db>,
    Path(headnode): Path<String>,
    Json(input): Json<CreateHeadnode>,
) -> Result<StatusCode, ServerError> {
    db.write()
        .await
        .create_headnode(&headnode, &input.project, &input.base_img)?;
    Ok(StatusCode::OK)
}

async fn show_headnode(
    State(db): State<Db>,
    Path(headnode): Path<String>,
) -> Result<Json<HeadnodeView>, ServerError> {
    let hil = db.read().await;
    let hn = hil.headnode(&headnode)?;
    Ok(Json(HeadnodeView {
        name: hn.label.clone(),
        project: hn.project.clone(),
        base_img: hn.base_img.clone(),
        hnics: hn.hnics.keys().cloned().collect(),
    }))
}

async fn create_hnic(
    State(db): State<Db>,
    Path((headnode, hnic)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    db.write().await.create_hnic(&headnode, &hnic)?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_node_reads_obm_type_field() {
        let input: RegisterNode = serde_json::from_str(
            r#"{"obm":{"type":"http://schema.massopencloud.org/haas/v0/obm/mock","host":"h","user":"u","password":"p"}}"#,
        )
        .unwrap();
        assert!(input.obm.obm_type.ends_with("/mock"));
    }

    #[test]
    fn create_network_fields_are_optional() {
        let input: CreateNetwork = serde_json::from_str("{}").unwrap();
        assert!(input.owner.is_none());
        assert!(input.access.is_empty());
        assert!(input.net_id.is_none());
    }

    #[test]
    fn node_view_reflects_model() {
        let mut node = Node::new(
            "node-99",
            Obm::Mock {
                host: "h".into(),
                user: "u".into(),
                password: "p".into(),
            },
        );
        node.nics
            .insert("eth0".into(), crate::model::Nic::new("eth0", "00:11:22:33:44:55"));
        let json = serde_json::to_value(NodeView::from(&node)).unwrap();
        assert_eq!(json["name"], "node-99");
        assert_eq!(json["free"], true);
        assert_eq!(json["power"], "off");
        assert_eq!(json["nics"][0]["label"], "eth0");
        assert!(json["project"].is_null());
    }
}
