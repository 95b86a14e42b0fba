//! Full node lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every `Session`
//! operation over real HTTP using ureq. Setup calls that are not client
//! operations (projects, networks, applying queued networking actions) go
//! straight through ureq.

use hil_client::{
    ApiError, HttpMethod, HttpRequest, HttpResponse, NodeFilter, Obm, ObmKind, Session, Transport,
};
use mock_server::Db;

/// Executes requests with ureq, returning 4xx/5xx as data.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = &self.agent;
        let result = match (req.method, req.body) {
            (HttpMethod::Get, _) => agent.get(&req.path).call(),
            (HttpMethod::Delete, _) => agent.delete(&req.path).call(),
            (HttpMethod::Post, Some(body)) => agent
                .post(&req.path)
                .content_type("application/json")
                .send(body.as_bytes()),
            (HttpMethod::Post, None) => agent.post(&req.path).send_empty(),
            (HttpMethod::Put, Some(body)) => agent
                .put(&req.path)
                .content_type("application/json")
                .send(body.as_bytes()),
            (HttpMethod::Put, None) => agent.put(&req.path).send_empty(),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body,
        })
    }
}

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::serve(listener, Db::default()).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

/// Issue a setup call that has no client operation.
fn admin(transport: &UreqTransport, method: HttpMethod, url: String, body: Option<&str>) {
    let response = transport
        .execute(HttpRequest {
            method,
            path: url,
            headers: Vec::new(),
            body: body.map(str::to_string),
        })
        .unwrap();
    assert!(response.is_success(), "setup call failed: {}", response.body);
}

#[test]
fn node_lifecycle() {
    let base = start_server();
    let transport = UreqTransport::new();
    let session = Session::new(&base, &transport);
    let mock = Obm::new(ObmKind::Mock, "bmc", "root", "secret");
    let ipmi = Obm::new(ObmKind::Ipmi, "ipmihost", "root", "tapeworm");

    // Step 1: nothing registered yet.
    assert!(session.list_nodes(NodeFilter::All).unwrap().is_empty());

    // Step 2: register nodes; a second registration is a duplicate.
    session.register_node("node-1", &mock).unwrap();
    session.register_node("node-99", &ipmi).unwrap();
    let err = session.register_node("node-1", &mock).unwrap_err();
    assert!(matches!(err, ApiError::Duplicate(_)));

    // Step 3: nics.
    session.add_nic("node-1", "eth0", "00:11:22:33:44:55").unwrap();
    let err = session.add_nic("node-1", "eth0", "00:11:22:33:44:55").unwrap_err();
    assert!(matches!(err, ApiError::Duplicate(_)));
    let err = session.add_nic("missing", "eth0", "00:11:22:33:44:55").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // Step 4: give node-1 to a project that owns a network.
    admin(&transport, HttpMethod::Put, format!("{base}/project/proj"), None);
    admin(
        &transport,
        HttpMethod::Post,
        format!("{base}/project/proj/connect_node"),
        Some(r#"{"node":"node-1"}"#),
    );
    admin(
        &transport,
        HttpMethod::Put,
        format!("{base}/network/net"),
        Some(r#"{"owner":"proj","access":["proj"]}"#),
    );
    assert_eq!(session.list_nodes(NodeFilter::Free).unwrap(), vec!["node-99".to_string()]);

    // Step 5: a free node cannot reach a project network.
    session.add_nic("node-99", "ipmi", "aa:bb:cc:dd:ee:ff").unwrap();
    let err = session
        .connect_network("node-99", "ipmi", "net", "vlan/native")
        .unwrap_err();
    assert!(matches!(err, ApiError::ProjectMismatch(_)));

    // Step 6: connect queues an action; the nic is locked until it applies.
    session.connect_network("node-1", "eth0", "net", "vlan/native").unwrap();
    let err = session
        .connect_network("node-1", "eth0", "net", "vlan/native")
        .unwrap_err();
    assert!(matches!(err, ApiError::Blocked(_)));
    let err = session.power_off("node-1").unwrap_err();
    assert!(matches!(err, ApiError::Blocked(_)));
    admin(&transport, HttpMethod::Post, format!("{base}/networking/apply"), None);

    // Step 7: same nic/channel again is a duplicate and changes nothing.
    let before = session.show_node("node-1").unwrap();
    assert_eq!(
        before.nic("eth0").unwrap().networks.get("vlan/native").map(String::as_str),
        Some("net")
    );
    let err = session
        .connect_network("node-1", "eth0", "net", "vlan/native")
        .unwrap_err();
    assert!(matches!(err, ApiError::Duplicate(_)));
    assert_eq!(session.show_node("node-1").unwrap(), before);

    // Step 8: an attached nic cannot be removed, and stays attached.
    let err = session.remove_nic("node-1", "eth0").unwrap_err();
    assert!(matches!(err, ApiError::Blocked(_)));
    assert_eq!(session.show_node("node-1").unwrap(), before);
    let err = session.delete_node("node-1").unwrap_err();
    assert!(matches!(err, ApiError::Blocked(_)));

    // Step 9: the IPMI controller is unreachable from the mock: server error.
    let err = session.power_cycle("node-99").unwrap_err();
    assert!(matches!(err, ApiError::Server(_)));

    // Step 10: console logging captures power events.
    let err = session.show_console("node-1").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    session.start_console("node-1").unwrap();
    session.power_cycle("node-1").unwrap();
    let log = session.show_console("node-1").unwrap();
    assert!(log.contains("[obm] power cycle"), "{log}");
    session.stop_console("node-1").unwrap();
    let err = session.stop_console("node-1").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // Step 11: detach, then tear down.
    session.detach_network("node-1", "eth0", "net").unwrap();
    admin(&transport, HttpMethod::Post, format!("{base}/networking/apply"), None);
    let err = session.detach_network("node-1", "eth0", "net").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    session.remove_nic("node-1", "eth0").unwrap();
    session.delete_node("node-1").unwrap();

    // Step 12: gone.
    let err = session.show_node("node-1").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = session.delete_node("node-1").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(session.list_nodes(NodeFilter::All).unwrap(), vec!["node-99".to_string()]);
}

#[test]
fn truncated_body_is_a_transport_error() {
    use std::io::{BufRead, BufReader, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        // Promise 100 bytes, send 7, hang up.
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n[\"node-")
            .unwrap();
    });

    let transport = UreqTransport::new();
    let session = Session::new(&format!("http://{addr}"), &transport);
    let err = session.list_nodes(NodeFilter::All).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "{err:?}");
}
