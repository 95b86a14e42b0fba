//! Drive parsed `hil` commands against the live mock server.

use std::time::Duration;

use clap::Parser;
use hil_cli::{execute, Cli, UreqTransport};
use hil_client::{ApiError, Session};

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
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn run(session: &Session<UreqTransport>, args: &[&str]) -> Result<Option<String>, ApiError> {
    let argv = std::iter::once("hil").chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv).unwrap();
    execute(&cli.command, session)
}

#[test]
fn register_add_nic_and_show() {
    let base = start_server();
    let session = Session::new(&base, UreqTransport::new(Duration::from_secs(5)));

    let out = run(&session, &["node", "register", "node-1", "mock", "bmc", "root", "secret"]).unwrap();
    assert!(out.is_none());
    run(&session, &["node", "nic", "add", "node-1", "eth0", "00:11:22:33:44:55"]).unwrap();

    let listed = run(&session, &["node", "list", "free"]).unwrap().unwrap();
    assert_eq!(listed, "node-1");

    let shown = run(&session, &["node", "show", "node-1"]).unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&shown).unwrap();
    assert_eq!(json["nics"][0]["macaddr"], "00:11:22:33:44:55");

    let err = run(&session, &["node", "delete", "node-1"]).unwrap_err();
    assert!(matches!(err, ApiError::Blocked(_)));
    run(&session, &["node", "nic", "remove", "node-1", "eth0"]).unwrap();
    run(&session, &["node", "delete", "node-1"]).unwrap();
}

#[test]
fn console_and_power_commands() {
    let base = start_server();
    let session = Session::new(&base, UreqTransport::new(Duration::from_secs(5)));

    run(&session, &["node", "register", "n", "mock", "bmc", "root", "secret"]).unwrap();
    run(&session, &["node", "console", "start", "n"]).unwrap();
    run(&session, &["node", "power-off", "n"]).unwrap();
    let log = run(&session, &["node", "console", "show", "n"]).unwrap().unwrap();
    assert!(log.contains("[obm] power off"));
    run(&session, &["node", "console", "stop", "n"]).unwrap();

    let err = run(&session, &["node", "power-cycle", "missing"]).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn unreachable_endpoint_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let session = Session::new(
        &format!("http://127.0.0.1:{port}"),
        UreqTransport::new(Duration::from_secs(2)),
    );
    let err = run(&session, &["node", "list"]).unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
