//! One call per operation: build, execute through a `Transport`, parse.
//!
//! There is no retry and no state carried between calls; a failed call
//! leaves the session usable for the next one.

use crate::client::HilClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{NodeFilter, NodeInfo, Obm};

pub struct Session<T> {
    client: HilClient,
    transport: T,
}

impl<T: Transport> Session<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            client: HilClient::new(base_url),
            transport,
        }
    }

    pub fn client(&self) -> &HilClient {
        &self.client
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        tracing::debug!(method = %request.method, path = %request.path, "sending request");
        let response = self.transport.execute(request)?;
        tracing::debug!(status = response.status, "received response");
        Ok(response)
    }

    pub fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<String>, ApiError> {
        let response = self.send(self.client.build_list_nodes(filter))?;
        self.client.parse_list_nodes(response)
    }

    pub fn show_node(&self, node: &str) -> Result<NodeInfo, ApiError> {
        let response = self.send(self.client.build_show_node(node))?;
        self.client.parse_show_node(response)
    }

    pub fn register_node(&self, node: &str, obm: &Obm) -> Result<(), ApiError> {
        let response = self.send(self.client.build_register_node(node, obm)?)?;
        self.client.parse_register_node(response)
    }

    pub fn delete_node(&self, node: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_delete_node(node))?;
        self.client.parse_delete_node(response)
    }

    pub fn power_cycle(&self, node: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_power_cycle(node))?;
        self.client.parse_power_cycle(response)
    }

    pub fn power_off(&self, node: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_power_off(node))?;
        self.client.parse_power_off(response)
    }

    pub fn add_nic(&self, node: &str, nic: &str, macaddr: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_add_nic(node, nic, macaddr)?)?;
        self.client.parse_add_nic(response)
    }

    pub fn remove_nic(&self, node: &str, nic: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_remove_nic(node, nic))?;
        self.client.parse_remove_nic(response)
    }

    pub fn connect_network(
        &self,
        node: &str,
        nic: &str,
        network: &str,
        channel: &str,
    ) -> Result<(), ApiError> {
        let request = self.client.build_connect_network(node, nic, network, channel)?;
        let response = self.send(request)?;
        self.client.parse_connect_network(response)
    }

    pub fn detach_network(&self, node: &str, nic: &str, network: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_detach_network(node, nic, network)?)?;
        self.client.parse_detach_network(response)
    }

    pub fn start_console(&self, node: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_start_console(node))?;
        self.client.parse_start_console(response)
    }

    pub fn stop_console(&self, node: &str) -> Result<(), ApiError> {
        let response = self.send(self.client.build_stop_console(node))?;
        self.client.parse_stop_console(response)
    }

    pub fn show_console(&self, node: &str) -> Result<String, ApiError> {
        let response = self.send(self.client.build_show_console(node))?;
        self.client.parse_show_console(response)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::http::HttpMethod;

    /// Replays canned responses and records what was sent.
    #[derive(Default)]
    struct Scripted {
        responses: RefCell<VecDeque<Result<HttpResponse, ApiError>>>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn reply(self, status: u16, body: &str) -> Self {
            self.responses.borrow_mut().push_back(Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }));
            self
        }

        fn fail(self, message: &str) -> Self {
            self.responses
                .borrow_mut()
                .push_back(Err(ApiError::Transport(message.to_string())));
            self
        }
    }

    impl Transport for Scripted {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.borrow_mut().push(request);
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    #[test]
    fn each_operation_sends_exactly_one_request() {
        let transport = Scripted::default()
            .reply(200, r#"{"name":"node-99","free":true,"nics":[]}"#)
            .reply(200, "");
        let session = Session::new("http://hil", &transport);

        let node = session.show_node("node-99").unwrap();
        assert_eq!(node.name, "node-99");
        session.power_off("node-99").unwrap();

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[1].path, "http://hil/node/node-99/power_off");
    }

    #[test]
    fn failure_does_not_poison_next_call() {
        let transport = Scripted::default()
            .reply(423, "")
            .fail("connection reset")
            .reply(202, "");
        let session = Session::new("http://hil", &transport);

        let err = session
            .connect_network("n", "eth0", "net", "vlan/native")
            .unwrap_err();
        assert!(matches!(err, ApiError::Blocked(_)));

        let err = session.detach_network("n", "eth0", "net").unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));

        session
            .connect_network("n", "eth0", "net", "vlan/native")
            .unwrap();
        assert_eq!(transport.sent.borrow().len(), 3);
    }

    #[test]
    fn successful_read_body_is_returned_unchanged() {
        let transport = Scripted::default().reply(200, r#"["a","b c"]"#);
        let session = Session::new("http://hil/", &transport);
        let nodes = session.list_nodes(NodeFilter::Free).unwrap();
        assert_eq!(nodes, vec!["a".to_string(), "b c".to_string()]);
        assert_eq!(transport.sent.borrow()[0].path, "http://hil/nodes/free");
    }
}
