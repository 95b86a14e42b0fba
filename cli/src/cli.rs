//! Command tree for the `hil` binary.

use clap::{Parser, Subcommand};
use hil_client::{ApiError, NodeFilter, Obm, ObmKind, Session, Transport};

#[derive(Debug, Parser)]
#[command(name = "hil", about = "Manage bare-metal nodes through a HIL endpoint")]
pub struct Cli {
    /// Base URL of the HIL API.
    #[arg(long, env = "HIL_ENDPOINT", default_value = "http://127.0.0.1:5000")]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[arg(
        long,
        env = "HIL_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Node, nic, network and console operations.
    #[command(subcommand)]
    Node(NodeCommand),
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// List node names.
    List {
        /// `free` or `all`.
        #[arg(default_value = "all")]
        filter: NodeFilter,
    },
    Show {
        node: String,
    },
    /// Register a node with an OBM driver.
    Register {
        node: String,
        /// `ipmi` or `mock`.
        obm: ObmKind,
        host: String,
        user: String,
        password: String,
    },
    Delete {
        node: String,
    },
    PowerCycle {
        node: String,
    },
    PowerOff {
        node: String,
    },
    #[command(subcommand)]
    Nic(NicCommand),
    #[command(subcommand)]
    Network(NetworkCommand),
    #[command(subcommand)]
    Console(ConsoleCommand),
}

#[derive(Debug, Subcommand)]
pub enum NicCommand {
    Add {
        node: String,
        nic: String,
        macaddr: String,
    },
    Remove {
        node: String,
        nic: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    Connect {
        node: String,
        nic: String,
        network: String,
        channel: String,
    },
    Detach {
        node: String,
        nic: String,
        network: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConsoleCommand {
    Start { node: String },
    Stop { node: String },
    Show { node: String },
}

/// Run one command. Returns text to print, if the command produces any.
pub fn execute<T: Transport>(command: &Command, session: &Session<T>) -> Result<Option<String>, ApiError> {
    let Command::Node(command) = command;
    match command {
        NodeCommand::List { filter } => Ok(Some(session.list_nodes(*filter)?.join("\n"))),
        NodeCommand::Show { node } => {
            let info = session.show_node(node)?;
            let json = serde_json::to_string_pretty(&info)
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
            Ok(Some(json))
        }
        NodeCommand::Register {
            node,
            obm,
            host,
            user,
            password,
        } => {
            session.register_node(node, &Obm::new(*obm, host, user, password))?;
            Ok(None)
        }
        NodeCommand::Delete { node } => session.delete_node(node).map(|()| None),
        NodeCommand::PowerCycle { node } => session.power_cycle(node).map(|()| None),
        NodeCommand::PowerOff { node } => session.power_off(node).map(|()| None),
        NodeCommand::Nic(NicCommand::Add { node, nic, macaddr }) => {
            session.add_nic(node, nic, macaddr).map(|()| None)
        }
        NodeCommand::Nic(NicCommand::Remove { node, nic }) => {
            session.remove_nic(node, nic).map(|()| None)
        }
        NodeCommand::Network(NetworkCommand::Connect {
            node,
            nic,
            network,
            channel,
        }) => session
            .connect_network(node, nic, network, channel)
            .map(|()| None),
        NodeCommand::Network(NetworkCommand::Detach { node, nic, network }) => {
            session.detach_network(node, nic, network).map(|()| None)
        }
        NodeCommand::Console(ConsoleCommand::Start { node }) => {
            session.start_console(node).map(|()| None)
        }
        NodeCommand::Console(ConsoleCommand::Stop { node }) => {
            session.stop_console(node).map(|()| None)
        }
        NodeCommand::Console(ConsoleCommand::Show { node }) => session.show_console(node).map(Some),
    }
}
