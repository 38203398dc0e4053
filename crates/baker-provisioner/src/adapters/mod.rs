//! Adapters binding the outbound ports to the host: child processes, HTTP,
//! sockets, the terminal and the filesystem.

pub mod binaries;
pub mod clock;
pub mod download;
pub mod faucet;
pub mod handoff;
pub mod host_ports;
pub mod octez_client;
pub mod octez_node;
pub mod rpc;
pub mod service;
pub mod terminal;

pub use binaries::find_executable;
pub use clock::TokioSleeper;
pub use download::{HttpDownloader, LogProgress};
pub use faucet::CommandFaucet;
pub use handoff::JsonSummaryHandoff;
pub use host_ports::TcpPortProbe;
pub use octez_client::OctezClient;
pub use octez_node::{OctezNode, OctezNodeProcess};
pub use rpc::RpcNodeClient;
pub use service::SystemdRunRegistrar;
pub use terminal::TerminalPrompter;
