//! Concrete dependency probes for the `DEPENDENCIES` targets.
//!
//! - [`TcpDependency`]: TCP reachability; also a shutdown resource
//! - [`JsonRpcProbe`]: JSON-RPC "latest block" call
//! - [`DemoConnector`]: demo-mode connector, always healthy

mod demo;
mod rpc;
mod tcp;

pub use demo::DemoConnector;
pub use rpc::JsonRpcProbe;
pub use tcp::TcpDependency;
