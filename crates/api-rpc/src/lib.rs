//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 trigger surface of the Taskboard daemon:
//! manual generation passes, recurring definition management and the
//! dependency graph.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
