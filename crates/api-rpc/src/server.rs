//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over TCP, bound to localhost by default.

use crate::handler::RpcHandler;
use crate::types::{
    CreateRecurringRequest, DeleteRecurringRequest, DependencyRequest, ShowDependenciesRequest,
    UpdateRecurringRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

/// Register `method` with a handler taking parsed params
macro_rules! register {
    ($module:expr, $handler:expr, $method:literal, $req:ty, $call:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($method, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: $req = params.parse()?;
                    handler.$call(req).await
                }
            })
            .map_err(|e| e.to_string())?;
    }};
    ($module:expr, $handler:expr, $method:literal, $call:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($method, move |_, _, _| {
                let handler = handler.clone();
                async move { handler.$call().await }
            })
            .map_err(|e| e.to_string())?;
    }};
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Build the method table
    pub fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        register!(module, self.handler, "recurring.run.v1", run);
        register!(module, self.handler, "recurring.create.v1", CreateRecurringRequest, create_recurring);
        register!(module, self.handler, "recurring.update.v1", UpdateRecurringRequest, update_recurring);
        register!(module, self.handler, "recurring.delete.v1", DeleteRecurringRequest, delete_recurring);
        register!(module, self.handler, "dependency.add.v1", DependencyRequest, add_dependency);
        register!(module, self.handler, "dependency.remove.v1", DependencyRequest, remove_dependency);
        register!(module, self.handler, "dependency.show.v1", ShowDependenciesRequest, show_dependencies);
        register!(module, self.handler, "dependency.blocked.v1", blocked);

        Ok(module)
    }

    /// Start the JSON-RPC server; returns the bound address and its handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started successfully");
        Ok((local_addr, handle))
    }
}
