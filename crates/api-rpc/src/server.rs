//! JSON-RPC Server
//!
//! Serves the command surface over HTTP on localhost.

use crate::handler::RpcHandler;
use crate::types::{BreakageRequest, ConfigureRequest, GateRequest};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use linecount_core::application::CountingEngine;
use linecount_core::port::OrderSource;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9640;

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

/// Register a method whose handler takes no parameters
macro_rules! register_command {
    ($module:expr, $handler:expr, $name:literal, $method:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($name, move |_, _, _| {
                let handler = handler.clone();
                async move { handler.$method().await }
            })
            .map_err(|e| e.to_string())?;
    }};
}

/// Register a method whose handler takes one parsed request
macro_rules! register_request {
    ($module:expr, $handler:expr, $name:literal, $method:ident, $request:ty) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: $request = params.parse()?;
                    handler.$method(req).await
                }
            })
            .map_err(|e| e.to_string())?;
    }};
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        engine: CountingEngine,
        orders: Arc<dyn OrderSource>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(engine, orders)),
        }
    }

    /// Start the JSON-RPC server; returns the bound address and the server handle
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        register_request!(module, self.handler, "line.configure.v1", configure, ConfigureRequest);
        register_command!(module, self.handler, "counting.start.v1", start);
        register_command!(module, self.handler, "counting.stop.v1", stop);
        register_command!(module, self.handler, "counting.pause.v1", pause);
        register_command!(module, self.handler, "counting.resume.v1", resume);
        register_request!(module, self.handler, "counting.breakage.v1", breakage, BreakageRequest);
        register_request!(module, self.handler, "gate.set.v1", set_gate, GateRequest);
        register_command!(module, self.handler, "line.reset.v1", reset);
        register_command!(module, self.handler, "line.status.v1", status);

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
