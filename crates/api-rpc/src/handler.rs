//! RPC Method Handlers

use crate::error::to_rpc_error;
use crate::types::{
    BreakageRequest, CommandResponse, ConfigureRequest, ConfigureResponse, GateRequest,
    StatusResponse, TaskFailureCount,
};
use jsonrpsee::types::ErrorObjectOwned;
use linecount_core::application::{CountingEngine, TaskKind};
use linecount_core::port::OrderSource;
use std::sync::Arc;
use tracing::info;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    engine: CountingEngine,
    orders: Arc<dyn OrderSource>,
}

impl RpcHandler {
    pub fn new(engine: CountingEngine, orders: Arc<dyn OrderSource>) -> Self {
        Self { engine, orders }
    }

    /// line.configure.v1
    pub async fn configure(
        &self,
        params: ConfigureRequest,
    ) -> Result<ConfigureResponse, ErrorObjectOwned> {
        info!(order = %params.order_label, target = params.target, "RPC configure");
        let setup = self
            .engine
            .setup_order(self.orders.as_ref(), &params.order_label, params.target)
            .await
            .map_err(to_rpc_error)?;
        Ok(setup.into())
    }

    /// counting.start.v1
    pub async fn start(&self) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine.start_counting().await.map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// counting.stop.v1
    pub async fn stop(&self) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine.stop_counting().await.map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// counting.pause.v1
    pub async fn pause(&self) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine.pause_counting().await.map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// counting.resume.v1
    pub async fn resume(&self) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine.resume_counting().await.map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// counting.breakage.v1
    pub async fn breakage(
        &self,
        params: BreakageRequest,
    ) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine
            .add_breakage(params.quantity)
            .map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// gate.set.v1
    pub async fn set_gate(&self, params: GateRequest) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine.set_gate(params.open).await.map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// line.reset.v1
    pub async fn reset(&self) -> Result<CommandResponse, ErrorObjectOwned> {
        self.engine.reset().await.map_err(to_rpc_error)?;
        Ok(self.command_response())
    }

    /// line.status.v1
    pub async fn status(&self) -> Result<StatusResponse, ErrorObjectOwned> {
        let failures = self.engine.task_failures();
        let task_failures = [
            TaskKind::Counting,
            TaskKind::Statistics,
            TaskKind::ScheduledPause,
            TaskKind::Finalize,
        ]
        .into_iter()
        .map(|task| TaskFailureCount {
            task,
            count: failures.count(task),
        })
        .collect();

        Ok(StatusResponse {
            status: self.engine.status(),
            task_failures,
        })
    }

    fn command_response(&self) -> CommandResponse {
        let state = self.engine.snapshot();
        CommandResponse {
            run_state: state.run.run_state,
            gate_state: state.run.gate_state,
            current_count: state.progress.current_count,
            stop_threshold: state.progress.stop_threshold(),
        }
    }
}
