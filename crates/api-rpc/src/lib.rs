//! JSON-RPC API Layer
//!
//! Command surface of the line counter: order setup, run control, gate,
//! reset and status, served as JSON-RPC 2.0 on localhost.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
