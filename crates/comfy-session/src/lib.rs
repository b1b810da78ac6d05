//! Client library for a locally-hosted ComfyUI workflow engine.
//!
//! Provides the typed workflow document model, prompt submission over
//! HTTP, completion tracking over the websocket, and the lifecycle of the
//! engine server process itself.

pub mod api;
pub mod models;
pub mod server;
pub mod session;

pub use models::{InputValue, NodeConnection, Workflow, WorkflowNode};
pub use server::{EngineServer, ServerConfig};
pub use session::Session;
