use std::path::PathBuf;

use comfy_session::ServerConfig;
use serde::{Deserialize, Serialize};

use crate::workspace::Workspace;

/// Paths to the two workflow template variants.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Templates {
    /// The batch entry point template.
    pub batch: PathBuf,
    /// The streaming entry point template.
    pub streaming: PathBuf,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            batch: PathBuf::from("workflow_api.json"),
            streaming: PathBuf::from("workflow_stream_api.json"),
        }
    }
}

/// Top-level predictor configuration, merged from defaults, the config
/// file, and environment variables.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Engine server process settings.
    pub server: ServerConfig,
    /// The workspace directories reset per request.
    pub workspace: Workspace,
    /// Directory where model weights are expected to live.
    pub models_directory: PathBuf,
    /// Workflow template paths.
    pub templates: Templates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            workspace: Workspace::default(),
            models_directory: PathBuf::from("ComfyUI/models/checkpoints"),
            templates: Templates::default(),
        }
    }
}

impl Config {
    /// Directories the engine server should be pointed at. Keeps the
    /// server arguments and the per-request cleanup working on the same
    /// paths.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            output_directory: self.workspace.output.clone(),
            input_directory: self.workspace.input.clone(),
            temp_directory: self.workspace.temp.clone(),
            ..self.server.clone()
        }
    }
}
