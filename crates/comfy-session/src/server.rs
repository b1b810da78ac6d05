use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// How long to wait between readiness probes, and how many to attempt
/// before giving up on the server.
const READY_PROBE_INTERVAL: Duration = Duration::from_millis(500);
const READY_PROBE_ATTEMPTS: u32 = 120;

/// Configuration for launching the engine server process.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    /// The program to launch.
    pub command: String,
    /// Arguments preceding the generated ones, e.g. the path to the
    /// engine's entry script.
    pub args: Vec<String>,
    /// Loopback address the server listens on.
    pub listen: String,
    /// Directory the engine writes produced images into.
    pub output_directory: PathBuf,
    /// Directory the engine reads input images from.
    pub input_directory: PathBuf,
    /// Directory the engine uses for temporary files.
    pub temp_directory: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "python".to_string(),
            args: vec!["ComfyUI/main.py".to_string()],
            listen: "127.0.0.1:8188".to_string(),
            output_directory: PathBuf::from("/tmp/outputs"),
            input_directory: PathBuf::from("/tmp/inputs"),
            temp_directory: PathBuf::from("ComfyUI/temp"),
        }
    }
}

impl ServerConfig {
    /// The HTTP URL of the server this configuration describes.
    pub fn url(&self) -> String {
        format!("http://{}", self.listen)
    }

    fn host_and_port(&self) -> anyhow::Result<(&str, &str)> {
        self.listen
            .split_once(':')
            .with_context(|| format!("invalid listen address: {}", self.listen))
    }
}

/// A running engine server process. The child is killed when this handle
/// is dropped.
#[derive(Debug)]
pub struct EngineServer {
    child: Child,
    url: String,
}

impl EngineServer {
    /// Spawns the engine server process and waits until it accepts HTTP
    /// requests.
    ///
    /// # Errors
    ///
    /// Failure to spawn the process or to observe a successful readiness
    /// probe within the startup window is fatal.
    pub async fn start(config: &ServerConfig) -> anyhow::Result<Self> {
        let (host, port) = config.host_and_port()?;
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .arg("--listen")
            .arg(host)
            .arg("--port")
            .arg(port)
            .arg("--output-directory")
            .arg(&config.output_directory)
            .arg("--input-directory")
            .arg(&config.input_directory)
            .arg("--temp-directory")
            .arg(&config.temp_directory)
            .kill_on_drop(true);

        info!(command = %config.command, listen = %config.listen, "starting engine server");
        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn engine server: {}", config.command))?;

        let server = Self {
            child,
            url: config.url(),
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// The HTTP URL of the running server.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        for attempt in 0..READY_PROBE_ATTEMPTS {
            match client.get(&self.url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(url = %self.url, "engine server ready");
                    return Ok(());
                }
                Ok(response) => {
                    debug!(attempt, status = %response.status(), "engine server not ready")
                }
                Err(e) => debug!(attempt, error = %e, "engine server not ready"),
            }
            tokio::time::sleep(READY_PROBE_INTERVAL).await;
        }
        Err(anyhow::anyhow!(
            "engine server at {} did not become ready",
            self.url
        ))
    }

    /// Stops the server process.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        self.child.kill().await.context("failed to stop engine server")
    }
}
