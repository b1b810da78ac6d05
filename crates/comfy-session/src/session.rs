use anyhow::{anyhow, Context};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::{
    api::{Api, PromptApi, WebsocketApi},
    models::{Update, Workflow},
};

/// A handle to one engine session: endpoint clients constructed once at
/// process start and reused for every submission.
#[derive(Clone, Debug)]
pub struct Session {
    prompt: PromptApi,
    websocket: WebsocketApi,
}

impl Session {
    /// Opens a session against the engine at the given URL.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn connect<S>(url: S) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        let api = Api::new_with_url(url.as_ref())?;
        Ok(Self {
            prompt: api.prompt()?,
            websocket: api.websocket()?,
        })
    }

    /// Submits a workflow document and blocks until the engine reports the
    /// submission finished.
    ///
    /// # Errors
    ///
    /// Submission failures, execution errors, interruptions, and a
    /// websocket that closes before completion are all fatal.
    pub async fn run_workflow(&self, workflow: &Workflow) -> anyhow::Result<()> {
        let updates = self
            .websocket
            .updates()
            .await
            .context("failed to connect to engine websocket")?;
        let mut updates = std::pin::pin!(updates);
        let queued = self
            .prompt
            .send(workflow)
            .await
            .context("failed to queue workflow")?;
        if !queued.node_errors.is_empty() {
            return Err(anyhow!(
                "engine rejected workflow nodes: {:?}",
                queued.node_errors
            ));
        }
        info!(prompt_id = %queued.prompt_id, number = queued.number, "workflow queued");

        while let Some(update) = updates.next().await {
            match update.context("error reading engine update")? {
                Update::Executing(executing)
                    if executing.node.is_none() && executing.prompt_id == Some(queued.prompt_id) =>
                {
                    info!(prompt_id = %queued.prompt_id, "workflow finished");
                    return Ok(());
                }
                Update::ExecutionError(error) if error.prompt_id == queued.prompt_id => {
                    return Err(anyhow!(
                        "execution error in node {:?} ({:?}): {}",
                        error.node_id,
                        error.node_type,
                        error.exception_message.unwrap_or_default()
                    ));
                }
                Update::ExecutionInterrupted(data) if data.prompt_id == queued.prompt_id => {
                    return Err(anyhow!("execution interrupted: {:?}", data));
                }
                Update::Progress(progress) => {
                    debug!(value = progress.value, max = progress.max, "sampling progress");
                }
                _ => {}
            }
        }
        Err(anyhow!("engine closed websocket before workflow finished"))
    }
}
