use std::collections::HashMap;

use anyhow::Context;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::models::Workflow;

#[derive(Serialize, Debug)]
struct WorkflowWrapper<'a> {
    prompt: &'a Workflow,
    client_id: uuid::Uuid,
}

/// Struct representing a response to a prompt queueing request.
#[derive(Serialize, Deserialize, Debug)]
pub struct QueuedPrompt {
    /// The prompt id assigned by the engine.
    pub prompt_id: uuid::Uuid,
    /// The prompt number.
    pub number: u64,
    /// Node errors that have occurred, indexed by node id.
    #[serde(default)]
    pub node_errors: HashMap<String, serde_json::Value>,
}

/// Struct representing a connection to the ComfyUI API `prompt` endpoint.
#[derive(Clone, Debug)]
pub struct PromptApi {
    client: reqwest::Client,
    endpoint: Url,
    client_id: uuid::Uuid,
}

impl PromptApi {
    /// Constructs a new `PromptApi` client with a given `reqwest::Client`
    /// and ComfyUI API endpoint `String`.
    ///
    /// # Errors
    ///
    /// If the endpoint fails to parse as a URL, an error will be returned.
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        client_id: uuid::Uuid,
    ) -> anyhow::Result<Self> {
        Ok(Self::new_with_url(
            client,
            Url::parse(&endpoint).context("failed to parse endpoint url")?,
            client_id,
        ))
    }

    /// Constructs a new `PromptApi` client with a given `reqwest::Client`
    /// and endpoint `Url`.
    pub fn new_with_url(client: reqwest::Client, endpoint: Url, client_id: uuid::Uuid) -> Self {
        Self {
            client,
            endpoint,
            client_id,
        }
    }

    /// Queues a workflow document for execution.
    ///
    /// # Returns
    ///
    /// A `Result` containing a `QueuedPrompt` on success, or an error if
    /// the request failed.
    pub async fn send(&self, workflow: &Workflow) -> anyhow::Result<QueuedPrompt> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&WorkflowWrapper {
                prompt: workflow,
                client_id: self.client_id,
            })
            .send()
            .await
            .context("failed to send request")?;
        if response.status().is_success() {
            return response.json().await.context("failed to parse json");
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to get response text")?;
        Err(anyhow::anyhow!(
            "got error code: {}, message text: {}",
            status,
            text
        ))
    }
}
