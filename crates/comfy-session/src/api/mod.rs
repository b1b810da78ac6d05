use anyhow::{anyhow, Context};
use reqwest::Url;

pub mod prompt;
pub mod websocket;

pub use prompt::*;
pub use websocket::*;

/// Struct representing a connection to a ComfyUI API.
#[derive(Clone, Debug)]
pub struct Api {
    client: reqwest::Client,
    url: Url,
    client_id: uuid::Uuid,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: Url::parse("http://127.0.0.1:8188").expect("Failed to parse default URL"),
            client_id: uuid::Uuid::new_v4(),
        }
    }
}

impl Api {
    /// Returns a new `Api` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new `Api` instance with the given URL as a string value.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn new_with_url<S>(url: S) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            url: Url::parse(url.as_ref()).context("Failed to parse URL")?,
            ..Default::default()
        })
    }

    /// Returns the base URL of the engine this `Api` talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns a new instance of `PromptApi` with the API's cloned
    /// `reqwest::Client` and the URL for the `prompt` endpoint.
    ///
    /// # Errors
    ///
    /// If the URL fails to parse, an error will be returned.
    pub fn prompt(&self) -> anyhow::Result<PromptApi> {
        Ok(PromptApi::new_with_url(
            self.client.clone(),
            self.url
                .join("prompt")
                .context("Failed to parse prompt endpoint")?,
            self.client_id,
        ))
    }

    /// Returns a new instance of `WebsocketApi` with the URL for the `ws`
    /// endpoint.
    ///
    /// # Errors
    ///
    /// * If the URL fails to parse, an error will be returned.
    /// * On failure to set the `ws://` scheme on the URL, an error will be returned.
    pub fn websocket(&self) -> anyhow::Result<WebsocketApi> {
        let mut url = self.url.clone();
        url.set_scheme("ws")
            .map_err(|_| anyhow!("Failed to set scheme: ws://"))?;
        Ok(WebsocketApi::new_with_url(
            url.join(format!("ws?clientId={}", self.client_id).as_str())
                .context("Failed to parse websocket endpoint")?,
        ))
    }
}
