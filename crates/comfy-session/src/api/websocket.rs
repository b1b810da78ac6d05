use futures_util::{stream::FusedStream, StreamExt};
use reqwest::Url;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::warn;

use crate::models::Update;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum WebSocketApiError {
    /// Error parsing endpoint URL
    #[error("Failed to parse endpoint URL")]
    ParseError(#[from] url::ParseError),
    /// Error connecting to the websocket endpoint
    #[error("Failed to connect to websocket endpoint")]
    ConnectFailed(#[from] tokio_tungstenite::tungstenite::Error),
    /// An error occurred while reading a websocket message.
    #[error("Error occurred while reading websocket message")]
    ReadFailed(#[source] tokio_tungstenite::tungstenite::Error),
}

type Result<T> = std::result::Result<T, WebSocketApiError>;

/// Struct representing a connection to the ComfyUI API `ws` endpoint.
#[derive(Clone, Debug)]
pub struct WebsocketApi {
    endpoint: Url,
}

impl WebsocketApi {
    /// Constructs a new `WebsocketApi` client with a given ComfyUI API
    /// endpoint.
    ///
    /// # Errors
    ///
    /// If the endpoint fails to parse as a URL, an error will be returned.
    pub fn new<S>(endpoint: S) -> Result<Self>
    where
        S: AsRef<str>,
    {
        Ok(Self::new_with_url(Url::parse(endpoint.as_ref())?))
    }

    /// Constructs a new `WebsocketApi` client with a given endpoint `Url`.
    pub fn new_with_url(endpoint: Url) -> Self {
        Self { endpoint }
    }

    /// Connects to the websocket endpoint and returns a stream of `Update`
    /// values, which contain progress updates for queued prompts.
    ///
    /// Binary messages carry preview images and are skipped; text messages
    /// that fail to parse as a known update type are logged and skipped.
    pub async fn updates(&self) -> Result<impl FusedStream<Item = Result<Update>>> {
        let (connection, _) = connect_async(&self.endpoint).await?;
        Ok(connection.filter_map(|m| async {
            match m {
                Ok(Message::Text(t)) => match serde_json::from_str::<Update>(t.as_str()) {
                    Ok(update) => Some(Ok(update)),
                    Err(e) => {
                        warn!(error = %e, "skipping unrecognized websocket message");
                        None
                    }
                },
                Ok(Message::Binary(_)) => None,
                Ok(_) => {
                    warn!("unexpected websocket message type");
                    None
                }
                Err(e) => Some(Err(WebSocketApiError::ReadFailed(e))),
            }
        }))
    }
}
