use folio_shared::ClientChatRequest;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::{StreamDecoder, StreamEvent};

/// Progress of one streamed turn, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Opened,
    Delta(String),
    Done,
    Failed(String),
    Cancelled,
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnEvent::Done | TurnEvent::Failed(_) | TurnEvent::Cancelled
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to relay failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("relay responded with {0}")]
    Status(StatusCode),
}

#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn open(&self, request: &ClientChatRequest) -> Result<reqwest::Response, ClientError> {
        let response = self.http.post(&self.url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Relay rejected chat request: {}", body);
            return Err(ClientError::Status(status));
        }
        Ok(response)
    }

    /// Sends `request` and streams the decoded reply on the returned channel.
    ///
    /// The channel always ends with exactly one terminal event. Cancelling
    /// `cancel` stops the read loop and drops the response body.
    pub fn stream_turn(
        &self,
        request: ClientChatRequest,
        cancel: CancellationToken,
    ) -> mpsc::UnboundedReceiver<TurnEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();

        tokio::spawn(async move {
            let terminal = client.run_turn(&request, &cancel, &tx).await;
            if tx.send(terminal).is_err() {
                debug!("Turn receiver dropped before completion");
            }
        });

        rx
    }

    async fn run_turn(
        &self,
        request: &ClientChatRequest,
        cancel: &CancellationToken,
        tx: &mpsc::UnboundedSender<TurnEvent>,
    ) -> TurnEvent {
        info!("Sending {} messages to {}", request.messages.len(), self.url);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnEvent::Cancelled,
            opened = self.open(request) => opened,
        };
        let response = match opened {
            Ok(response) => response,
            Err(e) => {
                error!("Error connecting to relay: {}", e);
                return TurnEvent::Failed(e.to_string());
            }
        };

        if tx.send(TurnEvent::Opened).is_err() {
            return TurnEvent::Cancelled;
        }

        let mut body = response.bytes_stream();
        let mut decoder = StreamDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Turn cancelled, dropping response stream");
                    return TurnEvent::Cancelled;
                }
                next = body.next() => next,
            };

            let ended = next.is_none();
            let events = match next {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => {
                    error!("Relay stream interrupted: {}", e);
                    return TurnEvent::Failed(e.to_string());
                }
                None => decoder.finish(),
            };

            for event in events {
                match event {
                    StreamEvent::Delta(text) => {
                        if tx.send(TurnEvent::Delta(text)).is_err() {
                            return TurnEvent::Cancelled;
                        }
                    }
                    StreamEvent::Done => return TurnEvent::Done,
                }
            }

            if ended {
                if decoder.dropped_records() > 0 {
                    debug!(
                        "Stream ended, {} malformed records dropped",
                        decoder.dropped_records()
                    );
                }
                return TurnEvent::Done;
            }
        }
    }
}
