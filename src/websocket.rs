/// Websocket client for real-time Solana log monitoring
///
/// Opens a `logsSubscribe` stream filtered to transactions mentioning one
/// program, applies the protocol's textual log filter, and forwards candidate
/// signatures to the parsing stage. The subscriber itself runs one
/// connection's lifetime; the pipeline restarts it forever on any exit.

use serde::Serialize;
use std::str::FromStr;

use futures_util::{SinkExt, StreamExt};
use solana_sdk::signature::Signature;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::logger::{log, log_debug, LogTag};

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("websocket connect failed: {0}")]
    Connect(tokio_tungstenite::tungstenite::Error),
    #[error("websocket send failed: {0}")]
    Send(tokio_tungstenite::tungstenite::Error),
    #[error("subscription serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("stream closed by server")]
    Closed,
    #[error("candidate channel closed")]
    ChannelClosed,
}

/// `logsSubscribe` request message
#[derive(Serialize)]
struct LogsSubscribe {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Vec<serde_json::Value>,
}

/// Per-protocol log subscriber.
///
/// The textual `filter` only reduces false positives ahead of the expensive
/// parse stage; it must never reject a transaction that actually performed
/// the protocol's creation instruction.
pub struct LogsSubscriber {
    name: &'static str,
    tag: LogTag,
    program_id: &'static str,
    filter: fn(&[String]) -> bool,
}

impl LogsSubscriber {
    pub fn new(
        name: &'static str,
        tag: LogTag,
        program_id: &'static str,
        filter: fn(&[String]) -> bool,
    ) -> Self {
        Self {
            name,
            tag,
            program_id,
            filter,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run one subscription until the stream ends.
    ///
    /// Returns `Err` on connection loss or channel shutdown so the supervisor
    /// can apply its restart delay.
    pub async fn run(
        &self,
        ws_url: &str,
        out: &mpsc::UnboundedSender<Signature>,
    ) -> Result<(), SubscribeError> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(SubscribeError::Connect)?;
        let (mut sender, mut receiver) = ws_stream.split();

        let subscribe = LogsSubscribe {
            jsonrpc: "2.0",
            id: 1,
            method: "logsSubscribe",
            params: vec![
                serde_json::json!({ "mentions": [self.program_id] }),
                serde_json::json!({ "commitment": "confirmed" }),
            ],
        };
        let payload = serde_json::to_string(&subscribe)?;
        sender
            .send(Message::Text(payload))
            .await
            .map_err(SubscribeError::Send)?;

        log(
            self.tag,
            "SUBSCRIBE",
            &format!("{} log subscription opened", self.name),
        );

        // The upstream re-delivers notifications; consecutive duplicates are
        // suppressed by remembering the last seen signature.
        let mut last_signature = String::new();

        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    self.handle_message(&text, &mut last_signature, out)?;
                }
                Ok(Message::Close(_)) => {
                    log(self.tag, "CLOSE", "log stream closed by server");
                    return Err(SubscribeError::Closed);
                }
                Ok(_) => {
                    // Binary, ping and pong frames carry nothing for us
                }
                Err(e) => {
                    log(self.tag, "ERROR", &format!("log stream error: {}", e));
                    return Err(SubscribeError::Closed);
                }
            }
        }

        Err(SubscribeError::Closed)
    }

    fn handle_message(
        &self,
        text: &str,
        last_signature: &mut String,
        out: &mpsc::UnboundedSender<Signature>,
    ) -> Result<(), SubscribeError> {
        let Ok(notification) = serde_json::from_str::<serde_json::Value>(text) else {
            return Ok(());
        };

        // Subscription confirmation
        if notification.get("method").is_none() {
            if let Some(result) = notification.get("result") {
                if result.is_number() {
                    log_debug(
                        self.tag,
                        "SUBSCRIBED",
                        &format!("subscription confirmed: {}", result),
                    );
                }
            }
            return Ok(());
        }

        if notification.get("method").and_then(|m| m.as_str()) != Some("logsNotification") {
            return Ok(());
        }

        let Some(value) = notification
            .get("params")
            .and_then(|p| p.get("result"))
            .and_then(|r| r.get("value"))
        else {
            return Ok(());
        };

        let Some(signature) = value.get("signature").and_then(|s| s.as_str()) else {
            return Ok(());
        };

        if signature == last_signature {
            return Ok(());
        }
        *last_signature = signature.to_string();

        let logs: Vec<String> = value
            .get("logs")
            .and_then(|l| l.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        if !(self.filter)(&logs) {
            return Ok(());
        }

        let Ok(parsed) = Signature::from_str(signature) else {
            log_debug(
                self.tag,
                "SKIP",
                &format!("unparseable signature: {}", signature),
            );
            return Ok(());
        };

        log_debug(
            self.tag,
            "CANDIDATE",
            &format!("forwarding candidate {}", signature),
        );

        out.send(parsed).map_err(|_| SubscribeError::ChannelClosed)
    }
}
