mod backoff;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use tokio_tungstenite::tungstenite::Message;

pub use backoff::Backoff;

use crate::error::PipelineError;
use crate::models::{RawMessage, RisEnvelope};
use crate::shaper::EventShaper;

const RIS_LIVE_URL: &str = "wss://ris-live.ripe.net/v1/ws/";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Drives the RIPE RIS-Live websocket feed into an `EventShaper` (§4.8).
/// Reconnects with a doubling backoff on any read/connect error, resetting
/// the backoff the moment a frame comes through.
pub struct IngestDriver {
    client_id: String,
    shaper: Arc<EventShaper>,
}

impl IngestDriver {
    pub fn new(client_id: String, shaper: Arc<EventShaper>) -> Self {
        Self { client_id, shaper }
    }

    /// Runs until `cancel` is set. Never returns an error itself; connection
    /// failures are logged and retried per the backoff schedule.
    pub async fn run(&self, cancel: Arc<AtomicBool>) {
        let mut backoff = Backoff::new(INITIAL_BACKOFF, MAX_BACKOFF);
        while !cancel.load(Ordering::Relaxed) {
            if let Err(err) = self.run_once(&cancel, &mut backoff).await {
                error!("RIS-Live connection error: {}", err);
                let wait = backoff.next();
                warn!("reconnecting to RIS-Live in {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
    }

    async fn run_once(&self, cancel: &AtomicBool, backoff: &mut Backoff) -> Result<(), PipelineError> {
        let url = format!("{}?client={}", RIS_LIVE_URL, self.client_id);
        let (mut ws, _response) = tokio_tungstenite::connect_async(&url).await?;
        info!("connected to RIS-Live as client {}", self.client_id);

        let subscribe = serde_json::json!({"type": "ris_subscribe", "data": {"type": "UPDATE"}});
        ws.send(Message::Text(subscribe.to_string())).await?;

        while let Some(frame) = ws.next().await {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            match frame? {
                Message::Text(text) => {
                    backoff.reset();
                    self.handle_frame(&text);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_frame(&self, text: &str) {
        let envelope: RisEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("malformed RIS-Live frame, skipping: {}", err);
                return;
            }
        };
        match envelope.kind.as_str() {
            "ris_message" => match RawMessage::from_ris_message_data(envelope.data) {
                Ok(msg) => self.shaper.process_message(&msg),
                Err(err) => warn!("failed to parse ris_message payload: {}", err),
            },
            "ris_error" => error!("RIS-Live reported an error frame: {}", envelope.data),
            other => warn!("unrecognized RIS-Live frame type: {}", other),
        }
    }
}
