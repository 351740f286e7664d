use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::models::Event;
use crate::relay::Relay;
use crate::responder::Outcome;

// Handles queued events one at a time, in arrival order.
// `requeue` is weak so the worker stops once the server drops its sender.
pub async fn event_worker(
    mut rx: mpsc::Receiver<Value>,
    requeue: mpsc::WeakSender<Value>,
    dispatcher: Arc<Dispatcher>,
    relay: Arc<Relay>,
) {
    info!("Event worker started - processing events sequentially");

    while let Some(raw) = rx.recv().await {
        let event = match serde_json::from_value::<Event>(raw.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Unrecognized event, relaying as-is: {}", e);
                relay.forward(&raw).await;
                continue;
            }
        };

        match dispatcher.handle(&event).await {
            Outcome::Consumed => {}
            Outcome::Pass => relay.forward(&raw).await,
            Outcome::Reinject(msg) => reinject(&requeue, Event::Message(msg)),
        }
    }

    info!("Event queue closed, worker stopped");
}

// Never waits: a full queue drops the synthesized event
fn reinject(requeue: &mpsc::WeakSender<Value>, event: Event) {
    let value = match serde_json::to_value(&event) {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not encode synthesized event: {}", e);
            return;
        }
    };
    let Some(tx) = requeue.upgrade() else {
        warn!("Event queue closed, dropping synthesized event");
        return;
    };
    if let Err(e) = tx.try_send(value) {
        warn!("Event queue full, dropping synthesized event: {}", e);
    }
}
