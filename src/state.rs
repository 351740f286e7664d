use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use crate::dispatcher::Dispatcher;
use crate::load_balancer::LoadBalancer;
use crate::relay::Relay;

// app's shared state
pub struct AppState {
    pub event_tx: mpsc::Sender<Value>, // into the event worker
    pub dispatcher: Arc<Dispatcher>,
    pub load_balancer: Arc<LoadBalancer>,
    pub relay: Arc<Relay>,
}
