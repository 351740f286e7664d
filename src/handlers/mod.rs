mod event;
mod health;
mod metrics;

pub use event::event_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
