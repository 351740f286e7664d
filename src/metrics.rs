use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref EVENTS_TOTAL: Counter =
        register_counter!("pokepro_events_total", "Total number of events received").unwrap();
    pub static ref POKES_TOTAL: Counter =
        register_counter!("pokepro_pokes_total", "Total pokes aimed at the bot").unwrap();
    pub static ref RESPONSES_TOTAL: CounterVec = register_counter_vec!(
        "pokepro_responses_total",
        "Poke responses by handler",
        &["kind"]
    )
    .unwrap();
    pub static ref COOLDOWN_REJECTS: Counter = register_counter!(
        "pokepro_cooldown_rejects_total",
        "Pokes rejected by the per-user cooldown"
    )
    .unwrap();
    pub static ref FOLLOW_POKES: Counter =
        register_counter!("pokepro_follow_pokes_total", "Follow-pokes sent").unwrap();
    pub static ref HANDLER_ERRORS: Counter =
        register_counter!("pokepro_handler_errors_total", "Failed handler runs").unwrap();
    pub static ref RELAYED_EVENTS: Counter = register_counter!(
        "pokepro_relayed_events_total",
        "Events relayed to downstream hosts"
    )
    .unwrap();
    pub static ref LLM_LATENCY: Histogram = register_histogram!(
        "pokepro_llm_latency_seconds",
        "LLM completion latency in seconds"
    )
    .unwrap();
    pub static ref LLM_BACKENDS_HEALTHY: Gauge =
        register_gauge!("pokepro_llm_backends_healthy", "Healthy LLM backends").unwrap();
}
