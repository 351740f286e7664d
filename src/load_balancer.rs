use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::task::JoinSet;
use tokio::time::{Duration, interval};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::LLM_BACKENDS_HEALTHY;

// Single LLM backend server
pub struct Backend {
    pub url: String,
    healthy: AtomicBool,
}

impl Backend {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

// Round-robin over LLM backends
pub struct LoadBalancer {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl LoadBalancer {
    // Create from comma-separated urls "localhost:11434, localhost:11435"
    pub fn new(backends_str: &str) -> Result<Self> {
        let backends: Vec<Arc<Backend>> = backends_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let full_url = if url.starts_with("http") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", url.trim_end_matches('/'))
                };
                Arc::new(Backend::new(full_url))
            })
            .collect();
        if backends.is_empty() {
            return Err(Error::Config("at least one LLM backend required".to_string()));
        }

        info!("LLM load balancer initialized with {} backends", backends.len());
        for (i, b) in backends.iter().enumerate() {
            info!("  [{}] {}", i + 1, b.url);
        }
        LLM_BACKENDS_HEALTHY.set(backends.len() as f64);

        Ok(Self {
            backends,
            current: AtomicUsize::new(0),
        })
    }

    // Next healthy backend, round-robin
    pub fn get_backend(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        for i in 0..len {
            let backend = &self.backends[(start + i) % len];
            if backend.is_healthy() {
                return Some(Arc::clone(backend));
            }
        }
        None
    }

    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// Ollama answers /api/tags whenever it can serve a model list
async fn probe(client: &reqwest::Client, backend: &Backend) -> bool {
    match client
        .get(format!("{}/api/tags", backend.url))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(res) => res.status().is_success(),
        Err(e) => {
            debug!("Probe of {} failed: {}", backend.url, e);
            false
        }
    }
}

/// Probes all backends concurrently and records the result on each.
/// Returns the number of healthy backends.
pub async fn check_backends(load_balancer: &LoadBalancer, client: &reqwest::Client) -> usize {
    let mut probes = JoinSet::new();
    for backend in load_balancer.all_backends() {
        let backend = Arc::clone(backend);
        let client = client.clone();
        probes.spawn(async move {
            let healthy = probe(&client, &backend).await;
            (backend, healthy)
        });
    }

    while let Some(joined) = probes.join_next().await {
        let Ok((backend, healthy)) = joined else {
            continue;
        };
        if backend.is_healthy() == healthy {
            continue;
        }
        backend.set_healthy(healthy);
        if healthy {
            info!("LLM backend {} is back", backend.url);
        } else {
            warn!("LLM backend {} stopped answering, taken out of rotation", backend.url);
        }
    }

    let healthy = load_balancer.healthy_count();
    LLM_BACKENDS_HEALTHY.set(healthy as f64);
    healthy
}

// Runs until the process exits. A backend marked down by a failed
// generate call is only put back here.
pub async fn health_checker(
    load_balancer: Arc<LoadBalancer>,
    client: reqwest::Client,
    check_interval: Duration,
) {
    let mut ticks = interval(check_interval);
    info!("LLM health checker started (interval: {:?})", check_interval);

    loop {
        ticks.tick().await;
        if check_backends(&load_balancer, &client).await == 0 {
            warn!("No LLM backend is answering, LLM replies will pass");
        }
    }
}
