use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::load_balancer::LoadBalancer;
use crate::metrics::LLM_LATENCY;
use crate::models::{GenerateRequest, GenerateResponse};

/// Single-turn text completion.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

// Ollama /api/generate client over the backend pool
pub struct OllamaClient {
    client: reqwest::Client,
    load_balancer: Arc<LoadBalancer>,
    model: String,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, load_balancer: Arc<LoadBalancer>, model: &str) -> Self {
        Self {
            client,
            load_balancer,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Completion for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let backend = self.load_balancer.get_backend().ok_or(Error::NoBackend)?;
        debug!("Using LLM backend: {}", backend.url);

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: system.to_string(),
            stream: false,
        };

        let start_time = Instant::now();
        let result = self
            .client
            .post(format!("{}/api/generate", backend.url))
            .json(&request)
            .send()
            .await;

        let res = match result {
            Ok(res) => res,
            // Marking backend as unhealthy on connection errors
            Err(e) => {
                backend.set_healthy(false);
                warn!("LLM backend {} failed, marked unhealthy", backend.url);
                return Err(e.into());
            }
        };
        let body: GenerateResponse = res.error_for_status()?.json().await?;
        LLM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        Ok(body.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use serde_json::{Value, json};

    async fn fake_ollama() -> String {
        async fn generate(Json(req): Json<Value>) -> Json<Value> {
            let reply = format!("[{}] {}", req["system"].as_str().unwrap_or("-"), req["prompt"]);
            let model = req["model"].clone();
            Json(json!({ "model": model, "response": format!("  {}\n", reply), "done": true }))
        }
        let app = Router::new().route("/api/generate", post(generate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("127.0.0.1:{}", addr.port())
    }

    #[tokio::test]
    async fn completes_through_backend() {
        let backend = fake_ollama().await;
        let lb = Arc::new(LoadBalancer::new(&backend).unwrap());
        let llm = OllamaClient::new(reqwest::Client::new(), lb, "test-model");

        let text = llm.complete("be cute", "hello").await.unwrap();
        assert_eq!(text, "[be cute] \"hello\"");
    }

    #[tokio::test]
    async fn no_healthy_backend_is_an_error() {
        let lb = Arc::new(LoadBalancer::new("127.0.0.1:9").unwrap());
        lb.all_backends()[0].set_healthy(false);
        let llm = OllamaClient::new(reqwest::Client::new(), lb, "m");

        assert!(matches!(llm.complete("", "hi").await, Err(Error::NoBackend)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_marked_unhealthy() {
        // grab a free port, then close it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let lb = Arc::new(LoadBalancer::new(&format!("127.0.0.1:{}", port)).unwrap());
        let llm = OllamaClient::new(reqwest::Client::new(), lb.clone(), "m");

        assert!(matches!(llm.complete("", "hi").await, Err(Error::Http(_))));
        assert_eq!(lb.healthy_count(), 0);
    }
}
