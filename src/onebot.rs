use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Chat, Segment};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StrangerInfo {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
}

/// The chat-platform actions pokepro needs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn group_poke(&self, group_id: i64, user_id: i64) -> Result<()>;

    async fn friend_poke(&self, user_id: i64) -> Result<()>;

    async fn send_message(&self, chat: Chat, message: Vec<Segment>) -> Result<()>;

    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: u64) -> Result<()>;

    async fn get_stranger_info(&self, user_id: i64) -> Result<StrangerInfo>;
}

// Group poke in groups, friend poke otherwise
pub async fn poke(api: &dyn ChatApi, chat: Chat, user_id: i64) -> Result<()> {
    match chat {
        Chat::Group(group_id) => api.group_poke(group_id, user_id).await,
        Chat::Private(_) => api.friend_poke(user_id).await,
    }
}

// OneBot action response envelope
#[derive(Deserialize, Debug)]
struct ActionResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wording: String,
}

/// OneBot v11 HTTP API client.
pub struct OneBotClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl OneBotClient {
    pub fn new(client: reqwest::Client, base_url: &str, access_token: Option<String>) -> Self {
        let base_url = if base_url.starts_with("http") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };
        Self {
            client,
            base_url,
            access_token: access_token.filter(|t| !t.is_empty()),
        }
    }

    async fn call(&self, action: &str, params: Value) -> Result<Value> {
        debug!(action, %params, "OneBot call");

        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, action))
            .json(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let body: ActionResponse = request.send().await?.error_for_status()?.json().await?;

        if body.retcode != 0 || !(body.status == "ok" || body.status == "async") {
            let message = if body.wording.is_empty() {
                body.message
            } else {
                body.wording
            };
            return Err(Error::Api {
                action: action.to_string(),
                status: body.status,
                retcode: body.retcode,
                message,
            });
        }
        Ok(body.data)
    }
}

#[async_trait]
impl ChatApi for OneBotClient {
    async fn group_poke(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.call("group_poke", json!({ "group_id": group_id, "user_id": user_id }))
            .await?;
        Ok(())
    }

    async fn friend_poke(&self, user_id: i64) -> Result<()> {
        self.call("friend_poke", json!({ "user_id": user_id })).await?;
        Ok(())
    }

    async fn send_message(&self, chat: Chat, message: Vec<Segment>) -> Result<()> {
        match chat {
            Chat::Group(group_id) => {
                self.call(
                    "send_group_msg",
                    json!({ "group_id": group_id, "message": message }),
                )
                .await?
            }
            Chat::Private(user_id) => {
                self.call(
                    "send_private_msg",
                    json!({ "user_id": user_id, "message": message }),
                )
                .await?
            }
        };
        Ok(())
    }

    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: u64) -> Result<()> {
        self.call(
            "set_group_ban",
            json!({ "group_id": group_id, "user_id": user_id, "duration": duration }),
        )
        .await?;
        Ok(())
    }

    async fn get_stranger_info(&self, user_id: i64) -> Result<StrangerInfo> {
        let data = self
            .call(
                "get_stranger_info",
                json!({ "user_id": user_id, "no_cache": true }),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }
}
