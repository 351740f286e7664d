// Recording fakes for the ChatApi and Completion seams
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::llm::Completion;
use crate::models::{Chat, NoticeEvent, Segment};
use crate::onebot::{ChatApi, StrangerInfo};

pub const BOT: i64 = 10001;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GroupPoke(i64, i64),
    FriendPoke(i64),
    Send(Chat, Vec<Segment>),
    Ban(i64, i64, u64),
    StrangerInfo(i64),
}

#[derive(Default)]
pub struct RecordingApi {
    pub calls: Mutex<Vec<Call>>,
    pub fail_ban: bool,
    pub fail_pokes: bool,
    pub nicknames: HashMap<i64, String>,
}

impl RecordingApi {
    pub fn with_nicknames(names: &[(i64, &str)]) -> Self {
        Self {
            nicknames: names
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn refuse(action: &str) -> Error {
        Error::Api {
            action: action.to_string(),
            status: "failed".to_string(),
            retcode: 100,
            message: "refused".to_string(),
        }
    }
}

#[async_trait]
impl ChatApi for RecordingApi {
    async fn group_poke(&self, group_id: i64, user_id: i64) -> Result<()> {
        self.record(Call::GroupPoke(group_id, user_id));
        if self.fail_pokes {
            return Err(Self::refuse("group_poke"));
        }
        Ok(())
    }

    async fn friend_poke(&self, user_id: i64) -> Result<()> {
        self.record(Call::FriendPoke(user_id));
        if self.fail_pokes {
            return Err(Self::refuse("friend_poke"));
        }
        Ok(())
    }

    async fn send_message(&self, chat: Chat, message: Vec<Segment>) -> Result<()> {
        self.record(Call::Send(chat, message));
        Ok(())
    }

    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: u64) -> Result<()> {
        self.record(Call::Ban(group_id, user_id, duration));
        if self.fail_ban {
            return Err(Self::refuse("set_group_ban"));
        }
        Ok(())
    }

    async fn get_stranger_info(&self, user_id: i64) -> Result<StrangerInfo> {
        self.record(Call::StrangerInfo(user_id));
        Ok(StrangerInfo {
            user_id,
            nickname: self.nicknames.get(&user_id).cloned().unwrap_or_default(),
        })
    }
}

pub struct FixedCompletion {
    reply: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FixedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::default(),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for FixedCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.reply.clone().ok_or(Error::NoBackend)
    }
}

pub fn poke_notice(group_id: Option<i64>, poker: i64, target: i64) -> NoticeEvent {
    NoticeEvent {
        time: 1_729_000_000,
        self_id: BOT,
        notice_type: "notify".to_string(),
        sub_type: Some("poke".to_string()),
        group_id,
        user_id: poker,
        target_id: Some(target),
        sender_id: None,
    }
}
