//! The seven poke responses.
//!
//! Every response is a short script against [`ChatApi`]; the dispatcher picks
//! which one runs.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::dice::Dice;
use crate::dispatcher::ResponseKind;
use crate::error::{Error, Result};
use crate::llm::Completion;
use crate::models::{Chat, MessageEvent, NoticeEvent, Segment, Sender};
use crate::onebot::{ChatApi, poke};

const FALLBACK_FACE_ID: u32 = 287;
const FALLBACK_USERNAME: &str = "你";
const FALLBACK_BOTNAME: &str = "我";

/// What should happen to an event after pokepro looked at it.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// pokepro acted on it; do not relay.
    Consumed,
    /// Relay downstream unchanged.
    Pass,
    /// Queue this synthesized command in place of the original event.
    Reinject(MessageEvent),
}

pub struct Responder {
    settings: Arc<Settings>,
    api: Arc<dyn ChatApi>,
    llm: Arc<dyn Completion>,
    dice: Arc<Dice>,
}

impl Responder {
    pub fn new(
        settings: Arc<Settings>,
        api: Arc<dyn ChatApi>,
        llm: Arc<dyn Completion>,
        dice: Arc<Dice>,
    ) -> Self {
        Self {
            settings,
            api,
            llm,
            dice,
        }
    }

    pub async fn respond(&self, kind: ResponseKind, notice: &NoticeEvent) -> Result<Outcome> {
        match kind {
            ResponseKind::Poke => self.counter_poke(notice).await,
            ResponseKind::Llm => self.llm_reply(notice).await,
            ResponseKind::Face => self.face_burst(notice).await,
            ResponseKind::Gallery => self.gallery_image(notice).await,
            ResponseKind::Meme => self.meme(notice),
            ResponseKind::Ban => self.ban(notice).await,
            ResponseKind::Lookup => self.lookup(notice),
        }
    }

    async fn counter_poke(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let times: u32 = self.dice.range(1..=self.settings.poke_max_times);
        let chat = notice.chat();
        let poker = notice.poker();
        for _ in 0..times {
            poke(self.api.as_ref(), chat, poker).await?;
            sleep(self.settings.poke_interval).await;
        }
        Ok(Outcome::Consumed)
    }

    async fn llm_reply(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let username = self
            .nickname(notice.poker())
            .await
            .unwrap_or_else(|| notice.poker().to_string());
        let prompt = self
            .settings
            .llm_prompt_template
            .replace("{username}", &username);

        let reply = match self
            .llm
            .complete(&self.settings.llm_system_prompt, &prompt)
            .await
        {
            Ok(reply) if !reply.is_empty() => reply,
            Ok(_) => {
                warn!("LLM returned an empty completion");
                return Ok(Outcome::Pass);
            }
            Err(e) => {
                error!("LLM call failed: {}", e);
                return Ok(Outcome::Pass);
            }
        };

        self.api
            .send_message(notice.chat(), vec![Segment::text(reply)])
            .await?;
        Ok(Outcome::Consumed)
    }

    async fn face_burst(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let face_id = self
            .dice
            .pick(&self.settings.face_ids)
            .copied()
            .unwrap_or(FALLBACK_FACE_ID);
        let count: usize = self.dice.range(1..=3);

        let faces = vec![Segment::face(face_id); count];
        self.api.send_message(notice.chat(), faces).await?;
        Ok(Outcome::Consumed)
    }

    async fn gallery_image(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let files = gallery_files(&self.settings.gallery_path).await?;
        let Some(file) = self.dice.pick(&files) else {
            debug!("Gallery {} is empty", self.settings.gallery_path.display());
            return Ok(Outcome::Pass);
        };

        let file = tokio::fs::canonicalize(file).await?;
        let uri = format!("file://{}", file.display());
        self.api
            .send_message(notice.chat(), vec![Segment::image(uri)])
            .await?;
        Ok(Outcome::Consumed)
    }

    fn meme(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let command = self
            .dice
            .pick(&self.settings.meme_cmds)
            .ok_or_else(|| Error::Config("meme_cmds_str is empty".to_string()))?;
        Ok(Outcome::Reinject(command_event(notice, command)))
    }

    async fn ban(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let poker = notice.poker();
        let duration: u64 = self.dice.range(self.settings.ban_duration.clone());

        let result = match notice.chat().group_id() {
            Some(group_id) => self.api.set_group_ban(group_id, poker, duration).await,
            None => Err(Error::GroupOnly("set_group_ban")),
        };

        let templates = match &result {
            Ok(()) => {
                info!(user_id = poker, duration, "Muted poker");
                &self.settings.ban_responses
            }
            Err(e) => {
                warn!(user_id = poker, "Mute failed: {}", e);
                &self.settings.ban_fail_responses
            }
        };

        let Some(template) = self.dice.pick(templates) else {
            warn!("No mute reply templates configured");
            return Ok(Outcome::Consumed);
        };
        let reply = self.format_reply(template, poker, notice.self_id).await;

        self.api
            .send_message(notice.chat(), vec![Segment::text(reply)])
            .await?;
        Ok(Outcome::Consumed)
    }

    fn lookup(&self, notice: &NoticeEvent) -> Result<Outcome> {
        let command = self
            .dice
            .pick(&self.settings.api_cmds)
            .ok_or_else(|| Error::Config("api_cmds_str is empty".to_string()))?;
        Ok(Outcome::Reinject(command_event(notice, command)))
    }

    // Nicknames are only fetched for placeholders that occur
    pub async fn format_reply(&self, template: &str, user_id: i64, self_id: i64) -> String {
        let username = if template.contains("{username}") {
            self.nickname(user_id).await
        } else {
            None
        };
        let botname = if template.contains("{botname}") {
            self.nickname(self_id).await
        } else {
            None
        };
        fill_placeholders(
            template,
            username.as_deref().unwrap_or(FALLBACK_USERNAME),
            botname.as_deref().unwrap_or(FALLBACK_BOTNAME),
        )
    }

    async fn nickname(&self, user_id: i64) -> Option<String> {
        match self.api.get_stranger_info(user_id).await {
            Ok(info) if !info.nickname.is_empty() => Some(info.nickname),
            Ok(_) => None,
            Err(e) => {
                warn!(user_id, "Nickname lookup failed: {}", e);
                None
            }
        }
    }
}

// Regular files only, sorted
async fn gallery_files(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

// One pass over the template: nicknames are inserted verbatim, even when
// they look like placeholders themselves
fn fill_placeholders(template: &str, username: &str, botname: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{username}") {
            out.push_str(username);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{botname}") {
            out.push_str(botname);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Builds the message event `@bot <command>` sent by the poker, so the
/// plugin host that owns `command` handles it as if the user typed it.
pub fn command_event(notice: &NoticeEvent, command: &str) -> MessageEvent {
    let chat = notice.chat();
    let poker = notice.poker();
    let (message_type, sub_type) = match chat {
        Chat::Group(_) => ("group", "normal"),
        Chat::Private(_) => ("private", "friend"),
    };

    MessageEvent {
        time: notice.time,
        self_id: notice.self_id,
        message_type: message_type.to_string(),
        sub_type: Some(sub_type.to_string()),
        message_id: None,
        user_id: poker,
        group_id: chat.group_id(),
        message: vec![Segment::at(notice.self_id), Segment::text(command)],
        raw_message: command.to_string(),
        sender: Some(Sender {
            user_id: Some(poker),
            ..Sender::default()
        }),
    }
}
