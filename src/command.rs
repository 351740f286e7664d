use std::time::Duration;
use tokio::time::sleep;

use crate::config::Settings;
use crate::error::Result;
use crate::models::{Chat, MessageEvent};
use crate::onebot::{ChatApi, poke};

const COMMAND: &str = "戳";
const COMMAND_ME: &str = "戳我";

// `戳 @a @b [times]` / `戳我 [times]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokeCommand {
    pub targets: Vec<i64>,
    pub times: u32,
}

impl PokeCommand {
    /// Returns `None` when the message is not a poke command.
    ///
    /// Group messages must be woken, by a configured prefix or by mentioning
    /// the bot. Mentions of the bot are never targets.
    pub fn parse(msg: &MessageEvent, settings: &Settings) -> Option<Self> {
        let text = msg.plain_text();
        let mentions_bot = msg.mentions().any(|id| id == msg.self_id);

        let (text, prefixed) = match settings
            .wake_prefixes
            .iter()
            .find(|prefix| text.starts_with(prefix.as_str()))
        {
            Some(prefix) => (text[prefix.len()..].trim_start(), true),
            None => (text.as_str(), false),
        };

        let private = matches!(msg.chat(), Chat::Private(_));
        if !(private || prefixed || mentions_bot) {
            return None;
        }

        let mut tokens = text.split_whitespace();
        let poke_sender = match tokens.next()? {
            COMMAND => false,
            COMMAND_ME => true,
            _ => return None,
        };

        let times = tokens
            .find_map(|t| t.parse::<u32>().ok())
            .unwrap_or(1)
            .clamp(1, settings.command_max_times);

        let mut targets: Vec<i64> = Vec::new();
        for id in msg.mentions().filter(|id| *id != msg.self_id) {
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        if poke_sender && !targets.contains(&msg.user_id) {
            targets.push(msg.user_id);
        }

        Some(Self { targets, times })
    }

    // Stops at the first failed poke
    pub async fn execute(&self, api: &dyn ChatApi, chat: Chat, interval: Duration) -> Result<()> {
        for target in &self.targets {
            for _ in 0..self.times {
                poke(api, chat, *target).await?;
                sleep(interval).await;
            }
        }
        Ok(())
    }
}
