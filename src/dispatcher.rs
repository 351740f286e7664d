use rand::distr::weighted::WeightedIndex;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::command::PokeCommand;
use crate::config::Settings;
use crate::cooldown::Cooldown;
use crate::dice::Dice;
use crate::error::{Error, Result};
use crate::llm::Completion;
use crate::metrics::{COOLDOWN_REJECTS, FOLLOW_POKES, HANDLER_ERRORS, POKES_TOTAL, RESPONSES_TOTAL};
use crate::models::{Event, MessageEvent, NoticeEvent};
use crate::onebot::{ChatApi, poke};
use crate::responder::{Outcome, Responder};

/// The poke responses, in the order `weight_str` assigns weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Poke,
    Llm,
    Face,
    Gallery,
    Meme,
    Ban,
    Lookup,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 7] = [
        ResponseKind::Poke,
        ResponseKind::Llm,
        ResponseKind::Face,
        ResponseKind::Gallery,
        ResponseKind::Meme,
        ResponseKind::Ban,
        ResponseKind::Lookup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResponseKind::Poke => "poke",
            ResponseKind::Llm => "llm",
            ResponseKind::Face => "face",
            ResponseKind::Gallery => "gallery",
            ResponseKind::Meme => "meme",
            ResponseKind::Ban => "ban",
            ResponseKind::Lookup => "box",
        }
    }
}

pub struct Dispatcher {
    settings: Arc<Settings>,
    api: Arc<dyn ChatApi>,
    responder: Responder,
    cooldown: Cooldown,
    weights: WeightedIndex<u32>,
    dice: Arc<Dice>,
}

impl Dispatcher {
    pub fn new(
        settings: Arc<Settings>,
        api: Arc<dyn ChatApi>,
        llm: Arc<dyn Completion>,
        dice: Arc<Dice>,
    ) -> Result<Self> {
        let weights = WeightedIndex::new(&settings.weights)
            .map_err(|e| Error::Config(format!("invalid response weights: {}", e)))?;
        let responder = Responder::new(settings.clone(), api.clone(), llm, dice.clone());

        Ok(Self {
            cooldown: Cooldown::new(settings.cooldown),
            settings,
            api,
            responder,
            weights,
            dice,
        })
    }

    pub async fn handle(&self, event: &Event) -> Outcome {
        match event {
            Event::Notice(notice) => self.on_notice(notice).await,
            Event::Message(msg) => self.on_message(msg).await,
            Event::Other => Outcome::Pass,
        }
    }

    pub fn select(&self) -> ResponseKind {
        ResponseKind::ALL[self.dice.weighted(&self.weights)]
    }

    pub fn tracked_users(&self) -> usize {
        self.cooldown.len()
    }

    async fn on_notice(&self, notice: &NoticeEvent) -> Outcome {
        if !notice.is_poke() {
            return Outcome::Pass;
        }
        let poker = notice.poker();
        // our own pokes echo back as notices
        if poker == notice.self_id {
            return Outcome::Pass;
        }
        let Some(target) = notice.target_id else {
            return Outcome::Pass;
        };

        if target != notice.self_id {
            self.follow_poke(notice, target).await;
            return Outcome::Pass;
        }

        POKES_TOTAL.inc();
        if let Err(left) = self.cooldown.check(poker) {
            COOLDOWN_REJECTS.inc();
            debug!(user_id = poker, "Poke ignored, cooldown has {:?} left", left);
            return Outcome::Pass;
        }

        let kind = self.select();
        debug!("Selected poke response: {}", kind.name());
        RESPONSES_TOTAL.with_label_values(&[kind.name()]).inc();

        match self.responder.respond(kind, notice).await {
            Ok(outcome) => outcome,
            Err(e) => {
                HANDLER_ERRORS.inc();
                error!(user_id = poker, "Poke response `{}` failed: {}", kind.name(), e);
                Outcome::Pass
            }
        }
    }

    async fn follow_poke(&self, notice: &NoticeEvent, target: i64) {
        let prob = self.settings.follow_poke_prob;
        if prob <= 0.0 || !self.dice.chance(prob) {
            return;
        }

        debug!(target, "Following poke");
        match poke(self.api.as_ref(), notice.chat(), target).await {
            Ok(()) => FOLLOW_POKES.inc(),
            Err(e) => warn!(target, "Follow-poke failed: {}", e),
        }
    }

    async fn on_message(&self, msg: &MessageEvent) -> Outcome {
        let Some(command) = PokeCommand::parse(msg, &self.settings) else {
            return Outcome::Pass;
        };

        if let Err(e) = command
            .execute(self.api.as_ref(), msg.chat(), self.settings.poke_interval)
            .await
        {
            HANDLER_ERRORS.inc();
            error!("Poke command failed: {}", e);
        }
        Outcome::Consumed
    }
}
