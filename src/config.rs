use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::dispatcher::ResponseKind;
use crate::error::{Error, Result};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "pokepro")]
#[command(about = "Weighted poke responder for OneBot v11 bots")]
pub struct Args {
    // Port to receive OneBot event reports on
    #[arg(short, long, env = "POKEPRO_PORT", default_value_t = 8080)]
    pub port: u16,

    // OneBot HTTP API base url
    #[arg(long, env = "ONEBOT_API", default_value = "http://localhost:3000")]
    pub onebot_api: String,

    // Sent as a bearer token on every OneBot action
    #[arg(long, env = "ONEBOT_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    // LLM backends (comma-separated)
    // Example: "localhost:11434,localhost:11435"
    #[arg(short, long, env = "POKEPRO_LLM_BACKENDS", default_value = "localhost:11434")]
    pub backends: String,

    // Model name passed to /api/generate
    #[arg(short, long, env = "POKEPRO_LLM_MODEL", default_value = "qwen2.5:7b")]
    pub model: String,

    // LLM backend health check interval in seconds
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64,

    // Capacity of the event queue
    #[arg(long, default_value_t = 100)]
    pub queue_size: usize,

    // Downstream plugin hosts that receive unconsumed events (comma-separated)
    #[arg(long, env = "POKEPRO_FORWARD_URLS", default_value = "")]
    pub forward_urls: String,

    // Plugin options file (JSON)
    #[arg(short, long, env = "POKEPRO_CONFIG", default_value = "pokepro.json")]
    pub config: PathBuf,
}

/// Plugin options as written in the JSON config file.
///
/// List options are plain strings so they can be edited in one line; see
/// [`split_list`] for the accepted separators.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PokeConfig {
    pub weight_str: String,
    pub poke_max_times: u32,
    pub poke_interval: f64,
    pub face_ids_str: String,
    pub gallery_path: PathBuf,
    pub meme_cmds_str: String,
    pub api_cmds_str: String,
    pub ban_responses: Vec<String>,
    pub ban_fail_responses: Vec<String>,
    pub ban_min_seconds: u64,
    pub ban_max_seconds: u64,
    pub llm_prompt_template: String,
    pub llm_system_prompt: String,
    pub cooldown_seconds: u64,
    pub follow_poke_prob: f64,
    pub command_max_times: u32,
    pub wake_prefixes: Vec<String>,
}

impl Default for PokeConfig {
    fn default() -> Self {
        Self {
            weight_str: String::new(),
            poke_max_times: 5,
            poke_interval: 0.0,
            face_ids_str: String::new(),
            gallery_path: PathBuf::from("data/poke_gallery"),
            meme_cmds_str: String::new(),
            api_cmds_str: "盒".to_string(),
            ban_responses: vec![
                "{username}，你被{botname}禁言了，好好反省一下吧！".to_string(),
                "戳{botname}是要付出代价的，{username}。".to_string(),
            ],
            ban_fail_responses: vec![
                "{username}，算你运气好，{botname}没能禁言你……".to_string(),
                "可恶，禁言失败了，下次一定！".to_string(),
            ],
            ban_min_seconds: 30,
            ban_max_seconds: 120,
            llm_prompt_template: "{username}戳了你一下，请你简短地回应一下".to_string(),
            llm_system_prompt: String::new(),
            cooldown_seconds: 10,
            follow_poke_prob: 0.1,
            command_max_times: 10,
            wake_prefixes: vec!["/".to_string()],
        }
    }
}

impl PokeConfig {
    // Missing file -> defaults; unreadable file -> error; malformed JSON or
    // a mistyped option -> warning, defaults for what could not be read
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Ok(Self::from_value(value)),
            Err(e) => {
                warn!(path = %path.display(), "Config file is not valid JSON, using defaults: {}", e);
                Ok(Self::default())
            }
        }
    }

    // Applies options one at a time so a single bad one only loses itself
    pub fn from_value(value: Value) -> Self {
        let Value::Object(options) = value else {
            warn!("Config file is not a JSON object, using defaults");
            return Self::default();
        };
        let Ok(Value::Object(mut merged)) = serde_json::to_value(Self::default()) else {
            return Self::default();
        };

        for (key, option) in options {
            let previous = merged.insert(key.clone(), option);
            if let Err(e) = serde_json::from_value::<Self>(Value::Object(merged.clone())) {
                warn!(option = %key, "Malformed config option ignored: {}", e);
                match previous {
                    Some(previous) => merged.insert(key, previous),
                    None => merged.remove(&key),
                };
            }
        }
        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }
}

/// Parsed, validated plugin options. Built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// One weight per [`ResponseKind`], in [`ResponseKind::ALL`] order.
    pub weights: Vec<u32>,
    pub poke_max_times: u32,
    pub poke_interval: Duration,
    pub face_ids: Vec<u32>,
    pub gallery_path: PathBuf,
    pub meme_cmds: Vec<String>,
    pub api_cmds: Vec<String>,
    pub ban_responses: Vec<String>,
    pub ban_fail_responses: Vec<String>,
    pub ban_duration: RangeInclusive<u64>,
    pub llm_prompt_template: String,
    pub llm_system_prompt: String,
    pub cooldown: Duration,
    pub follow_poke_prob: f64,
    pub command_max_times: u32,
    pub wake_prefixes: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(PokeConfig::default())
    }
}

impl Settings {
    // Malformed options are logged and replaced by their defaults
    pub fn from_config(config: PokeConfig) -> Self {
        let weights = parse_list::<u32>(&config.weight_str).unwrap_or_else(|e| {
            warn!("weight_str ignored: {}", e);
            Vec::new()
        });
        let face_ids = parse_list::<u32>(&config.face_ids_str).unwrap_or_else(|e| {
            warn!("face_ids_str ignored: {}", e);
            Vec::new()
        });

        let poke_interval = Duration::try_from_secs_f64(config.poke_interval).unwrap_or_else(|_| {
            warn!("poke_interval {} is not a valid delay, using 0", config.poke_interval);
            Duration::ZERO
        });

        let (ban_min, ban_max) = if config.ban_min_seconds <= config.ban_max_seconds {
            (config.ban_min_seconds, config.ban_max_seconds)
        } else {
            (config.ban_max_seconds, config.ban_min_seconds)
        };

        let follow_poke_prob = if config.follow_poke_prob.is_nan() {
            0.0
        } else {
            config.follow_poke_prob.clamp(0.0, 1.0)
        };

        Self {
            weights: pad_weights(weights, ResponseKind::ALL.len()),
            poke_max_times: config.poke_max_times.max(1),
            poke_interval,
            face_ids,
            gallery_path: config.gallery_path,
            meme_cmds: split_list(&config.meme_cmds_str),
            api_cmds: split_list(&config.api_cmds_str),
            ban_responses: config.ban_responses,
            ban_fail_responses: config.ban_fail_responses,
            ban_duration: ban_min..=ban_max,
            llm_prompt_template: config.llm_prompt_template,
            llm_system_prompt: config.llm_system_prompt,
            cooldown: Duration::from_secs(config.cooldown_seconds),
            follow_poke_prob,
            command_max_times: config.command_max_times.max(1),
            wake_prefixes: config
                .wake_prefixes
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

const SEPARATORS: [char; 4] = [':', '：', ',', '，'];

/// Splits on ASCII and full-width colons and commas, trimming every item and
/// dropping empty ones.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(|c| SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn parse_list<T>(input: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    split_list(input)
        .iter()
        .map(|item| {
            item.parse::<T>()
                .map_err(|e| Error::Config(format!("invalid number `{}`: {}", item, e)))
        })
        .collect()
}

// Pad with 1s up to `count`, drop extras. The total must fit a u32 for
// `WeightedIndex<u32>`.
pub fn pad_weights(mut weights: Vec<u32>, count: usize) -> Vec<u32> {
    weights.truncate(count);
    weights.resize(count, 1);
    if weights.iter().all(|w| *w == 0) {
        warn!("All response weights are zero, falling back to equal weights");
        return vec![1; count];
    }
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if total > u64::from(u32::MAX) {
        warn!(total, "Response weights overflow, falling back to equal weights");
        return vec![1; count];
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_accepts_every_separator() {
        let parts = split_list(" a:b：c , d，e ");
        assert_eq!(parts, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn split_list_drops_empty_items() {
        assert!(split_list("").is_empty());
        assert_eq!(split_list(",, x ,:"), vec!["x"]);
    }

    #[test]
    fn parse_list_reads_integers() {
        let ids: Vec<u32> = parse_list("287，2, 15").unwrap();
        assert_eq!(ids, vec![287, 2, 15]);
    }

    #[test]
    fn parse_list_rejects_garbage() {
        let err = parse_list::<u32>("1,two,3").unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("two")));
    }

    #[test]
    fn weights_are_padded_and_truncated() {
        assert_eq!(pad_weights(vec![5, 0], 4), vec![5, 0, 1, 1]);
        assert_eq!(pad_weights(vec![1, 2, 3, 4, 5], 3), vec![1, 2, 3]);
    }

    #[test]
    fn all_zero_weights_fall_back_to_ones() {
        assert_eq!(pad_weights(vec![0, 0, 0], 3), vec![1, 1, 1]);
    }

    #[test]
    fn overflowing_weights_fall_back_to_ones() {
        assert_eq!(pad_weights(vec![u32::MAX, 1], 3), vec![1, 1, 1]);
        assert_eq!(pad_weights(vec![u32::MAX, 0], 2), vec![u32::MAX, 0]);

        let settings = Settings::from_config(PokeConfig {
            weight_str: "4294967295,1".to_string(),
            ..PokeConfig::default()
        });
        assert_eq!(settings.weights, vec![1; ResponseKind::ALL.len()]);
    }

    #[test]
    fn malformed_weights_use_defaults() {
        let settings = Settings::from_config(PokeConfig {
            weight_str: "3,x".to_string(),
            ..PokeConfig::default()
        });
        assert_eq!(settings.weights, vec![1; ResponseKind::ALL.len()]);
    }

    #[test]
    fn settings_normalize_ranges() {
        let settings = Settings::from_config(PokeConfig {
            poke_interval: -1.0,
            poke_max_times: 0,
            ban_min_seconds: 90,
            ban_max_seconds: 10,
            follow_poke_prob: 3.0,
            ..PokeConfig::default()
        });
        assert_eq!(settings.poke_interval, Duration::ZERO);
        assert_eq!(settings.poke_max_times, 1);
        assert_eq!(settings.ban_duration, 10..=90);
        assert_eq!(settings.follow_poke_prob, 1.0);
    }

    #[test]
    fn config_file_fills_missing_fields() {
        let cfg: PokeConfig =
            serde_json::from_str(r#"{"weight_str": "0,0,1", "meme_cmds_str": "摸,拍"}"#).unwrap();
        let settings = Settings::from_config(cfg);
        assert_eq!(settings.weights, vec![0, 0, 1, 1, 1, 1, 1]);
        assert_eq!(settings.meme_cmds, vec!["摸", "拍"]);
        assert_eq!(settings.api_cmds, vec!["盒"]);
        assert_eq!(settings.cooldown, Duration::from_secs(10));
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let cfg = PokeConfig::load(Path::new("/nonexistent/pokepro.json")).unwrap();
        assert_eq!(cfg.poke_max_times, 5);
    }

    #[test]
    fn mistyped_option_keeps_its_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pokepro.json");
        std::fs::write(&path, r#"{"poke_interval": "1", "poke_max_times": 3}"#).unwrap();

        let cfg = PokeConfig::load(&path).unwrap();
        assert_eq!(cfg.poke_interval, 0.0);
        assert_eq!(cfg.poke_max_times, 3);
        assert_eq!(cfg.api_cmds_str, "盒");
    }

    #[test]
    fn invalid_json_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pokepro.json");
        std::fs::write(&path, "{ weight_str: 1,").unwrap();

        let cfg = PokeConfig::load(&path).unwrap();
        assert_eq!(cfg.cooldown_seconds, 10);
        assert_eq!(cfg.weight_str, "");
    }
}
