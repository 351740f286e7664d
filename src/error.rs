use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // OneBot answered, but refused the action
    #[error("OneBot action `{action}` failed (status: {status}, retcode: {retcode}): {message}")]
    Api {
        action: String,
        status: String,
        retcode: i64,
        message: String,
    },

    #[error("Action `{0}` is only available in group chats")]
    GroupOnly(&'static str),

    #[error("No healthy LLM backends available")]
    NoBackend,

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
