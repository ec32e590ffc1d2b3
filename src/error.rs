#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Malformed schedule payload: {0}")]
    Payload(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;
