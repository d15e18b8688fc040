use serde_json::Value;

/// Shown when a planning request fails without a usable server message.
pub const GENERIC_PLANNING_MESSAGE: &str = "Could not plan a trip right now. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Planning failed: {0}")]
    Planning(String),
}

impl LiveError {
    /// Text fit for the trip panel: the server's own explanation when it gave
    /// one, otherwise a generic message.
    pub fn user_message(&self) -> String {
        match self {
            LiveError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            LiveError::Planning(message) => message.clone(),
            _ => GENERIC_PLANNING_MESSAGE.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LiveError>;

/// Pulls a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, validation-style
/// `{"detail": [{"msg": "..."}]}` and `{"error": "..."}`.
pub(crate) fn error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;

    let message = match value.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    };

    message
        .or_else(|| value.get("error").and_then(Value::as_str).map(str::to_string))
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}
