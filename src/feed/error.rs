#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed responded with {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid feed url: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed record: {reason}")]
    Malformed { reason: String },

    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("feed is closed")]
    Closed,
}

impl FeedError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
