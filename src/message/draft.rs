use time::OffsetDateTime;

use crate::feed::RecordBody;

use super::{SubmitError, MAX_LENGTH};

/// Normalized user input, ready to hand to the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Draft {
    author: String,
    text: String,
}

impl Draft {
    pub fn new(raw: &str, author: &str, max_len: usize) -> Result<Self, SubmitError> {
        if author.trim().is_empty() {
            return Err(SubmitError::NoAuthor);
        }

        let text = raw.trim();
        if text.is_empty() {
            return Err(SubmitError::Empty);
        }

        let have = text.chars().count();
        if have > max_len {
            return Err(SubmitError::TooLong { have, max: max_len });
        }

        Ok(Self {
            author: author.to_string(),
            text: text.to_string(),
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_body(self, created_at: i64) -> RecordBody {
        RecordBody {
            name: self.author,
            text: self.text,
            created_at,
        }
    }

    /// Stamps the draft with the current time, in whole seconds.
    pub fn into_body_now(self) -> RecordBody {
        self.into_body(OffsetDateTime::now_utc().unix_timestamp())
    }
}

/// Normalizes `raw` into a record body from `author`.
pub fn submit(raw: &str, author: &str) -> Result<RecordBody, SubmitError> {
    Draft::new(raw, author, MAX_LENGTH).map(Draft::into_body_now)
}
