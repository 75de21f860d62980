use crate::feed::{RecordBody, RecordId};

mod draft;
pub use draft::{submit, Draft};

mod composer;
pub use composer::Composer;

/// Longest message text accepted, in characters.
pub const MAX_LENGTH: usize = 100;

/// A confirmed message: one the feed has assigned an id to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: RecordId,
    pub name: String,
    pub text: String,
    pub created_at: i64,
}

impl Message {
    pub fn from_record(id: RecordId, body: RecordBody) -> Self {
        let RecordBody {
            name,
            text,
            created_at,
        } = body;
        Self {
            id,
            name,
            text,
            created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("the message is empty")]
    Empty,

    #[error("the message is too long: {have} characters, at most {max} allowed")]
    TooLong { have: usize, max: usize },

    #[error("no author is set")]
    NoAuthor,

    #[error("messages are still loading")]
    NotReady,
}
