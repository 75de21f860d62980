use std::fmt;

use time::{macros::format_description, OffsetDateTime};

use crate::message::Message;

/// A message as it is laid out on screen.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Row<'a> {
    pub message: &'a Message,
    /// Sent by the current user.
    pub own: bool,
    /// First of a run of messages by the same author.
    pub show_details: bool,
}

pub fn rows<'a>(messages: impl IntoIterator<Item = &'a Message>, user: &str) -> Vec<Row<'a>> {
    let mut prev = <Option<&str>>::None;
    messages
        .into_iter()
        .map(|message| {
            let show_details = prev != Some(&*message.name);
            prev = Some(message.name.as_str());
            Row {
                message,
                own: message.name == user,
                show_details,
            }
        })
        .collect()
}

/// `HH:MM` in UTC, or `--:--` for timestamps out of range.
pub fn clock(created_at: i64) -> String {
    OffsetDateTime::from_unix_timestamp(created_at)
        .ok()
        .and_then(|at| at.format(format_description!("[hour]:[minute]")).ok())
        .unwrap_or_else(|| String::from("--:--"))
}

impl fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Message {
            name,
            text,
            created_at,
            ..
        } = self.message;

        if self.show_details {
            let marker = if self.own { " (you)" } else { "" };
            writeln!(f, "[{}] {name}{marker}", clock(*created_at))?;
        }
        write!(f, "  {text}")
    }
}
