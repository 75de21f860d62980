use super::{Draft, SubmitError, MAX_LENGTH};

/// The message input buffer. Input past `max_len` characters is cut off.
#[derive(Clone, Debug)]
pub struct Composer {
    buffer: String,
    max_len: usize,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(MAX_LENGTH)
    }
}

impl Composer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: String::with_capacity(max_len),
            max_len,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn set(&mut self, input: &str) {
        self.buffer.clear();
        self.push_str(input);
    }

    pub fn push_str(&mut self, input: &str) {
        let room = self.max_len.saturating_sub(self.buffer.chars().count());
        self.buffer.extend(input.chars().take(room));
    }

    /// Turns the buffer into a draft. The buffer is only cleared on success.
    pub fn take_draft(&mut self, author: &str) -> Result<Draft, SubmitError> {
        let draft = Draft::new(&self.buffer, author, self.max_len)?;
        self.buffer.clear();
        Ok(draft)
    }
}
