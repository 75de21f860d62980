use std::time::Duration;

/// What to do after a bulk fetch fails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Retry {
    /// Keep loading until the user asks for a reload.
    #[default]
    Manual,
    /// Refetch after `initial`, doubling up to `max`. `attempts` caps the
    /// number of automatic refetches.
    Backoff {
        initial: Duration,
        max: Duration,
        attempts: Option<u32>,
    },
}

impl Retry {
    pub const fn backoff(initial: Duration, max: Duration) -> Self {
        Self::Backoff {
            initial,
            max,
            attempts: None,
        }
    }

    /// Delay before refetching after `failures` failed fetches, or `None`
    /// when no automatic refetch should happen.
    pub fn delay(&self, failures: u32) -> Option<Duration> {
        let Self::Backoff {
            initial,
            max,
            attempts,
        } = *self
        else {
            return None;
        };

        if failures == 0 || attempts.is_some_and(|attempts| failures > attempts) {
            return None;
        }

        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        Some(initial.saturating_mul(factor).min(max))
    }
}
