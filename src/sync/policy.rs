use std::str::FromStr;

/// What happens to live records that arrive while the bulk fetch is in flight.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingPolicy {
    /// Discard them, trusting the snapshot to contain them.
    ///
    /// A record the feed accepted after the snapshot was read, but that
    /// arrived before the snapshot did, is lost until the view is reopened.
    #[default]
    Drop,
    /// Keep them in arrival order and merge them right after the snapshot.
    Buffer,
}

impl FromStr for LoadingPolicy {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match &*input.trim().to_ascii_lowercase() {
            "drop" => Ok(Self::Drop),
            "buffer" => Ok(Self::Buffer),
            _ => Err(format!("expected `drop` or `buffer`, got `{input}`")),
        }
    }
}
