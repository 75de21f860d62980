pub mod config;
pub mod feed;
pub mod input;
pub mod message;
pub mod sync;
pub mod transcript;
pub mod view;

mod fut;

mod repaint;
pub use repaint::{ErasedRepaint, Repaint};

pub use config::Config;
pub use view::ChatView;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub(crate) fn default_http_client() -> reqwest::Client {
    use reqwest::header::{HeaderValue, USER_AGENT as USER_AGENT_HEADER};
    reqwest::ClientBuilder::new()
        .default_headers(
            std::iter::once((USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT))).collect(),
        )
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to the default http client");
            reqwest::Client::new()
        })
}
