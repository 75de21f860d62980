use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt as _;
use hashbrown::HashSet;
use reqwest::{header::ACCEPT, Method};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use url::Url;

use super::{Feed, FeedError, LiveRecord, RecordBody, RecordId, Snapshot, Subscription};

mod sse;
use sse::{EventBuffer, FirebaseEvent};

#[derive(Clone, Debug)]
pub struct FirebaseConfig {
    pub database_url: Url,
    pub path: String,
    pub auth: Option<String>,
}

/// A Firebase Realtime Database location, spoken to over its REST API.
#[derive(Clone, Debug)]
pub struct FirebaseFeed {
    client: reqwest::Client,
    endpoint: Url,
    auth: Option<String>,
}

enum StreamEnd {
    Disconnected,
    Cancelled,
    Unsubscribed,
}

impl FirebaseFeed {
    const RECONNECT: Duration = Duration::from_secs(5);

    pub fn create(config: FirebaseConfig) -> Result<Self, FeedError> {
        let FirebaseConfig {
            mut database_url,
            path,
            auth,
        } = config;

        if !database_url.path().ends_with('/') {
            let path = format!("{}/", database_url.path());
            database_url.set_path(&path);
        }

        let endpoint = database_url.join(&format!("{}.json", path.trim_matches('/')))?;
        Ok(Self {
            client: crate::default_http_client(),
            endpoint,
            auth,
        })
    }

    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request(&self, method: Method) -> reqwest::RequestBuilder {
        let req = self.client.request(method, self.endpoint.clone());
        match &self.auth {
            Some(auth) => req.query(&[("auth", auth)]),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, FeedError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(FeedError::Status { status, body })
    }

    async fn listen(self, send: UnboundedSender<LiveRecord>) {
        let mut seen = HashSet::new();
        loop {
            match self.stream_once(&mut seen, &send).await {
                Ok(StreamEnd::Unsubscribed) => break,
                Ok(StreamEnd::Cancelled) => {
                    tracing::warn!(endpoint = %self.endpoint, "feed ended the live stream");
                    break;
                }
                Ok(StreamEnd::Disconnected) => {
                    tracing::info!(endpoint = %self.endpoint, "live stream disconnected");
                }
                Err(err) => {
                    tracing::warn!(endpoint = %self.endpoint, %err, "live stream failed");
                }
            }

            if send.is_closed() {
                break;
            }
            tracing::debug!("reconnecting in {:?}", Self::RECONNECT);
            tokio::time::sleep(Self::RECONNECT).await;
        }
    }

    async fn stream_once(
        &self,
        seen: &mut HashSet<RecordId>,
        send: &UnboundedSender<LiveRecord>,
    ) -> Result<StreamEnd, FeedError> {
        let resp = self
            .request(Method::GET)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        tracing::debug!(endpoint = %self.endpoint, "live stream connected");

        let mut bytes = resp.bytes_stream();
        let mut buffer = EventBuffer::default();

        while let Some(chunk) = bytes.next().await {
            buffer.extend(&chunk?);

            while let Some(event) = buffer.next_event() {
                let event = match FirebaseEvent::parse(event) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(%err, "skipping unreadable live event");
                        continue;
                    }
                };

                match event {
                    FirebaseEvent::KeepAlive => continue,
                    FirebaseEvent::Cancel { reason } => {
                        tracing::warn!(%reason, "live stream cancelled");
                        return Ok(StreamEnd::Cancelled);
                    }
                    FirebaseEvent::AuthRevoked => {
                        tracing::warn!("credentials revoked");
                        return Ok(StreamEnd::Cancelled);
                    }
                    FirebaseEvent::Unknown { event } => {
                        tracing::debug!(%event, "ignoring live event");
                        continue;
                    }
                    event => {
                        for (id, value) in event.children_added(seen) {
                            let Some(body) = RecordBody::quarantine(&id, &value) else {
                                continue;
                            };
                            if send.send(LiveRecord { id, body }).is_err() {
                                return Ok(StreamEnd::Unsubscribed);
                            }
                        }
                    }
                }
            }
        }

        Ok(StreamEnd::Disconnected)
    }
}

#[async_trait]
impl Feed for FirebaseFeed {
    async fn fetch_all(&self) -> Result<Snapshot, FeedError> {
        let resp = self.request(Method::GET).send().await?;
        let data = Self::check(resp).await?.bytes().await?;
        Snapshot::from_value(serde_json::from_slice(&data)?)
    }

    fn subscribe_on_added(&self) -> Subscription {
        let (send, recv) = unbounded_channel();
        let handle = tokio::spawn(self.clone().listen(send));
        Subscription::new(recv, move || handle.abort())
    }

    async fn append(&self, body: &RecordBody) -> Result<RecordId, FeedError> {
        #[derive(serde::Deserialize)]
        struct Pushed {
            name: RecordId,
        }

        let resp = self.request(Method::POST).json(body).send().await?;
        let data = Self::check(resp).await?.bytes().await?;
        let Pushed { name } = serde_json::from_slice(&data)?;
        Ok(name)
    }
}
