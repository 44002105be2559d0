use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

use crate::config::BridgeConfig;
use crate::models::{CommandBatch, CommandResult, Snapshot, WireCommand};

use super::error::TransportError;
use super::sse::{SseDecoder, SseItem};

// ============================================================================
// Bridge Client - HTTP / event-stream access to the bridge service
// ============================================================================
//
// Endpoints:
// - POST /snapshot               full-state snapshot
// - GET  /commands?limit=N       pending commands, oldest first
// - POST /commands/{id}/ack      retire a command (optionally with result)
// - GET  /commands/stream        server-sent `commands` events
//
// The shared secret, when configured, travels as `X-Bridge-Secret` on
// every request and as `?secret=` on the stream endpoint.
//
// ============================================================================

pub const SECRET_HEADER: &str = "X-Bridge-Secret";

/// Result of acknowledging (or claiming) a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Accepted,
    /// Someone else already retired the command.
    AlreadyConsumed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Commands(Vec<WireCommand>),
    Heartbeat,
}

pub type CommandStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// Network surface the sync loops depend on.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    async fn push_snapshot(&self, snapshot: &Snapshot) -> Result<(), TransportError>;

    async fn fetch_commands(&self, limit: usize) -> Result<Vec<WireCommand>, TransportError>;

    /// Acknowledge a command. `None` is a bare claim with no result body.
    async fn ack(
        &self,
        id: &str,
        result: Option<&CommandResult>,
    ) -> Result<AckOutcome, TransportError>;

    async fn open_stream(&self) -> Result<CommandStream, TransportError>;
}

pub struct HttpBridgeClient {
    client: Client,
    base_url: Url,
    secret: Option<String>,
    request_timeout: Duration,
}

impl HttpBridgeClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(config.base_url())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", config.base_url(), e)))?;

        // No overall timeout on the client: the stream request lives for
        // the whole session. Plain requests set their own.
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url,
            secret: config.secret().map(str::to_string),
            request_timeout: config.request_timeout(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.secret {
            Some(ref secret) => request.header(SECRET_HEADER, secret),
            None => request,
        }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::status(status, &body))
    }
}

#[async_trait]
impl BridgeApi for HttpBridgeClient {
    async fn push_snapshot(&self, snapshot: &Snapshot) -> Result<(), TransportError> {
        let url = self.endpoint(&["snapshot"])?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(self.request_timeout)
            .json(snapshot)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_commands(&self, limit: usize) -> Result<Vec<WireCommand>, TransportError> {
        let mut url = self.endpoint(&["commands"])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());

        let response = self
            .authorize(self.client.get(url))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;
        let batch: CommandBatch = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(batch.commands)
    }

    async fn ack(
        &self,
        id: &str,
        result: Option<&CommandResult>,
    ) -> Result<AckOutcome, TransportError> {
        let url = self.endpoint(&["commands", id, "ack"])?;
        let mut request = self
            .authorize(self.client.post(url))
            .timeout(self.request_timeout);
        if let Some(result) = result {
            request = request.json(result);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(AckOutcome::AlreadyConsumed),
            _ => {
                Self::ensure_success(response).await?;
                Ok(AckOutcome::Accepted)
            }
        }
    }

    async fn open_stream(&self) -> Result<CommandStream, TransportError> {
        let mut url = self.endpoint(&["commands", "stream"])?;
        if let Some(ref secret) = self.secret {
            url.query_pairs_mut().append_pair("secret", secret);
        }

        let response = self
            .authorize(self.client.get(url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = Self::ensure_success(response).await?;

        tracing::info!("📡 Command stream connected");

        let events = response
            .bytes_stream()
            .scan(SseDecoder::new(), |decoder, chunk| {
                let items: Vec<Result<StreamEvent, TransportError>> = match chunk {
                    Ok(bytes) => decoder.feed(&bytes).into_iter().map(to_stream_event).collect(),
                    Err(e) => vec![Err(TransportError::Request(e))],
                };
                futures_util::future::ready(Some(stream::iter(items)))
            })
            .flatten()
            .boxed();

        Ok(events)
    }
}

/// Map one SSE item onto a stream event. Anything that is not a
/// well-formed `commands` event still proves the connection is alive.
fn to_stream_event(item: SseItem) -> Result<StreamEvent, TransportError> {
    match item {
        SseItem::Event { event: Some(ref name), ref data } if name == "commands" => {
            match serde_json::from_str::<CommandBatch>(data) {
                Ok(batch) => Ok(StreamEvent::Commands(batch.commands)),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed commands event");
                    Ok(StreamEvent::Heartbeat)
                }
            }
        }
        _ => Ok(StreamEvent::Heartbeat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str, secret: Option<&str>) -> HttpBridgeClient {
        let config = BridgeConfig {
            base_url: base_url.to_string(),
            secret: secret.map(str::to_string),
            ..BridgeConfig::default()
        };
        HttpBridgeClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments_and_escapes_ids() {
        let client = client("http://127.0.0.1:8787/", None);
        let url = client.endpoint(&["commands", "a/b c", "ack"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8787/commands/a%2Fb%20c/ack");
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let client = client("https://bridge.example.com/api", None);
        let url = client.endpoint(&["snapshot"]).unwrap();
        assert_eq!(url.as_str(), "https://bridge.example.com/api/snapshot");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = BridgeConfig {
            base_url: "not a url".to_string(),
            ..BridgeConfig::default()
        };
        assert!(matches!(
            HttpBridgeClient::new(&config),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_commands_event_decodes_batch() {
        let item = SseItem::Event {
            event: Some("commands".to_string()),
            data: r#"{"commands":[{"id":"c1","type":"next_turn","payload":{}}]}"#.to_string(),
        };
        match to_stream_event(item).unwrap() {
            StreamEvent::Commands(commands) => {
                assert_eq!(commands.len(), 1);
                assert_eq!(commands[0].command_id(), Some("c1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_other_events_are_heartbeats() {
        assert_eq!(to_stream_event(SseItem::Comment).unwrap(), StreamEvent::Heartbeat);
        let ping = SseItem::Event { event: Some("ping".to_string()), data: String::new() };
        assert_eq!(to_stream_event(ping).unwrap(), StreamEvent::Heartbeat);
        let broken = SseItem::Event { event: Some("commands".to_string()), data: "{".to_string() };
        assert_eq!(to_stream_event(broken).unwrap(), StreamEvent::Heartbeat);
    }
}
