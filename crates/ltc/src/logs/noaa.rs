//! Doppler WebSocket consumer.
//!
//! Log messages stream from `<loggregator>/apps/<guid>/stream`; recent
//! container metrics are read from `<loggregator>/apps/<guid>/containermetrics`
//! until the server closes the socket. Frames are protobuf [`Envelope`]s.

use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::events::{ContainerMetric, Envelope, LogMessage};
use super::reader::LogConsumer;
use crate::app_examiner::MetricsSource;
use crate::error::{LtcError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long reading container metrics may take.
const METRICS_TIMEOUT: Duration = Duration::from_secs(5);

/// Reconnection policy of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Consecutive failed connection attempts tolerated.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl ReconnectConfig {
    /// Whether failed attempt number `attempt` (1-based) may be retried.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

enum Disconnect {
    Stopped,
    Closed(String),
}

/// Consumer of a doppler endpoint.
#[derive(Debug, Clone)]
pub struct NoaaConsumer {
    loggregator_url: String,
    reconnect: ReconnectConfig,
}

impl NoaaConsumer {
    /// Creates a consumer of `loggregator_url`, e.g. `ws://doppler.example.com`.
    pub fn new(loggregator_url: impl Into<String>) -> Self {
        Self {
            loggregator_url: loggregator_url.into().trim_end_matches('/').to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Overrides the reconnection policy.
    #[must_use]
    pub const fn with_reconnect_config(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    fn stream_url(&self, app_guid: &str) -> String {
        format!("{}/apps/{app_guid}/stream", self.loggregator_url)
    }

    fn metrics_url(&self, app_guid: &str) -> String {
        format!("{}/apps/{app_guid}/containermetrics", self.loggregator_url)
    }

    async fn pump(
        mut socket: Socket,
        messages: &mpsc::Sender<LogMessage>,
        errors: &mpsc::Sender<LtcError>,
        stop: &CancellationToken,
    ) -> Disconnect {
        loop {
            let frame = tokio::select! {
                () = stop.cancelled() => {
                    let _ = socket.close(None).await;
                    return Disconnect::Stopped;
                }
                frame = socket.next() => frame,
            };

            match frame {
                Some(Ok(Message::Binary(bytes))) => match Envelope::from_frame(&bytes) {
                    Ok(envelope) => {
                        if let Some(message) = envelope.into_log_message() {
                            trace!(source = %message.source_type, "log message");
                            if messages.send(message).await.is_err() {
                                return Disconnect::Stopped;
                            }
                        }
                    }
                    Err(e) => {
                        let err = LtcError::LogStream(format!("failed to decode log envelope: {e}"));
                        if errors.send(err).await.is_err() {
                            return Disconnect::Stopped;
                        }
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    return Disconnect::Closed(
                        frame.map_or_else(|| "closed by server".to_string(), |f| f.reason.to_string()),
                    );
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Disconnect::Closed(e.to_string()),
                None => return Disconnect::Closed("stream ended".to_string()),
            }
        }
    }
}

impl LogConsumer for NoaaConsumer {
    async fn tail_logs(
        &self,
        app_guid: &str,
        messages: mpsc::Sender<LogMessage>,
        errors: mpsc::Sender<LtcError>,
        stop: CancellationToken,
    ) {
        let url = self.stream_url(app_guid);
        let mut attempt = 0u32;

        while !stop.is_cancelled() {
            debug!(%url, attempt, "connecting to log stream");
            let connected = tokio::select! {
                () = stop.cancelled() => return,
                connected = connect_async(url.as_str()) => connected,
            };

            match connected {
                Ok((socket, _response)) => {
                    attempt = 0;
                    match Self::pump(socket, &messages, &errors, &stop).await {
                        Disconnect::Stopped => return,
                        Disconnect::Closed(reason) => {
                            debug!(%url, %reason, "log stream disconnected");
                        }
                    }
                }
                Err(e) => {
                    attempt += 1;
                    if !self.reconnect.should_retry(attempt) {
                        let err = LtcError::LogStream(format!(
                            "Error dialing loggregator server: {e}. Giving up after {} retries",
                            self.reconnect.max_retries
                        ));
                        let _ = errors.send(err).await;
                        return;
                    }
                    warn!(%url, attempt, error = %e, "log stream connection failed, retrying");
                }
            }

            tokio::select! {
                () = stop.cancelled() => return,
                () = sleep(self.reconnect.retry_delay) => {}
            }
        }
    }
}

impl MetricsSource for NoaaConsumer {
    async fn container_metrics(&self, app_guid: &str) -> Result<Vec<ContainerMetric>> {
        let url = self.metrics_url(app_guid);
        let read = async {
            let (mut socket, _response) = connect_async(url.as_str())
                .await
                .map_err(|e| LtcError::LogStream(e.to_string()))?;

            let mut metrics = Vec::new();
            while let Some(frame) = socket.next().await {
                match frame.map_err(|e| LtcError::LogStream(e.to_string()))? {
                    Message::Binary(bytes) => {
                        let envelope = Envelope::from_frame(&bytes).map_err(|e| {
                            LtcError::LogStream(format!("failed to decode metrics envelope: {e}"))
                        })?;
                        metrics.extend(envelope.into_container_metric());
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Ok(metrics)
        };

        timeout(METRICS_TIMEOUT, read)
            .await
            .map_err(|_| LtcError::LogStream(format!("timed out reading {url}")))?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::SinkExt;
    use prost::Message as _;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;
    use crate::logs::events::{EventType, MessageType};
    use crate::logs::reader::LogReader;

    fn log_frame(text: &str) -> Message {
        let envelope = Envelope {
            origin: "test".into(),
            event_type: EventType::LogMessage as i32,
            timestamp: 0,
            log_message: Some(LogMessage {
                message: text.as_bytes().to_vec(),
                message_type: MessageType::Out as i32,
                timestamp: 0,
                app_id: "app".into(),
                source_type: "APP".into(),
                source_instance: "0".into(),
            }),
            container_metric: None,
        };
        Message::Binary(envelope.encode_to_vec())
    }

    fn metric_frame(index: i32) -> Message {
        let envelope = Envelope {
            origin: "rep".into(),
            event_type: EventType::ContainerMetric as i32,
            timestamp: 0,
            log_message: None,
            container_metric: Some(ContainerMetric {
                application_id: "app".into(),
                instance_index: index,
                cpu_percentage: 1.5,
                memory_bytes: 100,
                disk_bytes: 200,
            }),
        };
        Message::Binary(envelope.encode_to_vec())
    }

    /// Serves one connection per entry of `sessions`, sending its frames
    /// and then closing.
    async fn serve(sessions: Vec<Vec<Message>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            for frames in sessions {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let mut socket = accept_async(stream).await.expect("handshake");
                for frame in frames {
                    socket.send(frame).await.expect("send");
                }
                let _ = socket.close(None).await;
            }
        });
        format!("ws://{addr}")
    }

    fn fast_retries(max_retries: u32) -> ReconnectConfig {
        ReconnectConfig {
            max_retries,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn urls_are_derived_from_loggregator() {
        let consumer = NoaaConsumer::new("ws://doppler.example.com/");
        assert_eq!(consumer.stream_url("app"), "ws://doppler.example.com/apps/app/stream");
        assert_eq!(
            consumer.metrics_url("app"),
            "ws://doppler.example.com/apps/app/containermetrics"
        );
    }

    #[test]
    fn retry_budget() {
        let config = ReconnectConfig::default();
        assert!(config.should_retry(5));
        assert!(!config.should_retry(6));
    }

    #[tokio::test]
    async fn streams_log_messages_across_reconnects() {
        let url = serve(vec![
            vec![log_frame("first"), log_frame("second")],
            vec![log_frame("third")],
        ])
        .await;
        let consumer = Arc::new(NoaaConsumer::new(url).with_reconnect_config(fast_retries(2)));
        let reader = LogReader::new(consumer);

        let mut seen = Vec::new();
        let mut errors = Vec::new();
        timeout(
            Duration::from_secs(10),
            reader.tail_logs("app", |m| seen.push(m.text().into_owned()), |e| errors.push(e.to_string())),
        )
        .await
        .expect("tail ends after retries are exhausted");

        assert_eq!(seen, vec!["first", "second", "third"]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Giving up after 2 retries"), "{errors:?}");
    }

    #[tokio::test]
    async fn unreachable_stream_reports_one_error() {
        let consumer = Arc::new(
            NoaaConsumer::new("ws://127.0.0.1:1").with_reconnect_config(fast_retries(1)),
        );
        let reader = LogReader::new(consumer);
        let mut errors = Vec::new();
        reader.tail_logs("app", |_| {}, |e| errors.push(e.to_string())).await;
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn reads_container_metrics_until_close() {
        let url = serve(vec![vec![metric_frame(0), log_frame("ignored"), metric_frame(1)]]).await;
        let metrics = NoaaConsumer::new(url)
            .container_metrics("app")
            .await
            .expect("metrics");
        assert_eq!(
            metrics.iter().map(|m| m.instance_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[tokio::test]
    async fn unreachable_metrics_fail() {
        assert!(NoaaConsumer::new("ws://127.0.0.1:1").container_metrics("app").await.is_err());
    }
}
