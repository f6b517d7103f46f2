//! Log tailing on top of a [`LogConsumer`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::events::LogMessage;
use crate::error::LtcError;

/// Capacity of the message and error buffers between producer and reader.
pub const LOG_BUFFER: usize = 10;

/// Producer of log messages for one app.
pub trait LogConsumer: Send + Sync + 'static {
    /// Streams messages of `app_guid` into `messages` and stream errors
    /// into `errors` until `stop` is cancelled or the stream gives up.
    ///
    /// Sends block while the buffers are full.
    fn tail_logs(
        &self,
        app_guid: &str,
        messages: mpsc::Sender<LogMessage>,
        errors: mpsc::Sender<LtcError>,
        stop: CancellationToken,
    ) -> impl Future<Output = ()> + Send;
}

/// Delivers streamed log messages and errors to callbacks.
#[derive(Debug)]
pub struct LogReader<C> {
    consumer: Arc<C>,
    stop: CancellationToken,
}

impl<C: LogConsumer> LogReader<C> {
    /// Creates a reader over `consumer`.
    pub fn new(consumer: Arc<C>) -> Self {
        Self {
            consumer,
            stop: CancellationToken::new(),
        }
    }

    /// Tails `app_guid` until [`LogReader::stop_tailing`] is called or the
    /// stream ends.
    ///
    /// Messages reach `on_message` in stream order; errors are reported
    /// to `on_error` without ending the tail.
    pub async fn tail_logs(
        &self,
        app_guid: &str,
        mut on_message: impl FnMut(LogMessage),
        mut on_error: impl FnMut(LtcError),
    ) {
        let (message_tx, mut message_rx) = mpsc::channel(LOG_BUFFER);
        let (error_tx, mut error_rx) = mpsc::channel(LOG_BUFFER);

        let consumer = Arc::clone(&self.consumer);
        let guid = app_guid.to_string();
        let stop = self.stop.clone();
        let producer = tokio::spawn(async move {
            consumer.tail_logs(&guid, message_tx, error_tx, stop).await;
        });

        loop {
            tokio::select! {
                biased;
                () = self.stop.cancelled() => break,
                Some(err) = error_rx.recv() => on_error(err),
                message = message_rx.recv() => match message {
                    Some(message) => on_message(message),
                    None => break,
                },
            }
        }

        debug!(app = app_guid, "stopped tailing");
        producer.abort();
    }

    /// Ends the current tail. Calling it again has no effect.
    pub fn stop_tailing(&self) {
        self.stop.cancel();
    }

    /// Token that stops the tail when cancelled, for exit callbacks.
    #[must_use]
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::fake::{FakeLogConsumer, log_message};
    use super::*;

    #[tokio::test]
    async fn delivers_messages_in_order_then_ends_with_stream() {
        let messages: Vec<_> = (0..25)
            .map(|i| log_message("APP", "0", &format!("line {i}"), i))
            .collect();
        let consumer = Arc::new(FakeLogConsumer::new(messages).closing());
        let reader = LogReader::new(Arc::clone(&consumer));

        let mut seen = Vec::new();
        let mut errors = Vec::new();
        reader
            .tail_logs("app", |m| seen.push(m.text().into_owned()), |e| errors.push(e.to_string()))
            .await;

        let expected: Vec<_> = (0..25).map(|i| format!("line {i}")).collect();
        assert_eq!(seen, expected);
        assert!(errors.is_empty());
        assert_eq!(consumer.tailed(), vec!["app"]);
    }

    #[tokio::test]
    async fn errors_do_not_end_the_tail() {
        let consumer = Arc::new(
            FakeLogConsumer::new(vec![log_message("APP", "0", "after error", 0)])
                .with_errors(&["blip"])
                .closing(),
        );
        let reader = LogReader::new(consumer);

        let mut seen = Vec::new();
        let mut errors = Vec::new();
        reader
            .tail_logs("app", |m| seen.push(m.text().into_owned()), |e| errors.push(e.to_string()))
            .await;

        assert_eq!(errors, vec!["blip"]);
        assert_eq!(seen, vec!["after error"]);
    }

    #[tokio::test]
    async fn stop_tailing_ends_an_open_stream() {
        let consumer = Arc::new(FakeLogConsumer::new(vec![log_message("APP", "0", "one", 0)]));
        let reader = Arc::new(LogReader::new(consumer));

        let stopper = Arc::clone(&reader);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let tail = tokio::spawn(async move {
            let mut count = 0;
            stopper
                .tail_logs(
                    "app",
                    |m| {
                        count += 1;
                        let _ = seen_tx.send(m.text().into_owned());
                    },
                    |_| {},
                )
                .await;
            count
        });

        assert_eq!(seen_rx.recv().await.as_deref(), Some("one"));
        reader.stop_tailing();
        reader.stop_tailing();

        let count = tokio::time::timeout(Duration::from_secs(5), tail)
            .await
            .expect("tail ends")
            .expect("join");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn stopped_reader_delivers_nothing() {
        let consumer = Arc::new(FakeLogConsumer::new(vec![log_message("APP", "0", "late", 0)]));
        let reader = LogReader::new(consumer);
        reader.stop_tailing();

        let mut seen = 0;
        reader.tail_logs("app", |_| seen += 1, |_| {}).await;
        assert_eq!(seen, 0);
    }
}
