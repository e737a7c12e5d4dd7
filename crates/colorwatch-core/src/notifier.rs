//! Relay notifiers.
//!
//! The detector loop hands each transition to a [`Notifier`]. `Ok` means the
//! notification was accepted and the latch may flip; `Err` leaves the latch
//! alone so the transition is attempted again on the next frame.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{ColorwatchError, ColorwatchResult};
use crate::message::Notification;

/// Default relay endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/upload";

/// Default capacity of the queued notifier.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Accepts presence transitions from the detector loop.
pub trait Notifier {
    fn notify(&self, transition: Notification) -> ColorwatchResult<()>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, transition: Notification) -> ColorwatchResult<()> {
        (**self).notify(transition)
    }
}

/// Posts notifications to the relay's `/upload` endpoint.
#[derive(Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    /// Create a notifier for `endpoint`. No timeout is applied unless given.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> ColorwatchResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        debug!(endpoint = %endpoint, ?timeout, "HttpNotifier initialized");
        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one notification.
    ///
    /// Any HTTP response counts as delivered; a non-success status is only
    /// logged. Transport failures are returned.
    pub async fn send(&self, transition: Notification) -> ColorwatchResult<StatusCode> {
        let payload = transition.payload();
        debug!(url = %self.endpoint, message = %payload.message, "Sending notification");

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(message = %payload.message, "Notification delivered");
        } else {
            warn!(
                message = %payload.message,
                status_code = %status,
                "Relay answered notification with non-success status"
            );
        }
        Ok(status)
    }
}

/// Sends each notification synchronously, blocking the detector loop until
/// the request completes, fails, or shutdown is signalled.
pub struct InlineNotifier {
    http: HttpNotifier,
    runtime: tokio::runtime::Handle,
    shutdown: watch::Receiver<bool>,
}

impl InlineNotifier {
    /// `runtime` drives the requests; the loop must run off the async
    /// workers, e.g. inside `spawn_blocking`. A request still in flight when
    /// `shutdown` turns true is abandoned with [`ColorwatchError::Cancelled`].
    pub fn new(
        http: HttpNotifier,
        runtime: tokio::runtime::Handle,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            http,
            runtime,
            shutdown,
        }
    }
}

impl Notifier for InlineNotifier {
    fn notify(&self, transition: Notification) -> ColorwatchResult<()> {
        let shutdown = self.shutdown.clone();
        self.runtime.block_on(async {
            tokio::select! {
                sent = self.http.send(transition) => sent.map(|_| ()),
                _ = quit_requested(shutdown) => {
                    warn!(message = transition.text(), "Quit requested, abandoning notification");
                    Err(ColorwatchError::Cancelled)
                }
            }
        })
    }
}

/// Resolves once `shutdown` is true. Pends forever if the sender is gone.
async fn quit_requested(mut shutdown: watch::Receiver<bool>) {
    let sender_gone = shutdown.wait_for(|quit| *quit).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

/// Hands notifications to a bounded queue drained by a separate task, so
/// network latency does not stall frame capture.
///
/// Enqueueing counts as acceptance. A send that later fails in the drain
/// task is logged and dropped.
pub struct QueuedNotifier {
    tx: mpsc::Sender<Notification>,
}

/// Receiving half of a [`QueuedNotifier`].
pub struct NotificationQueue {
    rx: mpsc::Receiver<Notification>,
}

impl QueuedNotifier {
    pub fn new(capacity: usize) -> (Self, NotificationQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, NotificationQueue { rx })
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, transition: Notification) -> ColorwatchResult<()> {
        self.tx.try_send(transition).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ColorwatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ColorwatchError::QueueClosed,
        })
    }
}

impl NotificationQueue {
    /// Drain the queue until every sender is gone or shutdown is signalled.
    ///
    /// Notifications still queued at shutdown are discarded.
    pub async fn run(mut self, http: HttpNotifier, mut shutdown: watch::Receiver<bool>) {
        info!(endpoint = %http.endpoint(), "Notification sender started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = self.rx.recv() => match next {
                    Some(transition) => tokio::select! {
                        sent = http.send(transition) => {
                            if let Err(e) = sent {
                                warn!(
                                    error = %e,
                                    message = transition.text(),
                                    "Queued notification could not be delivered"
                                );
                            }
                        }
                        _ = quit_requested(shutdown.clone()) => {
                            warn!(message = transition.text(), "Quit requested, abandoning notification");
                            break;
                        }
                    },
                    None => break,
                },
            }
        }
        let dropped = self.rx.len();
        if dropped > 0 {
            warn!(dropped, "Discarding undelivered notifications on shutdown");
        }
        info!("Notification sender stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let http = HttpNotifier::new("http://127.0.0.1:1/upload", Some(Duration::from_secs(2))).unwrap();
        assert!(http.send(Notification::Detected).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_inline_notifier_reports_failure() {
        let http = HttpNotifier::new("http://127.0.0.1:1/upload", Some(Duration::from_secs(2))).unwrap();
        let (_quit_tx, quit_rx) = watch::channel(false);
        let notifier = InlineNotifier::new(http, tokio::runtime::Handle::current(), quit_rx);
        let result = tokio::task::spawn_blocking(move || notifier.notify(Notification::NotDetected))
            .await
            .unwrap();
        assert!(matches!(result, Err(ColorwatchError::Notify(_))));
    }

    /// Accepts connections and never answers them.
    async fn silent_relay() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}/upload", addr)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_inline_notifier_abandons_hung_request_on_quit() {
        let http = HttpNotifier::new(&silent_relay().await, None).unwrap();
        let (quit_tx, quit_rx) = watch::channel(false);
        let notifier = InlineNotifier::new(http, tokio::runtime::Handle::current(), quit_rx);
        let pending = tokio::task::spawn_blocking(move || notifier.notify(Notification::Detected));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!pending.is_finished());
        quit_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(3), pending)
            .await
            .expect("notify still blocked after quit")
            .unwrap();
        assert!(matches!(result, Err(ColorwatchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_queue_abandons_hung_request_on_quit() {
        let (notifier, queue) = QueuedNotifier::new(4);
        let (quit_tx, quit_rx) = watch::channel(false);
        let http = HttpNotifier::new(&silent_relay().await, None).unwrap();
        let task = tokio::spawn(queue.run(http, quit_rx));
        notifier.notify(Notification::Detected).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        quit_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("sender still blocked after quit")
            .unwrap();
    }

    #[test]
    fn test_queue_full_and_closed() {
        let (notifier, queue) = QueuedNotifier::new(1);
        assert!(notifier.notify(Notification::Detected).is_ok());
        assert!(matches!(
            notifier.notify(Notification::NotDetected),
            Err(ColorwatchError::QueueFull)
        ));
        drop(queue);
        assert!(matches!(
            notifier.notify(Notification::Detected),
            Err(ColorwatchError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_queue_stops_on_shutdown() {
        let (_notifier, queue) = QueuedNotifier::new(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let http = HttpNotifier::new("http://127.0.0.1:1/upload", None).unwrap();
        let task = tokio::spawn(queue.run(http, shutdown_rx));
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sender did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_queue_stops_when_senders_dropped() {
        let (notifier, queue) = QueuedNotifier::new(4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let http = HttpNotifier::new("http://127.0.0.1:1/upload", Some(Duration::from_secs(1))).unwrap();
        let task = tokio::spawn(queue.run(http, shutdown_rx));
        drop(notifier);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("sender did not stop")
            .unwrap();
    }
}
