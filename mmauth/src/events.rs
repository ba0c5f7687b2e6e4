//! Platform "app opened via URL" events, delivered to whichever listener is
//! currently armed.

use tokio::sync::broadcast;

/// Source of URL-open events delivered by the platform.
pub trait UrlEventSource: Send + Sync {
    /// Register a listener. The subscription only sees events published after
    /// this call; dropping it deregisters the listener.
    fn subscribe(&self) -> UrlEventStream;
}

/// One listener registration.
pub struct UrlEventStream {
    rx: broadcast::Receiver<String>,
}

impl UrlEventStream {
    /// Next URL-open event, or `None` once the source is gone.
    pub async fn next(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(url) => return Some(url),
                // Slow consumer: skip what was missed, keep listening.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process event bus. The embedding host publishes every URL the OS hands
/// to the application; subscribers that match the redirect prefix act on it.
#[derive(Clone)]
pub struct UrlEventBus {
    tx: broadcast::Sender<String>,
}

impl UrlEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Publish a URL-open event to every live subscriber. Publishing with no
    /// subscribers drops the event, same as the platform would.
    pub fn publish(&self, url: impl Into<String>) {
        let _ = self.tx.send(url.into());
    }
}

impl Default for UrlEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlEventSource for UrlEventBus {
    fn subscribe(&self) -> UrlEventStream {
        UrlEventStream {
            rx: self.tx.subscribe(),
        }
    }
}
