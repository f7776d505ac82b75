use tokio::sync::broadcast;
use tracing::trace;

use crate::messages::DetectorMessage;
use crate::models::VideoRecord;

const CHANNEL_CAPACITY: usize = 64;

/// Fire-and-forget fan-out of `VIDEO_DETECTED` messages.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<DetectorMessage>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DetectorMessage> {
        self.tx.subscribe()
    }

    /// Announce a new current record. Returns how many listeners got it;
    /// having none is not an error.
    pub fn notify(&self, record: Option<VideoRecord>) -> usize {
        let delivered = self.tx.send(DetectorMessage::detected(record)).unwrap_or(0);
        trace!(delivered, "Sent VIDEO_DETECTED");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_listeners_is_fine() {
        assert_eq!(Notifier::new().notify(None), 0);
    }

    #[tokio::test]
    async fn test_listeners_receive() {
        let notifier = Notifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_eq!(notifier.notify(None), 2);
        assert_eq!(a.recv().await.unwrap(), DetectorMessage::detected(None));
        assert_eq!(b.recv().await.unwrap(), DetectorMessage::detected(None));
    }
}
