//! Byte-counter progress for a single submission
//!
//! Upload maps onto 0-50 and download onto 50-100. Values only ever increase.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Shared progress sink fed from the upload body stream and the response stream
#[derive(Debug)]
pub struct TransferProgress {
    last: AtomicU8,
    sender: Option<UnboundedSender<u8>>,
}

impl TransferProgress {
    /// A sink that forwards every increase to `sender`
    #[must_use]
    pub fn new(sender: UnboundedSender<u8>) -> Self {
        Self {
            last: AtomicU8::new(0),
            sender: Some(sender),
        }
    }

    /// A sink that only tracks the value
    #[must_use]
    pub fn detached() -> Self {
        Self {
            last: AtomicU8::new(0),
            sender: None,
        }
    }

    /// Current percentage
    #[must_use]
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }

    /// Record `sent` of `total` upload bytes
    pub fn upload(&self, sent: u64, total: u64) {
        self.advance(scaled(sent, total, 0));
    }

    /// Record `received` response bytes; `total` is the `Content-Length` when known
    pub fn download(&self, received: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => self.advance(scaled(received, total, 50)),
            _ => self.advance(50),
        }
    }

    /// Mark the transfer complete
    pub fn finish(&self) {
        self.advance(100);
    }

    fn advance(&self, value: u8) {
        let value = value.min(100);
        let previous = self.last.fetch_max(value, Ordering::AcqRel);
        if value > previous {
            if let Some(sender) = &self.sender {
                // Receiver gone means nobody is listening any more
                let _ = sender.send(value);
            }
        }
    }
}

/// `done / total` scaled into a 50-point band starting at `base`
fn scaled(done: u64, total: u64, base: u8) -> u8 {
    if total == 0 {
        return base + 50;
    }
    let fraction = (done.min(total) as f64 / total as f64) * 50.0;
    base + fraction.floor() as u8
}
