//! Screenshot capture seam.
//!
//! The renderer owns capture and encoding; the link only needs to know when a
//! frame has finished and how to get its encoded bytes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

/// Source of encoded screenshots, implemented by the rendering side.
#[async_trait]
pub trait ScreenshotProducer: Send + Sync {
    /// Resolve once the frame currently being rendered has finished.
    async fn wait_for_frame_end(&self);

    /// Capture the last finished frame and encode it (JPEG).
    async fn capture_frame(&self) -> anyhow::Result<Bytes>;
}

/// End-of-frame signal shared between the render loop and capture waiters.
#[derive(Debug, Clone)]
pub struct FrameSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl FrameSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0u64);
        Self { tx: Arc::new(tx) }
    }

    /// Called by the renderer after each frame is presented.
    pub fn frame_rendered(&self) {
        self.tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Wait for the next `frame_rendered` call after this one starts waiting.
    pub async fn wait_next_frame(&self) {
        let mut rx = self.tx.subscribe();
        rx.borrow_and_update();
        let _ = rx.changed().await;
    }
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer that returns the same pre-encoded image after each frame.
#[derive(Debug, Clone)]
pub struct StaticScreenshot {
    signal: FrameSignal,
    image: Bytes,
}

impl StaticScreenshot {
    pub fn new(signal: FrameSignal, image: impl Into<Bytes>) -> Self {
        Self {
            signal,
            image: image.into(),
        }
    }

    pub fn signal(&self) -> &FrameSignal {
        &self.signal
    }
}

#[async_trait]
impl ScreenshotProducer for StaticScreenshot {
    async fn wait_for_frame_end(&self) {
        self.signal.wait_next_frame().await;
    }

    async fn capture_frame(&self) -> anyhow::Result<Bytes> {
        if self.image.is_empty() {
            anyhow::bail!("no image available");
        }
        Ok(self.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_on_next_frame() {
        let signal = FrameSignal::new();
        signal.frame_rendered();
        assert_eq!(signal.frames(), 1);

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait_next_frame().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.frame_rendered();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter did not wake")
            .unwrap();
        assert_eq!(signal.frames(), 2);
    }

    #[tokio::test]
    async fn static_screenshot_captures_after_frame() {
        let signal = FrameSignal::new();
        let producer = StaticScreenshot::new(signal.clone(), vec![0xFF, 0xD8]);

        let pending = tokio::spawn({
            let producer = producer.clone();
            async move {
                producer.wait_for_frame_end().await;
                producer.capture_frame().await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        producer.signal().frame_rendered();

        let image = pending.await.unwrap().unwrap();
        assert_eq!(signal.frames(), 1);
        assert_eq!(&image[..], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn empty_image_is_an_error() {
        let producer = StaticScreenshot::new(FrameSignal::new(), Bytes::new());
        assert!(producer.capture_frame().await.is_err());
    }
}
