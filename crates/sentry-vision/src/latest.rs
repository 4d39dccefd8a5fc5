//! Latest-frame hand-off between a capture thread and the control loop.
//!
//! The slot holds at most one frame. Publishing never blocks and replaces
//! any frame the consumer has not taken yet, so the loop always works on the
//! freshest image and a slow tick simply drops stale frames.

use crate::error::{VisionError, VisionResult};
use crate::source::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

struct SlotState<T> {
    frame: Option<T>,
    dropped: u64,
    closed: bool,
}

/// Single-slot, last-write-wins buffer.
pub struct LatestFrameSlot<T> {
    inner: Arc<(Mutex<SlotState<T>>, Condvar)>,
}

impl<T> Clone for LatestFrameSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> LatestFrameSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(SlotState {
                    frame: None,
                    dropped: 0,
                    closed: false,
                }),
                Condvar::new(),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.inner.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a frame, replacing any unconsumed one.
    ///
    /// Returns true if a previous frame was overwritten.
    pub fn publish(&self, frame: T) -> bool {
        let mut state = self.lock();
        let replaced = state.frame.replace(frame).is_some();
        if replaced {
            state.dropped += 1;
        }
        drop(state);
        self.inner.1.notify_one();
        replaced
    }

    /// Take the current frame, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout or once the slot is closed and empty.
    pub fn take(&self, timeout: Duration) -> Option<T> {
        let state = self.lock();
        let (mut state, _) = self
            .inner
            .1
            .wait_timeout_while(state, timeout, |s| s.frame.is_none() && !s.closed)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.frame.take()
    }

    /// Mark the producer as finished and wake any waiting consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.inner.1.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of frames overwritten before they were consumed.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

impl<T> Default for LatestFrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a [`FrameSource`] on a background thread, publishing into a
/// [`LatestFrameSlot`]. The grabber is itself a frame source that yields the
/// freshest frame.
pub struct FrameGrabber<F> {
    slot: LatestFrameSlot<VisionResult<F>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    dimensions: (u32, u32),
    wait_timeout: Duration,
}

impl<F: Send + 'static> FrameGrabber<F> {
    /// Start capturing from `source` on a new thread.
    pub fn spawn<S>(mut source: S, wait_timeout: Duration) -> VisionResult<Self>
    where
        S: FrameSource<Frame = F> + Send + 'static,
    {
        let slot: LatestFrameSlot<VisionResult<F>> = LatestFrameSlot::new();
        let stop = Arc::new(AtomicBool::new(false));
        let dimensions = source.dimensions();

        let producer_slot = slot.clone();
        let producer_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("frame-grabber".to_string())
            .spawn(move || {
                while !producer_stop.load(Ordering::Acquire) {
                    match source.next_frame() {
                        Ok(frame) => {
                            producer_slot.publish(Ok(frame));
                        }
                        Err(e) => {
                            warn!("Frame grabber stopping: {}", e);
                            producer_slot.publish(Err(e));
                            break;
                        }
                    }
                }
                source.release();
                producer_slot.close();
                debug!("Frame grabber thread exited");
            })?;

        Ok(Self {
            slot,
            stop,
            handle: Some(handle),
            dimensions,
            wait_timeout,
        })
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Frame grabber thread panicked");
            }
            info!(dropped = self.slot.dropped(), "Frame grabber stopped");
        }
    }
}

impl<F: Send + 'static> FrameSource for FrameGrabber<F> {
    type Frame = F;

    fn next_frame(&mut self) -> VisionResult<F> {
        match self.slot.take(self.wait_timeout) {
            Some(result) => result,
            None if self.slot.is_closed() => Err(VisionError::NoFrame),
            None => Err(VisionError::acquisition(format!(
                "no frame within {} ms",
                self.wait_timeout.as_millis()
            ))),
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn release(&mut self) {
        self.shutdown();
    }
}

impl<F> Drop for FrameGrabber<F> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
