//! Detector loop: capture, count, latch, notify.

use image::RgbImage;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::color::HsvRange;
use crate::error::ColorwatchResult;
use crate::latch::EdgeLatch;
use crate::message::Notification;
use crate::notifier::Notifier;

/// A blocking source of RGB frames, e.g. a camera.
///
/// Implementations release their device when dropped.
pub trait FrameSource {
    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> ColorwatchResult<Option<RgbImage>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> ColorwatchResult<Option<RgbImage>> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Result of feeding one presence reading to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// No transition.
    Steady,
    /// Transition accepted by the notifier; latch flipped.
    Delivered(Notification),
    /// Notifier refused the transition; latch unchanged.
    Failed(Notification),
}

/// Counters reported when the loop exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub delivered: u64,
    pub failed: u64,
    pub detected: bool,
}

/// Owns the frame source, the latch and the notifier for one run.
pub struct Detector<S, N> {
    source: S,
    notifier: N,
    range: HsvRange,
    threshold: u32,
    latch: EdgeLatch,
    max_frames: Option<u64>,
}

impl<S: FrameSource, N: Notifier> Detector<S, N> {
    /// `threshold` is exclusive: a frame needs more matching pixels than this.
    pub fn new(source: S, notifier: N, range: HsvRange, threshold: u32) -> Self {
        Self {
            source,
            notifier,
            range,
            threshold,
            latch: EdgeLatch::new(),
            max_frames: None,
        }
    }

    /// Stop after `limit` frames.
    pub fn with_max_frames(mut self, limit: Option<u64>) -> Self {
        self.max_frames = limit;
        self
    }

    pub fn is_detected(&self) -> bool {
        self.latch.was_detected()
    }

    /// Feed one presence reading through the latch, notifying on edges.
    pub fn step(&mut self, present: bool) -> Step {
        let Some(transition) = self.latch.pending(present) else {
            return Step::Steady;
        };

        match self.notifier.notify(transition) {
            Ok(()) => {
                self.latch.commit(transition);
                info!(message = transition.text(), "Presence changed, relay notified");
                Step::Delivered(transition)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    message = transition.text(),
                    "Error sending notification, will retry on next frame"
                );
                Step::Failed(transition)
            }
        }
    }

    /// Count matching pixels in `frame` and step the latch. Returns the sample.
    pub fn process_frame(&mut self, frame: &RgbImage) -> (u32, Step) {
        let sample = self.range.count_matching(frame);
        let step = self.step(sample > self.threshold);
        (sample, step)
    }

    /// Run until the source ends, the frame limit is hit, or `shutdown`
    /// turns true. The source is dropped on every exit path.
    pub fn run(mut self, shutdown: &watch::Receiver<bool>) -> ColorwatchResult<RunSummary> {
        info!(
            source = %self.source.describe(),
            threshold = self.threshold,
            range = ?self.range,
            "Detector started"
        );

        let mut summary = RunSummary::default();
        loop {
            if *shutdown.borrow() {
                info!("Quit requested, stopping detector");
                break;
            }
            if self.max_frames.is_some_and(|limit| summary.frames >= limit) {
                info!(frames = summary.frames, "Frame limit reached");
                break;
            }

            let Some(frame) = self.source.next_frame()? else {
                info!("Frame source exhausted");
                break;
            };
            summary.frames += 1;

            let (sample, step) = self.process_frame(&frame);
            debug!(frame = summary.frames, sample, "Frame processed");
            match step {
                Step::Steady => {}
                Step::Delivered(_) => summary.delivered += 1,
                Step::Failed(_) => summary.failed += 1,
            }
        }

        summary.detected = self.is_detected();
        Ok(summary)
    }
}
