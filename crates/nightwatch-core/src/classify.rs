use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::NightwatchConfig;
use crate::frame::{Frame, FrameType};
use crate::metadata;
use crate::retry::RetryPolicy;

/// Image type from the frame's sidecar.
///
/// Never fails: a missing or unreadable sidecar, or one without an image
/// type, classifies as `Unknown`.
pub fn classify_frame(config: &NightwatchConfig, frame: &Frame) -> FrameType {
    match metadata::read_sidecar(config, frame) {
        Ok(meta) => meta
            .image_type
            .as_deref()
            .map(FrameType::from_tag)
            .unwrap_or(FrameType::Unknown),
        Err(e) => {
            debug!(frame = %frame.basename, "Cannot classify yet: {e}");
            FrameType::Unknown
        }
    }
}

/// Classify, waiting out a sidecar that has not been written yet.
///
/// Retries only while the answer is `Unknown`; once the schedule is spent,
/// `Unknown` is final.
pub fn classify_with_retry(
    config: &NightwatchConfig,
    frame: &Frame,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> FrameType {
    let found = policy.run(clock, |_| match classify_frame(config, frame) {
        FrameType::Unknown => None,
        known => Some(known),
    });
    match found {
        Some(frame_type) => frame_type,
        None => {
            info!(
                frame = %frame.basename,
                attempts = policy.attempts(),
                "No image type after retries; treating as Unknown"
            );
            FrameType::Unknown
        }
    }
}
