use crate::models::error::CaptureError;
use crate::models::media::Frame;

/// A screen-capture device polled by the controller's frame producer.
///
/// The controller moves the source onto its `replay-frames` thread, calls
/// `read_next` once per tick and moves it back on `stop`. `read_next` may block
/// on the device; pacing is done by the caller.
pub trait FrameSource: Send + 'static {
    /// Open the device. A failure here is fatal for the controller.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Release the device. Called exactly once per successful `start`.
    fn stop(&mut self);

    /// Grab one frame. `Ok(None)` means nothing new was available this tick;
    /// an error is a dropped frame and the producer simply moves on.
    fn read_next(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Human-readable device description for logs.
    fn describe(&self) -> String;
}
