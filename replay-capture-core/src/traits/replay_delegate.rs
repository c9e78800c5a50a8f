use crate::models::clip_result::ClipResult;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Event listener for controller and save notifications.
///
/// May be called from producer or save threads as well as the caller's.
/// Implementations must return quickly.
pub trait ReplayDelegate: Send + Sync {
    fn on_state_changed(&self, state: CaptureState);

    /// A trigger was accepted and the look-forward capture is running.
    fn on_save_started(&self) {}

    fn on_clip_saved(&self, result: &ClipResult);

    fn on_save_failed(&self, error: &CaptureError);
}
