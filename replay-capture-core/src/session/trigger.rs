use std::sync::Arc;
use std::thread;

use crate::models::clip_result::ClipResult;
use crate::models::error::CaptureError;
use crate::session::controller::ControllerShared;
use crate::session::save_session::SaveSession;
use crate::traits::muxer::Muxer;

/// What `on_trigger` did with a save signal.
#[must_use]
pub enum TriggerOutcome {
    /// A save session is running on its own thread.
    Started(SaveHandle),
    /// A save was already running; the trigger was ignored.
    AlreadySaving,
    /// The controller is not capturing; the trigger was ignored.
    NotCapturing,
    /// The save thread could not be spawned.
    DispatchFailed(CaptureError),
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    /// The save handle, or the reason no save was started.
    pub fn into_handle(self) -> Result<SaveHandle, CaptureError> {
        match self {
            Self::Started(handle) => Ok(handle),
            Self::AlreadySaving => Err(CaptureError::ConcurrentSaveRejected),
            Self::NotCapturing => Err(CaptureError::InvalidState("controller is not capturing".into())),
            Self::DispatchFailed(e) => Err(e),
        }
    }
}

/// Join handle of a dispatched save. Dropping it detaches the save.
pub struct SaveHandle {
    handle: thread::JoinHandle<Result<ClipResult, CaptureError>>,
}

impl SaveHandle {
    /// Wait for the save to finish and return its outcome.
    pub fn join(self) -> Result<ClipResult, CaptureError> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(CaptureError::EncodingFailed("save thread panicked".into())))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Entry point for save signals coming from the recognition frontend.
///
/// `on_trigger` returns immediately; the look-forward wait and the encode run
/// on a `replay-save` thread. At most one save runs at a time.
#[derive(Clone)]
pub struct TriggerCoordinator {
    shared: Arc<ControllerShared>,
    muxer: Arc<dyn Muxer>,
}

impl TriggerCoordinator {
    pub(crate) fn new(shared: Arc<ControllerShared>, muxer: Arc<dyn Muxer>) -> Self {
        Self { shared, muxer }
    }

    pub fn on_trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.shared.save_gate.try_acquire() else {
            log::debug!("Already in the process of saving a clip; trigger ignored");
            return TriggerOutcome::AlreadySaving;
        };
        if !self.shared.state.load().is_capturing() {
            log::debug!("Trigger ignored: controller is {:?}", self.shared.state.load());
            return TriggerOutcome::NotCapturing;
        }

        let session = SaveSession::new(Arc::clone(&self.shared), Arc::clone(&self.muxer));
        let spawned = thread::Builder::new().name("replay-save".into()).spawn(move || {
            let _guard = guard;
            session.run()
        });

        match spawned {
            Ok(handle) => TriggerOutcome::Started(SaveHandle { handle }),
            Err(e) => {
                log::error!("Failed to spawn save thread: {}", e);
                TriggerOutcome::DispatchFailed(CaptureError::InvalidState(format!(
                    "failed to spawn save thread: {}",
                    e
                )))
            }
        }
    }

    pub fn is_saving(&self) -> bool {
        self.shared.save_gate.is_active()
    }
}
