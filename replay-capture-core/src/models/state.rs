use std::sync::atomic::{AtomicU8, Ordering};

/// Controller state machine.
///
/// ```text
/// idle → capturing ⇄ saving
///   ↑________|_________|   (stop)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Capturing = 1,
    Saving = 2,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Capturing,
            2 => Self::Saving,
            _ => Self::Idle,
        }
    }
}

/// The single state flag shared by every producer and the save session.
///
/// Loads are `Acquire`, stores are `Release` and transitions are `AcqRel`
/// compare-exchanges, so a producer that observes `Saving` also observes every
/// write the session made before pausing.
#[derive(Debug)]
pub struct AtomicCaptureState(AtomicU8);

impl AtomicCaptureState {
    pub fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> CaptureState {
        CaptureState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: CaptureState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`. Returns the state actually found on failure.
    pub fn transition(&self, from: CaptureState, to: CaptureState) -> Result<(), CaptureState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(CaptureState::from_u8)
    }
}

impl Default for AtomicCaptureState {
    fn default() -> Self {
        Self::new(CaptureState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_checks_current_state() {
        let state = AtomicCaptureState::default();
        assert_eq!(
            state.transition(CaptureState::Capturing, CaptureState::Saving),
            Err(CaptureState::Idle)
        );

        state.store(CaptureState::Capturing);
        assert!(state.transition(CaptureState::Capturing, CaptureState::Saving).is_ok());
        assert_eq!(state.load(), CaptureState::Saving);
    }
}
