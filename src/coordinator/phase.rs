use crate::core::Phase;
use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const SAVING: u8 = 1;
const LOADING: u8 = 2;
const DELETING: u8 = 3;

fn encode(phase: Phase) -> u8 {
    match phase {
        Phase::Idle => IDLE,
        Phase::Saving => SAVING,
        Phase::Loading => LOADING,
        Phase::Deleting => DELETING,
    }
}

fn decode(raw: u8) -> Phase {
    match raw {
        SAVING => Phase::Saving,
        LOADING => Phase::Loading,
        DELETING => Phase::Deleting,
        _ => Phase::Idle,
    }
}

/// Global operation mutex. At most one non-idle phase at a time.
#[derive(Debug, Default)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub(crate) fn current(&self) -> Phase {
        decode(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.current() == Phase::Idle
    }

    /// Moves from `Idle` to `phase`. `None` when another phase is active.
    pub(crate) fn try_enter(&self, phase: Phase) -> Option<PhaseGuard<'_>> {
        self.0
            .compare_exchange(IDLE, encode(phase), Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PhaseGuard { cell: self })
    }
}

/// Returns the cell to `Idle` when dropped, including on early error returns.
pub(crate) struct PhaseGuard<'a> {
    cell: &'a PhaseCell,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.cell.0.store(IDLE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_one_phase_at_a_time() {
        let cell = PhaseCell::default();
        assert!(cell.is_idle());

        let guard = cell.try_enter(Phase::Saving).unwrap();
        assert_eq!(cell.current(), Phase::Saving);
        assert!(cell.try_enter(Phase::Loading).is_none());
        assert!(cell.try_enter(Phase::Saving).is_none());

        drop(guard);
        assert!(cell.is_idle());
        let _guard = cell.try_enter(Phase::Deleting).unwrap();
        assert_eq!(cell.current(), Phase::Deleting);
    }

    #[test]
    fn test_guard_resets_on_early_return() {
        fn failing(cell: &PhaseCell) -> Result<(), ()> {
            let _guard = cell.try_enter(Phase::Loading).ok_or(())?;
            Err(())
        }

        let cell = PhaseCell::default();
        assert!(failing(&cell).is_err());
        assert!(cell.is_idle());
    }
}
