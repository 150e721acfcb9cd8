use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Pipeline-wide cancellation flag.
///
/// Starts unset and can only ever move to set. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Returns `true` only for the call that performed the
    /// transition; later calls are no-ops returning `false`.
    pub fn set(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Sets the wrapped signal when dropped, including during a panic unwind.
pub struct StopOnDrop(pub StopSignal);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.set();
    }
}

#[cfg(test)]
mod tests {
    use super::{StopOnDrop, StopSignal};

    #[test]
    fn starts_unset() {
        assert!(!StopSignal::new().is_set());
    }

    #[test]
    fn only_first_set_reports_transition() {
        let stop = StopSignal::new();

        assert!(stop.set());
        assert!(!stop.set());
        assert!(stop.is_set());
    }

    #[test]
    fn clones_observe_the_same_flag() {
        let stop = StopSignal::new();
        let observer = stop.clone();

        stop.set();

        assert!(observer.is_set());
    }

    #[test]
    fn guard_sets_signal_on_panic() {
        let stop = StopSignal::new();
        let guarded = stop.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = StopOnDrop(guarded);
            panic!("component crashed");
        });

        assert!(result.is_err());
        assert!(stop.is_set());
    }
}
