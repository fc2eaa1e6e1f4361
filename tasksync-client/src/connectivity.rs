//! Online/Offline state machine.
//!
//! The monitor owns the mode. Gateway failures move it to `Offline`
//! immediately; only a fully successful reconciliation moves it back. A
//! successful health probe by itself changes nothing, it merely permits a
//! reconciliation attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectivityMode {
    Online,
    Offline,
}

/// What a mode-changing report did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed,
    Unchanged,
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    offline: AtomicBool,
    reconciling: Arc<AtomicBool>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::with_mode(ConnectivityMode::Online)
    }

    pub fn with_mode(mode: ConnectivityMode) -> Self {
        Self {
            offline: AtomicBool::new(mode == ConnectivityMode::Offline),
            reconciling: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn mode(&self) -> ConnectivityMode {
        if self.is_offline() {
            ConnectivityMode::Offline
        } else {
            ConnectivityMode::Online
        }
    }

    /// A gateway call failed.
    pub fn report_failure(&self) -> Transition {
        if self.offline.swap(true, Ordering::SeqCst) {
            Transition::Unchanged
        } else {
            tracing::warn!("CLIENT: remote unreachable, switching to offline mode");
            Transition::Changed
        }
    }

    /// A reconciliation pass replayed every pending operation.
    pub fn report_reconciled(&self) -> Transition {
        if self.offline.swap(false, Ordering::SeqCst) {
            tracing::info!("CLIENT: reconciliation complete, back online");
            Transition::Changed
        } else {
            Transition::Unchanged
        }
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling.load(Ordering::SeqCst)
    }

    /// Claims the single reconciliation slot. `None` if a pass is in flight.
    pub fn try_begin_reconciliation(&self) -> Option<ReconciliationGuard> {
        self.reconciling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ReconciliationGuard {
                flag: self.reconciling.clone(),
            })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the reconciliation slot on drop.
#[derive(Debug)]
pub struct ReconciliationGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ReconciliationGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_online() {
        let monitor = ConnectivityMonitor::new();
        assert!(!monitor.is_offline());
        assert_eq!(monitor.mode(), ConnectivityMode::Online);
    }

    #[test]
    fn test_failures_and_reconciliation_transitions() {
        let monitor = ConnectivityMonitor::new();

        assert_eq!(monitor.report_failure(), Transition::Changed);
        assert_eq!(monitor.report_failure(), Transition::Unchanged);
        assert!(monitor.is_offline());

        assert_eq!(monitor.report_reconciled(), Transition::Changed);
        assert!(!monitor.is_offline());
        assert_eq!(monitor.report_reconciled(), Transition::Unchanged);
    }

    #[test]
    fn test_single_reconciliation_slot() {
        let monitor = ConnectivityMonitor::with_mode(ConnectivityMode::Offline);

        let guard = monitor.try_begin_reconciliation();
        assert!(guard.is_some());
        assert!(monitor.is_reconciling());
        assert!(monitor.try_begin_reconciliation().is_none());

        drop(guard);
        assert!(!monitor.is_reconciling());
        assert!(monitor.try_begin_reconciliation().is_some());
    }
}
