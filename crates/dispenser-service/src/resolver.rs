//! Error and warning classification of decoded status flags.
//!
//! Faults are tracked in an active set so a fault that stays asserted is
//! reported once; the set forgets a fault as soon as the device stops
//! reporting it. Warnings are edge-triggered against the previous frame.

use dispenser_protocol::{StatusFlag, StatusFlags};

use crate::config::ErrorMode;

/// Fault flags, in the order they are reported.
pub const FAULT_FLAGS: [StatusFlag; 7] = [
    StatusFlag::SensorInvalid,
    StatusFlag::BinFull,
    StatusFlag::CardEmpty,
    StatusFlag::DispenseError,
    StatusFlag::NoCapture,
    StatusFlag::Overlapped,
    StatusFlag::Jam,
];

/// Warning flags, in the order they are reported.
pub const WARNING_FLAGS: [StatusFlag; 2] = [StatusFlag::CardPreEmpty, StatusFlag::CaptureError];

/// Result of scanning one frame for faults.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FaultScan {
    /// Faults asserted in this frame that were not active before.
    pub raised: Vec<StatusFlag>,

    /// Every fault asserted in this frame.
    pub asserted: StatusFlags,
}

impl FaultScan {
    /// Whether this frame calls for a device reset under `mode`.
    pub fn needs_reset(&self, mode: ErrorMode) -> bool {
        match mode {
            ErrorMode::Fatal => !self.asserted.is_empty(),
            ErrorMode::BestEffort => !self.raised.is_empty(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Resolver {
    active: StatusFlags,
    warnings: StatusFlags,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faults currently recorded as active.
    pub fn active(&self) -> StatusFlags {
        self.active
    }

    /// Record the faults of `flags` and report the ones newly raised.
    pub fn scan_faults(&mut self, flags: StatusFlags) -> FaultScan {
        let mut scan = FaultScan::default();
        for flag in FAULT_FLAGS {
            if flags.contains(flag) {
                scan.asserted = scan.asserted.with(flag);
                if !self.active.contains(flag) {
                    self.active = self.active.with(flag);
                    scan.raised.push(flag);
                }
            } else {
                self.active = self.active.without(flag);
            }
        }
        scan
    }

    /// Warnings of `flags` that were not asserted in the previous frame.
    pub fn scan_warnings(&mut self, flags: StatusFlags) -> Vec<StatusFlag> {
        let mut raised = Vec::new();
        for flag in WARNING_FLAGS {
            if flags.contains(flag) {
                if !self.warnings.contains(flag) {
                    raised.push(flag);
                }
                self.warnings = self.warnings.with(flag);
            } else {
                self.warnings = self.warnings.without(flag);
            }
        }
        raised
    }

    /// Forget every active fault, as after a device reset.
    pub fn clear(&mut self) {
        self.active = StatusFlags::empty();
    }

    /// Keep only `faults` active. Used after a reset caused by those same
    /// faults, so they are not reported again while they stay asserted.
    pub fn retain(&mut self, faults: StatusFlags) {
        self.active = faults;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn frame(list: &[StatusFlag]) -> StatusFlags {
        list.iter().copied().collect()
    }

    #[test]
    fn test_fault_reported_once_and_rearmed() {
        let mut resolver = Resolver::new();
        let jam = frame(&[StatusFlag::Jam]);

        assert_eq!(resolver.scan_faults(jam).raised, vec![StatusFlag::Jam]);
        assert!(resolver.scan_faults(jam).raised.is_empty());
        assert!(resolver.scan_faults(jam).raised.is_empty());

        assert!(resolver.scan_faults(frame(&[])).raised.is_empty());
        assert!(resolver.active().is_empty());

        assert_eq!(resolver.scan_faults(jam).raised, vec![StatusFlag::Jam]);
    }

    #[test]
    fn test_faults_reported_in_fixed_order() {
        let mut resolver = Resolver::new();
        let scan = resolver.scan_faults(frame(&[
            StatusFlag::Jam,
            StatusFlag::CardEmpty,
            StatusFlag::SensorInvalid,
        ]));

        assert_eq!(
            scan.raised,
            vec![
                StatusFlag::SensorInvalid,
                StatusFlag::CardEmpty,
                StatusFlag::Jam
            ]
        );
    }

    #[test]
    fn test_non_fault_flags_ignored() {
        let mut resolver = Resolver::new();
        let scan = resolver.scan_faults(frame(&[
            StatusFlag::CaptureSensor1,
            StatusFlag::CardPreEmpty,
            StatusFlag::CaptureError,
            StatusFlag::Dispensing,
        ]));

        assert!(scan.raised.is_empty());
        assert!(scan.asserted.is_empty());
    }

    #[rstest]
    #[case::fatal_new(ErrorMode::Fatal, true, true)]
    #[case::fatal_held(ErrorMode::Fatal, false, true)]
    #[case::best_effort_new(ErrorMode::BestEffort, true, true)]
    #[case::best_effort_held(ErrorMode::BestEffort, false, false)]
    fn test_reset_policy(#[case] mode: ErrorMode, #[case] new: bool, #[case] expected: bool) {
        let scan = FaultScan {
            raised: if new { vec![StatusFlag::BinFull] } else { vec![] },
            asserted: StatusFlag::BinFull.into(),
        };
        assert_eq!(scan.needs_reset(mode), expected);
    }

    #[test]
    fn test_no_reset_without_faults() {
        assert!(!FaultScan::default().needs_reset(ErrorMode::Fatal));
        assert!(!FaultScan::default().needs_reset(ErrorMode::BestEffort));
    }

    #[test]
    fn test_pre_empty_is_edge_triggered() {
        let mut resolver = Resolver::new();
        let low = frame(&[StatusFlag::CardPreEmpty]);

        assert_eq!(resolver.scan_warnings(low), vec![StatusFlag::CardPreEmpty]);
        assert!(resolver.scan_warnings(low).is_empty());
        assert!(resolver.scan_warnings(low).is_empty());
        assert!(resolver.scan_warnings(frame(&[])).is_empty());
        assert_eq!(resolver.scan_warnings(low), vec![StatusFlag::CardPreEmpty]);
    }

    #[test]
    fn test_clear_and_retain() {
        let mut resolver = Resolver::new();
        let both = frame(&[StatusFlag::Jam, StatusFlag::BinFull]);
        resolver.scan_faults(both);

        resolver.clear();
        assert_eq!(resolver.scan_faults(both).raised.len(), 2);

        resolver.retain(both);
        assert!(resolver.scan_faults(both).raised.is_empty());
    }
}
