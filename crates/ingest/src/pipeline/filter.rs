//! Admission filters

/// Predicate deciding whether a normalized record is persisted
pub trait AdmissionFilter<R>: Send + Sync {
    /// Whether `record` passes
    fn admit(&self, record: &R) -> bool;

    /// Filter name for logs
    fn name(&self) -> &'static str;
}

/// Admits every record
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl<R> AdmissionFilter<R> for AdmitAll {
    fn admit(&self, _record: &R) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "admit_all"
    }
}

/// Current and historical-average amounts of a record
pub trait DropMetric {
    /// Current amount
    fn current(&self) -> i64;

    /// Historical average, if known
    fn average(&self) -> Option<i64>;
}

/// Admits records whose current amount dropped at least `threshold_percent`
/// below their average
#[derive(Debug, Clone, Copy)]
pub struct DropThresholdFilter {
    threshold_percent: f64,
}

impl DropThresholdFilter {
    /// Create a filter with the given threshold
    #[must_use]
    pub const fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    /// Configured threshold
    #[must_use]
    pub const fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    /// `(average - current) / average * 100`, or `None` when the average is
    /// absent or zero
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn drop_percent(current: i64, average: Option<i64>) -> Option<f64> {
        let average = average.filter(|avg| *avg != 0)?;
        let (current, average) = (current as f64, average as f64);
        Some((average - current) / average * 100.0)
    }
}

impl Default for DropThresholdFilter {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl<R: DropMetric + Send + Sync> AdmissionFilter<R> for DropThresholdFilter {
    fn admit(&self, record: &R) -> bool {
        Self::drop_percent(record.current(), record.average())
            .is_some_and(|drop| drop >= self.threshold_percent)
    }

    fn name(&self) -> &'static str {
        "drop_threshold"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Amounts {
        current: i64,
        average: Option<i64>,
    }

    impl DropMetric for Amounts {
        fn current(&self) -> i64 {
            self.current
        }

        fn average(&self) -> Option<i64> {
            self.average
        }
    }

    fn admits(current: i64, average: Option<i64>) -> bool {
        DropThresholdFilter::default().admit(&Amounts { current, average })
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(admits(500, Some(1000)));
        assert!(!admits(501, Some(1000)));
        assert!(admits(0, Some(1000)));
        assert!(admits(-200, Some(1000)));
    }

    #[test]
    fn test_absent_or_zero_average_rejected() {
        assert!(!admits(0, None));
        assert!(!admits(-1_000_000, Some(0)));
        assert!(!admits(100, None));
    }

    #[test]
    fn test_admit_all() {
        assert!(AdmissionFilter::<Amounts>::admit(
            &AdmitAll,
            &Amounts {
                current: 1,
                average: None
            }
        ));
    }

    proptest! {
        #[test]
        fn prop_admitted_rows_satisfy_rule(
            current in -10_000_000i64..10_000_000i64,
            average in proptest::option::of(-10_000_000i64..10_000_000i64),
        ) {
            if admits(current, average) {
                let avg = average.unwrap_or(0);
                prop_assert!(avg != 0);
                let drop = (avg - current) as f64 / avg as f64 * 100.0;
                prop_assert!(drop >= 50.0);
            }
        }

        #[test]
        fn prop_zero_average_never_admits(current in any::<i64>()) {
            prop_assert!(!admits(current, Some(0)));
            prop_assert!(!admits(current, None));
        }
    }
}
