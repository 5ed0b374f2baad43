/// Result of a non-blocking stage: either the stage's own value or the
/// fallback used in its place, with the reason it was needed.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { fallback: T, detail: String },
}

impl<T> StageOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    /// Split into the value to use and the degradation detail, if any.
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            StageOutcome::Completed(value) => (value, None),
            StageOutcome::Degraded { fallback, detail } => (fallback, Some(detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_outcome_carries_fallback_and_detail() {
        let outcome = StageOutcome::Degraded {
            fallback: "raw transcript",
            detail: "timed out".to_string(),
        };
        assert!(outcome.is_degraded());
        assert_eq!(*outcome.value(), "raw transcript");
        assert_eq!(
            outcome.into_parts(),
            ("raw transcript", Some("timed out".to_string()))
        );
    }

    #[test]
    fn completed_outcome_has_no_detail() {
        let outcome = StageOutcome::Completed(3);
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_parts(), (3, None));
    }
}
