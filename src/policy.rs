//! Post-step gating policy.
//!
//! Decides whether the post-build list runs, given the configured
//! [`ResultThreshold`] and the main build's outcome.
//!
//! Two defaults pull in opposite directions and both must hold:
//! - an unknown outcome (`None`) never blocks a known threshold;
//! - an unrecognized threshold never runs the post list.

use crate::outcome::BuildOutcome;
use serde::{Deserialize, Serialize};

/// Minimum main-build outcome required for the post list to run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultThreshold {
    /// Run regardless of outcome. Also the value used when nothing is configured.
    #[default]
    Always,
    /// Run only if the build succeeded.
    OnSuccess,
    /// Run if the build succeeded or is unstable.
    OnUnstableOrBetter,
    /// A value this version does not understand. Kept verbatim so it survives a
    /// load/save cycle; never runs the post list.
    Unrecognized(String),
}

impl ResultThreshold {
    /// Parse a configured value. Accepts the legacy names (`allCases`,
    /// `success`, `unstable`) and the canonical snake_case names.
    pub fn parse(value: &str) -> Self {
        match value {
            "allCases" | "always" => ResultThreshold::Always,
            "success" | "on_success" => ResultThreshold::OnSuccess,
            "unstable" | "on_unstable_or_better" => ResultThreshold::OnUnstableOrBetter,
            other => ResultThreshold::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResultThreshold::Always => "always",
            ResultThreshold::OnSuccess => "on_success",
            ResultThreshold::OnUnstableOrBetter => "on_unstable_or_better",
            ResultThreshold::Unrecognized(value) => value,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ResultThreshold::Unrecognized(_))
    }
}

impl From<String> for ResultThreshold {
    fn from(value: String) -> Self {
        ResultThreshold::parse(&value)
    }
}

impl From<ResultThreshold> for String {
    fn from(threshold: ResultThreshold) -> Self {
        threshold.as_str().to_string()
    }
}

impl std::fmt::Display for ResultThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decide whether the post-build list should run.
///
/// `outcome` is `None` while the build result is not yet determined; that is
/// treated as a best-possible outcome for every recognized threshold.
pub fn should_run_post_steps(threshold: &ResultThreshold, outcome: Option<BuildOutcome>) -> bool {
    match threshold {
        ResultThreshold::Always => true,
        ResultThreshold::OnSuccess => {
            outcome.is_none_or(|o| o.is_better_or_equal_to(BuildOutcome::Success))
        }
        ResultThreshold::OnUnstableOrBetter => {
            outcome.is_none_or(|o| o.is_better_or_equal_to(BuildOutcome::Unstable))
        }
        ResultThreshold::Unrecognized(value) => {
            tracing::warn!(
                threshold = %value,
                "unrecognized post-step threshold, post-build steps will not run"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_thresholds() -> [ResultThreshold; 3] {
        [
            ResultThreshold::Always,
            ResultThreshold::OnSuccess,
            ResultThreshold::OnUnstableOrBetter,
        ]
    }

    #[test]
    fn test_unknown_outcome_never_blocks_known_thresholds() {
        for threshold in known_thresholds() {
            assert!(should_run_post_steps(&threshold, None), "{threshold}");
        }
    }

    #[test]
    fn test_always_runs_for_every_outcome() {
        for outcome in BuildOutcome::all() {
            assert!(should_run_post_steps(
                &ResultThreshold::Always,
                Some(*outcome)
            ));
        }
    }

    #[test]
    fn test_on_success() {
        let t = ResultThreshold::OnSuccess;
        assert!(should_run_post_steps(&t, Some(BuildOutcome::Success)));
        assert!(!should_run_post_steps(&t, Some(BuildOutcome::Unstable)));
        assert!(!should_run_post_steps(&t, Some(BuildOutcome::Failure)));
        assert!(!should_run_post_steps(&t, Some(BuildOutcome::Aborted)));
    }

    #[test]
    fn test_on_unstable_or_better() {
        let t = ResultThreshold::OnUnstableOrBetter;
        assert!(should_run_post_steps(&t, Some(BuildOutcome::Success)));
        assert!(should_run_post_steps(&t, Some(BuildOutcome::Unstable)));
        assert!(!should_run_post_steps(&t, Some(BuildOutcome::Failure)));
        assert!(!should_run_post_steps(&t, Some(BuildOutcome::NotBuilt)));
    }

    #[test]
    fn test_unrecognized_fails_closed() {
        let t = ResultThreshold::parse("sometimes");
        assert_eq!(t, ResultThreshold::Unrecognized("sometimes".to_string()));
        assert!(!should_run_post_steps(&t, Some(BuildOutcome::Success)));
        assert!(!should_run_post_steps(&t, None));
    }

    #[test]
    fn test_parse_legacy_and_canonical_names() {
        assert_eq!(ResultThreshold::parse("allCases"), ResultThreshold::Always);
        assert_eq!(ResultThreshold::parse("always"), ResultThreshold::Always);
        assert_eq!(ResultThreshold::parse("success"), ResultThreshold::OnSuccess);
        assert_eq!(
            ResultThreshold::parse("unstable"),
            ResultThreshold::OnUnstableOrBetter
        );
        assert_eq!(
            ResultThreshold::parse("on_unstable_or_better"),
            ResultThreshold::OnUnstableOrBetter
        );
    }

    #[test]
    fn test_default_is_always() {
        assert_eq!(ResultThreshold::default(), ResultThreshold::Always);
    }

    #[test]
    fn test_unrecognized_value_round_trips() {
        let t = ResultThreshold::parse("nightly");
        let s: String = t.clone().into();
        assert_eq!(s, "nightly");
        assert!(!t.is_recognized());
    }
}
