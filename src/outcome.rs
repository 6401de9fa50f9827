//! Build outcomes and their ranking.
//!
//! Outcomes are totally ordered from best to worst:
//! `Success` > `Unstable` > `Failure` > `NotBuilt` > `Aborted`.
//! A build whose outcome is not yet known is represented as `None` by callers
//! and is treated as at least as good as any named outcome.

use serde::{Deserialize, Serialize};

/// The result of a build, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildOutcome {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildOutcome {
    /// Returns all outcomes, best first.
    pub fn all() -> &'static [BuildOutcome] {
        &[
            BuildOutcome::Success,
            BuildOutcome::Unstable,
            BuildOutcome::Failure,
            BuildOutcome::NotBuilt,
            BuildOutcome::Aborted,
        ]
    }

    /// Position in the ranking; lower is better.
    fn rank(self) -> u8 {
        match self {
            BuildOutcome::Success => 0,
            BuildOutcome::Unstable => 1,
            BuildOutcome::Failure => 2,
            BuildOutcome::NotBuilt => 3,
            BuildOutcome::Aborted => 4,
        }
    }

    /// True if `self` is the same as or better than `other`.
    pub fn is_better_or_equal_to(self, other: BuildOutcome) -> bool {
        self.rank() <= other.rank()
    }

    /// True if `self` is strictly worse than `other`.
    pub fn is_worse_than(self, other: BuildOutcome) -> bool {
        self.rank() > other.rank()
    }

    /// Combine two outcomes, keeping the worse one.
    pub fn combine(self, other: BuildOutcome) -> BuildOutcome {
        if other.is_worse_than(self) { other } else { self }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildOutcome::Success => "SUCCESS",
            BuildOutcome::Unstable => "UNSTABLE",
            BuildOutcome::Failure => "FAILURE",
            BuildOutcome::NotBuilt => "NOT_BUILT",
            BuildOutcome::Aborted => "ABORTED",
        }
    }
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BuildOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "SUCCESS" => Ok(BuildOutcome::Success),
            "UNSTABLE" => Ok(BuildOutcome::Unstable),
            "FAILURE" => Ok(BuildOutcome::Failure),
            "NOT_BUILT" | "NOTBUILT" => Ok(BuildOutcome::NotBuilt),
            "ABORTED" => Ok(BuildOutcome::Aborted),
            _ => anyhow::bail!(
                "Invalid build outcome '{}'. Valid values: SUCCESS, UNSTABLE, FAILURE, NOT_BUILT, ABORTED",
                s
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_is_total_and_ordered() {
        let all = BuildOutcome::all();
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                assert_eq!(a.is_better_or_equal_to(*b), i <= j, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_combine_keeps_worse() {
        assert_eq!(
            BuildOutcome::Success.combine(BuildOutcome::Unstable),
            BuildOutcome::Unstable
        );
        assert_eq!(
            BuildOutcome::Failure.combine(BuildOutcome::Unstable),
            BuildOutcome::Failure
        );
        assert_eq!(
            BuildOutcome::Success.combine(BuildOutcome::Success),
            BuildOutcome::Success
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "success".parse::<BuildOutcome>().unwrap(),
            BuildOutcome::Success
        );
        assert_eq!(
            "not-built".parse::<BuildOutcome>().unwrap(),
            BuildOutcome::NotBuilt
        );
        assert!("broken".parse::<BuildOutcome>().is_err());
    }

    #[test]
    fn test_serde_uses_host_names() {
        let json = serde_json::to_string(&BuildOutcome::NotBuilt).unwrap();
        assert_eq!(json, "\"NOT_BUILT\"");
        let parsed: BuildOutcome = serde_json::from_str("\"UNSTABLE\"").unwrap();
        assert_eq!(parsed, BuildOutcome::Unstable);
    }
}
