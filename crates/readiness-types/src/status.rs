//! Report status codes and comparison modes.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Severity of a test's movement between base and sample, encoded as a
/// signed ordinal: negative is a regression, zero neutral, positive an
/// improvement. Magnitude encodes severity, so the worst verdict in a set
/// is simply the minimum.
///
/// Declared in ascending code order so the derived `Ord` matches the codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// Triage claimed a fix but failures continue past the resolution time.
    FailedFixedRegression,
    /// Regression with a pass rate drop beyond the extreme threshold.
    ExtremeRegression,
    SignificantRegression,
    /// An extreme regression that clears once triaged incidents are factored in.
    ExtremeTriagedRegression,
    SignificantTriagedRegression,
    /// Marked fixed but the failures have not yet rolled off the sample window.
    FixedRegression,
    MissingSample,
    NotSignificant,
    MissingBasis,
    MissingBasisAndSample,
    SignificantImprovement,
}

impl Status {
    pub const fn code(self) -> i32 {
        match self {
            Status::FailedFixedRegression => -1000,
            Status::ExtremeRegression => -500,
            Status::SignificantRegression => -400,
            Status::ExtremeTriagedRegression => -300,
            Status::SignificantTriagedRegression => -200,
            Status::FixedRegression => -150,
            Status::MissingSample => -100,
            Status::NotSignificant => 0,
            Status::MissingBasis => 100,
            Status::MissingBasisAndSample => 200,
            Status::SignificantImprovement => 300,
        }
    }

    pub fn from_code(code: i32) -> Option<Status> {
        Some(match code {
            -1000 => Status::FailedFixedRegression,
            -500 => Status::ExtremeRegression,
            -400 => Status::SignificantRegression,
            -300 => Status::ExtremeTriagedRegression,
            -200 => Status::SignificantTriagedRegression,
            -150 => Status::FixedRegression,
            -100 => Status::MissingSample,
            0 => Status::NotSignificant,
            100 => Status::MissingBasis,
            200 => Status::MissingBasisAndSample,
            300 => Status::SignificantImprovement,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::FailedFixedRegression => "FailedFixed",
            Status::ExtremeRegression => "Extreme",
            Status::SignificantRegression => "Significant",
            Status::ExtremeTriagedRegression => "ExtremeTriaged",
            Status::SignificantTriagedRegression => "SignificantTriaged",
            Status::FixedRegression => "Fixed",
            Status::MissingSample => "MissingSample",
            Status::NotSignificant => "NotSignificant",
            Status::MissingBasis => "MissingBasis",
            Status::MissingBasisAndSample => "MissingBasisAndSample",
            Status::SignificantImprovement => "SignificantImprovement",
        }
    }

    /// True for verdicts that belong in a column's regressed-test list.
    pub fn is_regressed(self) -> bool {
        self < Status::MissingSample
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::NotSignificant
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Status::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown status code {code}")))
    }
}

/// The mode used to judge a test's sample window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "fisher_exact")]
    FisherExact,
    #[serde(rename = "pass_rate")]
    PassRate,
}

impl Default for Comparison {
    fn default() -> Self {
        Comparison::FisherExact
    }
}
