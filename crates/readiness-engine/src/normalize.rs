//! Job-name normalization. Base and sample job names embed the release
//! they ran against and sometimes a run-frequency marker; both are replaced
//! with fixed placeholders so the same job can be matched across releases.

use std::sync::OnceLock;

use regex::Regex;

fn frequency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-f\d+$").expect("static frequency pattern"))
}

/// Normalize a prow job name for cross-release matching. Idempotent: the
/// placeholders contain no release or frequency digits themselves.
pub fn normalize_job_name(job_name: &str, base_release: &str, sample_release: &str) -> String {
    let mut name = job_name.to_string();
    if !base_release.is_empty() {
        name = name.replace(base_release, "X.X");
    }
    if !sample_release.is_empty() {
        name = name.replace(sample_release, "X.X");
    }
    frequency_pattern().replace(&name, "-fXX").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_release_is_removed() {
        assert_eq!(
            normalize_job_name(
                "periodic-ci-openshift-release-master-ci-4.16-e2e-azure-ovn-upgrade",
                "4.16",
                ""
            ),
            "periodic-ci-openshift-release-master-ci-X.X-e2e-azure-ovn-upgrade"
        );
    }

    #[test]
    fn sample_release_is_removed() {
        assert_eq!(
            normalize_job_name(
                "periodic-ci-openshift-release-master-ci-4.16-e2e-azure-ovn-upgrade",
                "",
                "4.16"
            ),
            "periodic-ci-openshift-release-master-ci-X.X-e2e-azure-ovn-upgrade"
        );
    }

    #[test]
    fn frequency_is_removed() {
        assert_eq!(
            normalize_job_name("periodic-ci-openshift-release-master-ci-test-job-f27", "", ""),
            "periodic-ci-openshift-release-master-ci-test-job-fXX"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_job_name("periodic-4.16-e2e-aws-f27", "4.16", "4.17");
        let twice = normalize_job_name(&once, "4.16", "4.17");
        assert_eq!(once, twice);
    }

    #[test]
    fn base_and_sample_collapse_to_the_same_name() {
        let base = normalize_job_name("periodic-4.16-e2e", "4.16", "4.17");
        let sample = normalize_job_name("periodic-4.17-e2e", "4.16", "4.17");
        assert_eq!(base, sample);
    }
}
