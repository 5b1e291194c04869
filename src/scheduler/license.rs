/// License grant lookup.
///
/// Fails closed: if the scheduler cannot be asked, or answers with nothing,
/// the job is treated as unlicensed and the licensed filesystem stays hidden.
use crate::config::settings::{render_argv, TmpdirConfig, JOB_ID_PLACEHOLDER};
use crate::config::types::{JobId, LicenseMatch};
use crate::scheduler::runner::CommandRunner;

pub struct LicenseChecker<'a> {
    config: &'a TmpdirConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> LicenseChecker<'a> {
    pub fn new(config: &'a TmpdirConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Does `job` hold `license`? Never fails.
    pub fn has_license(&self, job: &JobId, license: &str) -> bool {
        let argv = render_argv(&self.config.license_query, JOB_ID_PLACEHOLDER, job.as_str());

        let output = match self.runner.run(&argv) {
            Ok(output) => output,
            Err(e) => {
                log::warn!(
                    "License query for job {} failed, treating as unlicensed: {}",
                    job,
                    e
                );
                return false;
            }
        };

        if !output.success() {
            log::warn!(
                "License query for job {} exited with {:?}, treating as unlicensed",
                job,
                output.status
            );
            return false;
        }

        let line = normalize_whitespace(&output.stdout);
        if line.is_empty() {
            log::warn!(
                "License query for job {} returned no output, treating as unlicensed",
                job
            );
            return false;
        }

        let granted = matches_license(&line, license, self.config.license_match);
        log::debug!(
            "Job {} license listing {:?}: {} {}",
            job,
            line,
            license,
            if granted { "granted" } else { "not granted" }
        );
        granted
    }
}

/// Collapse every whitespace run (newlines included) into one space
pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn matches_license(line: &str, license: &str, mode: LicenseMatch) -> bool {
    if license.is_empty() {
        return false;
    }
    match mode {
        LicenseMatch::Substring => line.contains(license),
        // Tokens may be comma separated and carry a `:count` suffix
        LicenseMatch::ExactToken => line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| token.split(':').next().unwrap_or(token))
            .any(|name| name == license),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::runner::fake::ScriptedRunner;

    fn check(runner: &ScriptedRunner, license: &str) -> bool {
        let config = TmpdirConfig::default();
        LicenseChecker::new(&config, runner).has_license(&JobId::from(12345), license)
    }

    #[test]
    fn listed_license_is_granted() {
        assert!(check(&ScriptedRunner::new().ok("common gpu\n"), "common"));
    }

    #[test]
    fn longer_name_is_not_a_substring() {
        assert!(!check(&ScriptedRunner::new().ok("common gpu\n"), "commonx"));
    }

    #[test]
    fn substring_mode_matches_inside_longer_tokens() {
        assert!(check(&ScriptedRunner::new().ok("commonwealth"), "common"));
    }

    #[test]
    fn launch_failure_fails_closed() {
        assert!(!check(&ScriptedRunner::new().launch_failure(), "common"));
    }

    #[test]
    fn empty_output_fails_closed() {
        assert!(!check(&ScriptedRunner::new().ok("  \n"), "common"));
    }

    #[test]
    fn nonzero_exit_fails_closed() {
        assert!(!check(&ScriptedRunner::new().exit(1, "common"), "common"));
    }

    #[test]
    fn query_carries_job_id() {
        let runner = ScriptedRunner::new().ok("common");
        check(&runner, "common");
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "squeue");
        assert!(calls[0].contains(&"--jobs=12345".to_string()));
    }

    #[test]
    fn exact_token_mode_requires_whole_names() {
        let line = "commonwealth gpu:2,common:1";
        assert!(matches_license(line, "common", LicenseMatch::ExactToken));
        assert!(matches_license(line, "gpu", LicenseMatch::ExactToken));
        assert!(!matches_license("commonwealth", "common", LicenseMatch::ExactToken));
    }

    #[test]
    fn empty_license_name_never_matches() {
        assert!(!matches_license("common", "", LicenseMatch::Substring));
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("  common\t\tgpu\n"), "common gpu");
    }
}
