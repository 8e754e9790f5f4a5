use crate::config::TriggerConfig;
use crate::error::{ConvoyError, Result};
use crate::types::TriggerDecision;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CommitEvent
// ---------------------------------------------------------------------------

/// Source-control webhook payload consumed by the trigger filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    pub branch: String,
    pub commit_sha: String,
    #[serde(default)]
    pub changed_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

// ---------------------------------------------------------------------------
// TriggerFilter
// ---------------------------------------------------------------------------

/// Admission filter over commit events. Pure: the decision is a function of
/// the event and this filter's configuration, with no side effects, so it
/// is testable without live infrastructure.
#[derive(Debug)]
pub struct TriggerFilter {
    release_branch: Regex,
    ignore_globs: Vec<Regex>,
    bot_authors: Vec<String>,
}

impl TriggerFilter {
    pub fn new(config: &TriggerConfig) -> Result<Self> {
        let release_branch = Regex::new(&config.release_branch)
            .map_err(|e| ConvoyError::MalformedEvent(format!("release branch pattern: {e}")))?;
        let ignore_globs = config
            .ignore_paths
            .iter()
            .map(|g| compile_glob(g))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            release_branch,
            ignore_globs,
            bot_authors: config.bot_authors.clone(),
        })
    }

    /// Evaluate an event. Errors only on a malformed event (empty branch or
    /// sha); callers treat that as REJECT via [`TriggerFilter::decide`].
    pub fn evaluate(&self, event: &CommitEvent) -> Result<TriggerDecision> {
        if event.branch.trim().is_empty() || event.commit_sha.trim().is_empty() {
            return Err(ConvoyError::MalformedEvent(
                "branch and commit_sha are required".to_string(),
            ));
        }

        if let Some(author) = &event.author {
            if self.bot_authors.iter().any(|b| b == author) {
                return Ok(TriggerDecision::reject(format!(
                    "author '{author}' is a machine identity"
                )));
            }
        }

        if !self.release_branch.is_match(&event.branch) {
            return Ok(TriggerDecision::reject(format!(
                "branch '{}' does not match release pattern",
                event.branch
            )));
        }

        if event.changed_paths.is_empty() {
            return Ok(TriggerDecision::reject("empty changed-path set"));
        }

        // Admit unless changed_paths ⊆ ignore_set. A commit touching both
        // an ignored and a non-ignored path admits: any real code change
        // triggers a build.
        let all_ignored = event
            .changed_paths
            .iter()
            .all(|path| self.ignore_globs.iter().any(|g| g.is_match(path)));
        if all_ignored {
            return Ok(TriggerDecision::reject(
                "every changed path matches the ignore set",
            ));
        }

        Ok(TriggerDecision::Admit)
    }

    /// Like [`evaluate`](Self::evaluate), but a malformed event is logged
    /// and rejected instead of surfaced as an error.
    pub fn decide(&self, event: &CommitEvent) -> TriggerDecision {
        match self.evaluate(event) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!("rejecting malformed event: {e}");
                TriggerDecision::reject(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Glob compilation
// ---------------------------------------------------------------------------

/// Compile a path glob to an anchored regex. `**` matches across path
/// separators, `*` and `?` within a single segment.
fn compile_glob(glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Swallow a following '/' so "charts/**" also matches
                    // "charts" itself is not required; "a/**" matches "a/b/c".
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        pattern.push_str("(?:.*/)?");
                    } else {
                        pattern.push_str(".*");
                    }
                } else {
                    pattern.push_str("[^/]*");
                }
            }
            '?' => pattern.push_str("[^/]"),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| ConvoyError::MalformedEvent(format!("glob '{glob}': {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriggerConfig;

    fn filter_with_ignores(ignores: &[&str]) -> TriggerFilter {
        let config = TriggerConfig {
            release_branch: "^main$".to_string(),
            ignore_paths: ignores.iter().map(|s| s.to_string()).collect(),
            bot_authors: vec!["convoy-bot".to_string()],
        };
        TriggerFilter::new(&config).unwrap()
    }

    fn event(branch: &str, paths: &[&str]) -> CommitEvent {
        CommitEvent {
            branch: branch.to_string(),
            commit_sha: "abc123f00d".to_string(),
            changed_paths: paths.iter().map(|s| s.to_string()).collect(),
            author: None,
        }
    }

    #[test]
    fn ignored_subset_rejects() {
        let f = filter_with_ignores(&["values.yaml", "deployment.yaml"]);
        let d = f.evaluate(&event("main", &["values.yaml"])).unwrap();
        assert!(!d.is_admit());
    }

    #[test]
    fn code_change_admits() {
        let f = filter_with_ignores(&["values.yaml", "deployment.yaml"]);
        let d = f.evaluate(&event("main", &["app.py"])).unwrap();
        assert!(d.is_admit());
    }

    #[test]
    fn mixed_change_admits() {
        // Conservative: any real code change triggers a build even when the
        // same commit also touches ignored manifests.
        let f = filter_with_ignores(&["values.yaml", "deployment.yaml"]);
        let d = f.evaluate(&event("main", &["app.py", "values.yaml"])).unwrap();
        assert!(d.is_admit());
    }

    #[test]
    fn empty_changeset_rejects() {
        let f = filter_with_ignores(&["values.yaml"]);
        let d = f.evaluate(&event("main", &[])).unwrap();
        assert!(!d.is_admit());
    }

    #[test]
    fn non_release_branch_rejects() {
        let f = filter_with_ignores(&["values.yaml"]);
        let d = f.evaluate(&event("feature/login", &["app.py"])).unwrap();
        assert!(!d.is_admit());
    }

    #[test]
    fn bot_author_rejects_even_with_code_paths() {
        let f = filter_with_ignores(&["values.yaml"]);
        let mut e = event("main", &["app.py"]);
        e.author = Some("convoy-bot".to_string());
        assert!(!f.evaluate(&e).unwrap().is_admit());
    }

    #[test]
    fn human_author_unaffected() {
        let f = filter_with_ignores(&["values.yaml"]);
        let mut e = event("main", &["app.py"]);
        e.author = Some("dev@example.com".to_string());
        assert!(f.evaluate(&e).unwrap().is_admit());
    }

    #[test]
    fn malformed_event_is_error_and_decide_rejects() {
        let f = filter_with_ignores(&["values.yaml"]);
        let e = event("", &["app.py"]);
        assert!(f.evaluate(&e).is_err());
        assert!(!f.decide(&e).is_admit());
    }

    #[test]
    fn double_star_glob_spans_directories() {
        let f = filter_with_ignores(&["charts/**"]);
        assert!(!f
            .evaluate(&event("main", &["charts/quote-app/values.yaml"]))
            .unwrap()
            .is_admit());
        assert!(f
            .evaluate(&event("main", &["src/charts.rs"]))
            .unwrap()
            .is_admit());
    }

    #[test]
    fn single_star_stays_within_segment() {
        let f = filter_with_ignores(&["*.md"]);
        assert!(!f.evaluate(&event("main", &["README.md"])).unwrap().is_admit());
        // docs/guide.md has a separator, *.md must not match it
        assert!(f
            .evaluate(&event("main", &["docs/guide.md"]))
            .unwrap()
            .is_admit());
    }

    #[test]
    fn release_branch_pattern_can_be_widened() {
        let config = TriggerConfig {
            release_branch: "^(main|release/.*)$".to_string(),
            ignore_paths: vec![],
            bot_authors: vec![],
        };
        let f = TriggerFilter::new(&config).unwrap();
        assert!(f.evaluate(&event("release/1.2", &["app.py"])).unwrap().is_admit());
        assert!(!f.evaluate(&event("develop", &["app.py"])).unwrap().is_admit());
    }

    #[test]
    fn decision_is_pure_across_repeats() {
        let f = filter_with_ignores(&["values.yaml"]);
        let e = event("main", &["app.py", "values.yaml"]);
        let first = f.evaluate(&e).unwrap();
        for _ in 0..10 {
            assert_eq!(f.evaluate(&e).unwrap(), first);
        }
    }
}
