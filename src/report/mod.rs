//! Run results
//!
//! A [`RunReport`] is owned by one run and only ever appended to. Renderers in
//! the CLI read it; nothing else is shared between test cases.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Outcome of one check or test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Not applicable, does not affect the exit code
    Skip,
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skip => "SKIP",
        }
    }

    pub fn from_bool(passed: bool) -> Self {
        if passed {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One named test case with its diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    /// `backend/check` or `group/check`
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

impl TestRecord {
    pub fn new(name: impl Into<String>, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            detail: detail.into(),
        }
    }

    pub fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, detail)
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, detail)
    }

    pub fn skip(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Skip, detail)
    }

    /// Group prefix of the name, e.g. `edge` for `edge/multiturn`.
    pub fn group(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }
}

/// Append-only record list for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub records: Vec<TestRecord>,
}

impl RunReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            started_at: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Append a record and return its status.
    pub fn record(&mut self, record: TestRecord) -> CheckStatus {
        match record.status {
            CheckStatus::Fail => {
                tracing::info!(test = %record.name, detail = %record.detail, "test failed")
            }
            _ => tracing::debug!(test = %record.name, status = %record.status, "test finished"),
        }
        let status = record.status;
        self.records.push(record);
        status
    }

    pub fn get(&self, name: &str) -> Option<&TestRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(CheckStatus::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    pub fn skipped(&self) -> usize {
        self.count(CheckStatus::Skip)
    }

    /// True when nothing failed. Skips do not count against a run.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Fold another report's records into this one.
    pub fn merge(&mut self, other: RunReport) {
        self.records.extend(other.records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_all_passed() {
        let mut report = RunReport::new("passthrough");
        report.record(TestRecord::pass("ollama/anthropic-nonstream", ""));
        report.record(TestRecord::skip("sglang/anthropic-nonstream", "untested type"));
        assert!(report.all_passed());

        report.record(TestRecord::fail("edge/multiturn", "HTTP 500"));
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_get_by_name() {
        let mut report = RunReport::new("t");
        report.record(TestRecord::fail("a/b", "x"));
        assert_eq!(report.get("a/b").unwrap().status, CheckStatus::Fail);
        assert!(report.get("a/c").is_none());
    }

    #[test]
    fn test_group_prefix() {
        assert_eq!(TestRecord::pass("edge/system-param (x)", "").group(), "edge");
        assert_eq!(TestRecord::pass("stats", "").group(), "stats");
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut a = RunReport::new("a");
        a.record(TestRecord::pass("one", ""));
        let mut b = RunReport::new("b");
        b.record(TestRecord::fail("two", ""));
        a.merge(b);
        let names: Vec<_> = a.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TestRecord::pass("x", "")).unwrap();
        assert!(json.contains("\"status\":\"pass\""));
    }
}
