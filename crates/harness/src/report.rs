//! Run summary.

use std::collections::BTreeMap;
use std::fmt;

use crate::record::{TestRecord, Verdict};

/// Passed/total for one tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolStats {
    pub passed: usize,
    pub total: usize,
}

/// Aggregate statistics over a run's records.
#[derive(Debug, Clone)]
pub struct Summary<'a> {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Failures on scenarios that expected an error.
    pub expected_failures: usize,
    /// Records whose verdict points at a problem in the server.
    pub regressions: Vec<&'a TestRecord>,
    /// Failed records, in execution order.
    pub failures: Vec<&'a TestRecord>,
    /// Checks that did not hold on otherwise passing records.
    pub check_failures: Vec<&'a TestRecord>,
    pub by_tool: BTreeMap<&'a str, ToolStats>,
}

impl<'a> Summary<'a> {
    pub fn from_records(records: &'a [TestRecord]) -> Self {
        let mut summary = Summary {
            total: records.len(),
            passed: 0,
            failed: 0,
            expected_failures: 0,
            regressions: Vec::new(),
            failures: Vec::new(),
            check_failures: Vec::new(),
            by_tool: BTreeMap::new(),
        };

        for record in records {
            let stats = summary.by_tool.entry(record.tool.as_str()).or_default();
            stats.total += 1;
            if record.is_pass() {
                stats.passed += 1;
                summary.passed += 1;
            } else {
                summary.failed += 1;
                summary.failures.push(record);
            }

            let verdict = record.verdict();
            match verdict {
                Verdict::ExpectedFail => summary.expected_failures += 1,
                Verdict::CheckFailed => summary.check_failures.push(record),
                _ => {}
            }
            if verdict.is_regression() {
                summary.regressions.push(record);
            }
        }

        summary
    }

    /// Percentage of passing records; 0 for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "TEST SUMMARY")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f)?;
        writeln!(f, "Total Tests: {}", self.total)?;
        writeln!(f, "Passed: {}", self.passed)?;
        writeln!(f, "Failed: {}", self.failed)?;
        if self.expected_failures > 0 {
            writeln!(f, "  of which expected: {}", self.expected_failures)?;
        }
        writeln!(f, "Success Rate: {:.1}%", self.success_rate())?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed Tests:")?;
            for record in &self.failures {
                writeln!(
                    f,
                    "  - [{}] {} ({})",
                    record.verdict().label(),
                    record.scenario,
                    record.tool
                )?;
                if let Some(error) = &record.error {
                    writeln!(f, "    Error: {error}")?;
                }
            }
        }

        if !self.check_failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed Checks:")?;
            for record in &self.check_failures {
                let reason = record.check_failure.as_deref().unwrap_or_default();
                writeln!(f, "  - {} ({}): {reason}", record.scenario, record.tool)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Results by Tool:")?;
        for (tool, stats) in &self.by_tool {
            writeln!(f, "  {tool}: {}/{} passed", stats.passed, stats.total)?;
        }

        writeln!(f)?;
        write!(f, "Regressions: {}", self.regressions.len())
    }
}
