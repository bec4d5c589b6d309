//! Scenario definitions.

use mcp::CallToolResult;
use serde_json::Value;

/// What a scenario is supposed to provoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expectation {
    /// A normal result.
    #[default]
    Success,
    /// An error payload. Used to exercise error propagation.
    Error,
}

/// Post-condition on a successful tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// The result text names every listed column, as a quoted JSON string.
    Columns(Vec<String>),
    /// The first text block is a JSON object whose `rowCount` is at least `n`.
    RowCountAtLeast(u64),
}

impl Check {
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Check::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Evaluate against a tool result. `Err` carries a human-readable reason.
    pub fn evaluate(&self, result: &CallToolResult) -> Result<(), String> {
        match self {
            Check::Columns(names) => {
                let text = result.joined_text();
                let missing: Vec<&str> = names
                    .iter()
                    .filter(|name| !text.contains(&format!("\"{name}\"")))
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(format!("missing columns: {}", missing.join(", ")))
                }
            }
            Check::RowCountAtLeast(min) => {
                let text = result.first_text().ok_or("result has no text content")?;
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| format!("result text is not JSON: {e}"))?;
                let count = value
                    .get("rowCount")
                    .and_then(Value::as_u64)
                    .or_else(|| value.get("rows").and_then(Value::as_array).map(|r| r.len() as u64))
                    .ok_or("result has no rowCount")?;
                if count >= *min {
                    Ok(())
                } else {
                    Err(format!("expected rowCount >= {min}, got {count}"))
                }
            }
        }
    }
}

/// One fixed test case: a tool, its arguments and a description.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub tool: String,
    pub arguments: Value,
    pub expect: Expectation,
    pub check: Option<Check>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
            arguments,
            expect: Expectation::Success,
            check: None,
        }
    }

    /// Mark this scenario as an intentional error-path check.
    pub fn expect_error(mut self) -> Self {
        self.expect = Expectation::Error;
        self
    }

    pub fn with_check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }
}
