//! Per-scenario outcomes.

use mcp::JsonRpcError;

use crate::scenario::Expectation;

/// Raw classification of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
        })
    }
}

/// Why a call failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// Nothing usable came back before the timeout.
    NoResponse,
    /// The request could not be written to the server.
    SendFailed(String),
    /// JSON-RPC level error payload.
    Rpc(JsonRpcError),
    /// Tool result flagged with `isError`.
    Tool(String),
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetail::NoResponse => write!(f, "no response"),
            ErrorDetail::SendFailed(reason) => write!(f, "no response (send failed: {reason})"),
            ErrorDetail::Rpc(error) => write!(f, "{error}"),
            ErrorDetail::Tool(text) => write!(f, "tool error: {text}"),
        }
    }
}

/// Final reading of a record once its expectation and check are considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verdict {
    Pass,
    Fail,
    /// Failed, as the scenario intended.
    ExpectedFail,
    /// Passed, though the scenario expected an error.
    UnexpectedPass,
    /// Passed, but the result did not satisfy the scenario's check.
    CheckFailed,
}

impl Verdict {
    /// Verdicts that point at a problem in the server.
    pub fn is_regression(self) -> bool {
        matches!(
            self,
            Verdict::Fail | Verdict::UnexpectedPass | Verdict::CheckFailed
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::ExpectedFail => "XFAIL",
            Verdict::UnexpectedPass => "XPASS",
            Verdict::CheckFailed => "CHECK",
        }
    }
}

/// The outcome of one scenario. Created once, never modified.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub scenario: String,
    pub tool: String,
    pub status: Status,
    pub error: Option<ErrorDetail>,
    pub expect: Expectation,
    pub check_failure: Option<String>,
    /// Leading text of the first content element, for operators.
    pub preview: Option<String>,
}

impl TestRecord {
    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }

    pub fn verdict(&self) -> Verdict {
        match (self.status, self.expect) {
            (Status::Pass, Expectation::Success) if self.check_failure.is_some() => {
                Verdict::CheckFailed
            }
            (Status::Pass, Expectation::Success) => Verdict::Pass,
            (Status::Fail, Expectation::Success) => Verdict::Fail,
            (Status::Fail, Expectation::Error) => Verdict::ExpectedFail,
            (Status::Pass, Expectation::Error) => Verdict::UnexpectedPass,
        }
    }
}
