//! Health status types for liveness and readiness probes.

use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome string of a passing check.
pub const CHECK_SUCCESS: &str = "OK";

/// Health check probe types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeType {
    /// Liveness probe: restart the instance if failed.
    Liveness,
    /// Readiness probe: stop routing traffic if failed.
    Readiness,
}

impl std::fmt::Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Liveness => write!(f, "liveness"),
            Self::Readiness => write!(f, "readiness"),
        }
    }
}

/// Aggregate status of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Unavailable,
}

impl HealthStatus {
    /// HTTP status code for the probe response.
    pub fn http_status(self) -> u16 {
        match self {
            HealthStatus::Ok => 200,
            HealthStatus::Unavailable => 503,
        }
    }
}

/// Individual health check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Registered check name
    pub name: String,
    /// `"OK"` or the failure description
    pub outcome: String,
}

impl CheckResult {
    /// Create a passing check.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CHECK_SUCCESS.to_string(),
        }
    }

    /// Create a failing check with a message.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: message.into(),
        }
    }

    /// Returns true if check passed.
    pub fn is_pass(&self) -> bool {
        self.outcome == CHECK_SUCCESS
    }
}

/// Result of one probe: aggregate status plus every check outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: HealthStatus,
    pub results: BTreeMap<String, String>,
}

impl ProbeReport {
    /// Fold check results into a report.
    ///
    /// When two groups share a check name the failing outcome is kept, so a
    /// failure is never hidden in the verbose body.
    pub fn from_results(results: impl IntoIterator<Item = CheckResult>) -> Self {
        let mut status = HealthStatus::Ok;
        let mut map = BTreeMap::new();

        for result in results {
            if !result.is_pass() {
                status = HealthStatus::Unavailable;
            }
            match map.get(&result.name) {
                Some(existing) if existing != CHECK_SUCCESS => {}
                _ => {
                    map.insert(result.name, result.outcome);
                }
            }
        }

        Self {
            status,
            results: map,
        }
    }

    /// Returns true if every check passed.
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }

    /// Response body: `{}` unless verbose, then the name to outcome map.
    pub fn to_body(&self, full: bool) -> String {
        if !full {
            return "{}\n".to_string();
        }
        let mut body = serde_json::to_string_pretty(&self.results)
            .unwrap_or_else(|_| "{}".to_string());
        body.push('\n');
        body
    }
}
