//! Fixture loader for the JSON and TOML files under `fixtures/`.

use call_telemetry_domain::{AlertRecord, CallCountRecord, CdrRecord, SystemAlertRecord};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::{fmt, fs};

/// Errors raised while loading fixtures.
#[derive(Debug)]
pub enum FixtureError {
    /// Fixture file does not exist.
    Missing {
        /// Path that could not be found.
        path: PathBuf,
    },
    /// Fixture file could not be read.
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Fixture file could not be parsed.
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl fmt::Display for FixtureError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path } => write!(formatter, "missing fixture: {}", path.display()),
            Self::Read { path, source } => {
                write!(formatter, "failed to read fixture {}: {source}", path.display())
            },
            Self::Parse { path, source } => {
                write!(formatter, "failed to parse fixture {}: {source}", path.display())
            },
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Missing { .. } => None,
        }
    }
}

/// Sample write payloads for every stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordFixtures {
    /// Call detail records across two accounts.
    pub cdrs: Vec<CdrRecord>,
    /// Alerts, templated and explicit.
    pub alerts: Vec<AlertRecord>,
    /// Gauge samples carrying every scope id.
    pub call_counts: Vec<CallCountRecord>,
    /// Platform component alerts.
    pub system_alerts: Vec<SystemAlertRecord>,
}

/// Absolute path of a fixture file.
pub fn fixture_path(relative_path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(relative_path)
}

/// Raw text of a fixture file.
pub fn fixture_text(relative_path: &str) -> Result<String, FixtureError> {
    let path = fixture_path(relative_path);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(FixtureError::Missing { path })
        },
        Err(source) => Err(FixtureError::Read { path, source }),
    }
}

/// Parse a JSON fixture.
pub fn load_json_fixture<T: DeserializeOwned>(relative_path: &str) -> Result<T, FixtureError> {
    let contents = fixture_text(relative_path)?;
    serde_json::from_str(&contents).map_err(|source| FixtureError::Parse {
        path: fixture_path(relative_path),
        source,
    })
}

/// Load the sample records.
pub fn record_fixtures() -> Result<RecordFixtures, FixtureError> {
    load_json_fixture("records/samples.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_telemetry_domain::ScopeLevel;
    use chrono::Utc;

    #[test]
    fn missing_fixture_errors_are_reported() {
        let result: Result<RecordFixtures, FixtureError> = load_json_fixture("records/missing.json");
        assert!(matches!(result, Err(FixtureError::Missing { .. })));
    }

    #[test]
    fn sample_records_convert_into_points() -> Result<(), Box<dyn std::error::Error>> {
        let fixtures = record_fixtures()?;
        assert_eq!(fixtures.cdrs.len(), 3);

        for cdr in fixtures.cdrs {
            let point = cdr.into_point()?;
            assert!(point.timestamp.is_some());
        }
        for alert in fixtures.alerts {
            assert!(!alert.resolved_message().is_empty());
            alert.into_point()?;
        }
        for level in [
            ScopeLevel::ServiceProvider,
            ScopeLevel::Account,
            ScopeLevel::Application,
        ] {
            for sample in &fixtures.call_counts {
                sample.clone().into_point(level)?;
            }
        }
        for alert in fixtures.system_alerts {
            alert.into_point(Utc::now())?;
        }
        Ok(())
    }
}
