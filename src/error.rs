use serde::Serialize;
use std::fmt;

use crate::solver::SolveStatus;

/// Failures that end a timetable request without a rendered grid.
#[derive(Debug, thiserror::Error)]
pub enum TimetableError {
    #[error("no feasible solution found")]
    Infeasible { status: SolveStatus },
    #[error("solver backend failed: {0}")]
    Backend(#[from] BackendError),
}

/// Raised by a [`crate::solver::Backend`] that could not run at all.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BackendError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Why a part of the dataset produced no decision variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataGapKind {
    NoLabPlacement,
    NoWeeklyOnceSlot,
    NoRegularSlot,
}

/// A non-fatal hole in the model. Encoding carries on for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataGap {
    pub kind: DataGapKind,
    pub section: String,
    pub subject: String,
    pub message: String,
}

impl DataGap {
    pub fn new(
        kind: DataGapKind,
        section: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            section: section.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DataGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}/{}: {}", self.kind, self.section, self.subject, self.message)
    }
}
