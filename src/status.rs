//! Generation status reporting for UI polling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage of a single generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Queued,
    Processing,
    Generating,
    Portrait,
    Complete,
    Error,
}

impl Stage {
    /// Happy-path order; `Error` may follow any of these.
    pub const SEQUENCE: [Stage; 5] = [
        Stage::Queued,
        Stage::Processing,
        Stage::Generating,
        Stage::Portrait,
        Stage::Complete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Queued => "queued",
            Stage::Processing => "processing",
            Stage::Generating => "generating",
            Stage::Portrait => "portrait",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }

    fn progress_percent(self) -> u8 {
        match self {
            Stage::Queued => 5,
            Stage::Processing => 15,
            Stage::Generating => 40,
            Stage::Portrait => 80,
            Stage::Complete => 100,
            Stage::Error => 0,
        }
    }

    /// Share of an average job still ahead once this stage is reached
    fn remaining_share(self) -> f64 {
        match self {
            Stage::Queued | Stage::Processing => 1.0,
            Stage::Generating => 0.75,
            Stage::Portrait => 0.25,
            Stage::Complete | Stage::Error => 0.0,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(Stage::Queued),
            "processing" => Ok(Stage::Processing),
            "generating" => Ok(Stage::Generating),
            "portrait" => Ok(Stage::Portrait),
            "complete" => Ok(Stage::Complete),
            "error" => Ok(Stage::Error),
            other => Err(format!("Unknown stage: {}", other)),
        }
    }
}

/// Polling contract returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub message: String,
    pub estimated_seconds: u32,
    pub progress_percent: u8,
}

/// Maps a stage to a user-facing report
#[derive(Debug, Clone, Copy)]
pub struct StatusReporter {
    average_job_seconds: u32,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(20)
    }
}

impl StatusReporter {
    pub fn new(average_job_seconds: u32) -> Self {
        Self {
            average_job_seconds: average_job_seconds.max(1),
        }
    }

    pub fn average_job_seconds(&self) -> u32 {
        self.average_job_seconds
    }

    pub fn report(&self, stage: Stage, position: Option<usize>) -> StatusReport {
        let own = (f64::from(self.average_job_seconds) * stage.remaining_share()).round() as u32;
        let message = match (stage, position) {
            (Stage::Queued, Some(position)) if position > 0 => {
                let ahead = if position == 1 {
                    "1 request".to_string()
                } else {
                    format!("{} requests", position)
                };
                format!("Waiting in queue: {} ahead of yours", ahead)
            }
            (Stage::Queued, _) => "Your request is next in line".to_string(),
            (Stage::Processing, _) => "Preparing your request".to_string(),
            (Stage::Generating, _) => "Generating content".to_string(),
            (Stage::Portrait, _) => "Creating portrait".to_string(),
            (Stage::Complete, _) => "Generation complete".to_string(),
            (Stage::Error, _) => "Generation failed".to_string(),
        };
        let waiting = match (stage, position) {
            (Stage::Queued, Some(position)) => {
                let position = u32::try_from(position).unwrap_or(u32::MAX);
                position.saturating_mul(self.average_job_seconds)
            }
            _ => 0,
        };

        StatusReport {
            message,
            estimated_seconds: waiting.saturating_add(own),
            progress_percent: stage.progress_percent(),
        }
    }
}
