//! Wire types for the query service's REST endpoints.
//!
//! The streamed answer itself is decoded by `gciqs_core`; these are the
//! plain JSON bodies around it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Health
// =============================================================================

/// Response from `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status (`ok` when healthy).
    pub status: String,
    /// Number of documents in the retrieval index.
    #[serde(default)]
    pub index_size: u64,
    /// Server clock as Unix seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Backend reachability as shown in the header bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    /// No health check has completed yet.
    #[default]
    Unknown,
    /// The last check succeeded.
    Online {
        /// Number of indexed documents.
        index_size: u64,
        /// When the check completed.
        checked_at: DateTime<Utc>,
    },
    /// The last check failed.
    Offline {
        /// When the check completed.
        checked_at: DateTime<Utc>,
    },
}

impl HealthStatus {
    /// Header text for this status.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Unknown => "checking...".to_string(),
            Self::Online { index_size, .. } => format!("online · {index_size} docs indexed"),
            Self::Offline { .. } => "backend offline".to_string(),
        }
    }

    /// When the last check completed, if one has.
    #[must_use]
    pub const fn checked_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unknown => None,
            Self::Online { checked_at, .. } | Self::Offline { checked_at } => Some(*checked_at),
        }
    }

    /// Color for displaying in the TUI.
    #[must_use]
    pub const fn color(&self) -> ratatui::style::Color {
        use ratatui::style::Color;
        match self {
            Self::Unknown => Color::Gray,
            Self::Online { .. } => Color::Green,
            Self::Offline { .. } => Color::Red,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Error body returned with a non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
