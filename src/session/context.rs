//! Session classification: context, kind and priority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocWardenError;

/// Who is driving a session, which decides its TTL and whether it may be
/// evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionContext {
    /// Human-in-the-loop review. No TTL, exempt by default.
    HumanValidation,
    /// Human and automation working together. No TTL, exempt by default.
    Collaborative,
    /// Machine-only processing.
    Automated,
    /// Screenshots, conversions and cleanup.
    Background,
}

impl SessionContext {
    /// All contexts, in declaration order.
    pub const ALL: [SessionContext; 4] = [
        SessionContext::HumanValidation,
        SessionContext::Collaborative,
        SessionContext::Automated,
        SessionContext::Background,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionContext::HumanValidation => "human_validation",
            SessionContext::Collaborative => "collaborative",
            SessionContext::Automated => "automated",
            SessionContext::Background => "background",
        }
    }

    /// Whether sessions in this context start out exempt from auto-closure.
    pub fn exempt_by_default(&self) -> bool {
        matches!(
            self,
            SessionContext::HumanValidation | SessionContext::Collaborative
        )
    }

    /// Whether the priority eviction pass may consider this context.
    pub fn is_evictable(&self) -> bool {
        matches!(self, SessionContext::Automated | SessionContext::Background)
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionContext {
    type Err = DocWardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "human_validation" | "human" => Ok(SessionContext::HumanValidation),
            "collaborative" => Ok(SessionContext::Collaborative),
            "automated" => Ok(SessionContext::Automated),
            "background" => Ok(SessionContext::Background),
            _ => Err(DocWardenError::InvalidContext(s.into())),
        }
    }
}

/// How a document is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Visible window for review. Only one ungrouped, non-exempt
    /// interactive session is kept at a time.
    Interactive,
    /// Headless work.
    Background,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Interactive => "interactive",
            SessionKind::Background => "background",
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, SessionKind::Interactive)
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority class of a session. Level 1 is the highest priority.
///
/// The derived ordering follows the numeric level, so a *greater* value is a
/// *worse* priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Template cross-validation.
    CriticalValidation = 1,
    /// Current client deliverables.
    ActiveClientWork = 2,
    /// Template comparison and pricing.
    #[default]
    ComparativeAnalysis = 3,
    /// Automated generation workflows.
    BatchProcessing = 4,
    /// Screenshots, conversions, cleanup.
    BackgroundTasks = 5,
}

impl Priority {
    /// Numeric level (1-5).
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Whether `self` ranks strictly below `other`.
    pub fn is_lower_than(self, other: Priority) -> bool {
        self.level() > other.level()
    }

    pub fn name(self) -> &'static str {
        match self {
            Priority::CriticalValidation => "critical_validation",
            Priority::ActiveClientWork => "active_client_work",
            Priority::ComparativeAnalysis => "comparative_analysis",
            Priority::BatchProcessing => "batch_processing",
            Priority::BackgroundTasks => "background_tasks",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = DocWardenError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Priority::CriticalValidation),
            2 => Ok(Priority::ActiveClientWork),
            3 => Ok(Priority::ComparativeAnalysis),
            4 => Ok(Priority::BatchProcessing),
            5 => Ok(Priority::BackgroundTasks),
            _ => Err(DocWardenError::InvalidPriority(level.to_string())),
        }
    }
}

impl FromStr for Priority {
    type Err = DocWardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(level) = trimmed.parse::<u8>() {
            return Priority::try_from(level);
        }
        let normalized = trimmed.to_ascii_lowercase().replace('-', "_");
        [
            Priority::CriticalValidation,
            Priority::ActiveClientWork,
            Priority::ComparativeAnalysis,
            Priority::BatchProcessing,
            Priority::BackgroundTasks,
        ]
        .into_iter()
        .find(|p| p.name() == normalized)
        .ok_or_else(|| DocWardenError::InvalidPriority(s.into()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{} {}", self.level(), self.name())
    }
}
