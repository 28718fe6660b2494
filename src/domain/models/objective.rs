//! Objective domain model.
//!
//! An objective is a user-level goal belonging to one swarm, decomposed
//! into an ordered list of tasks by a strategy template.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decomposition strategy for an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStrategy {
    Development,
    Research,
    Analysis,
    Testing,
    Optimization,
    /// Pick a concrete strategy by keyword heuristics; unresolved
    /// descriptions default to development.
    Auto,
}

impl Default for ObjectiveStrategy {
    fn default() -> Self {
        Self::Auto
    }
}

impl ObjectiveStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Testing => "testing",
            Self::Optimization => "optimization",
            Self::Auto => "auto",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" => Some(Self::Development),
            "research" => Some(Self::Research),
            "analysis" => Some(Self::Analysis),
            "testing" => Some(Self::Testing),
            "optimization" => Some(Self::Optimization),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Objective lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl Default for ObjectiveStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ObjectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "executing" => Some(Self::Executing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A high-level user goal owned by one swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: Uuid,
    pub swarm_id: Uuid,
    pub description: String,
    pub strategy: ObjectiveStrategy,
    pub status: ObjectiveStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Objective {
    pub fn new(swarm_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            swarm_id,
            description: description.into(),
            strategy: ObjectiveStrategy::default(),
            status: ObjectiveStatus::default(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_strategy(mut self, strategy: ObjectiveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn mark_executing(&mut self) {
        self.status = ObjectiveStatus::Executing;
    }

    pub fn mark_completed(&mut self) {
        self.status = ObjectiveStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = ObjectiveStatus::Failed;
        self.completed_at = Some(Utc::now());
    }
}

/// Resolve an `Auto` strategy by keyword heuristics over the description.
pub fn resolve_strategy(strategy: ObjectiveStrategy, description: &str) -> ObjectiveStrategy {
    if strategy != ObjectiveStrategy::Auto {
        return strategy;
    }
    let lower = description.to_lowercase();
    let matches_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if matches_any(&["research", "investigate", "explore", "survey"]) {
        ObjectiveStrategy::Research
    } else if matches_any(&["analyze", "analysis", "audit", "review"]) {
        ObjectiveStrategy::Analysis
    } else if matches_any(&["test", "verify", "validate", "qa"]) {
        ObjectiveStrategy::Testing
    } else if matches_any(&["optimize", "optimise", "speed up", "performance", "tune"]) {
        ObjectiveStrategy::Optimization
    } else {
        ObjectiveStrategy::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_lifecycle() {
        let mut obj = Objective::new(Uuid::new_v4(), "Build the thing");
        assert_eq!(obj.status, ObjectiveStatus::Pending);
        obj.mark_executing();
        assert_eq!(obj.status, ObjectiveStatus::Executing);
        obj.mark_completed();
        assert!(obj.status.is_terminal());
        assert!(obj.completed_at.is_some());
    }

    #[test]
    fn test_auto_strategy_keywords() {
        let auto = ObjectiveStrategy::Auto;
        assert_eq!(
            resolve_strategy(auto, "Research the best caching libraries"),
            ObjectiveStrategy::Research
        );
        assert_eq!(
            resolve_strategy(auto, "Analyze the access logs"),
            ObjectiveStrategy::Analysis
        );
        assert_eq!(
            resolve_strategy(auto, "Test the payment flow"),
            ObjectiveStrategy::Testing
        );
        assert_eq!(
            resolve_strategy(auto, "Optimize query performance"),
            ObjectiveStrategy::Optimization
        );
        // Unresolved defaults to development.
        assert_eq!(
            resolve_strategy(auto, "Ship the login page"),
            ObjectiveStrategy::Development
        );
    }

    #[test]
    fn test_explicit_strategy_not_overridden() {
        assert_eq!(
            resolve_strategy(ObjectiveStrategy::Testing, "Research everything"),
            ObjectiveStrategy::Testing
        );
    }
}
