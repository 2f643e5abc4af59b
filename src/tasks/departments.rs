use serde::Serialize;

use crate::db::models::Department;

/// The producer persona that does a department's work and the reviewer
/// persona that checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentPair {
    pub producer: &'static str,
    pub reviewer: &'static str,
}

impl Department {
    pub fn team(self) -> AgentPair {
        let (producer, reviewer) = match self {
            Department::Technical => ("Developer", "CodeReviewer"),
            Department::Marketing => ("Marketing", "PerformanceAnalytics"),
            Department::Sales => ("Sales", "SalesPerformance"),
            Department::Legal => ("Legal", "ComplianceReview"),
            Department::Finance => ("Finance", "FinancialAudit"),
            Department::Operations => ("Operations", "QualityAssurance"),
            Department::Hr => ("HR", "HRCompliance"),
        };
        AgentPair { producer, reviewer }
    }

    /// Case-insensitive substring match used by focus-area filters, so
    /// "tech" selects Technical and "hr" selects HR.
    pub fn matches_focus(self, area: &str) -> bool {
        let area = area.trim().to_lowercase();
        !area.is_empty() && self.as_str().to_lowercase().contains(&area)
    }
}
