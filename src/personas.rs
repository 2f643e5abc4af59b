//! The persona roster of the business-builder scenario and its handoff graph.
//!
//! Personas are played by the external realtime SDK; this module only knows
//! who exists and who may hand the conversation to whom.

use serde::Serialize;

use crate::db::models::Department;

pub const CEO: &str = "CEO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaRole {
    Executive,
    Producer,
    Reviewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: &'static str,
    pub role: PersonaRole,
    pub department: Option<Department>,
    pub voice: &'static str,
}

const fn persona(
    name: &'static str,
    role: PersonaRole,
    department: Option<Department>,
    voice: &'static str,
) -> Persona {
    Persona {
        name,
        role,
        department,
        voice,
    }
}

use PersonaRole::{Executive, Producer, Reviewer};

pub const ROSTER: &[Persona] = &[
    persona(CEO, Executive, None, "alloy"),
    persona("Developer", Producer, Some(Department::Technical), "echo"),
    persona("CodeReviewer", Reviewer, Some(Department::Technical), "fable"),
    persona("Marketing", Producer, Some(Department::Marketing), "nova"),
    persona("PerformanceAnalytics", Reviewer, Some(Department::Marketing), "shimmer"),
    persona("Sales", Producer, Some(Department::Sales), "onyx"),
    persona("SalesPerformance", Reviewer, Some(Department::Sales), "alloy"),
    persona("Legal", Producer, Some(Department::Legal), "echo"),
    persona("ComplianceReview", Reviewer, Some(Department::Legal), "fable"),
    persona("Finance", Producer, Some(Department::Finance), "nova"),
    persona("FinancialAudit", Reviewer, Some(Department::Finance), "shimmer"),
    persona("Operations", Producer, Some(Department::Operations), "onyx"),
    persona("QualityAssurance", Reviewer, Some(Department::Operations), "alloy"),
    persona("HR", Producer, Some(Department::Hr), "echo"),
    persona("HRCompliance", Reviewer, Some(Department::Hr), "fable"),
];

pub fn find(name: &str) -> Option<&'static Persona> {
    ROSTER.iter().find(|p| p.name == name)
}

pub fn department_of(name: &str) -> Option<Department> {
    find(name).and_then(|p| p.department)
}

/// Personas `name` may hand the conversation to.
///
/// The CEO reaches every producer. A producer reaches its reviewer and the
/// CEO; a reviewer reaches its producer and the CEO.
pub fn handoffs(name: &str) -> Vec<&'static str> {
    let Some(persona) = find(name) else {
        return Vec::new();
    };

    match (persona.role, persona.department) {
        (Executive, _) => Department::ALL.iter().map(|d| d.team().producer).collect(),
        (Producer, Some(department)) => vec![department.team().reviewer, CEO],
        (Reviewer, Some(department)) => vec![department.team().producer, CEO],
        _ => Vec::new(),
    }
}

pub fn can_hand_off(from: &str, to: &str) -> bool {
    handoffs(from).contains(&to)
}
