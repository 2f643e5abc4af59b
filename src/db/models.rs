use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a unit enum stored as a fixed string column, with `as_str`,
/// `FromStr` and `Display` kept in one table.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Lifecycle of a session. Sessions are never deleted, only completed.
    SessionStatus {
        Active => "active",
        Completed => "completed",
    }
);

string_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
});

string_enum!(EventDirection {
    Client => "client",
    Server => "server",
});

string_enum!(
    /// Any status may follow any other; no transition rules are enforced.
    TaskStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Review => "review",
        Completed => "completed",
        Blocked => "blocked",
    }
);

string_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

string_enum!(BusinessPhase {
    Discovery => "discovery",
    Planning => "planning",
    Execution => "execution",
    Monitoring => "monitoring",
});

string_enum!(Department {
    Technical => "Technical",
    Marketing => "Marketing",
    Sales => "Sales",
    Legal => "Legal",
    Finance => "Finance",
    Operations => "Operations",
    Hr => "HR",
});

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Default for BusinessPhase {
    fn default() -> Self {
        BusinessPhase::Planning
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub agent_config: String,
    pub active_agent: Option<String>,
    pub status: SessionStatus,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A session together with everything keyed off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: Session,
    pub messages: Vec<Message>,
    pub events: Vec<Event>,
    pub tasks: Vec<Task>,
    pub business_plan: Option<BusinessPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub is_simulated: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub session_id: String,
    pub direction: EventDirection,
    pub event_name: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A unit of launch work owned by one department.
///
/// `dependencies` are advisory: nothing checks that they exist or that they
/// complete first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub business_id: Option<String>,
    pub department: Department,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default)]
    pub reviewed_by: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub blockers: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub delegated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPlan {
    pub business_id: String,
    pub session_id: String,
    pub business_name: String,
    pub business_idea: String,
    pub target_market: String,
    pub revenue_model: String,
    pub timeline: Option<String>,
    pub budget: Option<String>,
    pub technical_plan: Option<String>,
    pub marketing_plan: Option<String>,
    pub sales_plan: Option<String>,
    pub legal_plan: Option<String>,
    pub finance_plan: Option<String>,
    pub operations_plan: Option<String>,
    pub hr_plan: Option<String>,
    pub current_phase: BusinessPhase,
    pub conversation_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BusinessPlan {
    /// The plan text for one department.
    pub fn department_plan(&self, department: Department) -> Option<&str> {
        match department {
            Department::Technical => self.technical_plan.as_deref(),
            Department::Marketing => self.marketing_plan.as_deref(),
            Department::Sales => self.sales_plan.as_deref(),
            Department::Legal => self.legal_plan.as_deref(),
            Department::Finance => self.finance_plan.as_deref(),
            Department::Operations => self.operations_plan.as_deref(),
            Department::Hr => self.hr_plan.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_their_wire_names() {
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
        assert_eq!("HR".parse::<Department>(), Ok(Department::Hr));
        assert_eq!(
            serde_json::to_value(Department::Technical).unwrap(),
            serde_json::json!("Technical")
        );
        assert!("archived".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn task_deserializes_with_defaults() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "department": "Technical",
            "title": "Set up CI"
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.dependencies.is_empty());
        assert!(task.completed_at.is_none());
    }
}
