//! Typed commands the CEO persona can run against a [`BusinessDesk`].
//!
//! Each command has a JSON-schema definition so an external agent runtime
//! can expose it as a function tool.

pub mod desk;

pub use desk::{Approval, BusinessDesk};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::context::BusinessContext;
use crate::db::models::{BusinessPlan, Department, Priority, Task, TaskStatus};
use crate::tasks::{TaskFilter, TaskSummary};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Validation Error: {0}")]
    Validation(String),
    #[error("Not Found: {0}")]
    NotFound(String),
}

impl CommandError {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::Validation(_) => "validation",
            CommandError::NotFound(_) => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBusinessPlan {
    pub business_name: String,
    pub business_idea: String,
    pub target_market: String,
    pub revenue_model: String,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTasks {
    /// Defaults to the business generated in the same scope.
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalType {
    BusinessPlan,
    TaskList,
    Spending,
    StrategicDecision,
    Milestone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestApproval {
    pub approval_type: ApprovalType,
    pub title: String,
    pub description: String,
    pub impact: Priority,
    #[serde(default)]
    pub estimated_cost: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateToTeam {
    pub task_ids: Vec<String>,
    pub department: Department,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskProgress {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub blockers: Option<String>,
}

/// `{"command": "<name>", "input": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "input", rename_all = "camelCase")]
pub enum Command {
    GenerateBusinessPlan(GenerateBusinessPlan),
    GenerateTasks(GenerateTasks),
    RequestApproval(RequestApproval),
    DelegateToTeam(DelegateToTeam),
    GetTaskStatus(TaskFilter),
    UpdateTaskProgress(UpdateTaskProgress),
    UpdateBusinessContext(BusinessContext),
    GetBusinessContext,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GenerateBusinessPlan(_) => "generateBusinessPlan",
            Command::GenerateTasks(_) => "generateTasks",
            Command::RequestApproval(_) => "requestApproval",
            Command::DelegateToTeam(_) => "delegateToTeam",
            Command::GetTaskStatus(_) => "getTaskStatus",
            Command::UpdateTaskProgress(_) => "updateTaskProgress",
            Command::UpdateBusinessContext(_) => "updateBusinessContext",
            Command::GetBusinessContext => "getBusinessContext",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommandOutput {
    BusinessPlan {
        business_id: String,
        plan: BusinessPlan,
        message: String,
    },
    Tasks {
        business_id: Option<String>,
        tasks: Vec<Task>,
        summary: TaskSummary,
        message: String,
    },
    Approval {
        approval: Approval,
        message: String,
    },
    Delegated {
        business_id: String,
        department: Department,
        tasks: Vec<Task>,
        message: String,
    },
    TaskUpdated {
        business_id: String,
        task: Task,
        message: String,
    },
    Context {
        context: BusinessContext,
        summary: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

fn tool(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        r#type: "function".to_string(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

fn names<T: Copy + Serialize>(all: &[T]) -> Vec<Value> {
    all.iter().filter_map(|v| serde_json::to_value(v).ok()).collect()
}

pub fn definitions() -> Vec<ToolDefinition> {
    let departments = names(Department::ALL);
    let statuses = names(TaskStatus::ALL);
    let priorities = names(Priority::ALL);

    vec![
        tool(
            "generateBusinessPlan",
            "Generate a business plan covering all seven departments from the strategic conversation.",
            json!({
                "type": "object",
                "properties": {
                    "businessName": {"type": "string", "description": "Name of the business"},
                    "businessIdea": {"type": "string", "description": "Core idea and value proposition"},
                    "targetMarket": {"type": "string", "description": "Target market and customer segments"},
                    "revenueModel": {"type": "string", "description": "Revenue model and pricing strategy"},
                    "timeline": {"type": "string", "description": "Expected launch timeline, e.g. \"90 days\""},
                    "budget": {"type": "string", "description": "Available budget or funding"}
                },
                "required": ["businessName", "businessIdea", "targetMarket", "revenueModel"],
                "additionalProperties": false
            }),
        ),
        tool(
            "generateTasks",
            "Generate the launch task list for a business, optionally narrowed to focus areas.",
            json!({
                "type": "object",
                "properties": {
                    "businessId": {"type": "string", "description": "Business id from the generated plan"},
                    "focusAreas": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Departments to focus on, e.g. [\"technical\", \"marketing\"]"
                    }
                },
                "additionalProperties": false
            }),
        ),
        tool(
            "requestApproval",
            "Ask the entrepreneur to approve a plan, spending or another high-impact decision.",
            json!({
                "type": "object",
                "properties": {
                    "approvalType": {
                        "type": "string",
                        "enum": ["business_plan", "task_list", "spending", "strategic_decision", "milestone"]
                    },
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "impact": {"type": "string", "enum": priorities},
                    "estimatedCost": {"type": "string", "description": "e.g. \"$5,000\" or \"N/A\""}
                },
                "required": ["approvalType", "title", "description", "impact"],
                "additionalProperties": false
            }),
        ),
        tool(
            "delegateToTeam",
            "Hand tasks to a department's producer and reviewer pair.",
            json!({
                "type": "object",
                "properties": {
                    "taskIds": {"type": "array", "items": {"type": "string"}},
                    "department": {"type": "string", "enum": departments},
                    "priority": {"type": "string", "enum": priorities},
                    "instructions": {"type": "string"}
                },
                "required": ["taskIds", "department"],
                "additionalProperties": false
            }),
        ),
        tool(
            "getTaskStatus",
            "List tasks with counts by status and department.",
            json!({
                "type": "object",
                "properties": {
                    "department": {"type": "string", "enum": departments},
                    "status": {"type": "string", "enum": statuses}
                },
                "additionalProperties": false
            }),
        ),
        tool(
            "updateTaskProgress",
            "Record progress, completion or blockers on one task.",
            json!({
                "type": "object",
                "properties": {
                    "taskId": {"type": "string"},
                    "status": {"type": "string", "enum": statuses},
                    "notes": {"type": "string"},
                    "blockers": {"type": "string"}
                },
                "required": ["taskId", "status"],
                "additionalProperties": false
            }),
        ),
        tool(
            "updateBusinessContext",
            "Merge facts about the business into the shared context.",
            json!({
                "type": "object",
                "properties": {
                    "businessName": {"type": "string"},
                    "businessIdea": {"type": "string"},
                    "targetMarket": {"type": "string"},
                    "revenueModel": {"type": "string"},
                    "timeline": {"type": "string"},
                    "budget": {"type": "string"},
                    "currentPhase": {"type": "string", "enum": ["discovery", "planning", "execution", "monitoring"]},
                    "approvedPlan": {"type": "boolean"},
                    "conversationSummary": {"type": "string"}
                },
                "additionalProperties": false
            }),
        ),
        tool(
            "getBusinessContext",
            "Read what is known about the business so far.",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
        ),
    ]
}
