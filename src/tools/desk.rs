use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::context::{BusinessContext, ContextStore, DEFAULT_CONTEXT_KEY};
use crate::db::models::{BusinessPhase, BusinessPlan, Department, Priority};
use crate::tasks::{catalog, summarize_counts, RegisterError, TaskProgress, TaskRegister};
use crate::tools::{
    ApprovalType, Command, CommandError, CommandOutput, DelegateToTeam, GenerateBusinessPlan,
    GenerateTasks, RequestApproval, UpdateTaskProgress,
};

const DEFAULT_TIMELINE: &str = "90 days";
const DEFAULT_BUDGET: &str = "To be determined";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: String,
    pub approval_type: ApprovalType,
    pub title: String,
    pub description: String,
    pub impact: Priority,
    pub estimated_cost: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
}

impl From<RegisterError> for CommandError {
    fn from(e: RegisterError) -> Self {
        CommandError::NotFound(e.to_string())
    }
}

/// The state the commands work on, held explicitly instead of as globals.
///
/// Context records are keyed by scope (usually a session id). Plans and task
/// registers are keyed by business id; a scope finds its business through the
/// `businessId` of its context.
#[derive(Default)]
pub struct BusinessDesk {
    contexts: ContextStore,
    plans: RwLock<HashMap<String, BusinessPlan>>,
    registers: RwLock<HashMap<String, TaskRegister>>,
    approvals: RwLock<HashMap<String, Approval>>,
}

fn required(value: &str, field: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        Err(CommandError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

impl BusinessDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contexts(&self) -> &ContextStore {
        &self.contexts
    }

    pub fn plan(&self, business_id: &str) -> Option<BusinessPlan> {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(business_id)
            .cloned()
    }

    pub fn approval(&self, id: &str) -> Option<Approval> {
        self.approvals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn business_of(&self, scope: &str) -> Option<String> {
        self.contexts.get(Some(scope)).business_id
    }

    fn with_register<T>(&self, business_id: &str, op: impl FnOnce(&mut TaskRegister) -> T) -> T {
        let mut registers = self.registers.write().unwrap_or_else(PoisonError::into_inner);
        op(registers.entry(business_id.to_string()).or_default())
    }

    /// Runs one command within `scope`. `None` means the default scope.
    pub fn execute(&self, scope: Option<&str>, command: Command) -> Result<CommandOutput, CommandError> {
        let scope = scope.unwrap_or(DEFAULT_CONTEXT_KEY);
        info!(scope, command = command.name(), "Executing command");

        match command {
            Command::GenerateBusinessPlan(input) => self.generate_plan(scope, input),
            Command::GenerateTasks(input) => self.generate_tasks(scope, input),
            Command::RequestApproval(input) => self.request_approval(input),
            Command::DelegateToTeam(input) => self.delegate(scope, input),
            Command::GetTaskStatus(filter) => {
                let (business_id, tasks) = match self.business_of(scope) {
                    Some(id) => {
                        let tasks = self.with_register(&id, |r| r.filter(&filter));
                        (Some(id), tasks)
                    }
                    None => (None, Vec::new()),
                };
                let mut message = format!("Found {} task(s)", tasks.len());
                if let Some(department) = filter.department {
                    message.push_str(&format!(" in {}", department));
                }
                if let Some(status) = filter.status {
                    message.push_str(&format!(" with status {}", status));
                }
                message.push('.');
                Ok(CommandOutput::Tasks {
                    business_id,
                    summary: summarize_counts(&tasks),
                    tasks,
                    message,
                })
            }
            Command::UpdateTaskProgress(input) => self.update_progress(scope, input),
            Command::UpdateBusinessContext(partial) => {
                let context = self.contexts.update(partial, Some(scope));
                Ok(CommandOutput::Context {
                    summary: context.summary(),
                    context,
                })
            }
            Command::GetBusinessContext => {
                let context = self.contexts.get(Some(scope));
                Ok(CommandOutput::Context {
                    summary: context.summary(),
                    context,
                })
            }
        }
    }

    fn generate_plan(&self, scope: &str, input: GenerateBusinessPlan) -> Result<CommandOutput, CommandError> {
        required(&input.business_name, "businessName")?;
        required(&input.business_idea, "businessIdea")?;
        required(&input.target_market, "targetMarket")?;
        required(&input.revenue_model, "revenueModel")?;

        let business_id = format!("biz_{}", Uuid::new_v4().simple());
        let outline = |d: Department| Some(catalog::department_outline(d).to_string());
        let now = Utc::now();
        let plan = BusinessPlan {
            business_id: business_id.clone(),
            session_id: scope.to_string(),
            business_name: input.business_name,
            business_idea: input.business_idea,
            target_market: input.target_market,
            revenue_model: input.revenue_model,
            timeline: Some(input.timeline.unwrap_or_else(|| DEFAULT_TIMELINE.to_string())),
            budget: Some(input.budget.unwrap_or_else(|| DEFAULT_BUDGET.to_string())),
            technical_plan: outline(Department::Technical),
            marketing_plan: outline(Department::Marketing),
            sales_plan: outline(Department::Sales),
            legal_plan: outline(Department::Legal),
            finance_plan: outline(Department::Finance),
            operations_plan: outline(Department::Operations),
            hr_plan: outline(Department::Hr),
            current_phase: BusinessPhase::Planning,
            conversation_summary: None,
            created_at: now,
            updated_at: now,
        };

        self.plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(business_id.clone(), plan.clone());
        self.contexts.update(BusinessContext::from(&plan), Some(scope));

        let message = format!(
            "Business plan created for \"{}\" covering all 7 departments. Ready to generate tasks.",
            plan.business_name
        );
        Ok(CommandOutput::BusinessPlan {
            business_id,
            plan,
            message,
        })
    }

    fn generate_tasks(&self, scope: &str, input: GenerateTasks) -> Result<CommandOutput, CommandError> {
        let business_id = input
            .business_id
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.business_of(scope))
            .ok_or_else(|| {
                CommandError::NotFound(
                    "Business plan not found. Please generate a business plan first.".into(),
                )
            })?;
        if self.plan(&business_id).is_none() {
            return Err(CommandError::NotFound(
                "Business plan not found. Please generate a business plan first.".into(),
            ));
        }

        let generated = catalog::generate(&business_id, &input.focus_areas);
        let tasks = self.with_register(&business_id, |r| r.upsert_many(generated));
        let summary = summarize_counts(&tasks);
        let message = format!(
            "Generated {} tasks. Total estimated effort: {} hours.",
            summary.total, summary.total_estimated_hours
        );
        Ok(CommandOutput::Tasks {
            business_id: Some(business_id),
            tasks,
            summary,
            message,
        })
    }

    fn request_approval(&self, input: RequestApproval) -> Result<CommandOutput, CommandError> {
        required(&input.title, "title")?;
        required(&input.description, "description")?;

        let approval = Approval {
            id: format!("approval_{}", Uuid::new_v4().simple()),
            approval_type: input.approval_type,
            title: input.title,
            description: input.description,
            impact: input.impact,
            estimated_cost: input.estimated_cost.unwrap_or_else(|| "N/A".to_string()),
            status: "pending".to_string(),
            requested_at: Utc::now(),
        };
        self.approvals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(approval.id.clone(), approval.clone());

        let message = format!(
            "Approval requested: \"{}\". Impact: {}. Waiting for the entrepreneur to approve.",
            approval.title, approval.impact
        );
        Ok(CommandOutput::Approval { approval, message })
    }

    fn delegate(&self, scope: &str, input: DelegateToTeam) -> Result<CommandOutput, CommandError> {
        let business_id = self
            .business_of(scope)
            .ok_or_else(|| CommandError::NotFound("no business in this scope".into()))?;
        let tasks = self.with_register(&business_id, |r| r.delegate(&input.task_ids, input.priority));

        let team = input.department.team();
        let mut message = format!(
            "Delegated {} task(s) to the {} team ({} with {} reviewing).",
            tasks.len(),
            input.department,
            team.producer,
            team.reviewer
        );
        if let Some(instructions) = &input.instructions {
            message.push_str(&format!(" Instructions: {}", instructions));
        }
        Ok(CommandOutput::Delegated {
            business_id,
            department: input.department,
            tasks,
            message,
        })
    }

    fn update_progress(&self, scope: &str, input: UpdateTaskProgress) -> Result<CommandOutput, CommandError> {
        let business_id = self
            .business_of(scope)
            .ok_or_else(|| CommandError::NotFound(format!("Task {} not found.", input.task_id)))?;
        let progress = TaskProgress {
            status: input.status,
            notes: input.notes,
            blockers: input.blockers,
        };
        let task = self.with_register(&business_id, |r| r.update_one(&input.task_id, progress))?;

        let message = format!("Task \"{}\" updated to status: {}.", task.title, task.status);
        Ok(CommandOutput::TaskUpdated {
            business_id,
            task,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TaskStatus;
    use crate::tasks::TaskFilter;

    fn plan_input() -> Command {
        Command::GenerateBusinessPlan(GenerateBusinessPlan {
            business_name: "Acme".into(),
            business_idea: "Anvils as a service".into(),
            target_market: "Coyotes".into(),
            revenue_model: "Subscription".into(),
            timeline: None,
            budget: None,
        })
    }

    fn business_id(output: CommandOutput) -> String {
        match output {
            CommandOutput::BusinessPlan { business_id, .. } => business_id,
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn plan_fills_context_of_its_scope_only() {
        let desk = BusinessDesk::new();
        let id = business_id(desk.execute(Some("s1"), plan_input()).unwrap());

        let plan = desk.plan(&id).unwrap();
        assert_eq!(plan.timeline.as_deref(), Some("90 days"));
        assert!(plan.legal_plan.as_deref().unwrap().contains("critical priority"));

        let context = desk.contexts().get(Some("s1"));
        assert_eq!(context.business_id.as_deref(), Some(id.as_str()));
        assert!(context.summary().starts_with("Business: Acme\nIdea: Anvils as a service"));
        assert_eq!(desk.contexts().get(Some("s2")), BusinessContext::default());
    }

    #[test]
    fn tasks_need_a_plan() {
        let desk = BusinessDesk::new();
        let err = desk
            .execute(None, Command::GenerateTasks(GenerateTasks::default()))
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn generate_delegate_and_complete() {
        let desk = BusinessDesk::new();
        desk.execute(Some("s1"), plan_input()).unwrap();

        let generated = desk
            .execute(
                Some("s1"),
                Command::GenerateTasks(GenerateTasks {
                    business_id: None,
                    focus_areas: vec!["tech".into()],
                }),
            )
            .unwrap();
        match generated {
            CommandOutput::Tasks { tasks, summary, .. } => {
                assert_eq!(tasks.len(), 6);
                assert_eq!(summary.total_estimated_hours, 148.0);
            }
            other => panic!("unexpected output {:?}", other),
        }

        desk.execute(
            Some("s1"),
            Command::DelegateToTeam(DelegateToTeam {
                task_ids: vec!["tech_001".into(), "tech_002".into()],
                department: Department::Technical,
                priority: None,
                instructions: None,
            }),
        )
        .unwrap();

        desk.execute(
            Some("s1"),
            Command::UpdateTaskProgress(UpdateTaskProgress {
                task_id: "tech_001".into(),
                status: TaskStatus::Completed,
                notes: Some("pipeline green".into()),
                blockers: None,
            }),
        )
        .unwrap();

        let status = desk
            .execute(
                Some("s1"),
                Command::GetTaskStatus(TaskFilter {
                    department: None,
                    status: Some(TaskStatus::InProgress),
                }),
            )
            .unwrap();
        match status {
            CommandOutput::Tasks { tasks, message, .. } => {
                assert_eq!(tasks.len(), 1);
                assert_eq!(tasks[0].id, "tech_002");
                assert_eq!(message, "Found 1 task(s) with status in_progress.");
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn unknown_task_is_reported_not_thrown() {
        let desk = BusinessDesk::new();
        desk.execute(None, plan_input()).unwrap();
        let err = desk
            .execute(
                None,
                Command::UpdateTaskProgress(UpdateTaskProgress {
                    task_id: "ghost".into(),
                    status: TaskStatus::Blocked,
                    notes: None,
                    blockers: None,
                }),
            )
            .unwrap_err();
        assert_eq!(err, CommandError::NotFound("Task ghost not found.".into()));
    }

    #[test]
    fn approvals_are_recorded_pending() {
        let desk = BusinessDesk::new();
        let output = desk
            .execute(
                None,
                Command::RequestApproval(RequestApproval {
                    approval_type: ApprovalType::Spending,
                    title: "Buy servers".into(),
                    description: "Two racks".into(),
                    impact: Priority::High,
                    estimated_cost: None,
                }),
            )
            .unwrap();
        let CommandOutput::Approval { approval, .. } = output else {
            panic!("expected approval");
        };
        assert_eq!(approval.estimated_cost, "N/A");
        assert_eq!(desk.approval(&approval.id).unwrap().status, "pending");
    }
}
