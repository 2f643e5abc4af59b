use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::db::models::{Department, Priority, Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("Task {0} not found.")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.department.map_or(true, |d| task.department == d)
            && self.status.map_or(true, |s| task.status == s)
    }
}

/// A progress report against one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub status: TaskStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub blockers: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    pub by_department: BTreeMap<Department, usize>,
    pub total_estimated_hours: f64,
}

/// Tasks of one business, keyed by id and kept in first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskRegister {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    /// Inserts or replaces by id; a replaced task keeps its position.
    /// Dependency ids are not checked.
    pub fn upsert_many(&mut self, tasks: Vec<Task>) -> Vec<Task> {
        let mut stored = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.index.get(&task.id) {
                Some(&i) => self.tasks[i] = task.clone(),
                None => {
                    self.index.insert(task.id.clone(), self.tasks.len());
                    self.tasks.push(task.clone());
                }
            }
            stored.push(task);
        }
        stored
    }

    pub fn filter(&self, filter: &TaskFilter) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    /// Records progress on a task. Completing stamps `completed_at` once and
    /// reopening clears it; replaying the same update leaves the task as it was.
    pub fn update_one(&mut self, id: &str, progress: TaskProgress) -> Result<Task, RegisterError> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| RegisterError::NotFound(id.to_string()))?;
        let now = Utc::now();
        let task = &mut self.tasks[i];

        task.status = progress.status;
        if let Some(notes) = progress.notes {
            task.notes = Some(notes);
        }
        if let Some(blockers) = progress.blockers {
            task.blockers = Some(blockers);
        }
        if task.status == TaskStatus::Completed {
            task.completed_at.get_or_insert(now);
        } else {
            task.completed_at = None;
        }
        task.updated_at = Some(now);

        Ok(task.clone())
    }

    /// Moves the named tasks to in-progress, optionally overriding their
    /// priority. Unknown ids are skipped.
    pub fn delegate(&mut self, ids: &[String], priority: Option<Priority>) -> Vec<Task> {
        let now = Utc::now();
        let mut delegated = Vec::new();
        for id in ids {
            if let Some(&i) = self.index.get(id) {
                let task = &mut self.tasks[i];
                task.status = TaskStatus::InProgress;
                task.delegated_at = Some(now);
                if let Some(priority) = priority {
                    task.priority = priority;
                }
                delegated.push(task.clone());
            }
        }
        delegated
    }
}

pub fn summarize_counts(tasks: &[Task]) -> TaskSummary {
    let mut by_status = BTreeMap::new();
    let mut by_department = BTreeMap::new();
    for task in tasks {
        *by_status.entry(task.status).or_insert(0) += 1;
        *by_department.entry(task.department).or_insert(0) += 1;
    }

    TaskSummary {
        total: tasks.len(),
        by_status,
        by_department,
        total_estimated_hours: tasks.iter().map(|t| t.estimated_hours).sum(),
    }
}
