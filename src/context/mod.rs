//! In-memory business facts per session key.
//!
//! Lost on restart. Personas read the flattened summary to orient themselves
//! after a handoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::db::models::{BusinessPhase, BusinessPlan};

pub const DEFAULT_CONTEXT_KEY: &str = "default";

pub const EMPTY_SUMMARY: &str = "No business context available yet.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_idea: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<BusinessPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_plan: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl BusinessContext {
    /// Overlays every field present in `partial`.
    fn merge(&mut self, partial: BusinessContext) {
        macro_rules! overlay {
            ($($field:ident),+) => {
                $(if partial.$field.is_some() {
                    self.$field = partial.$field;
                })+
            };
        }
        overlay!(
            business_id,
            business_name,
            business_idea,
            target_market,
            revenue_model,
            timeline,
            budget,
            current_phase,
            approved_plan,
            conversation_summary
        );
    }

    pub fn summary(&self) -> String {
        let phase = self.current_phase.map(|p| p.as_str().to_string());
        let lines: Vec<String> = [
            ("Business", &self.business_name),
            ("Idea", &self.business_idea),
            ("Target Market", &self.target_market),
            ("Revenue Model", &self.revenue_model),
            ("Timeline", &self.timeline),
            ("Budget", &self.budget),
            ("Current Phase", &phase),
            ("Summary", &self.conversation_summary),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
        .collect();

        if lines.is_empty() {
            EMPTY_SUMMARY.to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl From<&BusinessPlan> for BusinessContext {
    fn from(plan: &BusinessPlan) -> Self {
        Self {
            business_id: Some(plan.business_id.clone()),
            business_name: Some(plan.business_name.clone()),
            business_idea: Some(plan.business_idea.clone()),
            target_market: Some(plan.target_market.clone()),
            revenue_model: Some(plan.revenue_model.clone()),
            timeline: plan.timeline.clone(),
            budget: plan.budget.clone(),
            current_phase: Some(plan.current_phase),
            approved_plan: None,
            conversation_summary: plan.conversation_summary.clone(),
            last_updated: None,
        }
    }
}

/// Keyed store of [`BusinessContext`] records. `None` keys map to
/// [`DEFAULT_CONTEXT_KEY`].
#[derive(Debug, Default)]
pub struct ContextStore {
    contexts: RwLock<HashMap<String, BusinessContext>>,
}

fn key_or_default(key: Option<&str>) -> &str {
    key.unwrap_or(DEFAULT_CONTEXT_KEY)
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored record, or an empty one.
    pub fn get(&self, key: Option<&str>) -> BusinessContext {
        let contexts = self.contexts.read().unwrap_or_else(|e| e.into_inner());
        contexts
            .get(key_or_default(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Shallow-merges `partial` into the stored record and stamps
    /// `last_updated`. Last write wins.
    pub fn update(&self, partial: BusinessContext, key: Option<&str>) -> BusinessContext {
        let mut contexts = self.contexts.write().unwrap_or_else(|e| e.into_inner());
        let entry = contexts.entry(key_or_default(key).to_string()).or_default();
        entry.merge(partial);
        entry.last_updated = Some(Utc::now());
        entry.clone()
    }

    pub fn clear(&self, key: Option<&str>) {
        let mut contexts = self.contexts.write().unwrap_or_else(|e| e.into_inner());
        contexts.remove(key_or_default(key));
    }

    pub fn summarize(&self, key: Option<&str>) -> String {
        self.get(key).summary()
    }
}
