use crate::db::models::{
    BusinessPlan, Department, Event, EventDirection, Message, MessageRole, Session, Task,
    TaskStatus,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use duckdb::{params, params_from_iter, types::Type, Connection, Result as DbResult, Row};
use std::str::FromStr;

const SESSION_COLUMNS: &str =
    "id, agent_config, active_agent, status, user_id, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, session_id, role, content, is_simulated, metadata, created_at";

const EVENT_COLUMNS: &str = "id, session_id, direction, event_name, event_data, created_at";

const TASK_COLUMNS: &str = "id, session_id, business_id, department, title, description, \
     assigned_to, reviewed_by, priority, estimated_hours, status, progress, notes, blockers, \
     dependencies, delegated_at, started_at, updated_at, completed_at, actual_hours";

const PLAN_COLUMNS: &str = "business_id, session_id, business_name, business_idea, \
     target_market, revenue_model, timeline, budget, technical_plan, marketing_plan, sales_plan, \
     legal_plan, finance_plan, operations_plan, hr_plan, current_phase, conversation_summary, \
     created_at, updated_at";

/// Filters for task listing; every field is optional and they combine with AND.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter<'a> {
    pub session_id: Option<&'a str>,
    pub business_id: Option<&'a str>,
    pub department: Option<Department>,
    pub status: Option<TaskStatus>,
}

/// A stored task with the key of its row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTask {
    pub key: i64,
    pub task: Task,
}

/// Uniqueness scope of a task id: its business, else its session.
pub fn task_scope(task: &Task) -> String {
    match (&task.business_id, &task.session_id) {
        (Some(business_id), _) => format!("business:{}", business_id),
        (None, Some(session_id)) => format!("session:{}", session_id),
        (None, None) => String::new(),
    }
}

/// Current time at the precision timestamps are stored with, so returned
/// records compare equal to what a later read yields.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn to_db_time(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn read_time(row: &Row, idx: usize) -> DbResult<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn read_opt_time(row: &Row, idx: usize) -> DbResult<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e))),
        None => Ok(None),
    }
}

fn read_enum<T: FromStr<Err = String>>(row: &Row, idx: usize) -> DbResult<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn read_json(row: &Row, idx: usize) -> DbResult<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn opt_time(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(to_db_time)
}

fn next_value(conn: &Connection, sequence: &str) -> DbResult<i64> {
    conn.query_row(&format!("SELECT nextval('{}')", sequence), [], |row| {
        row.get(0)
    })
}

pub struct DbService;

impl DbService {
    fn row_to_session(row: &Row) -> DbResult<Session> {
        Ok(Session {
            id: row.get(0)?,
            agent_config: row.get(1)?,
            active_agent: row.get(2)?,
            status: read_enum(row, 3)?,
            user_id: row.get(4)?,
            created_at: read_time(row, 5)?,
            updated_at: read_time(row, 6)?,
        })
    }

    fn row_to_message(row: &Row) -> DbResult<Message> {
        let metadata = match row.get::<_, Option<String>>(5)? {
            Some(raw) => {
                Some(serde_json::from_str(&raw).map_err(|e| conversion_error(5, e.to_string()))?)
            }
            None => None,
        };

        Ok(Message {
            id: row.get(0)?,
            session_id: row.get(1)?,
            role: read_enum::<MessageRole>(row, 2)?,
            content: row.get(3)?,
            is_simulated: row.get(4)?,
            metadata,
            created_at: read_time(row, 6)?,
        })
    }

    fn row_to_event(row: &Row) -> DbResult<Event> {
        Ok(Event {
            id: row.get(0)?,
            session_id: row.get(1)?,
            direction: read_enum::<EventDirection>(row, 2)?,
            event_name: row.get(3)?,
            event_data: read_json(row, 4)?,
            created_at: read_time(row, 5)?,
        })
    }

    fn row_to_task(row: &Row) -> DbResult<Task> {
        Self::row_to_task_at(row, 0)
    }

    /// Maps the task columns starting at column `base`.
    fn row_to_task_at(row: &Row, base: usize) -> DbResult<Task> {
        let dependencies = match read_json(row, base + 14)? {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Task {
            id: row.get(base)?,
            session_id: row.get(base + 1)?,
            business_id: row.get(base + 2)?,
            department: read_enum(row, base + 3)?,
            title: row.get(base + 4)?,
            description: row.get(base + 5)?,
            assigned_to: row.get(base + 6)?,
            reviewed_by: row.get(base + 7)?,
            priority: read_enum(row, base + 8)?,
            estimated_hours: row.get(base + 9)?,
            status: read_enum(row, base + 10)?,
            progress: row.get(base + 11)?,
            notes: row.get(base + 12)?,
            blockers: row.get(base + 13)?,
            dependencies,
            delegated_at: read_opt_time(row, base + 15)?,
            started_at: read_opt_time(row, base + 16)?,
            updated_at: read_opt_time(row, base + 17)?,
            completed_at: read_opt_time(row, base + 18)?,
            actual_hours: row.get(base + 19)?,
        })
    }

    fn row_to_plan(row: &Row) -> DbResult<BusinessPlan> {
        Ok(BusinessPlan {
            business_id: row.get(0)?,
            session_id: row.get(1)?,
            business_name: row.get(2)?,
            business_idea: row.get(3)?,
            target_market: row.get(4)?,
            revenue_model: row.get(5)?,
            timeline: row.get(6)?,
            budget: row.get(7)?,
            technical_plan: row.get(8)?,
            marketing_plan: row.get(9)?,
            sales_plan: row.get(10)?,
            legal_plan: row.get(11)?,
            finance_plan: row.get(12)?,
            operations_plan: row.get(13)?,
            hr_plan: row.get(14)?,
            current_phase: read_enum(row, 15)?,
            conversation_summary: row.get(16)?,
            created_at: read_time(row, 17)?,
            updated_at: read_time(row, 18)?,
        })
    }

    // --- Session Operations ---

    pub fn insert_session(
        conn: &Connection,
        agent_config: &str,
        active_agent: Option<&str>,
        user_id: Option<&str>,
    ) -> DbResult<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let seq = next_value(conn, "seq_sessions_order")?;
        let created_at = to_db_time(&now());

        conn.execute(
            "INSERT INTO sessions (id, seq, agent_config, active_agent, status, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'active', ?, ?, ?)",
            params![id, seq, agent_config, active_agent, user_id, created_at, created_at],
        )?;

        Self::get_session(conn, &id)?.ok_or(duckdb::Error::QueryReturnedNoRows)
    }

    pub fn get_session(conn: &Connection, id: &str) -> DbResult<Option<Session>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::row_to_session)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Newest first. `user_id` narrows the list to one owner.
    pub fn list_sessions(conn: &Connection, user_id: Option<&str>) -> DbResult<Vec<Session>> {
        let sql = match user_id {
            Some(_) => format!(
                "SELECT {} FROM sessions WHERE user_id = ? ORDER BY seq DESC",
                SESSION_COLUMNS
            ),
            None => format!("SELECT {} FROM sessions ORDER BY seq DESC", SESSION_COLUMNS),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(user_id.iter()), Self::row_to_session)?;
        rows.collect()
    }

    /// Writes back the mutable columns of an already-merged session record.
    pub fn update_session(conn: &Connection, session: &Session) -> DbResult<()> {
        conn.execute(
            "UPDATE sessions SET active_agent = ?, status = ?, user_id = ?, updated_at = ? WHERE id = ?",
            params![
                session.active_agent,
                session.status.as_str(),
                session.user_id,
                to_db_time(&session.updated_at),
                session.id,
            ],
        )?;
        Ok(())
    }

    fn touch_session(conn: &Connection, session_id: &str) -> DbResult<()> {
        conn.execute(
            "UPDATE sessions SET updated_at = ? WHERE id = ?",
            params![to_db_time(&now()), session_id],
        )?;
        Ok(())
    }

    // --- Message Operations ---

    pub fn insert_message(
        conn: &Connection,
        session_id: &str,
        role: MessageRole,
        content: &str,
        is_simulated: bool,
        metadata: Option<&serde_json::Value>,
    ) -> DbResult<Message> {
        let id = next_value(conn, "seq_messages_id")?;
        let created_at = now();
        let meta_str = metadata.map(|m| m.to_string());

        conn.execute(
            "INSERT INTO messages (id, session_id, role, content, is_simulated, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                session_id,
                role.as_str(),
                content,
                is_simulated,
                meta_str,
                to_db_time(&created_at)
            ],
        )?;

        Self::touch_session(conn, session_id)?;

        Ok(Message {
            id,
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            is_simulated,
            metadata: metadata.cloned(),
            created_at,
        })
    }

    pub fn get_messages(conn: &Connection, session_id: &str) -> DbResult<Vec<Message>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages WHERE session_id = ? ORDER BY id ASC",
            MESSAGE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![session_id], Self::row_to_message)?;
        rows.collect()
    }

    // --- Event Operations ---

    pub fn insert_event(
        conn: &Connection,
        session_id: &str,
        direction: EventDirection,
        event_name: &str,
        event_data: &serde_json::Value,
    ) -> DbResult<Event> {
        let id = next_value(conn, "seq_events_id")?;
        let created_at = now();

        conn.execute(
            "INSERT INTO events (id, session_id, direction, event_name, event_data, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                session_id,
                direction.as_str(),
                event_name,
                event_data.to_string(),
                to_db_time(&created_at)
            ],
        )?;

        Ok(Event {
            id,
            session_id: session_id.to_string(),
            direction,
            event_name: event_name.to_string(),
            event_data: event_data.clone(),
            created_at,
        })
    }

    pub fn get_events(conn: &Connection, session_id: &str) -> DbResult<Vec<Event>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM events WHERE session_id = ? ORDER BY id ASC",
            EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![session_id], Self::row_to_event)?;
        rows.collect()
    }

    // --- Task Operations ---

    /// Rows with task id `id`, narrowed by whichever of business and session
    /// are given.
    pub fn find_tasks(
        conn: &Connection,
        id: &str,
        business_id: Option<&str>,
        session_id: Option<&str>,
    ) -> DbResult<Vec<StoredTask>> {
        let mut sql = format!("SELECT seq, {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let mut values = vec![id.to_string()];
        if let Some(business_id) = business_id {
            sql.push_str(" AND business_id = ?");
            values.push(business_id.to_string());
        }
        if let Some(session_id) = session_id {
            sql.push_str(" AND session_id = ?");
            values.push(session_id.to_string());
        }
        sql.push_str(" ORDER BY seq ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(StoredTask {
                key: row.get(0)?,
                task: Self::row_to_task_at(row, 1)?,
            })
        })?;
        rows.collect()
    }

    pub fn insert_task(conn: &Connection, task: &Task) -> DbResult<()> {
        let seq = next_value(conn, "seq_tasks_order")?;
        conn.execute(
            &format!(
                "INSERT INTO tasks (seq, scope, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TASK_COLUMNS
            ),
            params![
                seq,
                task_scope(task),
                task.id,
                task.session_id,
                task.business_id,
                task.department.as_str(),
                task.title,
                task.description,
                task.assigned_to,
                task.reviewed_by,
                task.priority.as_str(),
                task.estimated_hours,
                task.status.as_str(),
                task.progress,
                task.notes,
                task.blockers,
                serde_json::Value::from(task.dependencies.clone()).to_string(),
                opt_time(&task.delegated_at),
                opt_time(&task.started_at),
                opt_time(&task.updated_at),
                opt_time(&task.completed_at),
                task.actual_hours,
            ],
        )?;
        Ok(())
    }

    /// Rewrites the row `key`. The task id and scope stay as inserted.
    pub fn update_task(conn: &Connection, key: i64, task: &Task) -> DbResult<()> {
        conn.execute(
            "UPDATE tasks SET session_id = ?, business_id = ?, department = ?, title = ?,
                description = ?, assigned_to = ?, reviewed_by = ?, priority = ?,
                estimated_hours = ?, status = ?, progress = ?, notes = ?, blockers = ?,
                dependencies = ?, delegated_at = ?, started_at = ?, updated_at = ?,
                completed_at = ?, actual_hours = ?
             WHERE seq = ?",
            params![
                task.session_id,
                task.business_id,
                task.department.as_str(),
                task.title,
                task.description,
                task.assigned_to,
                task.reviewed_by,
                task.priority.as_str(),
                task.estimated_hours,
                task.status.as_str(),
                task.progress,
                task.notes,
                task.blockers,
                serde_json::Value::from(task.dependencies.clone()).to_string(),
                opt_time(&task.delegated_at),
                opt_time(&task.started_at),
                opt_time(&task.updated_at),
                opt_time(&task.completed_at),
                task.actual_hours,
                key,
            ],
        )?;
        Ok(())
    }

    /// Tasks in first-insertion order.
    pub fn list_tasks(conn: &Connection, filter: &TaskFilter<'_>) -> DbResult<Vec<Task>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(session_id) = filter.session_id {
            clauses.push("session_id = ?");
            values.push(session_id.to_string());
        }
        if let Some(business_id) = filter.business_id {
            clauses.push("business_id = ?");
            values.push(business_id.to_string());
        }
        if let Some(department) = filter.department {
            clauses.push("department = ?");
            values.push(department.as_str().to_string());
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(status.as_str().to_string());
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks {} ORDER BY seq ASC",
            TASK_COLUMNS, where_clause
        ))?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::row_to_task)?;
        rows.collect()
    }

    // --- Business Plan Operations ---

    pub fn get_business_plan(conn: &Connection, business_id: &str) -> DbResult<Option<BusinessPlan>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM business_plans WHERE business_id = ?",
            PLAN_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![business_id], Self::row_to_plan)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// The most recently updated plan attached to a session.
    pub fn get_business_plan_for_session(
        conn: &Connection,
        session_id: &str,
    ) -> DbResult<Option<BusinessPlan>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM business_plans WHERE session_id = ? ORDER BY updated_at DESC LIMIT 1",
            PLAN_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![session_id], Self::row_to_plan)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn insert_business_plan(conn: &Connection, plan: &BusinessPlan) -> DbResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO business_plans ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                PLAN_COLUMNS
            ),
            params![
                plan.business_id,
                plan.session_id,
                plan.business_name,
                plan.business_idea,
                plan.target_market,
                plan.revenue_model,
                plan.timeline,
                plan.budget,
                plan.technical_plan,
                plan.marketing_plan,
                plan.sales_plan,
                plan.legal_plan,
                plan.finance_plan,
                plan.operations_plan,
                plan.hr_plan,
                plan.current_phase.as_str(),
                plan.conversation_summary,
                to_db_time(&plan.created_at),
                to_db_time(&plan.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn update_business_plan(conn: &Connection, plan: &BusinessPlan) -> DbResult<()> {
        conn.execute(
            "UPDATE business_plans SET business_name = ?, business_idea = ?, target_market = ?,
                revenue_model = ?, timeline = ?, budget = ?, technical_plan = ?,
                marketing_plan = ?, sales_plan = ?, legal_plan = ?, finance_plan = ?,
                operations_plan = ?, hr_plan = ?, current_phase = ?, conversation_summary = ?,
                updated_at = ?
             WHERE business_id = ?",
            params![
                plan.business_name,
                plan.business_idea,
                plan.target_market,
                plan.revenue_model,
                plan.timeline,
                plan.budget,
                plan.technical_plan,
                plan.marketing_plan,
                plan.sales_plan,
                plan.legal_plan,
                plan.finance_plan,
                plan.operations_plan,
                plan.hr_plan,
                plan.current_phase.as_str(),
                plan.conversation_summary,
                to_db_time(&plan.updated_at),
                plan.business_id,
            ],
        )?;
        Ok(())
    }

    // --- Transactions ---

    /// Runs `f` inside a transaction, rolling back if it or the commit fails.
    pub fn in_transaction<T, E>(
        conn: &Connection,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<duckdb::Error>,
    {
        conn.execute("BEGIN TRANSACTION", [])?;

        match f(conn) {
            Ok(value) => match conn.execute("COMMIT", []) {
                Ok(_) => Ok(value),
                Err(e) => {
                    // Leaves the shared connection usable for the next BEGIN
                    let _ = conn.execute("ROLLBACK", []);
                    Err(e.into())
                }
            },
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}
