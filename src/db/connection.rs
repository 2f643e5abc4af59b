use crate::config::DatabaseConfig;
use duckdb::{Connection, Result as DbResult};
use std::sync::{Arc, Mutex};
use tracing::info;

pub type DbPool = Arc<Mutex<Connection>>;

// Timestamps are stored as RFC 3339 text written by the service so they
// round-trip exactly and sort lexically.
const SCHEMA: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_sessions_order;
CREATE SEQUENCE IF NOT EXISTS seq_messages_id;
CREATE SEQUENCE IF NOT EXISTS seq_events_id;
CREATE SEQUENCE IF NOT EXISTS seq_tasks_order;

CREATE TABLE IF NOT EXISTS sessions (
    id VARCHAR PRIMARY KEY,
    seq BIGINT NOT NULL,
    agent_config VARCHAR NOT NULL,
    active_agent VARCHAR,
    status VARCHAR NOT NULL,
    user_id VARCHAR,
    created_at VARCHAR NOT NULL,
    updated_at VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id BIGINT PRIMARY KEY,
    session_id VARCHAR NOT NULL,
    role VARCHAR NOT NULL,
    content TEXT NOT NULL,
    is_simulated BOOLEAN NOT NULL,
    metadata VARCHAR,
    created_at VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id BIGINT PRIMARY KEY,
    session_id VARCHAR NOT NULL,
    direction VARCHAR NOT NULL,
    event_name VARCHAR NOT NULL,
    event_data VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL
);

-- Task ids repeat across businesses; `scope` is fixed at insert from the
-- business (or session) the task belongs to.
CREATE TABLE IF NOT EXISTS tasks (
    seq BIGINT PRIMARY KEY,
    scope VARCHAR NOT NULL,
    id VARCHAR NOT NULL,
    session_id VARCHAR,
    business_id VARCHAR,
    department VARCHAR NOT NULL,
    title VARCHAR NOT NULL,
    description TEXT NOT NULL,
    assigned_to VARCHAR NOT NULL,
    reviewed_by VARCHAR NOT NULL,
    priority VARCHAR NOT NULL,
    estimated_hours DOUBLE NOT NULL,
    status VARCHAR NOT NULL,
    progress INTEGER,
    notes TEXT,
    blockers TEXT,
    dependencies VARCHAR NOT NULL,
    delegated_at VARCHAR,
    started_at VARCHAR,
    updated_at VARCHAR,
    completed_at VARCHAR,
    actual_hours DOUBLE
);

CREATE TABLE IF NOT EXISTS business_plans (
    business_id VARCHAR PRIMARY KEY,
    session_id VARCHAR NOT NULL,
    business_name VARCHAR NOT NULL,
    business_idea TEXT NOT NULL,
    target_market TEXT NOT NULL,
    revenue_model TEXT NOT NULL,
    timeline VARCHAR,
    budget VARCHAR,
    technical_plan TEXT,
    marketing_plan TEXT,
    sales_plan TEXT,
    legal_plan TEXT,
    finance_plan TEXT,
    operations_plan TEXT,
    hr_plan TEXT,
    current_phase VARCHAR NOT NULL,
    conversation_summary TEXT,
    created_at VARCHAR NOT NULL,
    updated_at VARCHAR NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_scope_id ON tasks(scope, id);
"#;

pub fn get_connection(config: &DatabaseConfig) -> DbResult<DbPool> {
    info!("Connecting to DuckDB at {}", config.path);
    let conn = Connection::open(&config.path)?;

    init_schema(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> DbResult<()> {
    info!("Initializing database schema");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
