use std::fmt::Write;

use crate::db::models::SessionDetail;

const SEPARATOR: &str = "---";

/// Plain-text transcript: a header block, then one `[ROLE]: content` block
/// per message, each closed by a `---` line.
pub fn render(detail: &SessionDetail) -> String {
    let session = &detail.session;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "Session: {}", session.id);
    let _ = writeln!(out, "Agent Config: {}", session.agent_config);
    if let Some(agent) = &session.active_agent {
        let _ = writeln!(out, "Active Agent: {}", agent);
    }
    let _ = writeln!(out, "Status: {}", session.status);
    let _ = writeln!(out, "Created At: {}", session.created_at.to_rfc3339());
    let _ = writeln!(out, "{}", SEPARATOR);

    for message in &detail.messages {
        let role = message.role.as_str().to_uppercase();
        if message.is_simulated {
            let _ = writeln!(out, "[{} (simulated)]: {}", role, message.content);
        } else {
            let _ = writeln!(out, "[{}]: {}", role, message.content);
        }
        let _ = writeln!(out, "{}", SEPARATOR);
    }
    out
}

pub fn file_name(session_id: &str) -> String {
    format!("session_{}.txt", session_id)
}
