use clap::{Parser, Subcommand};

use crate::db::models::{Department, TaskStatus};

#[derive(Parser)]
#[command(name = "boardroom", version, about = "Session and business-context store for multi-persona voice agents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,

    /// Talk to a running server at `client.base_url` instead of opening the database
    #[arg(long, global = true)]
    pub remote: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Continue the cached session, the user's active one, or start a new one
    Resume {
        #[arg(short, long)]
        user: Option<String>,
        /// Agent configuration key (defaults to agents.default_config)
        #[arg(short, long)]
        agent_config: Option<String>,
    },

    /// List stored tasks
    Tasks {
        #[arg(short, long)]
        session: Option<String>,
        #[arg(short, long)]
        business: Option<String>,
        #[arg(short, long)]
        department: Option<Department>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },

    /// Show the persona roster and who may hand off to whom
    Personas,
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Create a new session
    Create {
        #[arg(short, long)]
        agent_config: Option<String>,
        #[arg(short, long)]
        persona: Option<String>,
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List sessions, newest first
    List {
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show a session with its messages, tasks and plan
    Show { id: String },

    /// Mark a session completed
    End { id: String },

    /// Attach an anonymous session to a user
    Link { id: String, user: String },

    /// Export a session transcript to a .txt file
    Export {
        id: String,
        /// The path to the output file (optional)
        #[arg(short, long)]
        path: Option<String>,
    },
}
