pub mod commands;

use std::sync::Arc;
use thiserror::Error;

use crate::cli::commands::{Cli, Commands, SessionAction};
use crate::config::AppConfig;
use crate::db::get_connection;
use crate::gateway::{
    GatewayError, HttpGateway, LocalGateway, NewSession, PersistenceGateway, TaskQuery,
};
use crate::personas;
use crate::session::{transcript, SessionLedger, SessionRecorder, SessionSlot};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("database: {0}")]
    Database(#[from] duckdb::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

pub fn open_gateway(config: &AppConfig, remote: bool) -> Result<Arc<dyn PersistenceGateway>, CliError> {
    if remote {
        Ok(Arc::new(HttpGateway::new(
            config.client.base_url.clone(),
            config.client.api_key.clone(),
        )))
    } else {
        let pool = get_connection(&config.database)?;
        Ok(Arc::new(LocalGateway::new(pool)))
    }
}

pub async fn run_cli(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve => Err(CliError::Failed(
            "serve is handled by the server entry point".into(),
        )),
        Commands::Personas => {
            println!("{:<22} | {:<10} | {:<11} | Hands off to", "Name", "Role", "Department");
            println!("{:-<22}-+-{:-<10}-+-{:-<11}-+-{:-<30}", "", "", "", "");
            for p in personas::ROSTER {
                println!(
                    "{:<22} | {:<10} | {:<11} | {}",
                    p.name,
                    format!("{:?}", p.role),
                    p.department.map(|d| d.as_str()).unwrap_or("-"),
                    personas::handoffs(p.name).join(", ")
                );
            }
            Ok(())
        }
        Commands::Tasks {
            session,
            business,
            department,
            status,
        } => {
            let gateway = open_gateway(&config, cli.remote)?;
            let tasks = gateway
                .list_tasks(TaskQuery {
                    session_id: session,
                    business_id: business,
                    department,
                    status,
                })
                .await?;
            if tasks.is_empty() {
                println!("No tasks found.");
            } else {
                println!("{:<10} | {:<11} | {:<12} | {:<8} | Title", "ID", "Department", "Status", "Priority");
                println!("{:-<10}-+-{:-<11}-+-{:-<12}-+-{:-<8}-+-{:-<30}", "", "", "", "", "");
                for t in tasks {
                    println!(
                        "{:<10} | {:<11} | {:<12} | {:<8} | {}",
                        t.id, t.department, t.status, t.priority, t.title
                    );
                }
            }
            Ok(())
        }
        Commands::Resume { user, agent_config } => {
            let gateway = open_gateway(&config, cli.remote)?;
            let ledger = Arc::new(SessionLedger::new(gateway));
            let recorder =
                SessionRecorder::new(ledger, SessionSlot::file(&config.client.session_file));
            let agent_config = agent_config.unwrap_or_else(|| config.agents.default_config.clone());

            match recorder
                .initialize(&agent_config, Some(&config.agents.default_persona), user.as_deref())
                .await
            {
                Some((session, origin)) => {
                    println!("Session {} ({:?})", session.id, origin);
                    Ok(())
                }
                None => Err(CliError::Failed("could not initialize a session".into())),
            }
        }
        Commands::Session { action } => {
            let gateway = open_gateway(&config, cli.remote)?;
            let ledger = SessionLedger::new(gateway);
            run_session_action(&ledger, &config, action).await
        }
    }
}

async fn run_session_action(
    ledger: &SessionLedger,
    config: &AppConfig,
    action: SessionAction,
) -> Result<(), CliError> {
    match action {
        SessionAction::Create {
            agent_config,
            persona,
            user,
        } => {
            let session = ledger
                .create(NewSession {
                    agent_config: agent_config.unwrap_or_else(|| config.agents.default_config.clone()),
                    active_agent: persona.or_else(|| Some(config.agents.default_persona.clone())),
                    user_id: user,
                })
                .await?;
            println!("Created Session: {} ({})", session.id, session.agent_config);
        }
        SessionAction::List { user } => {
            let sessions = match user.as_deref() {
                Some(user) => ledger.list_by_user(user).await?,
                None => ledger.list_all().await?,
            };
            if sessions.is_empty() {
                println!("No sessions found.");
            } else {
                println!("{:<36} | {:<9} | {:<32} | {:<16} | User", "ID", "Status", "Created At", "Agent Config");
                println!("{:-<36}-+-{:-<9}-+-{:-<32}-+-{:-<16}-+-{:-<12}", "", "", "", "", "");
                for s in sessions {
                    println!(
                        "{:<36} | {:<9} | {:<32} | {:<16} | {}",
                        s.id,
                        s.status,
                        s.created_at.to_rfc3339(),
                        s.agent_config,
                        s.user_id.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        SessionAction::Show { id } => {
            let detail = ledger.get(&id).await?;
            print!("{}", transcript::render(&detail));
            println!(
                "{} event(s), {} task(s), business plan: {}",
                detail.events.len(),
                detail.tasks.len(),
                detail
                    .business_plan
                    .as_ref()
                    .map(|p| p.business_name.as_str())
                    .unwrap_or("none")
            );
        }
        SessionAction::End { id } => {
            let session = ledger.complete(&id).await?;
            println!("Session {} is now {}", session.id, session.status);
        }
        SessionAction::Link { id, user } => {
            let session = ledger.link_user(&id, &user).await?;
            println!("Session {} now belongs to {}", session.id, user);
        }
        SessionAction::Export { id, path } => {
            let detail = ledger.get(&id).await?;
            let export_path = path.unwrap_or_else(|| transcript::file_name(&id));
            std::fs::write(&export_path, transcript::render(&detail))?;
            println!("Session exported successfully to: {}", export_path);
        }
    }
    Ok(())
}
