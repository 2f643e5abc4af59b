use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// Which agent configuration and persona a fresh session starts with.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
    pub default_config: String,
    pub default_persona: String,
}

/// Settings for talking to a running server instead of the local database.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub session_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub agents: AgentsConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "boardroom.duckdb")?
            .set_default("agents.default_config", "businessBuilder")?
            .set_default("agents.default_persona", "CEO")?
            .set_default("client.base_url", "http://127.0.0.1:8080")?
            .set_default("client.session_file", ".boardroom_session")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("BOARDROOM").separator("__"))
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${BOARDROOM_API_KEY}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.database.path = expand_env(&app_config.database.path);
        app_config.client.base_url = expand_env(&app_config.client.base_url);
        app_config.client.api_key = app_config
            .client
            .api_key
            .as_deref()
            .map(expand_env)
            .filter(|key| !key.is_empty());
        app_config.auth.api_keys = app_config
            .auth
            .api_keys
            .iter()
            .map(|key| expand_env(key))
            .filter(|key| !key.is_empty())
            .collect();

        Ok(app_config)
    }

    /// Configuration for tests and embedded use: in-memory database, no API keys.
    pub fn in_memory() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                path: ":memory:".to_string(),
            },
            auth: AuthConfig::default(),
            agents: AgentsConfig {
                default_config: "businessBuilder".to_string(),
                default_persona: "CEO".to_string(),
            },
            client: ClientConfig {
                base_url: "http://127.0.0.1:8080".to_string(),
                api_key: None,
                session_file: ".boardroom_session".to_string(),
            },
        }
    }
}

fn expand_env(val: &str) -> String {
    if val.starts_with("${") && val.ends_with('}') {
        let var_name = &val[2..val.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else {
        val.to_string()
    }
}
