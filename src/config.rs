use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub workspace_root: PathBuf,
    pub database_url: Option<String>,
    pub engine_command: String,
    pub queue_enabled: bool,
    pub fetch_timeout: Duration,
    pub analysis_time_limit: Duration,
    pub analysis_soft_limit: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_port: u16 = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8020);
        let bind_host = env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let bind_addr: SocketAddr = format!("{bind_host}:{api_port}").parse()?;

        let workspace_root =
            PathBuf::from(env::var("WORKSPACE_ROOT").unwrap_or_else(|_| "workspace".to_string()));

        let database_url = env::var("DATABASE_URL").ok();
        let engine_command = env::var("ENGINE_COMMAND").unwrap_or_else(|_| "emerge".to_string());
        let queue_enabled: bool = env::var("QUEUE_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);

        let fetch_timeout = Duration::from_secs(
            env::var("GIT_FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        );
        let analysis_time_limit = Duration::from_secs(
            env::var("ANALYSIS_TIME_LIMIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
        );
        let analysis_soft_limit = Duration::from_secs(
            env::var("ANALYSIS_SOFT_LIMIT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(540),
        );

        Ok(Self {
            bind_addr,
            workspace_root,
            database_url,
            engine_command,
            queue_enabled,
            fetch_timeout,
            analysis_time_limit,
            analysis_soft_limit,
        })
    }
}
