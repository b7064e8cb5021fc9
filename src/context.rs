use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime settings resolved from the command line and environment.
#[derive(Clone, Debug)]
pub struct Context {
    pub api_listen: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub database_path: PathBuf,
    pub environment: String,
    pub log_file: Option<PathBuf>,
    pub reset: bool,
}

impl Context {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        let allowed_origins = cli
            .allowed_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            api_listen: SocketAddr::new(cli.host, cli.port),
            allowed_origins,
            database_path: PathBuf::from(&cli.database_path),
            environment: cli.environment.clone(),
            log_file: cli.log_file.as_ref().map(PathBuf::from),
            reset: cli.reset,
        }
    }
}
