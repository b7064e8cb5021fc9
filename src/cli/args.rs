use clap::Parser;
use std::env;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "REST API for the county's services, news, tenders, departments and downloads",
    long_about = "Serves JSON CRUD endpoints under /api backed by a single SQLite file.\n\nEnvironment:\n  PORT              Listen port (default 3000)\n  ALLOWED_ORIGINS   Comma-separated CORS origins (default: any)\n  DATABASE_PATH     SQLite file (default ./embu_county.db)\n  APP_ENV           Runtime mode reported by /api/health\n"
)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        env = "PORT",
        default_value_t = 3000u16,
        value_name = "PORT",
        help = "Port the REST API listens on"
    )]
    pub port: u16,

    #[arg(
        long,
        env = "HOST",
        default_value = "0.0.0.0",
        value_name = "ADDR",
        help = "Interface the REST API binds to"
    )]
    pub host: std::net::IpAddr,

    #[arg(
        long = "allowed-origins",
        env = "ALLOWED_ORIGINS",
        value_name = "ORIGINS",
        value_delimiter = ',',
        help = "Comma-separated list of allowed CORS origins; empty allows any origin"
    )]
    pub allowed_origins: Vec<String>,

    #[arg(
        long = "database-path",
        env = "DATABASE_PATH",
        default_value = "./embu_county.db",
        value_name = "PATH",
        help = "SQLite database file, created when missing"
    )]
    pub database_path: String,

    #[arg(
        long,
        env = "APP_ENV",
        default_value = "development",
        value_name = "MODE",
        help = "Runtime mode label reported by the health check"
    )]
    pub environment: String,

    #[arg(
        long = "log-file",
        env = "LOG_FILE",
        value_name = "PATH",
        help = "Write logs to PATH (in addition to stderr)"
    )]
    pub log_file: Option<String>,

    #[arg(
        long,
        default_value_t = false,
        help = "Delete the SQLite database before starting"
    )]
    pub reset: bool,
}

pub fn parse() -> Cli {
    let dotenv_path = env::var("DOTENV_PATH").unwrap_or(".env".into());
    dotenvy::from_filename(&dotenv_path).ok();

    Cli::parse()
}
