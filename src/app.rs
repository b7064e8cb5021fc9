use crate::{context, rest, storage};
use anyhow::{Context as AnyhowContext, Result};
use std::path::Path;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use storage::{RecordStore, SqliteStorage};

/// The running service: resolved settings, the open store and the shutdown
/// signal shared with the REST task.
pub struct App<S: RecordStore = SqliteStorage> {
    config: context::Context,
    storage: S,
    shutdown: CancellationToken,
}

impl App {
    /// Parses configuration, installs logging and opens the database.
    pub fn from_cli() -> Result<App<SqliteStorage>> {
        let cli = crate::cli::parse();
        let ctx = context::Context::from_cli(&cli);

        crate::tracing::init(ctx.log_file.as_deref());
        log_startup_info(&ctx);

        let storage = init_storage(&ctx.database_path, ctx.reset)?;
        log::info!(
            "🗄️ Connected to SQLite database at {}",
            ctx.database_path.display()
        );

        Ok(App::new(ctx, storage))
    }
}

impl<S: RecordStore + Clone + Send + Sync + 'static> App<S> {
    fn new(config: context::Context, storage: S) -> Self {
        Self {
            config,
            storage,
            shutdown: CancellationToken::new(),
        }
    }

    /// Serves until Ctrl-C, then closes the store. A failed close is logged
    /// and does not hold up the exit.
    pub async fn run_daemon(&self) -> Result<()> {
        let mut rest_handle = self.spawn_rest_server();
        let requested = self.wait_for_shutdown(&mut rest_handle).await;
        self.close_storage();

        if !requested {
            anyhow::bail!("REST server exited unexpectedly");
        }
        log::info!("✅ Shutdown complete");
        Ok(())
    }

    fn spawn_rest_server(&self) -> JoinHandle<()> {
        let addr = self.config.api_listen;
        let store = self.storage.clone();
        let environment = self.config.environment.clone();
        let origins = self.config.allowed_origins.clone();
        let token = self.shutdown.clone();

        tokio::spawn(async move {
            if let Err(e) = rest::serve(addr, store, environment, origins, token).await {
                log::error!("REST server failed: {:#}", e);
            }
        })
    }

    /// Returns `true` when shutdown was requested by a signal.
    async fn wait_for_shutdown(&self, rest_task: &mut JoinHandle<()>) -> bool {
        let requested = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("🧨 Ctrl-C received, shutting down...");
                true
            }
            _ = &mut *rest_task => {
                log::error!("REST task exited unexpectedly");
                false
            }
        };

        self.shutdown.cancel();

        // Polling a completed JoinHandle again panics.
        if !rest_task.is_finished() {
            let _ = rest_task.await;
        }
        requested
    }

    fn close_storage(&self) {
        match self.storage.close() {
            Ok(()) => log::info!("🔒 Database connection closed"),
            Err(e) => log::error!("Error closing database: {}", e),
        }
    }
}

fn log_startup_info(ctx: &context::Context) {
    log::info!("🚀 Starting embu-api");
    log::info!("🌍 Environment: {}", ctx.environment);
    log::info!("🌐 API endpoints: http://{}/api", ctx.api_listen);
    if ctx.allowed_origins.is_empty() {
        log::info!("🔓 CORS: any origin");
    } else {
        log::info!("🔐 CORS: {}", ctx.allowed_origins.join(", "));
    }
    if let Some(path) = ctx.log_file.as_deref() {
        log::info!("📝 Log file: {}", path.display());
    }
}

fn init_storage(path: &Path, reset: bool) -> Result<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("creating database directory")?;
    }

    let sqlite = SqliteStorage::new(path);
    if reset {
        sqlite.reset_all().context("resetting storage")?;
    }
    sqlite
        .init()
        .with_context(|| format!("opening database at {}", path.display()))?;
    Ok(sqlite)
}

// --- Entry Point ---

pub async fn run() -> Result<()> {
    let app = App::from_cli()?;
    app.run_daemon().await
}
