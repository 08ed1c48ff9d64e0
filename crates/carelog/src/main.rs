use std::sync::Arc;

use carelog_core::{
    config::Config,
    parser::Engine,
    service::CareLogService,
    store::{MemoryStore, RecordStore},
};
use carelog_sqlite::SqliteStore;

mod intake;

#[tokio::main]
async fn main() -> Result<(), carelog_core::Error> {
    carelog_core::logging::init("carelog")?;

    let cfg = Config::load()?;
    let engine = Arc::new(Engine::new(cfg.parser())?);

    let store: Arc<dyn RecordStore> = match &cfg.database_path {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => {
            tracing::warn!("CARELOG_DB_PATH not set; records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let console = Arc::new(intake::Console::stdout());
    let service = CareLogService::new(engine, store, console.clone());

    intake::run_stdin(&cfg, &service, &*console)
        .await
        .map_err(|e| carelog_core::Error::External(format!("intake loop failed: {e}")))?;

    Ok(())
}
