use std::path::Path;

use cadence_core::config::load_config;
use cadence_db::db::connection::create_pool;
use cadence_db::db::migrate::run_migrations;
use cadence_db::store::PgAggregateStore;
use cadence_service::EventEngine;
use cadence_service::draft::EventDraft;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload};

type Engine = EventEngine<PgAggregateStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(filter_layer).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true),
    );
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    tracing::info!("Starting cadence scheduling engine");

    let config = load_config()?;

    tracing::info!(
        database = %config.database.redacted_url(),
        max_connections = config.database.max_connections,
        log_level = %config.logging.level,
        max_occurrences = config.engine.max_occurrences,
        publish_events = config.engine.publish_events,
        "Configuration loaded"
    );

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    run_migrations(&config.database.url).await?;

    let pool = create_pool(&config.database).await?;

    let engine = EventEngine::new(PgAggregateStore::new(pool), config.engine.clone());

    tracing::info!(
        max_occurrences = engine.config().max_occurrences,
        "Engine ready"
    );

    let drafts: Vec<String> = std::env::args().skip(1).collect();
    if drafts.is_empty() {
        tracing::info!("No draft files given, nothing to import");
    }
    for path in drafts {
        import_draft(&engine, Path::new(&path)).await?;
    }

    Ok(())
}

/// Creates the series described by a JSON draft file. Rejected drafts are logged and
/// skipped.
#[tracing::instrument(skip(engine), fields(path = %path.display()))]
async fn import_draft(engine: &Engine, path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let draft: EventDraft = serde_json::from_str(&raw)?;

    let expanded = match engine.validate_and_expand(&draft) {
        Ok(expanded) => expanded,
        Err(e) if e.is_client_fault() => {
            for violation in e.violations() {
                tracing::warn!(field = violation.field, "{}", violation.message);
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let created = engine
        .create_series(expanded.draft, expanded.windows)
        .await?;

    tracing::info!(
        event_id = %created.event_id,
        occurrences = created.occurrence_ids.len(),
        "Draft imported"
    );
    Ok(())
}
