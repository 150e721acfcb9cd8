use std::env;
use std::fs::File;
use std::io::Write;

use qt_scorer::models::config::{LoggingConfig, PipelineConfig};
use qt_scorer::processing::pipeline::run_pipeline;
use qt_scorer::processing::stop::StopSignal;
use qt_scorer::scoring::EmbeddingScorer;

fn init_logging(logging: &LoggingConfig) -> std::io::Result<()> {
    let level = logging.level_filter().unwrap_or(log::LevelFilter::Info);
    let mut builder = env_logger::Builder::new();
    // Directives from RUST_LOG replace the configured default level.
    builder
        .filter_level(level)
        .parse_env(env_logger::Env::default());
    builder.format(|buf, record| {
        let level = record.level().as_str();
        writeln!(
            buf,
            "[{} {}] {}",
            &level[..1],
            buf.timestamp_seconds(),
            record.args()
        )
    });
    if let Some(path) = &logging.file {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config_path = env::var("QT_SCORER_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = match PipelineConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
            log::error!("Failed to load configuration from {config_path}: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
        log::error!("Invalid configuration in {config_path}: {e}");
        std::process::exit(1);
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let stop = StopSignal::new();
    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && interrupt.set() {
            log::warn!("Interrupted, stopping pipeline");
        }
    });

    let scorer = config.scorer.clone();
    let result = run_pipeline(&config, stop, move |worker| {
        log::info!("Loading model {} for worker {worker}", scorer.model);
        EmbeddingScorer::new(&scorer.model, scorer.cache_dir.as_deref())
    })
    .await;

    if let Err(e) = result {
        log::error!("Pipeline failed: {e}");
        std::process::exit(1);
    }
}
