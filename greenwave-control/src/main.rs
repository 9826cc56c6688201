#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod server;
mod signal;

use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use greenwave_detect::runner::{ObjectDetector, YoloDetector};

use crate::config::Config;
use crate::server::{run_server, AppContext};
use crate::signal::store::SignalStore;
use crate::signal::timing::AllocationPolicy;

const CONFIG_ENV: &str = "GREENWAVE_CONFIG";
const CONFIG_DEFAULT: &str = "greenwave.yaml";

#[actix_web::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("greenwave_control=info,greenwave_detect=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_DEFAULT.to_string());
    let config = Config::load(&config_path)?;
    info!(
        "starting with {} signals, detector `{} {}`, output root {}",
        config.signals.len(),
        config.detector.program,
        config.detector.script.display(),
        config.detector.output_root.display(),
    );

    for weights in [&config.detector.vehicle_weights, &config.detector.ambulance_weights] {
        if !weights.exists() {
            warn!(
                "weights file {} not found, detection will fail until it is provisioned",
                weights.display()
            );
        }
    }
    fs::create_dir_all(&config.uploads_dir).with_context(|| {
        format!("could not create uploads dir {}", config.uploads_dir.display())
    })?;

    let store = SignalStore::new(config.signals.iter().map(|s| (s.id, s.name.clone())));
    let detector: Arc<dyn ObjectDetector> =
        Arc::new(YoloDetector::new(config.detector.to_settings()));
    let context = AppContext {
        store,
        detector,
        uploads_dir: config.uploads_dir.clone(),
        policy: AllocationPolicy {
            non_priority_floor_secs: config.allocation.non_priority_floor_secs,
        },
    };

    run_server(config.server.host.clone(), config.server.port, context).await?;
    Ok(())
}
