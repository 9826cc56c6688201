pub mod payload;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use log::info;

use greenwave_detect::runner::ObjectDetector;

use crate::signal::store::SignalStore;
use crate::signal::timing::AllocationPolicy;

/// Largest accepted upload body. Detector input frames are a few megabytes.
pub(crate) const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared service state handed to every handler.
pub struct AppContext {
    pub store: SignalStore,
    pub detector: Arc<dyn ObjectDetector>,
    pub uploads_dir: PathBuf,
    pub policy: AllocationPolicy,
}

/// Route table, shared between the server and handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .route("/signals", web::get().to(routes::signals))
        .route("/upload-image/{signal_id}", web::post().to(routes::upload_image))
        .route("/get-image/{signal_id}", web::get().to(routes::get_image))
        .route("/update-timings", web::post().to(routes::update_timings))
        .route("/health", web::get().to(|| async { "OK" }));
}

/// Binds and serves until shutdown.
pub async fn run_server(host: String, port: u16, context: AppContext) -> std::io::Result<()> {
    let context = Data::new(context);
    info!("listening on {host}:{port}");
    HttpServer::new(move || App::new().app_data(context.clone()).configure(configure))
        .bind((host.as_str(), port))?
        .run()
        .await
}
