use std::collections::{BTreeMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::web::{self, Data};
use actix_web::HttpResponse;
use log::{error, info, warn};

use crate::server::payload::{
    ErrorBody, SignalView, TimingEntry, TimingsUpdated, UpdateTimings, UploadAccepted,
};
use crate::server::AppContext;
use crate::signal::ingest::{ingest_image, IngestError};
use crate::signal::timing::{allocate, TimingRequest};

pub async fn signals(ctx: Data<AppContext>) -> HttpResponse {
    let view: BTreeMap<u8, SignalView> = ctx
        .store
        .snapshot()
        .iter()
        .map(|(id, signal)| (*id, SignalView::from(signal)))
        .collect();
    HttpResponse::Ok().json(view)
}

pub async fn upload_image(
    ctx: Data<AppContext>,
    path: web::Path<u8>,
    body: web::Bytes,
) -> HttpResponse {
    let signal_id = path.into_inner();
    if body.is_empty() {
        return HttpResponse::BadRequest().json(ErrorBody {
            error: "empty image payload".to_string(),
        });
    }

    match ingest_image(&ctx.store, ctx.detector.as_ref(), &ctx.uploads_dir, signal_id, body).await {
        Ok(summary) => {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs());
            HttpResponse::Ok().json(UploadAccepted {
                signal_id,
                vehicle_count: summary.vehicle_count,
                ambulance_count: summary.ambulance_count,
                message: "Image uploaded and processed successfully",
                // Timestamp forces stale overlays out of browser caches.
                image_url: format!("/get-image/{signal_id}?t={ts}"),
            })
        }
        Err(IngestError::UnknownSignal(err)) => HttpResponse::NotFound().json(ErrorBody {
            error: err.to_string(),
        }),
        Err(err) => {
            error!("signal {signal_id}: upload processing failed: {err}");
            HttpResponse::InternalServerError().json(ErrorBody {
                error: "Image processing failed".to_string(),
            })
        }
    }
}

pub async fn get_image(ctx: Data<AppContext>, path: web::Path<u8>) -> HttpResponse {
    let signal_id = path.into_inner();
    let annotated = match ctx.store.get(signal_id) {
        Ok(signal) => signal.annotated_image,
        Err(err) => {
            return HttpResponse::NotFound().json(ErrorBody {
                error: err.to_string(),
            })
        }
    };
    let Some(image) = annotated else {
        return HttpResponse::NotFound().json(ErrorBody {
            error: "Image not found".to_string(),
        });
    };

    match tokio::fs::read(&image).await {
        Ok(bytes) => HttpResponse::Ok().content_type("image/jpeg").body(bytes),
        Err(err) => {
            warn!(
                "signal {signal_id}: overlay {} unreadable: {err}",
                image.display()
            );
            HttpResponse::NotFound().json(ErrorBody {
                error: "Image not found".to_string(),
            })
        }
    }
}

pub async fn update_timings(ctx: Data<AppContext>, body: web::Json<UpdateTimings>) -> HttpResponse {
    let request = body.into_inner();

    let mut ambulance_presence = HashSet::new();
    for entry in &request.timings {
        match ctx.store.get(entry.signal_id) {
            Ok(signal) if signal.ambulance_count > 0 => {
                ambulance_presence.insert(signal.id);
            }
            Ok(_) => {}
            Err(err) => {
                return HttpResponse::NotFound().json(ErrorBody {
                    error: err.to_string(),
                })
            }
        }
    }

    let requests: Vec<TimingRequest> = request.timings.iter().map(TimingEntry::as_request).collect();
    let outcome = allocate(&requests, &ambulance_presence, request.total_time, &ctx.policy);

    for (&signal_id, &timing) in &outcome.timings {
        if let Err(err) = ctx.store.update(signal_id, |signal| signal.timing = timing) {
            error!("timing write skipped: {err}");
        }
    }

    info!(
        "timings updated from {}s budget: {:?} (ambulance priority: {})",
        request.total_time, outcome.timings, outcome.ambulance_priority
    );
    HttpResponse::Ok().json(TimingsUpdated {
        message: "Timings updated successfully",
        ambulance_priority: outcome.ambulance_priority,
    })
}

// ============================================================
// Tests
// ============================================================
