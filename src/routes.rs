use actix_web::{
    get,
    http::header::{self, EntityTag, ETag},
    post, web, HttpRequest, HttpResponse,
};
use futures::{future, stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::controller::TripController;
use crate::error::{Result, TripError};
use crate::mutations::Mutation;
use crate::schemas::Trip;

#[derive(Deserialize)]
struct MutationRequest {
    #[serde(default)]
    actor: String,
    mutation: Mutation,
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

#[get("/trips/{id}")]
async fn get_trip(
    controller: web::Data<TripController>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    let trip = controller.snapshot(&id).await?;
    Ok(HttpResponse::Ok().insert_header(etag(&trip)).json(trip))
}

#[post("/trips/{id}/mutations")]
async fn apply_mutation(
    controller: web::Data<TripController>,
    id: web::Path<String>,
    request: HttpRequest,
    body: web::Json<MutationRequest>,
) -> Result<HttpResponse> {
    let expected_version = if_match_version(&request)?;
    let MutationRequest { actor, mutation } = body.into_inner();
    let trip = controller
        .apply(&id, &mutation, &actor, expected_version)
        .await?;
    Ok(HttpResponse::Ok().insert_header(etag(&trip)).json(trip))
}

#[get("/trips/{id}/settlement")]
async fn get_settlement(
    controller: web::Data<TripController>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(controller.settlement(&id).await?))
}

/// Server-sent events: the current snapshot, then one event per write.
#[get("/trips/{id}/events")]
async fn trip_events(
    controller: web::Data<TripController>,
    id: web::Path<String>,
) -> Result<HttpResponse> {
    // Subscribe before reading so no write falls between the two
    let updates = controller.subscribe(&id);
    let current = controller.snapshot(&id).await?;

    let first = stream::once(future::ready(snapshot_event(&current)));
    // A write between subscribing and reading is already in `current`
    let rest = stream::unfold((updates, current.version), |(mut updates, sent)| async move {
        loop {
            match updates.recv().await {
                Ok(trip) if trip.version <= sent => {}
                Ok(trip) => {
                    let event = snapshot_event(&trip);
                    return Some((event, (updates, trip.version)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber fell behind, skipping to newer snapshots");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(first.chain(rest)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(get_trip)
        .service(apply_mutation)
        .service(get_settlement)
        .service(trip_events);
}

fn etag(trip: &Trip) -> ETag {
    ETag(EntityTag::new_strong(trip.version.to_string()))
}

/// Reads the version a client based its change on. `*` or no header means
/// the client doesn't care.
fn if_match_version(request: &HttpRequest) -> Result<Option<u64>> {
    let Some(value) = request.headers().get(header::IF_MATCH) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| TripError::validation("If-Match must be plain text"))?
        .trim();
    if value == "*" {
        return Ok(None);
    }
    let tag = value.strip_prefix("W/").unwrap_or(value).trim_matches('"');
    tag.parse()
        .map(Some)
        .map_err(|_| TripError::validation(format!("If-Match must be a trip version, got {value}")))
}

fn snapshot_event(trip: &Trip) -> Result<web::Bytes> {
    let json = serde_json::to_string(trip)?;
    Ok(web::Bytes::from(format!("event: snapshot\ndata: {json}\n\n")))
}
