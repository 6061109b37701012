use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Query, State, rejection::JsonRejection},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use footprints::{
    BoundingBox, ImageryProvider, LatLon, TileRequest, acquire_satellite, formatter, paths,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

const INDEX_HTML: &str = include_str!("../static/index.html");
const GEOJSON_MIME: &str = "application/geo+json";

#[derive(Debug, Serialize, Deserialize)]
pub struct SatelliteResponse {
    pub success: bool,
    pub image_url: String,
    pub image_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub points: Vec<LatLon>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub result_url: String,
}

#[derive(Debug, Deserialize)]
pub struct OsmQuery {
    pub tags: Option<String>,
}

pub fn router<P: ImageryProvider>(state: AppState<P>) -> Router {
    let uploads = ServeDir::new(state.store.root());
    let max_body = state.max_content_length;

    Router::new()
        .route("/", get(index::<P>))
        .route("/get_satellite", post(get_satellite::<P>))
        .route("/process", post(process::<P>))
        .route("/download", get(download::<P>))
        .route("/download_osm", get(download_osm::<P>))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the map page and starts a fresh session.
async fn index<P: ImageryProvider>(State(state): State<AppState<P>>) -> Html<&'static str> {
    tracing::info!("Loading index page");
    match state.store.clear_session() {
        Ok(report) => {
            for (path, e) in &report.failed {
                tracing::warn!(path = %path.display(), error = %e, "Could not delete file");
            }
            tracing::info!(
                removed = report.removed,
                failed = report.failed.len(),
                "Uploads folder cleanup complete"
            );
        }
        Err(e) => tracing::error!(error = %e, "Error cleaning uploads folder"),
    }
    Html(INDEX_HTML)
}

async fn get_satellite<P: ImageryProvider>(
    State(state): State<AppState<P>>,
    payload: Result<Json<BoundingBox>, JsonRejection>,
) -> Result<Json<SatelliteResponse>, ApiError> {
    let Json(bbox) = payload?;
    tracing::info!(?bbox, "Received bbox");
    bbox.validate()?;

    let request = TileRequest::new(bbox, state.tiles.zoom, state.tiles.source.clone());
    let raster = acquire_satellite(&state.store, state.imagery.as_ref(), &request).await?;

    Ok(Json(SatelliteResponse {
        success: true,
        image_url: paths::upload_url(&raster.file_name()),
        image_id: raster.token,
    }))
}

async fn process<P: ImageryProvider>(
    State(state): State<AppState<P>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(points = ?request.points, "Received points");
    for point in &request.points {
        point.validate()?;
    }

    let raster = state.store.current_raster()?;
    tracing::info!(path = %raster.path.display(), "Using current satellite image");

    let transformed = footprints::transform(&request.points);
    tracing::debug!(points = ?transformed, "Transformed points");

    state
        .detector
        .detect(&state.store, &raster, &transformed)
        .await?;

    Ok(Json(ProcessResponse {
        success: true,
        result_url: paths::upload_url(paths::DETECTION_RESULT),
    }))
}

async fn download<P: ImageryProvider>(
    State(state): State<AppState<P>>,
) -> Result<Response, ApiError> {
    let rendered = formatter::write_clean(&state.store, Utc::now().date_naive())?;
    Ok(attachment(paths::CLEAN_DOWNLOAD_NAME, rendered.body))
}

async fn download_osm<P: ImageryProvider>(
    State(state): State<AppState<P>>,
    Query(query): Query<OsmQuery>,
) -> Result<Response, ApiError> {
    let tags = formatter::parse_custom_tags(query.tags.as_deref());
    let rendered = formatter::write_osm(&state.store, tags, Utc::now().date_naive())?;
    Ok(attachment(paths::OSM_DOWNLOAD_NAME, rendered.body))
}

fn attachment(file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, GEOJSON_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}
