use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, State},
    http::{HeaderMap, Request, StatusCode, header},
    routing::post,
};
use chrono::Utc;
use footprints::{ArtifactStore, DetectionClient, ImageryProvider, TileRequest, paths};
use gateway::{AppState, TileSettings, router};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BBOX: &str = r#"{"west":-122.42,"south":37.77,"east":-122.41,"north":37.78}"#;
const POINTS: &str = r#"{"points":[[37.775,-122.415],[37.776,-122.416]]}"#;

struct StubImagery;

impl ImageryProvider for StubImagery {
    async fn fetch(&self, _request: &TileRequest, output: &Path) -> footprints::Result<()> {
        std::fs::write(output, b"II*\0stub-geotiff")?;
        Ok(())
    }
}

#[derive(Clone, Default)]
struct DetectorLog {
    calls: Arc<AtomicUsize>,
    points: Arc<Mutex<Vec<String>>>,
}

fn two_buildings() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "area": 12.34, "confidence": 0.91, "class": "building" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-122.4151, 37.7751], [-122.4150, 37.7751], [-122.4150, 37.7752], [-122.4151, 37.7751]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "confidence": 0.55 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-122.4161, 37.7761], [-122.4160, 37.7761], [-122.4160, 37.7762], [-122.4161, 37.7761]]]
                }
            }
        ]
    })
}

async fn stub_detect(State(log): State<DetectorLog>, mut multipart: Multipart) -> Json<Value> {
    log.calls.fetch_add(1, Ordering::SeqCst);
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("points") {
            let text = field.text().await.unwrap();
            log.points.lock().unwrap().push(text);
        }
    }
    Json(two_buildings())
}

async fn spawn_detector(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

struct TestApp {
    _dir: TempDir,
    root: PathBuf,
    app: Router,
    detector: DetectorLog,
}

impl TestApp {
    async fn new() -> Self {
        let log = DetectorLog::default();
        let detector = Router::new()
            .route("/detect", post(stub_detect))
            .with_state(log.clone());
        let base = spawn_detector(detector).await;
        Self::with_detector(&base, log, 16 * 1024 * 1024)
    }

    fn with_detector(base: &str, detector: DetectorLog, max_content_length: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let store = ArtifactStore::open(&root).unwrap();
        std::fs::write(root.join(paths::SENTINEL), b"").unwrap();

        let client = DetectionClient::new(base, Duration::from_secs(10)).unwrap();
        let tiles = TileSettings {
            zoom: 18,
            source: "Satellite".to_string(),
        };
        let state = AppState::new(store, StubImagery, client, tiles, max_content_length);

        Self {
            _dir: dir,
            root,
            app: router(state),
            detector,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        (status, headers, body)
    }

    async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Full session: acquire imagery, run detection, download the clean export.
///
/// Tests:
/// - image_id names a raster present in the upload folder
/// - points reach the detector in [lon, lat] order
/// - raw result is served from /uploads
/// - clean export carries exactly the four normalized properties
#[tokio::test]
async fn test_end_to_end_session() {
    let app = TestApp::new().await;

    let (status, body) = app.post_json("/get_satellite", BBOX).await;
    assert_eq!(status, StatusCode::OK, "get_satellite failed: {body}");
    assert_eq!(body["success"], true);
    let image_id = body["image_id"].as_str().unwrap().to_string();
    let file_name = format!("satellite_{image_id}.tif");
    assert_eq!(body["image_url"], format!("/uploads/{file_name}"));
    assert!(app.root.join(&file_name).is_file());

    let (status, body) = app.post_json("/process", POINTS).await;
    assert_eq!(status, StatusCode::OK, "process failed: {body}");
    assert_eq!(
        body,
        json!({ "success": true, "result_url": "/uploads/building_regularized.geojson" })
    );
    assert_eq!(app.detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        app.detector.points.lock().unwrap().as_slice(),
        ["[[-122.415,37.775],[-122.416,37.776]]".to_string()]
    );

    let (status, _, raw) = app.get("/uploads/building_regularized.geojson").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&raw).unwrap(), two_buildings());

    let (status, headers, body) = app.get("/download").await;
    assert_eq!(status, StatusCode::OK);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("building_detection_result.geojson"));

    let clean: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(clean["type"], "FeatureCollection");
    let features = clean["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    for (feature, original) in features.iter().zip(two_buildings()["features"].as_array().unwrap()) {
        let props = feature["properties"].as_object().unwrap();
        assert_eq!(props.len(), 4);
        assert_eq!(props["building"], "yes");
        assert_eq!(props["source"], "GeoAI Detection");
        assert_eq!(props["source:date"], Value::String(today()));
        assert_eq!(feature["geometry"], original["geometry"]);
    }
    assert_eq!(features[0]["properties"]["area"], json!(12.3));
    assert_eq!(features[1]["properties"]["area"], json!(0.0));
    assert!(app.root.join(paths::CLEAN_OUTPUT).is_file());
}

#[tokio::test]
async fn test_process_without_satellite_makes_no_remote_call() {
    let app = TestApp::new().await;

    let (status, body) = app.post_json("/process", POINTS).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No satellite image found");
    assert_eq!(app.detector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_downloads_without_detection_result_return_error() {
    let app = TestApp::new().await;

    for uri in ["/download", "/download_osm"] {
        let (status, _, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].is_string(), "{uri} should carry an error message");
    }
}

/// OSM export honours caller tags and degrades gracefully on bad input.
#[tokio::test]
async fn test_download_osm_tags() {
    let app = TestApp::new().await;
    app.post_json("/get_satellite", BBOX).await;
    app.post_json("/process", POINTS).await;

    // {"building":"house"}
    let (status, headers, body) = app
        .get("/download_osm?tags=%7B%22building%22%3A%22house%22%7D")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("buildings_for_osm_import.geojson")
    );
    let osm: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(osm["generator"], "Building Detector");
    let features = osm["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    for feature in features {
        assert_eq!(feature["properties"]["building"], "house");
        assert_eq!(feature["properties"]["source"], "GeoAI Detection");
        assert_eq!(feature["properties"]["source:date"], Value::String(today()));
    }
    assert_eq!(
        features[0]["properties"]["note"],
        "Detected building area: 12.3 m²"
    );
    assert!(features[1]["properties"].get("note").is_none());

    // {building
    let (status, _, body) = app.get("/download_osm?tags=%7Bbuilding").await;
    assert_eq!(status, StatusCode::OK, "malformed tags must not fail the download");
    let osm: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(osm["features"][0]["properties"]["building"], "yes");
    assert!(app.root.join(paths::OSM_OUTPUT).is_file());
}

#[tokio::test]
async fn test_get_satellite_validation() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post_json(
            "/get_satellite",
            r#"{"west":-122.41,"south":37.77,"east":-122.42,"north":37.78}"#,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("west"));

    let (status, _) = app
        .post_json("/get_satellite", r#"{"west":-122.42,"south":37.77}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.files(), vec![paths::SENTINEL.to_string()]);
}

#[tokio::test]
async fn test_process_rejects_malformed_points() {
    let app = TestApp::new().await;
    app.post_json("/get_satellite", BBOX).await;

    let (status, _) = app.post_json("/process", r#"{"points":[[37.775]]}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json("/process", r#"{"points":[[137.775,-122.415]]}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("latitude"));

    assert_eq!(app.detector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_detector_failure_is_bad_gateway() {
    let failing = Router::new().route(
        "/detect",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
    );
    let base = spawn_detector(failing).await;
    let app = TestApp::with_detector(&base, DetectorLog::default(), 16 * 1024 * 1024);
    app.post_json("/get_satellite", BBOX).await;

    let (status, body) = app.post_json("/process", POINTS).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("Status 500"), "{message}");
    assert!(message.contains("CUDA out of memory"), "{message}");
    assert!(!app.root.join(paths::DETECTION_RESULT).exists());
}

#[tokio::test]
async fn test_unreachable_detector_is_bad_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = TestApp::with_detector(
        &format!("http://{addr}"),
        DetectorLog::default(),
        16 * 1024 * 1024,
    );
    app.post_json("/get_satellite", BBOX).await;

    let (status, body) = app.post_json("/process", POINTS).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to connect to detection server")
    );
}

/// Loading the page starts a new session.
///
/// Tests:
/// - every artifact except the sentinel is deleted
/// - the current raster is forgotten
#[tokio::test]
async fn test_index_clears_session() {
    let app = TestApp::new().await;
    app.post_json("/get_satellite", BBOX).await;
    app.post_json("/process", POINTS).await;
    assert!(app.files().len() > 1);

    let (status, headers, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(String::from_utf8(body).unwrap().contains("Building Detector"));
    assert_eq!(app.files(), vec![paths::SENTINEL.to_string()]);

    let (status, _) = app.post_json("/process", POINTS).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.detector.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_uploads_serves_files_and_404s() {
    let app = TestApp::new().await;
    let (_, body) = app.post_json("/get_satellite", BBOX).await;

    let (status, _, bytes) = app.get(body["image_url"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"II*\0stub-geotiff");

    let (status, _, _) = app.get("/uploads/satellite_missing.tif").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = TestApp::with_detector("http://127.0.0.1:9", DetectorLog::default(), 64);

    let points: Vec<[f64; 2]> = vec![[37.775, -122.415]; 100];
    let body = json!({ "points": points }).to_string();
    let (status, _) = app.post_json("/process", &body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
