//! Artifact naming inside the upload folder
//!
//! Producers (acquisition, detection, formatting) and the HTTP layer resolve
//! every file name through these constants.

/// Prefix of every satellite raster, followed by the acquisition token
pub const SATELLITE_PREFIX: &str = "satellite_";

/// Extension of satellite rasters
pub const SATELLITE_EXTENSION: &str = "tif";

/// Raw detection result as returned by the remote detector
pub const DETECTION_RESULT: &str = "building_regularized.geojson";

/// Clean projection written on every `/download`
pub const CLEAN_OUTPUT: &str = "building_detection_clean.geojson";

/// OSM projection written on every `/download_osm`
pub const OSM_OUTPUT: &str = "buildings_for_osm.geojson";

/// Attachment name offered for the clean projection
pub const CLEAN_DOWNLOAD_NAME: &str = "building_detection_result.geojson";

/// Attachment name offered for the OSM projection
pub const OSM_DOWNLOAD_NAME: &str = "buildings_for_osm_import.geojson";

/// Placeholder kept in the upload folder across sessions
pub const SENTINEL: &str = ".gitkeep";

/// Content type of the raster part sent to the detector
pub const RASTER_MIME: &str = "image/tiff";

/// File name of the satellite raster for a given token
pub fn satellite_file_name(token: &str) -> String {
    format!("{SATELLITE_PREFIX}{token}.{SATELLITE_EXTENSION}")
}

/// Public URL under which an upload-folder file is served
pub fn upload_url(file_name: &str) -> String {
    format!("/uploads/{file_name}")
}
