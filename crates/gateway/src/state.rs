use crate::config::Config;
use footprints::{ArtifactStore, DetectionClient, ImageryProvider};
use std::sync::Arc;

/// Tiling parameters applied to every acquisition.
#[derive(Debug, Clone)]
pub struct TileSettings {
    pub zoom: u8,
    pub source: String,
}

pub struct AppState<P> {
    pub store: Arc<ArtifactStore>,
    pub imagery: Arc<P>,
    pub detector: DetectionClient,
    pub tiles: Arc<TileSettings>,
    pub max_content_length: usize,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            imagery: Arc::clone(&self.imagery),
            detector: self.detector.clone(),
            tiles: Arc::clone(&self.tiles),
            max_content_length: self.max_content_length,
        }
    }
}

impl<P: ImageryProvider> AppState<P> {
    pub fn new(
        store: ArtifactStore,
        imagery: P,
        detector: DetectionClient,
        tiles: TileSettings,
        max_content_length: usize,
    ) -> Self {
        Self {
            store: Arc::new(store),
            imagery: Arc::new(imagery),
            detector,
            tiles: Arc::new(tiles),
            max_content_length,
        }
    }

    pub fn from_config(config: &Config, imagery: P) -> footprints::Result<Self> {
        let store = ArtifactStore::open(&config.upload_folder)?;
        let detector = DetectionClient::new(&config.detector_url, config.detector_timeout())?;
        let tiles = TileSettings {
            zoom: config.imagery_zoom,
            source: config.imagery_source.clone(),
        };
        Ok(Self::new(
            store,
            imagery,
            detector,
            tiles,
            config.max_content_length,
        ))
    }
}
