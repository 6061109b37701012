use crate::errors::{FootprintError, Result};
use crate::paths;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use uuid::Uuid;

/// Reserved location for a raster that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSlot {
    pub token: String,
    pub path: PathBuf,
}

/// A satellite raster that exists on disk and is the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterArtifact {
    pub token: String,
    pub path: PathBuf,
}

impl RasterArtifact {
    pub fn file_name(&self) -> String {
        paths::satellite_file_name(&self.token)
    }
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: Vec<(PathBuf, io::Error)>,
}

#[derive(Debug, Default)]
struct Handles {
    raster: Option<RasterArtifact>,
    detection: Option<PathBuf>,
}

/// Upload folder holding the artifacts of the current session.
///
/// The current raster and detection result are tracked as explicit handles;
/// the directory is only scanned once, when the store is opened.
#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    handles: Mutex<Handles>,
}

impl ArtifactStore {
    /// Open (creating if needed) the upload folder and adopt whatever a previous
    /// run left behind.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let store = Self {
            root,
            handles: Mutex::new(Handles::default()),
        };

        let mut handles = store.handles();
        if let Ok(path) = store.latest(paths::SATELLITE_PREFIX)
            && let Some(token) = token_from_path(&path)
        {
            tracing::info!(path = %path.display(), "Adopted existing satellite image");
            handles.raster = Some(RasterArtifact { token, path });
        }
        let detection = store.path(paths::DETECTION_RESULT);
        if detection.is_file() {
            tracing::info!(path = %detection.display(), "Adopted existing detection result");
            handles.detection = Some(detection);
        }
        drop(handles);

        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Reserve a fresh raster location. Nothing is written.
    pub fn acquire_slot(&self) -> RasterSlot {
        let token = Uuid::new_v4().to_string();
        let path = self.path(&paths::satellite_file_name(&token));
        RasterSlot { token, path }
    }

    /// Mark a written slot as the current raster, replacing the previous one.
    pub fn commit_raster(&self, slot: RasterSlot) -> RasterArtifact {
        let artifact = RasterArtifact {
            token: slot.token,
            path: slot.path,
        };
        self.handles().raster = Some(artifact.clone());
        artifact
    }

    pub fn current_raster(&self) -> Result<RasterArtifact> {
        self.handles()
            .raster
            .clone()
            .ok_or_else(|| FootprintError::NotFound("No satellite image found".to_string()))
    }

    pub fn set_detection(&self, path: PathBuf) {
        self.handles().detection = Some(path);
    }

    pub fn current_detection(&self) -> Result<PathBuf> {
        self.handles()
            .detection
            .clone()
            .ok_or_else(|| FootprintError::NotFound("No detection result found".to_string()))
    }

    /// Newest file whose name starts with `prefix`, by creation time.
    pub fn latest(&self, prefix: &str) -> Result<PathBuf> {
        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            candidates.push((created, entry.path()));
        }

        candidates
            .into_iter()
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, path)| path)
            .ok_or_else(|| FootprintError::NotFound(format!("No file matching {prefix}* found")))
    }

    /// Delete every file except the sentinel and forget both handles.
    ///
    /// Per-file failures are collected in the report; only an unreadable
    /// folder is an error.
    pub fn clear_session(&self) -> Result<CleanupReport> {
        *self.handles() = Handles::default();

        let mut targets = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name() == paths::SENTINEL {
                continue;
            }
            let path = entry.path();
            if path.is_file() {
                targets.push(path);
            }
        }
        Ok(remove_files(targets))
    }

    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                FootprintError::NotFound(format!("File not found: {}", path.display()))
            }
            _ => FootprintError::Io(e),
        })
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove_files(targets: Vec<PathBuf>) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in targets {
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted file");
                report.removed += 1;
            }
            Err(e) => report.failed.push((path, e)),
        }
    }
    report
}

fn token_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(paths::SATELLITE_PREFIX).map(str::to_string)
}
