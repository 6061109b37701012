use crate::errors::{FootprintError, Result};
use crate::store::{ArtifactStore, RasterArtifact};
use crate::types::BoundingBox;
use std::future::Future;
use std::path::Path;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub bbox: BoundingBox,
    pub zoom: u8,
    pub source: String,
    pub overwrite: bool,
}

impl TileRequest {
    pub fn new(bbox: BoundingBox, zoom: u8, source: impl Into<String>) -> Self {
        Self {
            bbox,
            zoom,
            source: source.into(),
            overwrite: true,
        }
    }
}

/// Produces a georeferenced raster covering a bounding box.
pub trait ImageryProvider: Send + Sync + 'static {
    /// Write the mosaic for `request` to `output`.
    fn fetch(
        &self,
        request: &TileRequest,
        output: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Runs an external tiling program:
/// `<program> <args..> --output <path> --bbox w,s,e,n --zoom <z> --source <layer> [--overwrite]`
#[derive(Debug, Clone)]
pub struct CommandImagery {
    program: String,
    args: Vec<String>,
}

impl CommandImagery {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            FootprintError::Validation("imagery command must not be empty".to_string())
        })?;
        Ok(Self::new(program, parts.collect()))
    }

    fn command(&self, request: &TileRequest, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--output")
            .arg(output)
            .arg("--bbox")
            .arg(request.bbox.to_arg())
            .arg("--zoom")
            .arg(request.zoom.to_string())
            .arg("--source")
            .arg(&request.source);
        if request.overwrite {
            cmd.arg("--overwrite");
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

impl ImageryProvider for CommandImagery {
    async fn fetch(&self, request: &TileRequest, output: &Path) -> Result<()> {
        tracing::debug!(program = %self.program, output = %output.display(), "Starting tile download");

        let out = self
            .command(request, output)
            .output()
            .await
            .map_err(|e| {
                FootprintError::AcquisitionFailed(format!(
                    "failed to start `{}`: {}",
                    self.program, e
                ))
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(FootprintError::AcquisitionFailed(format!(
                "`{}` exited with {}: {}",
                self.program,
                out.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Download a new satellite raster and make it the current one.
#[tracing::instrument(skip_all, fields(bbox = %request.bbox.to_arg(), zoom = request.zoom))]
pub async fn acquire_satellite<P: ImageryProvider>(
    store: &ArtifactStore,
    provider: &P,
    request: &TileRequest,
) -> Result<RasterArtifact> {
    let slot = store.acquire_slot();
    tracing::info!(path = %slot.path.display(), "Downloading satellite image");

    provider.fetch(request, &slot.path).await?;

    let size = match std::fs::metadata(&slot.path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
        Ok(_) => {
            return Err(FootprintError::AcquisitionFailed(format!(
                "TIF file at {} is empty",
                slot.path.display()
            )));
        }
        Err(_) => {
            return Err(FootprintError::AcquisitionFailed(format!(
                "TIF file was not created at {}",
                slot.path.display()
            )));
        }
    };

    tracing::info!(image_id = %slot.token, size_bytes = size, "Satellite image downloaded");
    Ok(store.commit_raster(slot))
}
