//! Frame sources for the colorwatch detector.
//!
//! A source is chosen with a short spec string: `camera`, `camera:N`, or
//! `dir:<path>`. Live capture needs the `v4l` feature.

pub mod sequence;
#[cfg(feature = "v4l")]
pub mod v4l_camera;

use std::path::PathBuf;
use std::str::FromStr;

use colorwatch_core::detector::FrameSource;
use colorwatch_core::{ColorwatchError, ColorwatchResult};

pub use sequence::ImageSequence;
#[cfg(feature = "v4l")]
pub use v4l_camera::V4lCamera;

/// Boxed source handed to the detector thread.
pub type BoxedSource = Box<dyn FrameSource + Send>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    Camera { device: usize },
    Directory { path: PathBuf },
}

impl FromStr for SourceSpec {
    type Err = ColorwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "camera" {
            return Ok(Self::Camera { device: 0 });
        }
        if let Some(index) = s.strip_prefix("camera:") {
            let device = index
                .parse()
                .map_err(|_| ColorwatchError::config(format!("invalid camera index '{}'", index)))?;
            return Ok(Self::Camera { device });
        }
        if let Some(path) = s.strip_prefix("dir:") {
            if path.is_empty() {
                return Err(ColorwatchError::config("dir: source needs a path"));
            }
            return Ok(Self::Directory { path: path.into() });
        }
        Err(ColorwatchError::config(format!(
            "unknown source '{}' (expected 'camera', 'camera:N' or 'dir:<path>')",
            s
        )))
    }
}

/// Open the source described by `spec`. `repeat` loops replayed directories.
pub fn open(spec: &SourceSpec, repeat: bool) -> ColorwatchResult<BoxedSource> {
    match spec {
        SourceSpec::Directory { path } => Ok(Box::new(ImageSequence::open(path, repeat)?)),
        SourceSpec::Camera { device } => open_camera(*device),
    }
}

#[cfg(feature = "v4l")]
fn open_camera(device: usize) -> ColorwatchResult<BoxedSource> {
    Ok(Box::new(V4lCamera::open(device)?))
}

#[cfg(not(feature = "v4l"))]
fn open_camera(device: usize) -> ColorwatchResult<BoxedSource> {
    Err(ColorwatchError::frame_source(format!(
        "cannot open camera {}: built without the 'v4l' feature",
        device
    )))
}
