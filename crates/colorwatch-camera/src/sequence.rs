//! Replay a directory of still images as a frame stream.

use std::path::{Path, PathBuf};

use colorwatch_core::detector::FrameSource;
use colorwatch_core::{ColorwatchError, ColorwatchResult};
use image::RgbImage;
use tracing::debug;

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Frames read from image files in lexical file-name order.
pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    repeat: bool,
}

impl ImageSequence {
    /// Collect every PNG/JPEG in `dir`. With `repeat` the sequence loops.
    pub fn open(dir: &Path, repeat: bool) -> ColorwatchResult<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(ColorwatchError::frame_source(format!(
                "no images found in {}",
                dir.display()
            )));
        }
        debug!(dir = %dir.display(), count = files.len(), "Image sequence opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
            repeat,
        })
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> ColorwatchResult<Option<RgbImage>> {
        if self.next == self.files.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.next = 0;
        }
        let path = &self.files[self.next];
        self.next += 1;
        Ok(Some(image::open(path)?.to_rgb8()))
    }

    fn describe(&self) -> String {
        format!("{} images in {}", self.files.len(), self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frame(dir: &Path, name: &str, color: [u8; 3]) {
        RgbImage::from_pixel(4, 4, Rgb(color))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "002.png", [0, 0, 255]);
        write_frame(dir.path(), "001.png", [255, 0, 0]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut seq = ImageSequence::open(dir.path(), false).unwrap();
        assert!(seq.describe().starts_with("2 images in "));
        assert_eq!(seq.next_frame().unwrap().unwrap().get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(seq.next_frame().unwrap().unwrap().get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert!(seq.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_repeat_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", [1, 2, 3]);

        let mut seq = ImageSequence::open(dir.path(), true).unwrap();
        for _ in 0..3 {
            assert!(seq.next_frame().unwrap().is_some());
        }
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::open(dir.path(), false),
            Err(ColorwatchError::Source(_))
        ));
    }

    #[test]
    fn test_corrupt_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png").unwrap();
        let mut seq = ImageSequence::open(dir.path(), false).unwrap();
        assert!(matches!(seq.next_frame(), Err(ColorwatchError::Image(_))));
    }
}
