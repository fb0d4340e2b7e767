// Image loading module
// Decodes image files into paintable images and runs the lazy load workers

use crate::geometry::{Point, Rect};
use crate::trigger::WakeSignal;
use crossbeam_channel::Sender;
use image::DynamicImage;
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Why an image could not be loaded
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to detect image format: {0}")]
    Format(#[source] image::ImageError),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
}

/// A decoded image, immutable once constructed
#[derive(Debug, Clone)]
pub struct ViewImage {
    name: String,
    bounds: Rect,
    /// BGRA pixels, 4 bytes per pixel, rows packed without padding
    data: Vec<u8>,
}

/// Bytes needed for a tightly packed BGRA image
fn bgra_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

impl ViewImage {
    /// Build an image from BGRA pixel data
    pub fn from_bgra(name: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), bgra_len(width, height));
        Self {
            name: name.into(),
            bounds: Rect::new(Point::ZERO, Point::new(width as i32, height as i32)),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The part of this image inside `rect`
    pub fn sub_image(&self, rect: Rect) -> SubImage<'_> {
        SubImage {
            image: self,
            rect: self.bounds.intersect(&rect),
        }
    }
}

/// A borrowed rectangular view into a [`ViewImage`]
#[derive(Debug, Clone, Copy)]
pub struct SubImage<'a> {
    image: &'a ViewImage,
    rect: Rect,
}

impl<'a> SubImage<'a> {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn width(&self) -> u32 {
        self.rect.dx().max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.rect.dy().max(0) as u32
    }

    /// BGRA bytes of row `y` (relative to the sub-image)
    pub fn row(&self, y: u32) -> &'a [u8] {
        let stride = self.image.bounds.dx() as usize * 4;
        let src_y = (self.rect.min.y - self.image.bounds.min.y) as usize + y as usize;
        let src_x = (self.rect.min.x - self.image.bounds.min.x) as usize;
        let start = src_y * stride + src_x * 4;
        &self.image.data[start..start + self.width() as usize * 4]
    }

    /// Copy the visible pixels into a tightly packed buffer
    pub fn to_bgra(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity((self.width() * self.height() * 4) as usize);
        for y in 0..self.height() {
            out.extend_from_slice(self.row(y));
        }
        out
    }
}

/// A finished load, sent from a worker to the canvas exactly once
#[derive(Debug)]
pub struct Loaded {
    pub index: usize,
    pub result: Result<ViewImage, LoadError>,
}

/// Display name for a path: its file name when it has one
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load and decode an image file, optionally scaling it
pub fn load_image(path: &Path, scale: f32) -> Result<ViewImage, LoadError> {
    let data = fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let img = load_from_bytes(&data)?;

    let img = if (scale - 1.0).abs() > f32::EPSILON {
        let new_width = ((img.width() as f32 * scale) as u32).max(1);
        let new_height = ((img.height() as f32 * scale) as u32).max(1);
        img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    // Wayland ARGB8888 is BGRA in memory on little-endian
    let mut bgra_data = rgba.into_raw();
    for pixel in bgra_data.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    Ok(ViewImage::from_bgra(display_name(path), width, height, bgra_data))
}

/// Decode raw bytes, auto-detecting the format
fn load_from_bytes(data: &[u8]) -> Result<DynamicImage, LoadError> {
    let format = image::guess_format(data).map_err(LoadError::Format)?;
    image::load(Cursor::new(data), format).map_err(LoadError::Decode)
}

/// Spawn the dormant worker for image `index`.
///
/// The worker waits for its wake signal, loads the file and reports back
/// through `completions`. If the trigger is dropped unfired it exits quietly.
pub fn spawn_loader(
    index: usize,
    path: PathBuf,
    scale: f32,
    wake: WakeSignal,
    completions: Sender<Loaded>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("loader-{}", index))
        .spawn(move || {
            if !wake.wait() {
                debug!("Loader {} never woken", index);
                return;
            }

            debug!("Loading image {}: {}", index, path.display());
            let result = load_image(&path, scale);
            match &result {
                Ok(img) => info!(
                    "Image {} loaded: {}x{} pixels",
                    index,
                    img.bounds().dx(),
                    img.bounds().dy()
                ),
                Err(e) => warn!("Image {} failed to load: {}", index, e),
            }

            if completions.send(Loaded { index, result }).is_err() {
                debug!("Canvas gone before image {} finished loading", index);
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::LoadTrigger;
    use std::time::Duration;

    fn checkerboard(width: u32, height: u32) -> ViewImage {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        ViewImage::from_bgra("board", width, height, data)
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn bgra_len_does_not_wrap_at_four_gigabytes() {
        assert_eq!(bgra_len(32768, 32768), 1usize << 32);
        assert_eq!(bgra_len(u32::MAX, 2), u32::MAX as usize * 8);
        assert_eq!(bgra_len(8, 6), 192);
    }

    #[test]
    fn sub_image_rows_address_the_right_pixels() {
        let img = checkerboard(8, 6);
        let sub = img.sub_image(Rect::new(Point::new(2, 3), Point::new(5, 5)));

        assert_eq!((sub.width(), sub.height()), (3, 2));
        assert_eq!(sub.row(0), &[2, 3, 0, 255, 3, 3, 0, 255, 4, 3, 0, 255]);
        assert_eq!(&sub.row(1)[..4], &[2, 4, 0, 255]);
    }

    #[test]
    fn sub_image_is_clipped_to_bounds() {
        let img = checkerboard(8, 6);
        let sub = img.sub_image(Rect::new(Point::new(6, 4), Point::new(100, 100)));

        assert_eq!((sub.width(), sub.height()), (2, 2));
        assert_eq!(sub.to_bgra().len(), 2 * 2 * 4);
    }

    #[test]
    fn load_png_swaps_to_bgra() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        let buf = image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]));
        buf.save(&path).unwrap();

        let img = load_image(&path, 1.0).unwrap();
        assert_eq!(img.name(), "red.png");
        assert_eq!(img.bounds().size(), crate::geometry::Size::new(3, 2));
        assert_eq!(img.sub_image(img.bounds()).row(0)[..4], [0, 0, 255, 255]);
    }

    #[test]
    fn load_applies_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        image::RgbaImage::new(40, 20).save(&path).unwrap();

        let img = load_image(&path, 0.5).unwrap();
        assert_eq!((img.bounds().dx(), img.bounds().dy()), (20, 10));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_image(Path::new("/nonexistent/nothing.png"), 1.0).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn garbage_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        fs::write(&path, b"definitely not an image").unwrap();

        let err = load_image(&path, 1.0).unwrap_err();
        assert!(matches!(err, LoadError::Format(_)));
    }

    #[test]
    fn worker_waits_for_trigger_then_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.png");
        image::RgbaImage::new(4, 4).save(&path).unwrap();

        let (mut trigger, wake) = LoadTrigger::pair();
        let (tx, rx) = crossbeam_channel::bounded(0);
        let worker = spawn_loader(7, path, 1.0, wake, tx).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        assert!(trigger.fire());
        let loaded = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(loaded.index, 7);
        assert!(loaded.result.is_ok());

        worker.join().unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn worker_exits_when_trigger_dropped() {
        let (trigger, wake) = LoadTrigger::pair();
        let (tx, rx) = crossbeam_channel::bounded::<Loaded>(0);
        let worker = spawn_loader(0, PathBuf::from("unused.png"), 1.0, wake, tx).unwrap();

        drop(trigger);
        worker.join().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
