//! Tiny colour thumbnails as image descriptors.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;

use crate::pool::{CandidateIndex, FilePool};
use crate::provider::FeatureExtractor;

/// Side length of the square thumbnail.
pub const THUMBNAIL_SIDE: u32 = 16;
/// Length of a thumbnail descriptor (RGB per pixel).
pub const THUMBNAIL_DIMS: usize = (THUMBNAIL_SIDE * THUMBNAIL_SIDE * 3) as usize;

/// Describes a frame by its downscaled RGB pixels in `[0, 1]`.
pub struct ThumbnailExtractor {
    paths: Vec<PathBuf>,
}

impl ThumbnailExtractor {
    pub fn new(pool: &FilePool) -> Self {
        Self {
            paths: pool.paths().to_vec(),
        }
    }

    pub fn thumbnail(path: &Path) -> Result<Vec<f32>, String> {
        let image = image::open(path)
            .map_err(|err| format!("Failed to decode {}: {err}", path.display()))?;
        let small = image
            .resize_exact(THUMBNAIL_SIDE, THUMBNAIL_SIDE, FilterType::Triangle)
            .to_rgb8();
        Ok(small
            .pixels()
            .flat_map(|pixel| pixel.0)
            .map(|channel| channel as f32 / 255.0)
            .collect())
    }
}

impl FeatureExtractor for ThumbnailExtractor {
    fn extract(&self, index: CandidateIndex) -> Result<Vec<f32>, String> {
        let path = self
            .paths
            .get(index)
            .ok_or_else(|| format!("no frame at index {index}"))?;
        Self::thumbnail(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn solid_frame_yields_constant_descriptor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(40, 30, Rgb([255, 0, 51])).save(&path).unwrap();
        let descriptor = ThumbnailExtractor::thumbnail(&path).unwrap();
        assert_eq!(descriptor.len(), THUMBNAIL_DIMS);
        assert!((descriptor[0] - 1.0).abs() < 1e-6);
        assert!(descriptor[1].abs() < 1e-6);
        assert!((descriptor[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn extractor_follows_pool_order() {
        let dir = tempdir().unwrap();
        RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        let pool = FilePool::discover(dir.path(), crate::pool::FRAME_EXTENSIONS).unwrap();
        let extractor = ThumbnailExtractor::new(&pool);
        assert_eq!(extractor.extract(0).unwrap()[0], 1.0);
        assert_eq!(extractor.extract(1).unwrap()[0], 0.0);
        assert!(extractor.extract(2).is_err());
    }

    #[test]
    fn undecodable_frame_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = ThumbnailExtractor::thumbnail(&path).unwrap_err();
        assert!(err.contains("broken.png"));
    }
}
