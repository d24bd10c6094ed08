//! Grayscale heightmap terrain for outdoor levels.

use delve_common::{DelveResult, LevelError};
use glam::Vec3;
use std::path::Path;
use tracing::debug;

/// Grayscale heightmap. Samples are normalized to `0.0..=1.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heightmap {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl Heightmap {
    /// Creates a heightmap from 8-bit luma values.
    pub fn from_luma(width: u32, height: u32, bytes: &[u8]) -> Result<Self, LevelError> {
        if bytes.len() != width as usize * height as usize {
            return Err(LevelError::Dimensions {
                width,
                height,
                len: bytes.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples: bytes.iter().map(|b| f32::from(*b) / 255.0).collect(),
        })
    }

    /// Creates a flat heightmap at a normalized level.
    #[must_use]
    pub fn flat(width: u32, height: u32, level: f32) -> Self {
        Self {
            width,
            height,
            samples: vec![level.clamp(0.0, 1.0); width as usize * height as usize],
        }
    }

    /// Decodes a heightmap from encoded image bytes, converting to grayscale.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, LevelError> {
        let img = image::load_from_memory(bytes).map_err(|e| LevelError::Decode(e.to_string()))?;
        let luma = img.to_luma8();
        Self::from_luma(luma.width(), luma.height(), luma.as_raw())
    }

    /// Loads a heightmap image from disk.
    pub fn load(path: impl AsRef<Path>) -> DelveResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let map = Self::from_encoded(&bytes)?;
        debug!("Loaded heightmap {} ({}x{})", path.display(), map.width, map.height);
        Ok(map)
    }

    /// Returns the width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the normalized sample at a pixel, clamped to the image bounds.
    #[must_use]
    pub fn sample(&self, px: i64, pz: i64) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let x = px.clamp(0, i64::from(self.width) - 1) as usize;
        let z = pz.clamp(0, i64::from(self.height) - 1) as usize;
        self.samples
            .get(z * self.width as usize + x)
            .copied()
            .unwrap_or(0.0)
    }

    /// World-space floor height under `pos`.
    ///
    /// `scale.x` and `scale.z` are world units per pixel, `scale.y` is the
    /// height of a white pixel. Sampling is nearest-pixel, no filtering.
    #[must_use]
    pub fn height_at_world(&self, pos: Vec3, scale: Vec3) -> f32 {
        if scale.x <= 0.0 || scale.z <= 0.0 {
            return 0.0;
        }
        let px = (pos.x / scale.x).round() as i64;
        let pz = (pos.z / scale.z).round() as i64;
        self.sample(px, pz) * scale.y
    }

    /// World-space extent along X and Z.
    #[must_use]
    pub fn world_extent(&self, scale: Vec3) -> (f32, f32) {
        (self.width as f32 * scale.x, self.height as f32 * scale.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Heightmap {
        // 4x2, x increasing brightness.
        Heightmap::from_luma(4, 2, &[0, 85, 170, 255, 0, 85, 170, 255]).expect("valid heightmap")
    }

    #[test]
    fn test_nearest_pixel() {
        let map = ramp();
        let scale = Vec3::new(10.0, 100.0, 10.0);
        assert!((map.height_at_world(Vec3::new(0.0, 0.0, 0.0), scale)).abs() < 0.001);
        assert!((map.height_at_world(Vec3::new(14.0, 0.0, 0.0), scale) - 33.333).abs() < 0.01);
        assert!((map.height_at_world(Vec3::new(16.0, 0.0, 0.0), scale) - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let map = ramp();
        let scale = Vec3::new(10.0, 100.0, 10.0);
        assert!((map.height_at_world(Vec3::new(-500.0, 0.0, -500.0), scale)).abs() < 0.001);
        assert!((map.height_at_world(Vec3::new(9999.0, 0.0, 9999.0), scale) - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_empty_heightmap_is_flat_zero() {
        let map = Heightmap::default();
        assert!(map.height_at_world(Vec3::new(5.0, 0.0, 5.0), Vec3::ONE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(Heightmap::from_luma(3, 3, &[0; 4]).is_err());
    }
}
