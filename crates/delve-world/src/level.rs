//! Level images.

use crate::palette::{Rgba, TileKind};
use delve_common::{DelveResult, LevelError, TileCoord};
use std::path::Path;
use tracing::debug;

/// A decoded, color-coded level layout.
///
/// Pixel `(x, y)` is tile `(x, y)`: column first, row second.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelImage {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl LevelImage {
    /// Creates a level from a tightly packed RGBA8 buffer.
    pub fn from_rgba(width: u32, height: u32, bytes: &[u8]) -> Result<Self, LevelError> {
        let expected = width as usize * height as usize * 4;
        if bytes.len() != expected {
            return Err(LevelError::Dimensions {
                width,
                height,
                len: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decodes a level from encoded image bytes (PNG).
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, LevelError> {
        let img = image::load_from_memory(bytes).map_err(|e| LevelError::Decode(e.to_string()))?;
        let rgba = img.to_rgba8();
        Self::from_rgba(rgba.width(), rgba.height(), rgba.as_raw())
    }

    /// Loads a level image from disk.
    pub fn load(path: impl AsRef<Path>) -> DelveResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let level = Self::from_encoded(&bytes)?;
        debug!(
            "Loaded level {} ({}x{})",
            path.display(),
            level.width,
            level.height
        );
        Ok(level)
    }

    /// Builds a level from a text layout, one string per row.
    ///
    /// Glyphs follow [`TileKind::glyph`]; rows shorter than the widest one are
    /// padded with void.
    #[must_use]
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let height = rows.len();
        let mut pixels = Vec::with_capacity(width * height);
        for row in rows {
            let mut count = 0;
            for c in row.chars() {
                pixels.push(TileKind::from_glyph(c).color());
                count += 1;
            }
            pixels.extend(std::iter::repeat(TileKind::Void.color()).take(width - count));
        }
        Self {
            width: width as u32,
            height: height as u32,
            pixels,
        }
    }

    /// Returns the image width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the image height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if the image has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Returns the pixel at a tile, or `None` out of bounds.
    #[must_use]
    pub fn pixel(&self, tile: TileCoord) -> Option<Rgba> {
        if tile.x < 0 || tile.y < 0 || tile.x as u32 >= self.width || tile.y as u32 >= self.height {
            return None;
        }
        self.pixels
            .get(tile.y as usize * self.width as usize + tile.x as usize)
            .copied()
    }

    /// Classifies the pixel at a tile. Out of bounds is void.
    #[must_use]
    pub fn kind_at(&self, tile: TileCoord) -> TileKind {
        self.pixel(tile).map_or(TileKind::Void, TileKind::classify)
    }

    /// Iterates every tile with its classification, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (TileCoord, TileKind)> + '_ {
        let width = self.width.max(1) as usize;
        self.pixels.iter().enumerate().map(move |(i, p)| {
            (
                TileCoord::new((i % width) as i32, (i / width) as i32),
                TileKind::classify(*p),
            )
        })
    }
}
