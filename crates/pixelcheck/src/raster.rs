//! Raster images, shaded regions and content hashing.

use crate::result::{PixelCheckError, PixelCheckResult};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::str::FromStr;

/// Decoded screenshot. Comparison reads the RGB channels only.
pub type RasterImage = RgbaImage;

/// Fully transparent pixel
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Region excluded from comparison (dynamic content such as clocks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShadedRegion {
    /// X coordinate of top-left corner
    pub x: u32,
    /// Y coordinate of top-left corner
    pub y: u32,
    /// Width of region
    pub width: u32,
    /// Height of region
    pub height: u32,
}

impl ShadedRegion {
    /// Create a new shaded region
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if a point is within this region
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && px < self.x.saturating_add(self.width)
            && py >= self.y
            && py < self.y.saturating_add(self.height)
    }

    /// Grow the region by `margin` pixels on every side, clamped at the origin
    #[must_use]
    pub const fn inflate(&self, margin: u32) -> Self {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        Self {
            x,
            y,
            width: self.width.saturating_add(self.x - x).saturating_add(margin),
            height: self.height.saturating_add(self.y - y).saturating_add(margin),
        }
    }
}

/// Digest used for a screenshot's content hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// BLAKE3
    Blake3,
}

impl HashAlgorithm {
    /// Canonical name as recorded in sessions
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Hex digest of an image's dimensions and packed RGB content
    #[must_use]
    pub fn digest(self, image: &RasterImage) -> String {
        match self {
            Self::Sha224 => format!("{:x}", feed(Sha224::new(), image).finalize()),
            Self::Sha256 => format!("{:x}", feed(Sha256::new(), image).finalize()),
            Self::Sha384 => format!("{:x}", feed(Sha384::new(), image).finalize()),
            Self::Sha512 => format!("{:x}", feed(Sha512::new(), image).finalize()),
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(&image.width().to_be_bytes());
                hasher.update(&image.height().to_be_bytes());
                for pixel in image.pixels() {
                    hasher.update(&pixel.0[..3]);
                }
                hasher.finalize().to_hex().to_string()
            }
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = PixelCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA224" => Ok(Self::Sha224),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            "BLAKE3" => Ok(Self::Blake3),
            _ => Err(PixelCheckError::UnsupportedHashAlgorithm {
                algorithm: s.to_string(),
            }),
        }
    }
}

fn feed<D: Digest>(mut digest: D, image: &RasterImage) -> D {
    digest.update(image.width().to_be_bytes());
    digest.update(image.height().to_be_bytes());
    for pixel in image.pixels() {
        digest.update(&pixel.0[..3]);
    }
    digest
}

/// Hash an image with a recorded algorithm name
///
/// # Errors
/// Returns `UnsupportedHashAlgorithm` if the name is unknown
pub fn image_hash(algorithm: &str, image: &RasterImage) -> PixelCheckResult<String> {
    Ok(algorithm.parse::<HashAlgorithm>()?.digest(image))
}

/// True when the RGB channels of two pixels are identical
#[must_use]
pub fn same_rgb(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.0[..3] == b.0[..3]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> RasterImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn test_region_contains() {
        let region = ShadedRegion::new(10, 10, 5, 5);
        assert!(region.contains(10, 10));
        assert!(region.contains(14, 14));
        assert!(!region.contains(15, 10));
        assert!(!region.contains(9, 12));
    }

    #[test]
    fn test_region_inflate_clamps_at_origin() {
        let region = ShadedRegion::new(1, 5, 4, 4).inflate(3);
        assert_eq!(region, ShadedRegion::new(0, 2, 8, 10));
        assert!(region.contains(0, 2));
        assert!(region.contains(7, 11));
        assert!(!region.contains(8, 11));
    }

    #[test]
    fn test_algorithm_names_parse() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert_eq!("blake3".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Blake3);
        assert!(matches!(
            "MD5".parse::<HashAlgorithm>(),
            Err(PixelCheckError::UnsupportedHashAlgorithm { .. })
        ));
    }

    #[test]
    fn test_hash_ignores_alpha() {
        let opaque = solid(3, 3, [10, 20, 30, 255]);
        let translucent = solid(3, 3, [10, 20, 30, 7]);
        assert_eq!(
            image_hash("SHA-256", &opaque).unwrap(),
            image_hash("SHA-256", &translucent).unwrap()
        );
    }

    #[test]
    fn test_hash_depends_on_dimensions() {
        let wide = solid(4, 1, [1, 1, 1, 255]);
        let tall = solid(1, 4, [1, 1, 1, 255]);
        assert_ne!(
            image_hash("BLAKE3", &wide).unwrap(),
            image_hash("BLAKE3", &tall).unwrap()
        );
    }

    #[test]
    fn test_hex_digest_length() {
        let img = solid(2, 2, [0, 0, 0, 255]);
        assert_eq!(HashAlgorithm::Sha224.digest(&img).len(), 56);
        assert_eq!(HashAlgorithm::Sha256.digest(&img).len(), 64);
        assert_eq!(HashAlgorithm::Sha384.digest(&img).len(), 96);
        assert_eq!(HashAlgorithm::Sha512.digest(&img).len(), 128);
        assert_eq!(HashAlgorithm::Blake3.digest(&img).len(), 64);
        let digest = HashAlgorithm::Sha256.digest(&img);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
