//! HSV color ranges and per-frame pixel counting.
//!
//! Hue follows the 8-bit convention used by most vision tooling: degrees
//! halved into `0..=179`. Saturation and value span `0..=255`.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{ColorwatchError, ColorwatchResult};

/// Largest hue value in the halved-degree convention.
pub const MAX_HUE: u8 = 179;

/// A single HSV triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    /// Convert an 8-bit RGB pixel.
    ///
    /// Fixed-point with 12 fractional bits and rounded reciprocal tables, so
    /// results match the reference 8-bit `RGB2HSV` conversion bit for bit,
    /// including pixels that sit on a hue rounding boundary.
    pub fn from_rgb(pixel: Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));

        let v = r.max(g).max(b);
        let diff = v - r.min(g).min(b);

        let s = (diff * SAT_DIV[v as usize] + HSV_ROUND) >> HSV_SHIFT;

        let h = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };
        let mut h = (h * HUE_DIV[diff as usize] + HSV_ROUND) >> HSV_SHIFT;
        if h < 0 {
            h += 180;
        }

        Self::new(h as u8, s as u8, v as u8)
    }
}

const HSV_SHIFT: i32 = 12;
const HSV_ROUND: i32 = 1 << (HSV_SHIFT - 1);

/// `round((255 << 12) / v)`, zero at index 0.
const SAT_DIV: [i32; 256] = reciprocal_table(255 << HSV_SHIFT);

/// `round((30 << 12) / diff)`: one sixth of 180 hue steps, zero at index 0.
const HUE_DIV: [i32; 256] = reciprocal_table(30 << HSV_SHIFT);

const fn reciprocal_table(numerator: i32) -> [i32; 256] {
    let mut table = [0; 256];
    let mut i = 1;
    while i < 256 {
        let d = i as i32;
        table[i] = (2 * numerator + d) / (2 * d);
        i += 1;
    }
    table
}

impl From<[u8; 3]> for Hsv {
    fn from([h, s, v]: [u8; 3]) -> Self {
        Self::new(h, s, v)
    }
}

impl From<Hsv> for [u8; 3] {
    fn from(hsv: Hsv) -> Self {
        [hsv.h, hsv.s, hsv.v]
    }
}

impl std::str::FromStr for Hsv {
    type Err = ColorwatchError;

    /// Parse `"h,s,v"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ColorwatchError::InvalidRange(format!(
                "expected 'h,s,v', got '{}'",
                s
            )));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                ColorwatchError::InvalidRange(format!("'{}' is not a value in 0..=255", part))
            })?;
        }
        Ok(channels.into())
    }
}

/// Inclusive HSV box a pixel must fall into to count as a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl HsvRange {
    /// Build a range, rejecting inverted bounds and hues above 179.
    pub fn new(lower: Hsv, upper: Hsv) -> ColorwatchResult<Self> {
        let range = Self { lower, upper };
        range.validate()?;
        Ok(range)
    }

    /// Blue: `[100, 150, 0]` to `[140, 255, 255]`.
    pub const fn blue() -> Self {
        Self {
            lower: Hsv::new(100, 150, 0),
            upper: Hsv::new(140, 255, 255),
        }
    }

    pub fn validate(&self) -> ColorwatchResult<()> {
        if self.upper.h > MAX_HUE {
            return Err(ColorwatchError::InvalidRange(format!(
                "hue {} exceeds {}",
                self.upper.h, MAX_HUE
            )));
        }
        let pairs = [
            ("hue", self.lower.h, self.upper.h),
            ("saturation", self.lower.s, self.upper.s),
            ("value", self.lower.v, self.upper.v),
        ];
        for (channel, lo, hi) in pairs {
            if lo > hi {
                return Err(ColorwatchError::InvalidRange(format!(
                    "{} lower bound {} is above upper bound {}",
                    channel, lo, hi
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }

    /// Detection sample for one frame: number of pixels inside the range.
    /// Saturates at `u32::MAX`.
    pub fn count_matching(&self, frame: &RgbImage) -> u32 {
        let count = frame
            .pixels()
            .filter(|pixel| self.contains(Hsv::from_rgb(**pixel)))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

impl Default for HsvRange {
    fn default() -> Self {
        Self::blue()
    }
}
