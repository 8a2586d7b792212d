//! # Icon Assets
//!
//! Symbolic asset ids and the glyphs behind them. On a watch the host owns the
//! drawables; off-device the [`BuiltinAssets`] set draws equivalent monochrome
//! bitmaps with `embedded-graphics` so renders can be inspected in a terminal.
//!
//! ## Asset Set
//! - **25 moon phases**: `MoonPhase(0)` … `MoonPhase(24)`; 0 and 24 are both new moon
//! - **3 heart variants**: outline, red outline and filled, used in pairs by the
//!   heart-rate views to produce a "pulse"

use crate::lunar::{PhaseIndex, LAST_BUCKET, PHASE_BUCKETS};
use core::convert::Infallible;
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle},
};
use serde::Serialize;
use std::f64::consts::TAU;
use std::sync::Arc;

/// Default glyph edge length in pixels.
pub const DEFAULT_GLYPH_SIZE: u32 = 24;
/// Smallest edge that still shows a recognisable moon or heart.
pub const MIN_GLYPH_SIZE: u32 = 8;
/// Largest accepted edge; glyph buffers are `edge * edge` pixels.
pub const MAX_GLYPH_SIZE: u32 = 256;

/// Symbolic id of a renderable icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetId {
    MoonPhase(PhaseIndex),
    HeartOutline,
    HeartOutlineRed,
    HeartFilled,
}

/// Colour hint for monochrome icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tint {
    Monochrome,
    Red,
}

/// Square 1-bit bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    size: u32,
    pixels: Vec<bool>,
}

impl Glyph {
    /// Blank glyph; `size` is capped at [`MAX_GLYPH_SIZE`].
    pub fn new(size: u32) -> Self {
        let size = size.min(MAX_GLYPH_SIZE);
        let edge = size as usize;
        Self {
            size,
            pixels: vec![false; edge * edge],
        }
    }

    pub fn edge(&self) -> u32 {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.size || y >= self.size {
            return false;
        }
        self.pixels[(y * self.size + x) as usize]
    }

    fn set(&mut self, x: i32, y: i32, on: bool) {
        if x < 0 || y < 0 || x as u32 >= self.size || y as u32 >= self.size {
            return;
        }
        let idx = (y as u32 * self.size + x as u32) as usize;
        self.pixels[idx] = on;
    }

    /// Number of set pixels.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// One line per row, `#` for set pixels and `.` for clear ones.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(((self.size + 1) * self.size) as usize);
        for row in self.pixels.chunks(self.size.max(1) as usize) {
            out.extend(row.iter().map(|&p| if p { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }
}

impl OriginDimensions for Glyph {
    fn size(&self) -> Size {
        Size::new(self.size, self.size)
    }
}

impl DrawTarget for Glyph {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

/// A resolved icon as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icon {
    pub asset: AssetId,
    pub tint: Tint,
    #[serde(skip)]
    pub glyph: Arc<Glyph>,
}

/// Maps symbolic asset ids to icons.
pub trait AssetLookup: Send + Sync {
    fn icon(&self, id: AssetId) -> Icon;
}

/// Glyphs drawn once at start-up and shared by every render.
pub struct BuiltinAssets {
    moons: Vec<Arc<Glyph>>,
    heart_outline: Arc<Glyph>,
    heart_filled: Arc<Glyph>,
}

impl BuiltinAssets {
    pub fn new(glyph_size: u32) -> Self {
        let size = glyph_size.clamp(MIN_GLYPH_SIZE, MAX_GLYPH_SIZE);
        let moons = (0..PHASE_BUCKETS)
            .map(|bucket| Arc::new(draw_moon(size, bucket)))
            .collect();

        Self {
            moons,
            heart_outline: Arc::new(draw_heart(size, false)),
            heart_filled: Arc::new(draw_heart(size, true)),
        }
    }
}

impl Default for BuiltinAssets {
    fn default() -> Self {
        Self::new(DEFAULT_GLYPH_SIZE)
    }
}

impl AssetLookup for BuiltinAssets {
    fn icon(&self, id: AssetId) -> Icon {
        let (glyph, tint) = match id {
            AssetId::MoonPhase(bucket) => (
                &self.moons[usize::from(bucket.min(LAST_BUCKET))],
                Tint::Monochrome,
            ),
            AssetId::HeartOutline => (&self.heart_outline, Tint::Monochrome),
            AssetId::HeartOutlineRed => (&self.heart_outline, Tint::Red),
            AssetId::HeartFilled => (&self.heart_filled, Tint::Monochrome),
        };
        Icon {
            asset: id,
            tint,
            glyph: Arc::clone(glyph),
        }
    }
}

fn infallible(result: Result<(), Infallible>) {
    if let Err(never) = result {
        match never {}
    }
}

/// Moon disc with the lit region for `bucket`, outlined so a new moon is
/// still visible.
fn draw_moon(size: u32, bucket: PhaseIndex) -> Glyph {
    let mut glyph = Glyph::new(size);
    let phase = f64::from(bucket) / f64::from(LAST_BUCKET);
    let terminator = (phase * TAU).cos();
    let waxing = phase <= 0.5;
    let r = f64::from(size) / 2.0;
    let lit = PrimitiveStyle::with_stroke(BinaryColor::On, 1);

    for y in 0..size as i32 {
        let dy = f64::from(y) + 0.5 - r;
        if dy.abs() >= r {
            continue;
        }
        let half_width = (r * r - dy * dy).sqrt();
        // Lit span in disc coordinates, relative to the centre column.
        let (from, to) = if waxing {
            (half_width * terminator, half_width)
        } else {
            (-half_width, -half_width * terminator)
        };
        let x0 = (r + from).round() as i32;
        let x1 = (r + to).round() as i32 - 1;
        if x1 < x0 {
            continue;
        }
        infallible(
            Line::new(Point::new(x0, y), Point::new(x1, y))
                .into_styled(lit)
                .draw(&mut glyph),
        );
    }

    infallible(
        Circle::new(Point::zero(), size)
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut glyph),
    );
    glyph
}

/// Classic implicit heart curve: `(x² + y² − 1)³ − x²y³ ≤ 0`.
fn inside_heart(size: u32, px: i32, py: i32) -> bool {
    if px < 0 || py < 0 || px as u32 >= size || py as u32 >= size {
        return false;
    }
    let s = f64::from(size);
    let x = (f64::from(px) + 0.5) / s * 2.6 - 1.3;
    let y = 1.25 - (f64::from(py) + 0.5) / s * 2.4;
    let a = x * x + y * y - 1.0;
    a * a * a - x * x * y * y * y <= 0.0
}

fn draw_heart(size: u32, filled: bool) -> Glyph {
    let mut glyph = Glyph::new(size);
    let edge = size as i32;
    let pixels = (0..edge)
        .flat_map(|y| (0..edge).map(move |x| Point::new(x, y)))
        .filter(|p| inside_heart(size, p.x, p.y))
        .filter(|p| {
            filled
                || [(1, 0), (-1, 0), (0, 1), (0, -1)]
                    .iter()
                    .any(|(dx, dy)| !inside_heart(size, p.x + dx, p.y + dy))
        })
        .map(|p| Pixel(p, BinaryColor::On));
    infallible(glyph.draw_iter(pixels));
    glyph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_moon_bucket_has_an_icon() {
        let assets = BuiltinAssets::default();
        for bucket in 0..PHASE_BUCKETS {
            let icon = assets.icon(AssetId::MoonPhase(bucket));
            assert_eq!(icon.asset, AssetId::MoonPhase(bucket));
            assert_eq!(icon.glyph.edge(), DEFAULT_GLYPH_SIZE);
        }
    }

    #[test]
    fn test_new_moon_buckets_share_a_look() {
        let assets = BuiltinAssets::default();
        let first = assets.icon(AssetId::MoonPhase(0));
        let last = assets.icon(AssetId::MoonPhase(LAST_BUCKET));
        assert_eq!(first.glyph, last.glyph);
    }

    #[test]
    fn test_full_moon_is_brightest() {
        let assets = BuiltinAssets::default();
        let new = assets.icon(AssetId::MoonPhase(0)).glyph.lit_count();
        let quarter = assets.icon(AssetId::MoonPhase(6)).glyph.lit_count();
        let full = assets.icon(AssetId::MoonPhase(12)).glyph.lit_count();
        assert!(new < quarter, "new {new} should be darker than quarter {quarter}");
        assert!(quarter < full, "quarter {quarter} should be darker than full {full}");
    }

    #[test]
    fn test_waxing_lights_right_side() {
        let glyph = draw_moon(DEFAULT_GLYPH_SIZE, 6);
        let mid = DEFAULT_GLYPH_SIZE / 2;
        assert!(glyph.get(DEFAULT_GLYPH_SIZE - 3, mid));
        assert!(!glyph.get(3, mid));
    }

    #[test]
    fn test_heart_variants() {
        let assets = BuiltinAssets::default();
        let outline = assets.icon(AssetId::HeartOutline);
        let red = assets.icon(AssetId::HeartOutlineRed);
        let filled = assets.icon(AssetId::HeartFilled);

        assert_eq!(outline.tint, Tint::Monochrome);
        assert_eq!(red.tint, Tint::Red);
        assert_eq!(outline.glyph, red.glyph);
        assert!(filled.glyph.lit_count() > outline.glyph.lit_count());
        assert!(outline.glyph.lit_count() > 0);
    }

    #[test]
    fn test_ascii_dump_shape() {
        let glyph = draw_heart(10, true);
        let ascii = glyph.to_ascii();
        assert_eq!(ascii.lines().count(), 10);
        assert!(ascii.lines().all(|l| l.len() == 10));
        assert!(ascii.contains('#'));
    }

    #[test]
    fn test_glyph_size_is_bounded() {
        let huge = BuiltinAssets::new(70_000);
        assert_eq!(huge.icon(AssetId::HeartFilled).glyph.edge(), MAX_GLYPH_SIZE);
        let tiny = BuiltinAssets::new(1);
        assert_eq!(tiny.icon(AssetId::MoonPhase(12)).glyph.edge(), MIN_GLYPH_SIZE);

        let glyph = Glyph::new(u32::MAX);
        assert_eq!(glyph.edge(), MAX_GLYPH_SIZE);
        assert!(!glyph.get(u32::MAX, 0));
    }

    #[test]
    fn test_out_of_range_bucket_is_clamped() {
        let assets = BuiltinAssets::default();
        let icon = assets.icon(AssetId::MoonPhase(200));
        assert_eq!(icon.glyph, assets.icon(AssetId::MoonPhase(LAST_BUCKET)).glyph);
    }
}
