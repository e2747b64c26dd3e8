//! Color scales for focal-plane figures.

use plotters::style::RGBColor;

/// Named colormaps used by the QA figures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Diverging blue-white-red (low values blue, high values red)
    RdBuR,
    /// Sequential yellow-orange-red
    YlOrRd,
}

const RDBU_R: [(u8, u8, u8); 11] = [
    (5, 48, 97),
    (33, 102, 172),
    (67, 147, 195),
    (146, 197, 222),
    (209, 229, 240),
    (247, 247, 247),
    (253, 219, 199),
    (244, 165, 130),
    (214, 96, 77),
    (178, 24, 43),
    (103, 0, 31),
];

const YLORRD: [(u8, u8, u8); 9] = [
    (255, 255, 204),
    (255, 237, 160),
    (254, 217, 118),
    (254, 178, 76),
    (253, 141, 60),
    (252, 78, 42),
    (227, 26, 28),
    (189, 0, 38),
    (128, 0, 38),
];

impl Colormap {
    fn anchors(&self) -> &'static [(u8, u8, u8)] {
        match self {
            Colormap::RdBuR => &RDBU_R,
            Colormap::YlOrRd => &YLORRD,
        }
    }

    /// Color at position `t` in `[0, 1]` (clamped), linearly blended between anchors.
    pub fn sample(&self, t: f64) -> RGBColor {
        let anchors = self.anchors();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let pos = t * (anchors.len() - 1) as f64;
        let lo = (pos.floor() as usize).min(anchors.len() - 2);
        let frac = pos - lo as f64;

        let (r0, g0, b0) = anchors[lo];
        let (r1, g1, b1) = anchors[lo + 1];
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
        RGBColor(mix(r0, r1), mix(g0, g1), mix(b0, b1))
    }
}

/// Maps values onto a colormap over `[vmin, vmax]`
///
/// Values beyond the limits use the `over`/`under` colors when set and the
/// colormap end points otherwise. Sensors without a value get `undefined`.
#[derive(Debug, Clone, Copy)]
pub struct ColorScale {
    pub cmap: Colormap,
    pub vmin: f64,
    pub vmax: f64,
    pub over: Option<RGBColor>,
    pub under: Option<RGBColor>,
    pub undefined: RGBColor,
}

impl ColorScale {
    pub fn new(cmap: Colormap, vmin: f64, vmax: f64) -> Self {
        Self {
            cmap,
            vmin,
            vmax,
            over: None,
            under: None,
            undefined: RGBColor(200, 200, 200),
        }
    }

    pub fn with_over_under(mut self, over: RGBColor, under: RGBColor) -> Self {
        self.over = Some(over);
        self.under = Some(under);
        self
    }

    /// Position of `value` within the limits, `0.0` when the limits collapse.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.vmax - self.vmin;
        if span.abs() < f64::EPSILON {
            return 0.0;
        }
        (value - self.vmin) / span
    }

    pub fn color(&self, value: Option<f64>) -> RGBColor {
        match value {
            None => self.undefined,
            Some(v) if !v.is_finite() => self.undefined,
            Some(v) if v > self.vmax => self.over.unwrap_or_else(|| self.cmap.sample(1.0)),
            Some(v) if v < self.vmin => self.under.unwrap_or_else(|| self.cmap.sample(0.0)),
            Some(v) => self.cmap.sample(self.normalize(v)),
        }
    }
}
