//! Pan/zoom transform between image pixels and canvas pixels.
//!
//! `screen = image * scale + offset`. The offset is kept with sub-pixel
//! precision so repeated zoom steps about the cursor do not drift; only the
//! mapped points are rounded.

use crate::error::ViewportError;
use crate::model::Point;

pub const MIN_SCALE: f64 = 0.01;
pub const MAX_SCALE: f64 = 50.0;
/// Fraction of the canvas an image occupies after a fit.
pub const FIT_MARGIN: f64 = 0.95;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn new(scale: f64, offset: (f64, f64)) -> Self {
        Self {
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
            offset_x: offset.0,
            offset_y: offset.1,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Offset rounded to whole pixels.
    pub fn offset(&self) -> Point {
        Point::new(self.offset_x.round() as i32, self.offset_y.round() as i32)
    }

    pub fn offset_f64(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    /// Scale and center the image inside the view, leaving a 5% margin.
    pub fn fit_to_window(
        &mut self,
        image_w: u32,
        image_h: u32,
        view_w: u32,
        view_h: u32,
    ) -> Result<(), ViewportError> {
        if view_w == 0 || view_h == 0 || image_w == 0 || image_h == 0 {
            return Err(ViewportError::NotReady);
        }
        let (iw, ih) = (f64::from(image_w), f64::from(image_h));
        let (vw, vh) = (f64::from(view_w), f64::from(view_h));

        self.scale = ((vw / iw).min(vh / ih) * FIT_MARGIN).clamp(MIN_SCALE, MAX_SCALE);
        self.offset_x = ((vw - iw * self.scale) / 2.0).trunc();
        self.offset_y = ((vh - ih * self.scale) / 2.0).trunc();
        Ok(())
    }

    pub fn image_to_screen_f(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }

    pub fn screen_to_image_f(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    /// Image pixel to the nearest screen pixel.
    pub fn image_to_screen(&self, p: Point) -> Point {
        let (sx, sy) = self.image_to_screen_f(f64::from(p.x), f64::from(p.y));
        Point::new(sx.round() as i32, sy.round() as i32)
    }

    /// Screen pixel to image pixel, truncated toward zero.
    pub fn screen_to_image(&self, p: Point) -> Point {
        let (x, y) = self.screen_to_image_f(f64::from(p.x), f64::from(p.y));
        Point::new(x.trunc() as i32, y.trunc() as i32)
    }

    /// Multiply the scale by `factor`, keeping the image point under
    /// `cursor` fixed on screen.
    pub fn zoom_at(&mut self, cursor: Point, factor: f64) {
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let ratio = new_scale / self.scale;
        let (cx, cy) = (f64::from(cursor.x), f64::from(cursor.y));

        self.offset_x = cx - (cx - self.offset_x) * ratio;
        self.offset_y = cy - (cy - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    /// Unbounded: the image may be panned arbitrarily far off the canvas.
    pub fn pan_by(&mut self, dx: i32, dy: i32) {
        self.offset_x += f64::from(dx);
        self.offset_y += f64::from(dy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn fit_centers_with_margin() {
        let mut vp = Viewport::default();
        vp.fit_to_window(1000, 800, 500, 500).unwrap();
        assert!(approx_eq(vp.scale(), 0.475));
        // 1000 * 0.475 = 475 -> (500 - 475) / 2 = 12.5 -> 12
        // 800 * 0.475 = 380 -> (500 - 380) / 2 = 60
        assert_eq!(vp.offset(), Point::new(12, 60));
    }

    #[test]
    fn fit_on_zero_view_is_not_ready() {
        let mut vp = Viewport::new(2.0, (10.0, 20.0));
        let before = vp;
        assert_eq!(vp.fit_to_window(100, 100, 0, 300), Err(ViewportError::NotReady));
        assert_eq!(vp, before);
    }

    #[test]
    fn screen_round_trip_within_one_pixel() {
        let viewports = [
            Viewport::new(1.0, (0.0, 0.0)),
            Viewport::new(1.37, (12.4, -33.8)),
            Viewport::new(3.0, (-250.0, 17.0)),
            Viewport::new(49.9, (0.5, 0.5)),
        ];
        for vp in &viewports {
            for x in (0..400).step_by(7) {
                for y in (0..300).step_by(11) {
                    let p = Point::new(x, y);
                    let back = vp.screen_to_image(vp.image_to_screen(p));
                    assert!((back.x - x).abs() <= 1 && (back.y - y).abs() <= 1, "{:?} -> {:?}", p, back);
                }
            }
        }
    }

    #[test]
    fn zoom_keeps_cursor_point_fixed() {
        let mut vp = Viewport::new(0.8, (31.0, -12.0));
        let cursor = Point::new(410, 275);
        let factors = [1.1, 0.9, 1.1, 1.1, 2.5, 0.3, 0.9];

        let before = vp.screen_to_image_f(410.0, 275.0);
        for f in factors {
            vp.zoom_at(cursor, f);
            let after = vp.screen_to_image_f(410.0, 275.0);
            assert!(approx_eq(before.0, after.0) && approx_eq(before.1, after.1));
        }
    }

    #[test]
    fn repeated_zoom_in_out_does_not_drift() {
        let mut vp = Viewport::new(1.0, (100.0, 50.0));
        let cursor = Point::new(333, 217);
        for _ in 0..200 {
            vp.zoom_at(cursor, 1.25);
            vp.zoom_at(cursor, 0.8);
        }
        assert!(approx_eq(vp.scale(), 1.0));
        let (ox, oy) = vp.offset_f64();
        assert!(approx_eq(ox, 100.0) && approx_eq(oy, 50.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::new(40.0, (0.0, 0.0));
        vp.zoom_at(Point::new(0, 0), 10.0);
        assert_eq!(vp.scale(), MAX_SCALE);
        vp.zoom_at(Point::new(0, 0), 1e-9);
        assert_eq!(vp.scale(), MIN_SCALE);
    }

    #[test]
    fn pan_is_unbounded() {
        let mut vp = Viewport::default();
        vp.pan_by(-100_000, 250_000);
        assert_eq!(vp.offset(), Point::new(-100_000, 250_000));
        assert_eq!(vp.screen_to_image(Point::new(0, 0)), Point::new(100_000, -250_000));
    }
}
