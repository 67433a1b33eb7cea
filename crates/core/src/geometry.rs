//! Contain-fit geometry.
//!
//! An image shown with "contain" fitting is scaled to the largest size that
//! fits inside its container, leaving letterbox (or pillarbox) margins on one
//! axis. These functions map between container pixels and
//! percentage-of-image coordinates under that fitting.
//!
//! A pointer inside a letterbox margin maps to `None`, never to a clamped
//! edge coordinate. Callers treat `None` as "ignore this input".

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::region::{Point, PERCENT_MAX};

/// Pixel rectangle, relative to the container, that the image occupies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The container's rectangle in client (viewport) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A position in container-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Compute where an image of natural size `natural_w x natural_h` lands inside
/// a `container_w x container_h` container under contain fitting.
///
/// Returns `None` when either natural dimension is zero (the image has not
/// loaded) or the container has no area.
pub fn compute_contain_bounds(
    container_w: f64,
    container_h: f64,
    natural_w: f64,
    natural_h: f64,
) -> Option<ImageBounds> {
    let all_finite = [container_w, container_h, natural_w, natural_h]
        .iter()
        .all(|v| v.is_finite());
    if !all_finite || natural_w <= 0.0 || natural_h <= 0.0 {
        return None;
    }
    if container_w <= 0.0 || container_h <= 0.0 {
        return None;
    }

    let scale = (container_w / natural_w).min(container_h / natural_h);
    let width = natural_w * scale;
    let height = natural_h * scale;

    Some(ImageBounds {
        x: (container_w - width) / 2.0,
        y: (container_h - height) / 2.0,
        width,
        height,
    })
}

/// Convert a client-space pointer position to percentage-of-image
/// coordinates.
///
/// Returns `None` when the pointer falls outside the image (in the letterbox
/// margin or outside the container).
pub fn pixel_to_percentage(
    client_x: f64,
    client_y: f64,
    container: &ContainerRect,
    bounds: &ImageBounds,
) -> Option<Point> {
    if bounds.width <= 0.0 || bounds.height <= 0.0 {
        return None;
    }

    let local_x = client_x - container.left - bounds.x;
    let local_y = client_y - container.top - bounds.y;

    if !(0.0..=bounds.width).contains(&local_x) || !(0.0..=bounds.height).contains(&local_y) {
        return None;
    }

    Some(Point::new(
        local_x / bounds.width * PERCENT_MAX,
        local_y / bounds.height * PERCENT_MAX,
    ))
}

/// Convert percentage-of-image coordinates to container-local pixels.
pub fn percentage_to_pixel(x: f64, y: f64, bounds: &ImageBounds) -> PixelPoint {
    PixelPoint {
        x: bounds.x + x / PERCENT_MAX * bounds.width,
        y: bounds.y + y / PERCENT_MAX * bounds.height,
    }
}

// ---------------------------------------------------------------------------
// ContainViewport
// ---------------------------------------------------------------------------

/// Tracks the inputs of [`compute_contain_bounds`] and recomputes the bounds
/// whenever the container resizes or the image reports its natural size.
#[derive(Debug, Clone, Default)]
pub struct ContainViewport {
    container: Option<(f64, f64)>,
    natural: Option<(u32, u32)>,
    bounds: Option<ImageBounds>,
}

impl ContainViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a container resize.
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.container = Some((width, height));
        self.recompute();
    }

    /// Record the image's natural dimensions once it has loaded.
    pub fn set_natural_size(&mut self, width: u32, height: u32) {
        self.natural = Some((width, height));
        self.recompute();
    }

    /// Current bounds, or [`CoreError::GeometryUnavailable`] before both
    /// the container and the image sizes are known.
    pub fn bounds(&self) -> Result<ImageBounds, CoreError> {
        self.bounds.ok_or(CoreError::GeometryUnavailable)
    }

    pub fn pixel_to_percentage(
        &self,
        client_x: f64,
        client_y: f64,
        container: &ContainerRect,
    ) -> Result<Option<Point>, CoreError> {
        let bounds = self.bounds()?;
        Ok(pixel_to_percentage(client_x, client_y, container, &bounds))
    }

    pub fn percentage_to_pixel(&self, point: Point) -> Result<PixelPoint, CoreError> {
        let bounds = self.bounds()?;
        Ok(percentage_to_pixel(point.x, point.y, &bounds))
    }

    fn recompute(&mut self) {
        self.bounds = match (self.container, self.natural) {
            (Some((cw, ch)), Some((nw, nh))) => {
                compute_contain_bounds(cw, ch, f64::from(nw), f64::from(nh))
            }
            _ => None,
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const EPS: f64 = 1e-9;

    fn origin_container(width: f64, height: f64) -> ContainerRect {
        ContainerRect {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    #[test]
    fn letterboxed_wide_image() {
        let bounds = compute_contain_bounds(800.0, 450.0, 1600.0, 750.0).unwrap();
        assert_eq!(
            bounds,
            ImageBounds {
                x: 0.0,
                y: 37.5,
                width: 800.0,
                height: 375.0
            }
        );
    }

    #[test]
    fn pillarboxed_tall_image() {
        let bounds = compute_contain_bounds(800.0, 450.0, 1600.0, 1000.0).unwrap();
        assert!((bounds.width - 720.0).abs() < EPS);
        assert!((bounds.height - 450.0).abs() < EPS);
        assert!((bounds.x - 40.0).abs() < EPS);
        assert_eq!(bounds.y, 0.0);
    }

    #[test]
    fn zero_natural_size_has_no_bounds() {
        assert!(compute_contain_bounds(800.0, 450.0, 0.0, 750.0).is_none());
        assert!(compute_contain_bounds(800.0, 450.0, 1600.0, 0.0).is_none());
    }

    #[test]
    fn aspect_ratio_is_preserved() {
        let containers = [(800.0, 450.0), (300.0, 900.0), (1.0, 1.0), (1920.0, 1080.0)];
        let naturals = [(1600.0, 1000.0), (10.0, 3000.0), (4096.0, 4096.0), (7.0, 5.0)];
        for (cw, ch) in containers {
            for (nw, nh) in naturals {
                let b = compute_contain_bounds(cw, ch, nw, nh).unwrap();
                let got = b.width / b.height;
                let want = nw / nh;
                assert!((got - want).abs() / want < 1e-9, "{cw}x{ch} / {nw}x{nh}");
                assert!(b.width <= cw + EPS && b.height <= ch + EPS);
            }
        }
    }

    #[test]
    fn click_in_top_letterbox_is_ignored() {
        let bounds = compute_contain_bounds(800.0, 450.0, 1600.0, 750.0).unwrap();
        let container = origin_container(800.0, 450.0);
        assert!(pixel_to_percentage(400.0, 20.0, &container, &bounds).is_none());
        assert!(pixel_to_percentage(400.0, 440.0, &container, &bounds).is_none());
    }

    #[test]
    fn click_at_center_maps_to_fifty_percent() {
        let bounds = compute_contain_bounds(800.0, 450.0, 1600.0, 750.0).unwrap();
        let container = origin_container(800.0, 450.0);
        let point = pixel_to_percentage(400.0, 225.0, &container, &bounds).unwrap();
        assert!((point.x - 50.0).abs() < EPS);
        assert!((point.y - 50.0).abs() < EPS);
    }

    #[test]
    fn container_offset_is_subtracted() {
        let bounds = compute_contain_bounds(800.0, 450.0, 1600.0, 750.0).unwrap();
        let container = ContainerRect {
            left: 100.0,
            top: 50.0,
            width: 800.0,
            height: 450.0,
        };
        let point = pixel_to_percentage(500.0, 275.0, &container, &bounds).unwrap();
        assert!((point.x - 50.0).abs() < EPS);
        assert!((point.y - 50.0).abs() < EPS);
        assert!(pixel_to_percentage(50.0, 275.0, &container, &bounds).is_none());
    }

    #[test]
    fn round_trip_inside_image() {
        let bounds = compute_contain_bounds(640.0, 480.0, 1000.0, 400.0).unwrap();
        let container = origin_container(640.0, 480.0);
        for i in 1..20 {
            for j in 1..20 {
                let px = bounds.x + bounds.width * f64::from(i) / 20.0;
                let py = bounds.y + bounds.height * f64::from(j) / 20.0;
                let pct = pixel_to_percentage(px, py, &container, &bounds).unwrap();
                let back = percentage_to_pixel(pct.x, pct.y, &bounds);
                assert!((back.x - px).abs() < 1e-6);
                assert!((back.y - py).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn pillarbox_margin_returns_none() {
        let bounds = compute_contain_bounds(800.0, 450.0, 1600.0, 1000.0).unwrap();
        let container = origin_container(800.0, 450.0);
        assert!(pixel_to_percentage(10.0, 225.0, &container, &bounds).is_none());
        assert!(pixel_to_percentage(790.0, 225.0, &container, &bounds).is_none());
    }

    #[test]
    fn viewport_unavailable_until_image_loads() {
        let mut viewport = ContainViewport::new();
        viewport.set_container_size(800.0, 450.0);
        assert_matches!(viewport.bounds(), Err(CoreError::GeometryUnavailable));

        viewport.set_natural_size(1600, 750);
        assert_eq!(viewport.bounds().unwrap().height, 375.0);
    }

    #[test]
    fn viewport_recomputes_on_resize() {
        let mut viewport = ContainViewport::new();
        viewport.set_natural_size(1600, 750);
        viewport.set_container_size(800.0, 450.0);
        let before = viewport.bounds().unwrap();

        viewport.set_container_size(400.0, 450.0);
        let after = viewport.bounds().unwrap();
        assert_ne!(before, after);
        assert_eq!(after.width, 400.0);

        let center = viewport
            .percentage_to_pixel(Point::new(50.0, 50.0))
            .unwrap();
        assert_eq!(center.x, 200.0);
        assert_eq!(center.y, 225.0);
    }
}
