//! Sub-image extraction from a source image given a region.
//!
//! Percentages are converted using the source's *natural* pixel dimensions,
//! so the output never depends on how the image happens to be displayed.
//! The async entry points decode and rasterize on a blocking thread.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;

use image::{imageops, ImageFormat, RgbaImage};
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::region::{polygon_contains, Point, RectRegion, Region, PERCENT_MAX};
use crate::source::ImageSource;
use crate::types::ArtifactRef;

/// Default number of crops kept by [`CropCache`].
pub const DEFAULT_CROP_CACHE_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Raster
// ---------------------------------------------------------------------------

/// An owned RGBA image produced by the crop or mask rasterizers.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CoreError::Internal(format!("PNG encoding failed: {e}")))?;
        Ok(buf.into_inner())
    }
}

/// Pixel rectangle in natural image space. `x + width <= image width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Synchronous rasterizers
// ---------------------------------------------------------------------------

/// Decode an encoded image (PNG, JPEG, WebP) into RGBA.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, CoreError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| CoreError::SourceUnavailable(format!("Failed to decode image: {e}")))
}

/// Map a percentage rectangle onto natural pixels, rounding each edge to the
/// nearest pixel.
pub fn natural_pixel_rect(
    region: &RectRegion,
    natural_w: u32,
    natural_h: u32,
) -> Result<PixelRect, CoreError> {
    let edge = |pct: f64, size: u32| -> u32 {
        let px = (pct / PERCENT_MAX * f64::from(size)).round();
        px.clamp(0.0, f64::from(size)) as u32
    };
    let x0 = edge(region.x_start(), natural_w);
    let x1 = edge(region.x_end(), natural_w);
    let y0 = edge(region.y_start(), natural_h);
    let y1 = edge(region.y_end(), natural_h);

    if x1 <= x0 || y1 <= y0 {
        return Err(CoreError::InvalidRegion(format!(
            "Region covers {}x{} pixels of a {natural_w}x{natural_h} image",
            x1.saturating_sub(x0),
            y1.saturating_sub(y0)
        )));
    }

    Ok(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Copy the pixels under `region` into a new raster.
pub fn crop_rect_image(source: &RgbaImage, region: &RectRegion) -> Result<Raster, CoreError> {
    let rect = natural_pixel_rect(region, source.width(), source.height())?;
    let cropped = imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image();
    Ok(Raster::from_image(cropped))
}

/// Copy the pixels inside the polygon, leaving everything outside
/// transparent, and trim the result to the polygon's pixel bounding box.
///
/// A pixel is inside when its center is inside the polygon (even-odd rule).
pub fn crop_polygon_image(source: &RgbaImage, points: &[Point]) -> Result<Raster, CoreError> {
    if points.len() < 3 {
        return Err(CoreError::InvalidRegion(format!(
            "Polygon crop needs at least 3 points, got {}",
            points.len()
        )));
    }

    let (w, h) = (f64::from(source.width()), f64::from(source.height()));
    let ring: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (p.x / PERCENT_MAX * w, p.y / PERCENT_MAX * h))
        .collect();

    let rect = pixel_bounds(&ring, source.width(), source.height())?;
    let mut out = RgbaImage::new(rect.width, rect.height);

    for oy in 0..rect.height {
        let sy = rect.y + oy;
        let cy = f64::from(sy) + 0.5;
        for ox in 0..rect.width {
            let sx = rect.x + ox;
            let cx = f64::from(sx) + 0.5;
            if polygon_contains(&ring, cx, cy) {
                out.put_pixel(ox, oy, *source.get_pixel(sx, sy));
            }
        }
    }

    Ok(Raster::from_image(out))
}

/// Crop any region: rectangles by raster copy, polygons by clip mask.
pub fn crop_region_image(source: &RgbaImage, region: &Region) -> Result<Raster, CoreError> {
    match region {
        Region::Rect(rect) => crop_rect_image(source, rect),
        Region::Polygon(polygon) => crop_polygon_image(source, polygon.points()),
    }
}

/// Pixel bounding box of a ring in natural pixel space, clamped to the image.
pub(crate) fn pixel_bounds(
    ring: &[(f64, f64)],
    natural_w: u32,
    natural_h: u32,
) -> Result<PixelRect, CoreError> {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in ring {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let x0 = min_x.floor().clamp(0.0, f64::from(natural_w)) as u32;
    let y0 = min_y.floor().clamp(0.0, f64::from(natural_h)) as u32;
    let x1 = max_x.ceil().clamp(0.0, f64::from(natural_w)) as u32;
    let y1 = max_y.ceil().clamp(0.0, f64::from(natural_h)) as u32;

    if x1 <= x0 || y1 <= y0 {
        return Err(CoreError::InvalidRegion(format!(
            "Polygon covers no pixels of a {natural_w}x{natural_h} image"
        )));
    }

    Ok(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

// ---------------------------------------------------------------------------
// Async entry points
// ---------------------------------------------------------------------------

/// Decode `source` and crop a rectangle off the async runtime.
pub async fn crop_rect(source: Vec<u8>, region: RectRegion) -> Result<Raster, CoreError> {
    run_blocking(move || crop_rect_image(&decode(&source)?, &region)).await
}

/// Decode `source` and crop a polygon off the async runtime.
pub async fn crop_polygon(source: Vec<u8>, points: Vec<Point>) -> Result<Raster, CoreError> {
    run_blocking(move || crop_polygon_image(&decode(&source)?, &points)).await
}

/// Decode `source` and crop any region off the async runtime.
pub async fn crop_region(source: Vec<u8>, region: Region) -> Result<Raster, CoreError> {
    run_blocking(move || crop_region_image(&decode(&source)?, &region)).await
}

pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, CoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal(format!("Raster task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// CropCache
// ---------------------------------------------------------------------------

/// Memoizes crops by `(artifact, region)`.
///
/// Crops are referentially transparent, so a hit is always valid. Eviction
/// is least-recently-used with a fixed capacity.
pub struct CropCache {
    capacity: usize,
    entries: Mutex<VecDeque<(CropKey, Arc<Raster>)>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CropKey {
    artifact: ArtifactRef,
    polygon: bool,
    /// Region coordinates in millipercent.
    coords: Vec<(i64, i64)>,
}

impl CropKey {
    fn new(artifact: &ArtifactRef, region: &Region) -> Self {
        let quantize = |v: f64| (v * 1000.0).round() as i64;
        Self {
            artifact: artifact.clone(),
            polygon: matches!(region, Region::Polygon(_)),
            coords: region
                .polygon_points()
                .iter()
                .map(|p| (quantize(p.x), quantize(p.y)))
                .collect(),
        }
    }
}

impl CropCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Return the cached crop, or load the artifact, crop it and cache it.
    pub async fn get_or_crop(
        &self,
        images: &dyn ImageSource,
        artifact: &ArtifactRef,
        region: &Region,
    ) -> Result<Arc<Raster>, CoreError> {
        let key = CropKey::new(artifact, region);

        {
            let mut entries = self.entries.lock().await;
            if let Some(pos) = entries.iter().position(|(k, _)| *k == key) {
                if let Some(entry) = entries.remove(pos) {
                    let raster = Arc::clone(&entry.1);
                    entries.push_front(entry);
                    tracing::debug!(artifact = %artifact, "Crop cache hit");
                    return Ok(raster);
                }
            }
        }

        let bytes = images.load(artifact).await?;
        let raster = Arc::new(crop_region(bytes, region.clone()).await?);

        let mut entries = self.entries.lock().await;
        entries.retain(|(k, _)| *k != key);
        entries.push_front((key, Arc::clone(&raster)));
        entries.truncate(self.capacity);
        Ok(raster)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for CropCache {
    fn default() -> Self {
        Self::new(DEFAULT_CROP_CACHE_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{normalize_rect, PolygonRegion};
    use crate::source::MemoryImageSource;
    use assert_matches::assert_matches;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        })
    }

    fn png(image: &RgbaImage) -> Vec<u8> {
        Raster::from_image(image.clone()).to_png().unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> RectRegion {
        RectRegion::new(x0, y0, x1, y1).unwrap()
    }

    #[test]
    fn ten_to_ninety_on_1000_square_is_800_square() {
        let source = gradient(1000, 1000);
        let raster = crop_rect_image(&source, &rect(10.0, 10.0, 90.0, 90.0)).unwrap();
        assert_eq!((raster.width(), raster.height()), (800, 800));
        assert_eq!(raster.as_image().get_pixel(0, 0), source.get_pixel(100, 100));
    }

    #[test]
    fn crop_size_scales_with_natural_size() {
        let region = rect(25.0, 0.0, 75.0, 50.0);
        for (w, h) in [(400, 200), (800, 400), (1600, 800)] {
            let raster = crop_rect_image(&gradient(w, h), &region).unwrap();
            assert_eq!(raster.width(), w / 2);
            assert_eq!(raster.height(), h / 2);
        }
    }

    #[test]
    fn zero_width_rect_is_invalid() {
        let source = gradient(100, 100);
        assert_matches!(
            crop_rect_image(&source, &rect(40.0, 10.0, 40.0, 90.0)),
            Err(CoreError::InvalidRegion(_))
        );
    }

    #[test]
    fn sub_pixel_rect_is_invalid() {
        let source = gradient(10, 10);
        assert_matches!(
            crop_rect_image(&source, &rect(41.0, 41.0, 44.0, 44.0)),
            Err(CoreError::InvalidRegion(_))
        );
    }

    #[test]
    fn polygon_crop_trims_to_bounding_box_and_clears_outside() {
        let source = gradient(100, 100);
        let triangle = [
            Point::new(20.0, 20.0),
            Point::new(80.0, 20.0),
            Point::new(20.0, 80.0),
        ];
        let raster = crop_polygon_image(&source, &triangle).unwrap();
        assert_eq!((raster.width(), raster.height()), (60, 60));

        // Near the right-angle corner: inside.
        assert_eq!(raster.as_image().get_pixel(2, 2), source.get_pixel(22, 22));
        // Opposite corner of the box: outside the hypotenuse.
        assert_eq!(raster.as_image().get_pixel(58, 58)[3], 0);
    }

    #[test]
    fn rectangular_polygon_matches_rect_crop() {
        let source = gradient(200, 100);
        let region = rect(10.0, 20.0, 60.0, 70.0);
        let by_rect = crop_rect_image(&source, &region).unwrap();
        let by_polygon = crop_polygon_image(&source, &region.corners()).unwrap();
        assert_eq!(by_rect, by_polygon);
    }

    #[test]
    fn polygon_with_two_points_is_invalid() {
        let source = gradient(10, 10);
        assert_matches!(
            crop_polygon_image(&source, &[Point::new(0.0, 0.0), Point::new(5.0, 5.0)]),
            Err(CoreError::InvalidRegion(_))
        );
    }

    #[tokio::test]
    async fn undecodable_source_is_unavailable() {
        let result = crop_rect(b"not an image".to_vec(), RectRegion::full()).await;
        assert_matches!(result, Err(CoreError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn async_crop_region_dispatches_polygons() {
        let bytes = png(&gradient(100, 100));
        let region = Region::Polygon(
            PolygonRegion::new(vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(0.0, 50.0),
            ])
            .unwrap(),
        );
        let raster = crop_region(bytes, region).await.unwrap();
        assert_eq!((raster.width(), raster.height()), (50, 50));
    }

    #[tokio::test]
    async fn cache_reuses_crops() {
        let images = MemoryImageSource::new();
        let artifact = ArtifactRef::new("renders/a.png");
        images.insert(artifact.clone(), png(&gradient(100, 100))).await;

        let cache = CropCache::new(2);
        let region = Region::Rect(normalize_rect(Point::new(0.0, 0.0), Point::new(50.0, 50.0)));

        let first = cache.get_or_crop(&images, &artifact, &region).await.unwrap();
        let second = cache.get_or_crop(&images, &artifact, &region).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(images.load_count().await, 1);
    }

    #[tokio::test]
    async fn cache_evicts_least_recently_used() {
        let images = MemoryImageSource::new();
        let artifact = ArtifactRef::new("renders/a.png");
        images.insert(artifact.clone(), png(&gradient(100, 100))).await;

        let cache = CropCache::new(2);
        let regions: Vec<Region> = [10.0, 20.0, 30.0]
            .iter()
            .map(|&e| Region::Rect(normalize_rect(Point::new(0.0, 0.0), Point::new(e, e))))
            .collect();

        for region in &regions {
            cache.get_or_crop(&images, &artifact, region).await.unwrap();
        }
        assert_eq!(cache.len().await, 2);

        // The first region was evicted and has to be loaded again.
        cache.get_or_crop(&images, &artifact, &regions[0]).await.unwrap();
        assert_eq!(images.load_count().await, 4);
    }
}
