//! Region masks for selective edits.
//!
//! A mask has the source image's natural size and is opaque white inside the
//! region, fully transparent outside.

use std::io::Cursor;

use image::{ImageReader, Rgba, RgbaImage};

use crate::crop::{pixel_bounds, run_blocking, Raster};
use crate::error::CoreError;
use crate::region::{polygon_contains, Region, PERCENT_MAX};

const INSIDE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Rasterize `region` into a `width x height` mask.
///
/// Pixels are inside when their center is inside the region's polygon
/// (rectangles use their four corners).
pub fn region_mask(width: u32, height: u32, region: &Region) -> Result<Raster, CoreError> {
    if width == 0 || height == 0 {
        return Err(CoreError::InvalidRegion(format!(
            "Cannot build a mask for a {width}x{height} image"
        )));
    }

    let (w, h) = (f64::from(width), f64::from(height));
    let ring: Vec<(f64, f64)> = region
        .polygon_points()
        .iter()
        .map(|p| (p.x / PERCENT_MAX * w, p.y / PERCENT_MAX * h))
        .collect();

    let bounds = pixel_bounds(&ring, width, height)?;
    let mut mask = RgbaImage::new(width, height);
    for y in bounds.y..bounds.y + bounds.height {
        let cy = f64::from(y) + 0.5;
        for x in bounds.x..bounds.x + bounds.width {
            if polygon_contains(&ring, f64::from(x) + 0.5, cy) {
                mask.put_pixel(x, y, INSIDE);
            }
        }
    }

    Ok(Raster::from_image(mask))
}

/// Read only the header of an encoded image to get its natural size.
pub fn natural_dimensions(bytes: &[u8]) -> Result<(u32, u32), CoreError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CoreError::SourceUnavailable(format!("Unreadable image header: {e}")))?
        .into_dimensions()
        .map_err(|e| CoreError::SourceUnavailable(format!("Unreadable image header: {e}")))
}

/// Build a mask matching the natural size of `source` off the async runtime.
pub async fn mask_for_source(source: Vec<u8>, region: Region) -> Result<Raster, CoreError> {
    run_blocking(move || {
        let (width, height) = natural_dimensions(&source)?;
        region_mask(width, height, &region)
    })
    .await
}
