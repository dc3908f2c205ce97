//! Raster rendering of dictionary markers for printing and synthetic tests.

use image::{GrayImage, Luma};

use super::dictionary::MarkerDictionary;

/// Render marker `id` as a `side_px × side_px` image: black border ring,
/// data cells white where the codeword bit is 1.
///
/// Returns `None` for an unknown id or when `side_px` is smaller than the
/// number of cells per side.
pub fn render_marker(dict: &MarkerDictionary, id: usize, side_px: u32) -> Option<GrayImage> {
    let bits = dict.bits_per_side();
    let cells = bits + 2;
    if side_px < cells {
        return None;
    }
    let data = dict.cells(id)?;

    let cell_of = |p: u32| (u64::from(p) * u64::from(cells) / u64::from(side_px)) as u32;
    Some(GrayImage::from_fn(side_px, side_px, |x, y| {
        let (row, col) = (cell_of(y), cell_of(x));
        let on_border = row == 0 || col == 0 || row == cells - 1 || col == cells - 1;
        let white = !on_border && data[((row - 1) * bits + (col - 1)) as usize];
        Luma([if white { 255 } else { 0 }])
    }))
}

/// Like [`render_marker`], surrounded by a white quiet zone of `margin_px`.
pub fn render_marker_with_quiet_zone(
    dict: &MarkerDictionary,
    id: usize,
    side_px: u32,
    margin_px: u32,
) -> Option<GrayImage> {
    let marker = render_marker(dict, id, side_px)?;
    let total = side_px + 2 * margin_px;
    let mut out = GrayImage::from_pixel(total, total, Luma([255]));
    image::imageops::replace(&mut out, &marker, i64::from(margin_px), i64::from(margin_px));
    Some(out)
}
