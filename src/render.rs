use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::error::{QRError, QRResult};
use crate::symbol::SymbolGrid;

/// Width of the light border around the symbol, in modules.
pub const QUIET_ZONE: u32 = 4;

pub type RasterImage = RgbaImage;

// Rasterizer
//------------------------------------------------------------------------------

/// Draws `grid` with its quiet zone, centered on a `width`x`height` canvas of `bg`.
///
/// Each module becomes a square block of `fg` (dark) or `bg` (light). Pixels are
/// written as-is, never blended. If the canvas is smaller than one pixel per
/// module, pixels sample the padded symbol at a fractional scale instead.
pub fn rasterize(
    grid: &SymbolGrid,
    fg: Rgba<u8>,
    bg: Rgba<u8>,
    (width, height): (u32, u32),
) -> QRResult<RasterImage> {
    if width == 0 || height == 0 {
        return Err(QRError::InvalidDimensions { width, height });
    }

    let padded_sz = grid.width() as u32 + 2 * QUIET_ZONE;
    let side = width.min(height);
    let module_sz = side / padded_sz;

    let mut canvas = RasterImage::from_pixel(width, height, bg);
    if module_sz == 0 {
        debug!(width, height, padded_sz, "Canvas smaller than symbol, sampling modules");
        draw_sampled(&mut canvas, grid, fg, side);
        return Ok(canvas);
    }

    let qr_sz = padded_sz * module_sz;
    let dx = (width - qr_sz) / 2 + QUIET_ZONE * module_sz;
    let dy = (height - qr_sz) / 2 + QUIET_ZONE * module_sz;
    debug!(width, height, module_sz, "Rasterizing {}x{} symbol", grid.width(), grid.width());

    for r in 0..grid.width() {
        for c in 0..grid.width() {
            if !grid.is_dark(r, c) {
                continue;
            }
            let x = dx + c as u32 * module_sz;
            let y = dy + r as u32 * module_sz;
            let block = Rect::at(x as i32, y as i32).of_size(module_sz, module_sz);
            draw_filled_rect_mut(&mut canvas, block, fg);
        }
    }

    Ok(canvas)
}

fn draw_sampled(canvas: &mut RasterImage, grid: &SymbolGrid, fg: Rgba<u8>, side: u32) {
    let w = grid.width() as u64;
    let padded_sz = w + 2 * QUIET_ZONE as u64;
    let dx = (canvas.width() - side) / 2;
    let dy = (canvas.height() - side) / 2;
    let to_module = |p: u32| (p as u64 * padded_sz / side as u64).checked_sub(QUIET_ZONE as u64);

    for i in 0..side {
        for j in 0..side {
            let (Some(r), Some(c)) = (to_module(i), to_module(j)) else {
                continue;
            };
            if r < w && c < w && grid.is_dark(r as usize, c as usize) {
                canvas.put_pixel(dx + j, dy + i, fg);
            }
        }
    }
}

// Terminal preview
//------------------------------------------------------------------------------

/// Renders the symbol and its quiet zone with half blocks, two module rows per line.
/// Dark modules are drawn as spaces so the symbol reads correctly on dark terminals.
pub fn to_terminal_string(grid: &SymbolGrid) -> String {
    let qz = QUIET_ZONE as usize;
    let w = grid.width();
    let total_sz = w + 2 * qz;
    let is_light = |i: usize, j: usize| {
        if i < qz || i >= qz + w || j < qz || j >= qz + w {
            return true;
        }
        !grid.is_dark(i - qz, j - qz)
    };

    let mut canvas = String::with_capacity(total_sz * (total_sz / 2 + 1) * 3);
    for i in (0..total_sz).step_by(2) {
        for j in 0..total_sz {
            let top = is_light(i, j);
            let bottom = i + 1 < total_sz && is_light(i + 1, j);
            canvas.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        canvas.push('\n');
    }

    canvas
}
