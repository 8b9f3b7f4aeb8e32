//! ページ画像の生成（PDFium）

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::pdfium::load_pdfium;
use super::{PageRenderer, RenderedPage};
use crate::error::{Result, VerificaError};

/// PDFの1インチあたりのポイント数
const POINTS_PER_INCH: f32 = 72.0;

/// レンダリング画像の長辺上限（大判図面でのメモリ不足防止）
const MAX_RENDER_PX: u32 = 8192;

/// ポイント寸法とDPIからピクセル寸法を求める（長辺上限つき、縦横比維持）
pub fn render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_RENDER_PX as f32 {
        let ratio = MAX_RENDER_PX as f32 / max_dim;
        let shorter = |side: f32| ((side * ratio).round() as u32).clamp(1, MAX_RENDER_PX);
        if raw_w >= raw_h {
            (MAX_RENDER_PX, shorter(raw_h))
        } else {
            (shorter(raw_w), MAX_RENDER_PX)
        }
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// PDFiumによるレンダラー
///
/// PDFiumのハンドルは呼び出しごとに読み込むので、この型自体は状態を持たない
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// ライブラリが読み込めることを確認して生成
    pub fn new() -> Result<Self> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_page(&self, path: &Path, page_index: usize, dpi: u32) -> Result<RenderedPage> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| VerificaError::parse_failure(path, e))?;

        let index = u16::try_from(page_index)
            .map_err(|_| VerificaError::parse_failure(path, format!("ページ番号が大きすぎます: {}", page_index)))?;
        let page = document
            .pages()
            .get(index)
            .map_err(|e| VerificaError::parse_failure(path, format!("{}ページ目: {}", page_index + 1, e)))?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = render_dimensions(width_points, height_points, dpi);
        if (width_points * dpi as f32 / POINTS_PER_INCH) as u32 > target_w {
            warn!(path = %path.display(), width = target_w, height = target_h, "ページ寸法を上限に合わせて縮小");
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| VerificaError::Image(format!("レンダリング失敗 ({}): {}", path.display(), e)))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| VerificaError::Image(format!("ビットマップ変換失敗 ({})", path.display())))?;

        debug!(path = %path.display(), page = page_index + 1, width, height, "ページをレンダリング");

        Ok(RenderedPage {
            image: DynamicImage::ImageRgba8(rgba),
            pixels_per_point: width as f32 / width_points.max(1.0),
        })
    }
}
