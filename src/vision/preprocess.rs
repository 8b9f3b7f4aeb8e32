//! 読み取り前の画像処理
//!
//! グレースケール → 自動コントラスト → （低すぎれば拡大）→ シャープ化 → コントラスト強調 → 長辺の上限

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};

use crate::config::CropBox;
use crate::error::{Result, VerificaError};
use crate::pdf::RenderedPage;

/// 画像処理の設定
#[derive(Debug, Clone, Copy)]
pub struct PreprocessOptions {
    pub min_height: u32,
    pub max_dimension: u32,
}

/// 最暗部を0、最明部を255に引き伸ばす
pub fn autocontrast(gray: &GrayImage) -> GrayImage {
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if hi <= lo {
        return gray.clone();
    }

    let range = (hi - lo) as f32;
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p.0[0] = (((p.0[0] - lo) as f32 / range) * 255.0).round() as u8;
    }
    out
}

/// 読み取り用に画像を整える
pub fn preprocess(image: &DynamicImage, options: &PreprocessOptions) -> DynamicImage {
    let gray = autocontrast(&image.to_luma8());
    let mut out = DynamicImage::ImageLuma8(gray);

    if out.height() > 0 && out.height() < options.min_height {
        let factor = options.min_height as f32 / out.height() as f32;
        let width = ((out.width() as f32) * factor).round().max(1.0) as u32;
        out = out.resize_exact(width, options.min_height, FilterType::Lanczos3);
    }

    out = out.unsharpen(1.0, 2).adjust_contrast(30.0);

    let max_dimension = options.max_dimension.max(1);
    if out.width().max(out.height()) > max_dimension {
        out = out.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    out
}

/// 切り出し範囲（ポイント）をピクセルに変換して切り出す
pub fn crop_points(page: &RenderedPage, crop: &CropBox) -> Result<DynamicImage> {
    let scale = page.pixels_per_point;
    let (img_w, img_h) = (page.image.width(), page.image.height());

    let to_px = |v: f32| (v.max(0.0) * scale).round() as u32;
    let x0 = to_px(crop.x0.min(crop.x1)).min(img_w);
    let y0 = to_px(crop.y0.min(crop.y1)).min(img_h);
    let x1 = to_px(crop.x0.max(crop.x1)).min(img_w);
    let y1 = to_px(crop.y0.max(crop.y1)).min(img_h);

    if x1 <= x0 + 1 || y1 <= y0 + 1 {
        return Err(VerificaError::Image(format!(
            "切り出し範囲がページ外です ({}x{} px)",
            img_w, img_h
        )));
    }

    Ok(page.image.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

/// Base64エンコード済みの画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

/// PNGにしてBase64エンコード
pub fn encode_png(image: &DynamicImage) -> Result<EncodedImage> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| VerificaError::Image(format!("PNGエンコード失敗: {}", e)))?;
    Ok(EncodedImage {
        mime_type: "image/png".into(),
        data: STANDARD.encode(buf.into_inner()),
    })
}
