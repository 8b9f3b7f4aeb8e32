//! 表題欄の画像からコードを読み取る
//!
//! 1ページ目をレンダリングし、コード行の範囲を切り出して外部の画像認識に渡す。
//! 切り出し → ページ全体の順に試し、どちらも読めなければ厳格なプロンプトでもう一度だけ試す。

pub mod client;
pub mod preprocess;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use verifica_common::prompts::{code_reading_schema, prompt_variants};
use verifica_common::CodeReading;

use crate::config::{CropBox, VisionConfig};
use crate::error::{Result, VerificaError};
use crate::pdf::PageRenderer;

pub use client::GeminiVisionClient;
pub use preprocess::{EncodedImage, PreprocessOptions};

/// 画像認識の応答
#[derive(Debug, Clone, PartialEq)]
pub enum VisionReply {
    /// 構造化出力（スキーマに沿ったJSON）
    Structured(Value),
    Text(String),
}

/// 画像認識サービス
#[async_trait]
pub trait VisionOracle: Send + Sync {
    async fn generate(&self, prompt: &str, image: &EncodedImage, schema: &Value) -> Result<VisionReply>;
}

/// 読み取りの設定
#[derive(Debug, Clone, Copy)]
pub struct VisionOptions {
    pub dpi: u32,
    pub crop_box: CropBox,
    pub preprocess: PreprocessOptions,
}

impl From<&VisionConfig> for VisionOptions {
    fn from(config: &VisionConfig) -> Self {
        Self {
            dpi: config.dpi,
            crop_box: config.crop_box,
            preprocess: PreprocessOptions {
                min_height: config.min_height,
                max_dimension: config.max_dimension,
            },
        }
    }
}

impl Default for VisionOptions {
    fn default() -> Self {
        Self::from(&VisionConfig::default())
    }
}

/// 画像によるコード読み取り
pub struct VisualCodeExtractor {
    renderer: Arc<dyn PageRenderer>,
    oracle: Arc<dyn VisionOracle>,
    options: VisionOptions,
}

impl VisualCodeExtractor {
    pub fn new(renderer: Arc<dyn PageRenderer>, oracle: Arc<dyn VisionOracle>, options: VisionOptions) -> Self {
        Self { renderer, oracle, options }
    }

    /// 送信する画像を用意する（切り出し、ページ全体の順）
    fn prepare_images(renderer: &dyn PageRenderer, path: &Path, options: &VisionOptions) -> Result<Vec<EncodedImage>> {
        let page = renderer.render_page(path, 0, options.dpi)?;

        let mut images = Vec::with_capacity(2);
        match preprocess::crop_points(&page, &options.crop_box) {
            Ok(cropped) => images.push(cropped),
            Err(e) => warn!(path = %path.display(), error = %e, "切り出しに失敗、ページ全体のみ使用"),
        }
        images.push(page.image);

        images
            .iter()
            .map(|img| preprocess::encode_png(&preprocess::preprocess(img, &options.preprocess)))
            .collect()
    }

    /// 1文書のコードを読み取る
    ///
    /// # Returns
    /// 読み取れたコード。どの画像・プロンプトでも読めなければ `None`（抽出失敗）
    pub async fn extract(&self, path: &Path) -> Result<Option<String>> {
        let renderer = Arc::clone(&self.renderer);
        let owned_path = path.to_path_buf();
        let options = self.options;

        // PDFiumのハンドルはSendではない
        let images = tokio::task::spawn_blocking(move || Self::prepare_images(renderer.as_ref(), &owned_path, &options))
            .await
            .map_err(|e| VerificaError::Image(format!("レンダリングタスク失敗: {}", e)))??;

        let schema = code_reading_schema();
        for (attempt, prompt) in prompt_variants().iter().enumerate() {
            for (index, image) in images.iter().enumerate() {
                let reply = self.oracle.generate(prompt, image, &schema).await?;
                let reading = match &reply {
                    VisionReply::Structured(value) => CodeReading::from_value(value),
                    VisionReply::Text(text) => CodeReading::from_text(text),
                };
                if let Some(code) = reading.resolve() {
                    debug!(path = %path.display(), attempt, image = index, code = %code, "コードを読み取り");
                    return Ok(Some(code));
                }
            }
            debug!(path = %path.display(), attempt, "読み取れず");
        }

        Ok(None)
    }
}
