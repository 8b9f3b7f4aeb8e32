//! 本文テキスト抽出
//!
//! - LopdfText: lopdf のページ単位抽出（速い）
//! - PdfExtractText: pdf-extract のレイアウト抽出（遅いがフォント対応が広い）

use std::path::Path;

use tracing::debug;

use super::TextBackend;
use crate::error::{Result, VerificaError};

/// lopdf によるテキスト抽出
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfText;

impl TextBackend for LopdfText {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn page_texts(&self, path: &Path, max_pages: usize) -> Result<Vec<String>> {
        let doc = lopdf::Document::load(path).map_err(|e| VerificaError::parse_failure(path, e))?;
        if doc.is_encrypted() {
            return Err(VerificaError::parse_failure(path, "暗号化されたPDF"));
        }

        doc.get_pages()
            .keys()
            .take(max_pages)
            .map(|&page_number| {
                doc.extract_text(&[page_number])
                    .map_err(|e| VerificaError::parse_failure(path, format!("{}ページ目: {}", page_number, e)))
            })
            .collect()
    }
}

/// pdf-extract によるテキスト抽出
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractText;

impl TextBackend for PdfExtractText {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    fn page_texts(&self, path: &Path, max_pages: usize) -> Result<Vec<String>> {
        let bytes = std::fs::read(path)?;

        // pdf_extract は壊れたPDFでpanicすることがある
        let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        }))
        .map_err(|_| VerificaError::parse_failure(path, "pdf-extract が異常終了しました"))?
        .map_err(|e| VerificaError::parse_failure(path, e))?;

        debug!(path = %path.display(), pages = extracted.len(), "pdf-extract で抽出");
        Ok(extracted.into_iter().take(max_pages).collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// 1ページ1行のテキストPDFを生成
    pub fn make_text_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}
