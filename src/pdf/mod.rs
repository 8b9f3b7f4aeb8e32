//! PDFの読み込み口
//!
//! 目録テーブル・本文テキスト・ページ画像の取得をトレイトで切り離す。
//! 既定の実装は lopdf / pdf-extract / PDFium。テストでは偽物に差し替える。

mod pdfium;
pub mod render;
pub mod tables;
pub mod text;

use std::path::Path;

use image::DynamicImage;
use verifica_common::Table;

use crate::error::Result;

pub use render::PdfiumRenderer;
pub use tables::{PdfiumTables, TextLayoutTables};
pub use text::{LopdfText, PdfExtractText};

/// 文書単位の抽出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFlavor {
    /// 区切り文字（罫線・タブ・縦棒）で列を分ける
    Lattice,
    /// 空白の連続で列を分ける
    Stream,
}

impl TableFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableFlavor::Lattice => "lattice",
            TableFlavor::Stream => "stream",
        }
    }
}

/// ページ番号つきのテーブル
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTable {
    /// 1始まり
    pub page: Option<usize>,
    pub rows: Table,
}

/// ページ単位のテーブル抽出（第一候補）
pub trait PageTableBackend: Send + Sync {
    fn name(&self) -> &str;

    fn page_count(&self, path: &Path) -> Result<usize>;

    /// `page` は0始まり
    fn page_tables(&self, path: &Path, page: usize) -> Result<Vec<Table>>;
}

/// 文書単位のテーブル抽出（第一候補で何も取れなかったとき）
pub trait DocumentTableBackend: Send + Sync {
    fn name(&self) -> &str;

    fn document_tables(&self, path: &Path, flavor: TableFlavor) -> Result<Vec<PageTable>>;
}

/// 本文テキスト抽出
pub trait TextBackend: Send + Sync {
    fn name(&self) -> &str;

    /// 先頭 `max_pages` ページのテキスト
    fn page_texts(&self, path: &Path, max_pages: usize) -> Result<Vec<String>>;
}

/// レンダリング結果
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub image: DynamicImage,
    /// 1ポイントあたりのピクセル数
    pub pixels_per_point: f32,
}

/// ページ画像の生成
pub trait PageRenderer: Send + Sync {
    /// `page_index` は0始まり
    fn render_page(&self, path: &Path, page_index: usize, dpi: u32) -> Result<RenderedPage>;
}
