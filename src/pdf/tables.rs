//! 目録テーブルの抽出
//!
//! - PdfiumTables: PDFiumの文字列セグメント座標から行・列を組み立てる（ページ単位）
//! - TextLayoutTables: pdf-extractのテキスト行を区切り文字で分割する（文書単位）
//!
//! どちらもセル文字列の2次元配列を返すだけで、見出し判定は行わない

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use verifica_common::Table;

use super::pdfium::load_pdfium;
use super::{DocumentTableBackend, PageTable, PageTableBackend, TableFlavor, TextBackend};
use crate::error::{Result, VerificaError};
use crate::pdf::text::PdfExtractText;

/// 座標つきの文字列（ポイント、左上原点）
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextCell {
    fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// 行・列判定の許容幅
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    /// この距離以内のY中心は同じ行
    pub row_tolerance: f32,
    /// この距離を超えて離れた左端は別の列
    pub col_tolerance: f32,
    /// これ未満のセル数の行は表の外とみなす
    pub min_cols: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 4.0,
            col_tolerance: 8.0,
            min_cols: 2,
        }
    }
}

fn cmp_f32(a: f32, b: f32) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

/// Y座標で行にまとめる（上から下、各行は左から右）
fn cluster_rows(cells: &[TextCell], tolerance: f32) -> Vec<Vec<&TextCell>> {
    let mut rows: Vec<Vec<&TextCell>> = Vec::new();

    for cell in cells {
        match rows
            .iter_mut()
            .find(|row| row.first().map(|f| (cell.center_y() - f.center_y()).abs() <= tolerance).unwrap_or(false))
        {
            Some(row) => row.push(cell),
            None => rows.push(vec![cell]),
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| cmp_f32(a.x, b.x));
    }
    rows.sort_by(|a, b| {
        let ay = a.first().map(|c| c.y).unwrap_or(0.0);
        let by = b.first().map(|c| c.y).unwrap_or(0.0);
        cmp_f32(ay, by)
    });
    rows
}

/// 左端の分布から列境界を求める
fn column_boundaries(rows: &[Vec<&TextCell>], tolerance: f32) -> Vec<f32> {
    let mut xs: Vec<f32> = rows.iter().flat_map(|row| row.iter().map(|c| c.x)).collect();
    xs.sort_by(|a, b| cmp_f32(*a, *b));

    let Some(&first) = xs.first() else {
        return Vec::new();
    };

    let mut boundaries = vec![first];
    let mut last = first;
    for &x in &xs[1..] {
        if x - last > tolerance {
            boundaries.push(x);
        }
        last = x;
    }

    let max_right = rows
        .iter()
        .flat_map(|row| row.iter().map(|c| c.right()))
        .fold(f32::MIN, f32::max);
    boundaries.push(max_right.max(first) + 1.0);
    boundaries
}

fn column_index(cell: &TextCell, boundaries: &[f32]) -> usize {
    let center = cell.center_x();
    // 中心が次の境界を越えていても、左端が属する列を優先する
    boundaries
        .windows(2)
        .position(|w| cell.x >= w[0] && cell.x < w[1])
        .or_else(|| boundaries.windows(2).position(|w| center >= w[0] && center < w[1]))
        .unwrap_or(boundaries.len().saturating_sub(2))
}

/// 座標つき文字列を表にする
///
/// セル数が `min_cols` 未満の行（段落・ページ見出し）は除く。
/// 同じセルに複数の文字列が入る場合は空白でつなぐ。
pub fn layout_grid(cells: &[TextCell], config: &GridConfig) -> Table {
    let rows: Vec<Vec<&TextCell>> = cluster_rows(cells, config.row_tolerance)
        .into_iter()
        .filter(|row| row.len() >= config.min_cols)
        .collect();

    let boundaries = column_boundaries(&rows, config.col_tolerance);
    let num_cols = boundaries.len().saturating_sub(1);
    if num_cols < config.min_cols {
        return Vec::new();
    }

    rows.iter()
        .map(|row| {
            let mut out = vec![String::new(); num_cols];
            for cell in row {
                let idx = column_index(cell, &boundaries).min(num_cols - 1);
                if out[idx].is_empty() {
                    out[idx] = cell.text.clone();
                } else {
                    out[idx].push(' ');
                    out[idx].push_str(&cell.text);
                }
            }
            out
        })
        .collect()
}

// =============================================
// PDFium（ページ単位）
// =============================================

/// PDFiumの文字列セグメント座標による表抽出
#[derive(Debug, Clone, Default)]
pub struct PdfiumTables {
    pub grid: GridConfig,
}

impl PageTableBackend for PdfiumTables {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn page_count(&self, path: &Path) -> Result<usize> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| VerificaError::parse_failure(path, e))?;
        Ok(document.pages().len() as usize)
    }

    fn page_tables(&self, path: &Path, page: usize) -> Result<Vec<Table>> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| VerificaError::parse_failure(path, e))?;

        let index = u16::try_from(page)
            .map_err(|_| VerificaError::parse_failure(path, format!("ページ番号が大きすぎます: {}", page)))?;
        let pdf_page = document
            .pages()
            .get(index)
            .map_err(|e| VerificaError::parse_failure(path, format!("{}ページ目: {}", page + 1, e)))?;

        let page_height = pdf_page.height().value;
        let text = pdf_page
            .text()
            .map_err(|e| VerificaError::parse_failure(path, format!("{}ページ目のテキスト: {}", page + 1, e)))?;

        let cells: Vec<TextCell> = text
            .segments()
            .iter()
            .filter_map(|segment| {
                let content = segment.text().trim().to_string();
                if content.is_empty() {
                    return None;
                }
                let bounds = segment.bounds();
                Some(TextCell {
                    text: content,
                    x: bounds.left().value,
                    y: page_height - bounds.top().value,
                    width: bounds.right().value - bounds.left().value,
                    height: bounds.top().value - bounds.bottom().value,
                })
            })
            .collect();

        let table = layout_grid(&cells, &self.grid);
        debug!(page = page + 1, cells = cells.len(), rows = table.len(), "PDFiumで表を抽出");

        Ok(if table.is_empty() { Vec::new() } else { vec![table] })
    }
}

// =============================================
// テキスト行の分割（文書単位）
// =============================================

lazy_static! {
    static ref STREAM_SPLIT_RE: Regex = Regex::new(r"\s{2,}|\t").unwrap();
    static ref LATTICE_SPLIT_RE: Regex = Regex::new(r"\s*[|│┃¦]\s*|\t").unwrap();
}

/// 1行をセルに分割（区切りがなければ `None`）
pub fn split_line(line: &str, flavor: TableFlavor) -> Option<Vec<String>> {
    let re = match flavor {
        TableFlavor::Lattice => &*LATTICE_SPLIT_RE,
        TableFlavor::Stream => &*STREAM_SPLIT_RE,
    };
    let cells: Vec<String> = re
        .split(line.trim())
        .map(|c| c.trim().to_string())
        .collect();
    let non_empty = cells.iter().filter(|c| !c.is_empty()).count();
    if non_empty >= 2 {
        Some(cells)
    } else {
        None
    }
}

/// ページテキストを表にする（分割できた行のみ）
pub fn text_to_table(text: &str, flavor: TableFlavor) -> Table {
    text.lines().filter_map(|line| split_line(line, flavor)).collect()
}

/// テキスト抽出結果を区切り文字で表にする
pub struct TextLayoutTables {
    text: Box<dyn TextBackend>,
    max_pages: usize,
}

impl Default for TextLayoutTables {
    fn default() -> Self {
        Self::new(Box::new(PdfExtractText), usize::MAX)
    }
}

impl TextLayoutTables {
    pub fn new(text: Box<dyn TextBackend>, max_pages: usize) -> Self {
        Self { text, max_pages }
    }
}

impl DocumentTableBackend for TextLayoutTables {
    fn name(&self) -> &str {
        "text-layout"
    }

    fn document_tables(&self, path: &Path, flavor: TableFlavor) -> Result<Vec<PageTable>> {
        let pages = self.text.page_texts(path, self.max_pages)?;
        Ok(pages
            .iter()
            .enumerate()
            .map(|(i, text)| PageTable {
                page: Some(i + 1),
                rows: text_to_table(text, flavor),
            })
            .filter(|t| !t.rows.is_empty())
            .collect())
    }
}
