//! 目録テーブルの行解釈
//!
//! 抽出器が返した生テーブル（セル文字列の2次元配列）から
//! 見出し行を選び、各データ行をEntryに変換する。
//! PDFの読み込み自体は行わない。

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::code::{assemble_from_fields, compact, is_placeholder, parse_from_free_text, validate_format};
use crate::types::Entry;

/// 生テーブル（行 × セル）
pub type Table = Vec<Vec<String>>;

/// 見出し行とみなすのに必要な説明的セルの数
pub const MIN_DESCRIPTIVE_CELLS: usize = 2;

/// 見出しの大半が汎用名のときの置換判定（割合）
pub const PLACEHOLDER_RATIO: f64 = 0.6;

/// 目録の標準14列
pub const FALLBACK_SCHEMA: [&str; 14] = [
    "COMMESSA",
    "LOTTO",
    "FASE",
    "CAPITOLO",
    "PARAGRAFO",
    "WBS",
    "PARTE D'OPERA",
    "TIPOLOGIA",
    "DISCIPLINA",
    "PROGRESSIVO",
    "REVISIONE",
    "TITOLO",
    "FORMATO",
    "SCALA",
];

/// 鏡文字判定に使う既知の見出し語
const KNOWN_HEADER_WORDS: &[&str] = &[
    "CODICE",
    "TITOLO",
    "DESCRIZIONE",
    "ELABORATO",
    "DOCUMENTO",
    "OGGETTO",
    "COMMESSA",
    "LOTTO",
    "FASE",
    "CAPITOLO",
    "PARAGRAFO",
    "TIPOLOGIA",
    "DISCIPLINA",
    "PROGRESSIVO",
    "REVISIONE",
    "FORMATO",
    "SCALA",
    "NOTE",
    "DATA",
];

lazy_static! {
    // 抽出器が付ける汎用列名（"0", "Column3", "Unnamed: 2" など）
    static ref GENERIC_HEADER_RE: Regex =
        Regex::new(r"(?i)^(col(umn)?|colonna|unnamed:?|field)?[\s_]*\d*$").unwrap();
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'A' | 'E' | 'I' | 'O' | 'U')
}

/// 凡例行（空でないセルがすべて英字1文字）
pub fn is_legend_row(row: &[String]) -> bool {
    let mut cells = row.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).peekable();
    cells.peek().is_some()
        && cells.all(|c| {
            let mut chars = c.chars();
            matches!((chars.next(), chars.next()), (Some(ch), None) if ch.is_alphabetic())
        })
}

/// 説明的なセル（3文字以上か空白を含む）
pub fn is_descriptive(cell: &str) -> bool {
    let cell = cell.trim();
    cell.chars().count() >= 3 || cell.contains(' ')
}

/// 見出し行の位置を選ぶ
///
/// 凡例行を飛ばし、説明的セルが [`MIN_DESCRIPTIVE_CELLS`] 以上ある最初の行。
/// 標準14列と同じ幅の汎用名だけの行（"0".."13" など）も見出しとして採る
pub fn select_header(table: &[Vec<String>]) -> Option<usize> {
    table.iter().position(|row| {
        is_generic_header_row(row)
            || (!is_legend_row(row)
                && row.iter().filter(|cell| is_descriptive(cell)).count() >= MIN_DESCRIPTIVE_CELLS)
    })
}

/// 標準14列に置き換える対象の見出し行か
pub fn is_generic_header_row(row: &[String]) -> bool {
    if row.len() != FALLBACK_SCHEMA.len() {
        return false;
    }
    let generic = row
        .iter()
        .filter(|cell| !cell.trim().is_empty() && is_generic_header(cell))
        .count();
    generic as f64 >= PLACEHOLDER_RATIO * row.len() as f64
}

/// 語末が母音の語の数（イタリア語の語は母音で終わることが多い）
fn vowel_ending_score(text: &str) -> usize {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|word| word.chars().count() >= 3)
        .filter(|word| word.chars().last().map(is_vowel).unwrap_or(false))
        .count()
}

/// 鏡文字になった見出しを判定
pub fn is_mirrored(cell: &str) -> bool {
    let upper = cell.trim().to_uppercase();
    if upper.is_empty() {
        return false;
    }
    if KNOWN_HEADER_WORDS.iter().any(|w| upper.contains(w)) {
        return false;
    }
    let reversed: String = upper.chars().rev().collect();
    if KNOWN_HEADER_WORDS.iter().any(|w| reversed.contains(w)) {
        return true;
    }
    vowel_ending_score(&reversed) > vowel_ending_score(&upper)
}

/// 鏡文字なら反転して返す
pub fn repair_header(cell: &str) -> String {
    let trimmed = cell.trim();
    if is_mirrored(trimmed) {
        trimmed.chars().rev().collect()
    } else {
        trimmed.to_string()
    }
}

/// 汎用列名（抽出器の自動命名）か
pub fn is_generic_header(cell: &str) -> bool {
    GENERIC_HEADER_RE.is_match(cell.trim())
}

/// 見出しの大半が汎用名で列数が標準14列と一致すれば標準列名に置き換える
pub fn apply_fallback_schema(headers: Vec<String>) -> Vec<String> {
    if headers.len() != FALLBACK_SCHEMA.len() {
        return headers;
    }
    let generic = headers.iter().filter(|h| is_generic_header(h)).count();
    if generic as f64 >= PLACEHOLDER_RATIO * headers.len() as f64 {
        FALLBACK_SCHEMA.iter().map(|s| s.to_string()).collect()
    } else {
        headers
    }
}

/// 重複した見出しに連番をつける（`NAME`, `NAME_2`, `NAME_3`, …）
pub fn dedup_headers(headers: &[String]) -> Vec<String> {
    let mut seen: Vec<(String, usize)> = Vec::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let base = if header.trim().is_empty() {
                format!("COL{}", i + 1)
            } else {
                header.trim().to_string()
            };
            match seen.iter_mut().find(|(name, _)| *name == base) {
                Some((_, count)) => {
                    *count += 1;
                    format!("{}_{}", base, count)
                }
                None => {
                    seen.push((base.clone(), 1));
                    base
                }
            }
        })
        .collect()
}

/// 見出し行から最終的な列名を作る
pub fn build_headers(header_row: &[String]) -> Vec<String> {
    let repaired: Vec<String> = header_row.iter().map(|c| repair_header(c)).collect();
    dedup_headers(&apply_fallback_schema(repaired))
}

/// 1行からコードを探す
///
/// 行全体 → セル単位 → 分割列の組み立て の順
fn code_from_row(headers: &[String], cells: &[String]) -> Option<String> {
    let flat = cells
        .iter()
        .filter(|c| !c.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");

    parse_from_free_text(&flat)
        .filter(|c| validate_format(c))
        .or_else(|| {
            cells
                .iter()
                .filter_map(|cell| parse_from_free_text(cell))
                .find(|c| validate_format(c))
        })
        .or_else(|| {
            let fields: Vec<(String, String)> = headers
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect();
            assemble_from_fields(&fields)
        })
}

/// コードを含まない最長のセルをタイトルとする
fn title_from_row(cells: &[String], code: &str) -> String {
    let code_compact = compact(code);
    cells
        .iter()
        .filter(|cell| !is_placeholder(cell))
        .filter(|cell| !compact(cell).contains(&code_compact))
        .filter(|cell| parse_from_free_text(cell).as_deref() != Some(code))
        .fold(None::<&String>, |best, cell| match best {
            Some(b) if b.chars().count() >= cell.chars().count() => Some(b),
            _ => Some(cell),
        })
        .cloned()
        .unwrap_or_default()
}

/// 1テーブルをEntryに変換
///
/// # Arguments
/// * `table` - 生テーブル
/// * `page` - 1始まりのページ番号（不明なら `None`）
/// * `source` - バックエンド名
/// * `seen` - 既出コード（同じバックエンドの実行中で共有）
pub fn entries_from_table(
    table: &[Vec<String>],
    page: Option<usize>,
    source: &str,
    seen: &mut HashSet<String>,
) -> Vec<Entry> {
    let Some(header_idx) = select_header(table) else {
        return Vec::new();
    };
    let headers = build_headers(&table[header_idx]);

    let mut entries = Vec::new();
    for row in &table[header_idx + 1..] {
        let mut cells: Vec<String> = row.iter().map(|c| c.trim().to_string()).collect();
        cells.resize(headers.len(), String::new());

        let Some(code) = code_from_row(&headers, &cells) else {
            continue;
        };
        if !seen.insert(code.clone()) {
            continue;
        }

        entries.push(Entry {
            title: title_from_row(&cells, &code),
            code,
            raw_row: cells,
            headers: headers.clone(),
            page,
            source: source.to_string(),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_is_legend_row() {
        assert!(is_legend_row(&row(&["A", "", "B", "C"])));
        assert!(!is_legend_row(&row(&["A", "Codice"])));
        assert!(!is_legend_row(&row(&["", " "])));
        assert!(!is_legend_row(&row(&["1", "2"])));
    }

    #[test]
    fn test_select_header_skips_legend_row() {
        let table = vec![
            row(&["A", "B", "C"]),
            row(&["Codice elaborato", "Titolo", "Scala"]),
            row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale", "-"]),
        ];
        assert_eq!(select_header(&table), Some(1));
    }

    #[test]
    fn test_select_header_none() {
        let table = vec![row(&["A", "B"]), row(&["1", "xx"])];
        assert_eq!(select_header(&table), None);
    }

    #[test]
    fn test_select_header_generic_numeric_row() {
        let table = vec![
            (0..14).map(|i| i.to_string()).collect::<Vec<_>>(),
            row(&["ADRPMV", "02", "PE", "DG", "GEN", "-", "-", "E", "ED", "00", "1", "Relazione", "A4", "-"]),
        ];
        assert_eq!(select_header(&table), Some(0));

        // 幅が違えば汎用名だけの行は見出しにしない
        let narrow = vec![row(&["0", "1", "2"]), row(&["Codice elaborato", "Titolo", "Scala"])];
        assert_eq!(select_header(&narrow), Some(1));

        // 空セルだけの行は汎用名とみなさない
        assert!(!is_generic_header_row(&vec![String::new(); 14]));
    }

    #[test]
    fn test_repair_header_mirrored_known_word() {
        assert_eq!(repair_header("OLOTIT"), "TITOLO");
        assert_eq!(repair_header("ecidoC"), "Codice");
        assert_eq!(repair_header("Titolo"), "Titolo");
    }

    #[test]
    fn test_repair_header_vowel_heuristic() {
        assert_eq!(repair_header("alovaT"), "Tavola");
        assert_eq!(repair_header("Tavola"), "Tavola");
        assert_eq!(repair_header(""), "");
    }

    #[test]
    fn test_apply_fallback_schema() {
        let generic: Vec<String> = (0..14).map(|i| i.to_string()).collect();
        assert_eq!(apply_fallback_schema(generic)[6], "PARTE D'OPERA");

        let short: Vec<String> = (0..5).map(|i| format!("Column{}", i)).collect();
        assert_eq!(apply_fallback_schema(short.clone()), short);

        let mut mostly_named: Vec<String> = FALLBACK_SCHEMA.iter().map(|s| s.to_string()).collect();
        mostly_named[0] = "0".into();
        assert_eq!(apply_fallback_schema(mostly_named.clone()), mostly_named);
    }

    #[test]
    fn test_dedup_headers() {
        let headers = row(&["Note", "Note", "", "Note"]);
        assert_eq!(dedup_headers(&headers), vec!["Note", "Note_2", "COL3", "Note_3"]);
    }

    #[test]
    fn test_entries_from_table_basic() {
        let table = vec![
            row(&["A", "B", "C"]),
            row(&["Codice elaborato", "Titolo", "Scala"]),
            row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale", "-"]),
            row(&["ADRPMVO1 - PEDGGEN - EED00 - 0", "Planimetria di inquadramento", "1:500"]),
            row(&["", "nota a piè di pagina"]),
        ];
        let mut seen = HashSet::new();
        let entries = entries_from_table(&table, Some(2), "lopdf", &mut seen);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "ADRPMV02-PEDSIIE-RRC00-1");
        assert_eq!(entries[0].title, "Relazione generale");
        assert_eq!(entries[0].page, Some(2));
        assert_eq!(entries[0].source, "lopdf");
        assert_eq!(entries[0].headers, vec!["Codice elaborato", "Titolo", "Scala"]);
        assert_eq!(entries[1].code, "ADRPMV01-PEDGGEN-EED00-0");
        assert_eq!(entries[1].title, "Planimetria di inquadramento");
    }

    #[test]
    fn test_entries_from_table_skips_seen_codes() {
        let table = vec![
            row(&["Codice elaborato", "Titolo"]),
            row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale"]),
            row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale (copia)"]),
        ];
        let mut seen = HashSet::new();
        assert_eq!(entries_from_table(&table, None, "t", &mut seen).len(), 1);
        assert!(entries_from_table(&table, None, "t", &mut seen).is_empty());
    }

    #[test]
    fn test_entries_from_table_split_columns() {
        let mut table = vec![(0..14).map(|i| i.to_string()).collect::<Vec<_>>()];
        table.push(row(&[
            "ADRPMV", "02", "PE", "DG", "GEN", "-", "-", "E", "ED", "00", "1",
            "Relazione tecnica generale", "A4", "-",
        ]));
        let mut seen = HashSet::new();
        let entries = entries_from_table(&table, Some(1), "lopdf", &mut seen);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].code, "ADRPMV02-PEDGGEN-EED00-1");
        assert_eq!(entries[0].title, "Relazione tecnica generale");
        assert_eq!(entries[0].headers[0], "COMMESSA");
    }

    #[test]
    fn test_entries_from_table_pads_short_rows() {
        let table = vec![
            row(&["Codice elaborato", "Titolo", "Formato"]),
            row(&["ADRPMV02-PEDSIIE-RRC00-1"]),
        ];
        let mut seen = HashSet::new();
        let entries = entries_from_table(&table, None, "t", &mut seen);
        assert_eq!(entries[0].raw_row.len(), 3);
        assert_eq!(entries[0].title, "");
    }
}
