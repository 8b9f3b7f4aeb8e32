//! テキスト照合
//!
//! 文書テキストの各表記（大文字・英数字のみ・単語正規化した小文字）に対して
//! コード/タイトルの包含を判定する。全文検索・意味検索の両戦略で共通。

use std::collections::BTreeMap;

use crate::code::{compact, compare_codes, normalize, ComparisonStatus};
use crate::types::{Columns, Entry, MatchResult, MatchStatus, ScannedDocument};

/// 小文字化して空白を1つにまとめる
pub fn normalize_words(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 照合用の3表記
#[derive(Debug, Clone, Default)]
pub struct TextForms {
    pub upper: String,
    pub lower: String,
    pub compact: String,
}

impl TextForms {
    pub fn from_text(text: &str) -> Self {
        Self {
            upper: text.to_uppercase(),
            lower: normalize_words(text),
            compact: compact(text),
        }
    }
}

/// 英数字のみの表記でコードの包含を判定
pub fn contains_code(compact_haystack: &str, code: &str) -> bool {
    let needle = compact(code);
    !needle.is_empty() && compact_haystack.contains(&needle)
}

/// 単語正規化した表記でタイトルの包含を判定
pub fn contains_title(lower_haystack: &str, title: &str) -> bool {
    let needle = normalize_words(title);
    !needle.is_empty() && lower_haystack.contains(&needle)
}

/// 1文書（1パッセージ）に対する判定結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hit {
    pub code_found: bool,
    pub title_found: bool,
}

impl Hit {
    /// 必要な項目すべてを満たすか
    pub fn satisfies_all(&self, columns: Columns) -> bool {
        (!columns.code || self.code_found) && (!columns.title || self.title_found)
    }

    /// 必要な項目のいずれかを満たすか
    pub fn satisfies_any(&self, columns: Columns) -> bool {
        (columns.code && self.code_found) || (columns.title && self.title_found)
    }

    /// 判定結果から状態を決める（何も満たさなければ `None`）
    pub fn status(&self, columns: Columns) -> Option<MatchStatus> {
        if !self.satisfies_any(columns) {
            None
        } else if self.satisfies_all(columns) {
            Some(MatchStatus::Matched)
        } else if columns.code && self.code_found {
            Some(MatchStatus::CodeFound)
        } else {
            Some(MatchStatus::TitleFound)
        }
    }
}

/// 3表記に対してエントリを判定
pub fn evaluate(forms: &TextForms, entry: &Entry) -> Hit {
    Hit {
        code_found: contains_code(&forms.compact, &entry.code),
        title_found: contains_title(&forms.lower, &entry.title),
    }
}

fn evaluate_document(doc: &ScannedDocument, entry: &Entry) -> Hit {
    let code_found = contains_code(&doc.text_compact, &entry.code)
        || (!entry.code.is_empty() && doc.codes.iter().any(|c| *c == normalize(&entry.code)));
    Hit {
        code_found,
        title_found: contains_title(&doc.text_lower, &entry.title),
    }
}

fn build_result(entry: &Entry, file: Option<&str>, status: MatchStatus, hit: Hit) -> MatchResult {
    MatchResult {
        code: entry.code.clone(),
        title: entry.title.clone(),
        matched_file: file.map(str::to_string),
        status,
        code_found: hit.code_found,
        title_found: hit.title_found,
    }
}

/// 読み込んだ文書群からエントリを探す（全文検索戦略）
///
/// 1. 必要な項目すべてを1文書で満たせば `Matched`（最初の文書）
/// 2. コードとタイトルが別文書で見つかれば `Partial`（コード側の文書）
/// 3. 片方だけ見つかれば `CodeFound` / `TitleFound`
///
/// # Arguments
/// * `entry` - 目録のエントリ
/// * `documents` - ファイル名順に並んだ文書
/// * `columns` - 照合に使う列
pub fn match_in_documents(
    entry: &Entry,
    documents: &[ScannedDocument],
    columns: Columns,
) -> Option<MatchResult> {
    let mut first_code: Option<&ScannedDocument> = None;
    let mut first_title: Option<&ScannedDocument> = None;

    for doc in documents {
        let hit = evaluate_document(doc, entry);
        if hit.satisfies_any(columns) && hit.satisfies_all(columns) {
            return Some(build_result(entry, Some(&doc.relative_path), MatchStatus::Matched, hit));
        }
        if hit.code_found && first_code.is_none() {
            first_code = Some(doc);
        }
        if hit.title_found && first_title.is_none() {
            first_title = Some(doc);
        }
    }

    let code_doc = first_code.filter(|_| columns.code);
    let title_doc = first_title.filter(|_| columns.title);

    match (code_doc, title_doc) {
        (Some(doc), Some(_)) => {
            let hit = Hit { code_found: true, title_found: true };
            Some(build_result(entry, Some(&doc.relative_path), MatchStatus::Partial, hit))
        }
        (Some(doc), None) => {
            let hit = Hit { code_found: true, title_found: false };
            Some(build_result(entry, Some(&doc.relative_path), MatchStatus::CodeFound, hit))
        }
        (None, Some(doc)) => {
            let hit = Hit { code_found: false, title_found: true };
            Some(build_result(entry, Some(&doc.relative_path), MatchStatus::TitleFound, hit))
        }
        (None, None) => None,
    }
}

/// 文書ごとに読み取ったコードからエントリを探す（画像読み取り戦略）
///
/// タイトルは読み取らないため、タイトルも必要な場合は `CodeFound` 止まり。
/// コードを照合しない設定では常に `None`。
pub fn match_by_extracted_codes(
    entry: &Entry,
    extracted: &BTreeMap<String, Option<String>>,
    columns: Columns,
) -> Option<MatchResult> {
    if !columns.code || entry.code.is_empty() {
        return None;
    }

    extracted.iter().find_map(|(file, code)| {
        let code = code.as_deref()?;
        if compare_codes(&entry.code, code).status != ComparisonStatus::Ok {
            return None;
        }
        let hit = Hit { code_found: true, title_found: false };
        let status = hit.status(columns)?;
        Some(build_result(entry, Some(file), status, hit))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, title: &str) -> Entry {
        Entry {
            code: code.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn doc(name: &str, text: &str) -> ScannedDocument {
        ScannedDocument::from_pages(name, name, &[text.to_string()])
    }

    #[test]
    fn test_normalize_words() {
        assert_eq!(normalize_words("  Relazione\n\tGENERALE  "), "relazione generale");
        assert_eq!(normalize_words(""), "");
    }

    #[test]
    fn test_contains_code_and_title_empty_needles() {
        assert!(!contains_code("ABC", ""));
        assert!(!contains_title("abc", "   "));
    }

    #[test]
    fn test_hit_status() {
        let both = Columns::default();
        let code_only = Columns { code: true, title: false };
        let hit = Hit { code_found: true, title_found: false };
        assert_eq!(hit.status(both), Some(MatchStatus::CodeFound));
        assert_eq!(hit.status(code_only), Some(MatchStatus::Matched));
        assert_eq!(Hit::default().status(both), None);
        let title = Hit { code_found: false, title_found: true };
        assert_eq!(title.status(code_only), None);
        assert_eq!(title.status(both), Some(MatchStatus::TitleFound));
    }

    #[test]
    fn test_match_in_documents_matched() {
        let docs = vec![
            doc("a.pdf", "Indice generale"),
            doc("b.pdf", "ADRPMV02-PEDSIIE-RRC00-1\nRelazione   generale"),
        ];
        let result = match_in_documents(
            &entry("ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale"),
            &docs,
            Columns::default(),
        )
        .unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.matched_file.as_deref(), Some("b.pdf"));
        assert!(result.code_found && result.title_found);
    }

    #[test]
    fn test_match_in_documents_partial() {
        let docs = vec![
            doc("a.pdf", "ADRPMV02 PEDSIIE RRC00 1"),
            doc("b.pdf", "Relazione generale"),
        ];
        let result = match_in_documents(
            &entry("ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale"),
            &docs,
            Columns::default(),
        )
        .unwrap();
        assert_eq!(result.status, MatchStatus::Partial);
        assert_eq!(result.matched_file.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_match_in_documents_repaired_code() {
        let docs = vec![doc("a.pdf", "Codice elaborato ADRPMVO2-PEDSIIE-RRC00-1")];
        let result = match_in_documents(
            &entry("ADRPMV02-PEDSIIE-RRC00-1", ""),
            &docs,
            Columns { code: true, title: false },
        )
        .unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
    }

    #[test]
    fn test_match_in_documents_none() {
        let docs = vec![doc("a.pdf", "niente")];
        assert!(match_in_documents(&entry("ADRPMV02-PEDSIIE-RRC00-1", "Relazione"), &docs, Columns::default()).is_none());
        assert!(match_in_documents(&entry("ADRPMV02-PEDSIIE-RRC00-1", "Relazione"), &[], Columns::default()).is_none());
    }

    #[test]
    fn test_match_by_extracted_codes() {
        let mut extracted = BTreeMap::new();
        extracted.insert("a.pdf".to_string(), None);
        extracted.insert("b.pdf".to_string(), Some("ADRPMVO2-PEDSIIE-RRCO0-1".to_string()));

        let e = entry("ADRPMV02-PEDSIIE-RRC00-1", "Relazione");
        let result = match_by_extracted_codes(&e, &extracted, Columns::default()).unwrap();
        assert_eq!(result.status, MatchStatus::CodeFound);
        assert_eq!(result.matched_file.as_deref(), Some("b.pdf"));

        let result = match_by_extracted_codes(&e, &extracted, Columns { code: true, title: false }).unwrap();
        assert_eq!(result.status, MatchStatus::Matched);

        assert!(match_by_extracted_codes(&e, &extracted, Columns { code: false, title: true }).is_none());
    }
}
