//! 文書コードの正規化・修復モジュール
//!
//! コード書式: `seg0-seg1-seg2-seg3`
//! - seg0: 英字6文字 + 数字2桁（例: `ADRPMV02`）
//! - seg1: 英字4〜12文字（例: `PEDSIIE`）
//! - seg2: 英字2〜5文字 + 数字2桁（例: `RRC00`）
//! - seg3: 数字1桁（リビジョン）
//!
//! OCR/モデルの読み取り誤りは `0/O`, `1/I/L` に集中するため、
//! セグメントごとに期待される文字種で修復する（数字位置は数字寄り、
//! 英字セグメントは英字寄り）。

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref DASH_RUN_RE: Regex = Regex::new(r"[-–—]+").unwrap();
    static ref CODE_RE: Regex =
        Regex::new(r"^[A-Z]{6}[0-9]{2}-[A-Z]{4,12}-[A-Z]{2,5}[0-9]{2}-[0-9]$").unwrap();
    static ref CODE_SEARCH_RE: Regex =
        Regex::new(r"[A-Z]{6}[0-9]{2}-[A-Z]{4,12}-[A-Z]{2,5}[0-9]{2}-[0-9]").unwrap();
    // 数字位置に O/I/L、英字セグメントに 0/1 を許容する検索用パターン
    static ref TOLERANT_SEARCH_RE: Regex =
        Regex::new(r"[A-Z]{6}[0-9OIL]{2}-[A-Z01]{4,12}-[A-Z]{2,5}[0-9OIL]{2}-[0-9OIL]").unwrap();
    static ref SEGMENT_RES: [Regex; 4] = [
        Regex::new(r"^[A-Z]{6}[0-9]{2}$").unwrap(),
        Regex::new(r"^[A-Z]{4,12}$").unwrap(),
        Regex::new(r"^[A-Z]{2,5}[0-9]{2}$").unwrap(),
        Regex::new(r"^[0-9]$").unwrap(),
    ];
}

/// セグメント数
pub const SEGMENT_COUNT: usize = 4;

/// 数字として読むべき位置の修復
fn as_digit(c: char) -> char {
    match c {
        'O' => '0',
        'I' | 'L' => '1',
        _ => c,
    }
}

/// 英字として読むべき位置の修復
fn as_letter(c: char) -> char {
    match c {
        '0' => 'O',
        '1' => 'I',
        _ => c,
    }
}

/// 生文字列を正規化する
///
/// - 空白をすべて除去
/// - ダッシュ類（`-`, `–`, `—`）の連続を `-` 1文字に統一
/// - 大文字化
pub fn normalize(raw: &str) -> String {
    let no_space = WHITESPACE_RE.replace_all(raw, "");
    let dashed = DASH_RUN_RE.replace_all(&no_space, "-");
    dashed.to_uppercase()
}

/// 英数字のみ残して大文字化（部分一致判定用）
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// セグメント単位の修復
///
/// # Arguments
/// * `raw` - セグメント文字列
/// * `idx` - セグメント位置（0〜3）
///
/// # Returns
/// 修復後のセグメント。書式に合わなければ `None`
pub fn normalize_segment(raw: &str, idx: usize) -> Option<String> {
    if idx >= SEGMENT_COUNT {
        return None;
    }

    let token: Vec<char> = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_uppercase())
        .collect();
    if token.is_empty() {
        return None;
    }

    let repaired: String = match idx {
        0 | 2 => {
            let tail_start = token.len().saturating_sub(2);
            token
                .iter()
                .enumerate()
                .map(|(i, &c)| if i >= tail_start { as_digit(c) } else { c })
                .collect()
        }
        1 => token.iter().map(|&c| as_letter(c)).collect(),
        _ => {
            let last = token.len() - 1;
            token
                .iter()
                .enumerate()
                .map(|(i, &c)| if i == last { as_digit(c) } else { c })
                .collect()
        }
    };

    if SEGMENT_RES[idx].is_match(&repaired) {
        Some(repaired)
    } else {
        None
    }
}

/// 4セグメントを位置ごとに修復して結合
fn repair_segments(parts: &[&str]) -> Option<String> {
    if parts.len() != SEGMENT_COUNT {
        return None;
    }
    let segments = parts
        .iter()
        .enumerate()
        .map(|(idx, part)| normalize_segment(part, idx))
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("-"))
}

/// 自由テキストからコードを1件取り出す
///
/// 試行順序（最初に成功したものを採用）:
/// 1. `-` で分割して4セグメントを位置ごとに修復
/// 2. 正規化テキスト中の完全一致パターン検索
/// 3. 誤読許容パターンで検索し、位置ごとに修復
pub fn parse_from_free_text(text: &str) -> Option<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    let parts: Vec<&str> = normalized.split('-').collect();
    if let Some(code) = repair_segments(&parts) {
        return Some(code);
    }

    if let Some(m) = CODE_SEARCH_RE.find(&normalized) {
        return Some(m.as_str().to_string());
    }

    TOLERANT_SEARCH_RE
        .find_iter(&normalized)
        .find_map(|m| repair_segments(&m.as_str().split('-').collect::<Vec<_>>()))
}

/// テキスト中のすべてのコードを出現順に取り出す（重複除去済み）
pub fn find_all_codes(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let mut seen = HashSet::new();
    let mut codes = Vec::new();

    for m in TOLERANT_SEARCH_RE.find_iter(&normalized) {
        let parts: Vec<&str> = m.as_str().split('-').collect();
        if let Some(code) = repair_segments(&parts) {
            if seen.insert(code.clone()) {
                codes.push(code);
            }
        }
    }

    codes
}

/// 完全一致で書式を検証
pub fn validate_format(code: &str) -> bool {
    CODE_RE.is_match(code)
}

// =============================================
// 1文字ずつの比較
// =============================================

/// 比較結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonStatus {
    Ok,
    Failed,
}

/// 期待コードと抽出コードの比較結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeComparison {
    pub expected: String,
    pub extracted: String,
    pub status: ComparisonStatus,
}

fn strip_separators(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '–' | '—'))
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// 区切りを除いて1文字ずつ比較する
///
/// `O` と `0` は同一視する。それ以外の不一致、または長さの不一致は `Failed`。
pub fn compare_codes(expected: &str, extracted: &str) -> CodeComparison {
    let expected = strip_separators(expected);
    let extracted = strip_separators(extracted);

    let same = expected.chars().count() == extracted.chars().count()
        && expected.chars().zip(extracted.chars()).all(|(a, b)| {
            a == b || matches!((a, b), ('O', '0') | ('0', 'O'))
        });

    CodeComparison {
        status: if same { ComparisonStatus::Ok } else { ComparisonStatus::Failed },
        expected,
        extracted,
    }
}

// =============================================
// 分割列からの組み立て
// =============================================

/// 列名→セグメントの対応（列名は英数字のみの大文字で比較）
const FIELD_GROUPS: [&[&str]; SEGMENT_COUNT] = [
    &["COMMESSA", "LOTTO"],
    &["FASE", "CAPITOLO", "PARAGRAFO", "WBS", "PARTEDOPERA"],
    &["TIPOLOGIA", "DISCIPLINA", "PROGRESSIVO"],
    &["REVISIONE"],
];

/// `-` や `/` だけのセルは空欄扱い
pub fn is_placeholder(value: &str) -> bool {
    value
        .trim()
        .chars()
        .all(|c| c.is_whitespace() || matches!(c, '-' | '–' | '—' | '/'))
}

/// 分割された管理項目の列からコードを組み立てる
///
/// 目録によってはコードが「コミッサ」「ロット」「分野」…と複数列に分かれている。
/// 見出しがそれらの列名に一致する場合のみ組み立てを試みる。
///
/// # Arguments
/// * `fields` - (列名, セル値) の組
pub fn assemble_from_fields(fields: &[(String, String)]) -> Option<String> {
    let lookup = |key: &str| -> Option<&str> {
        fields
            .iter()
            .find(|(header, _)| compact(header) == key)
            .map(|(_, value)| value.as_str())
            .filter(|value| !is_placeholder(value))
    };

    let mut segments = Vec::with_capacity(SEGMENT_COUNT);
    for (idx, group) in FIELD_GROUPS.iter().enumerate() {
        let joined: String = group
            .iter()
            .filter_map(|key| lookup(key))
            .map(|value| value.trim())
            .collect();
        if joined.is_empty() {
            return None;
        }
        segments.push(normalize_segment(&joined, idx)?);
    }

    Some(segments.join("-"))
}
