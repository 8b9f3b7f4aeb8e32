//! 照合結果の集計とレポート生成
//!
//! - フォルダモード: 期待コード集合と文書ごとの読み取りコード集合の集合演算
//! - エントリモード: エントリごとの解決結果を分類
//!
//! BTreeMap/BTreeSet を使い、同じ入力からは常に同じ順序の結果を返す

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

use crate::code::normalize;
use crate::types::{
    EffectiveConfig, Entry, MatchResult, MatchStatus, MissingEntry, Report, RunError, Summary,
    UnexpectedDocument,
};

/// エントリ1件の解決結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(MatchResult),
    NotFound,
    /// 照合処理自体が失敗した（見つからなかったのとは区別する）
    Failed(String),
}

fn summarize(
    report_parts: (&[MatchResult], usize, usize, usize, usize),
    total_expected: usize,
    total_documents: usize,
    config: EffectiveConfig,
) -> Summary {
    let (matches, missing, unexpected, extraction_failures, errors) = report_parts;
    let count = |status: MatchStatus| matches.iter().filter(|m| m.status == status).count();
    Summary {
        total_expected,
        total_documents,
        matched: count(MatchStatus::Matched),
        partial: count(MatchStatus::Partial),
        code_found: count(MatchStatus::CodeFound),
        title_found: count(MatchStatus::TitleFound),
        missing,
        unexpected,
        extraction_failures,
        errors,
        config,
    }
}

/// フォルダモードの照合
///
/// # Arguments
/// * `expected` - 目録のエントリ
/// * `extracted` - ファイル名 → 読み取ったコード（読めなければ `None`）
/// * `errors` - 読み取り中に記録したエラー
/// * `config` - レポートに記録する有効設定
///
/// # Returns
/// 一致・欠落・想定外・読み取り失敗を分類したレポート
pub fn reconcile_folder(
    expected: &[Entry],
    extracted: &BTreeMap<String, Option<String>>,
    errors: Vec<RunError>,
    config: EffectiveConfig,
) -> Report {
    let mut expected_by_code: BTreeMap<String, &Entry> = BTreeMap::new();
    for entry in expected {
        let code = normalize(&entry.code);
        if !code.is_empty() {
            expected_by_code.entry(code).or_insert(entry);
        }
    }

    // コード → 最初にそのコードを持っていたファイル
    let mut found: BTreeMap<String, &str> = BTreeMap::new();
    let mut unexpected = Vec::new();
    let mut extraction_failures = Vec::new();

    for (file, code) in extracted {
        match code {
            Some(code) => {
                let code = normalize(code);
                if expected_by_code.contains_key(&code) {
                    found.entry(code).or_insert(file.as_str());
                } else {
                    unexpected.push(UnexpectedDocument {
                        filename: file.clone(),
                        code,
                    });
                }
            }
            None => extraction_failures.push(file.clone()),
        }
    }

    let expected_codes: BTreeSet<&String> = expected_by_code.keys().collect();
    let found_codes: BTreeSet<&String> = found.keys().collect();

    let matches: Vec<MatchResult> = expected_codes
        .intersection(&found_codes)
        .map(|code| {
            let entry = expected_by_code[*code];
            MatchResult {
                code: (*code).clone(),
                title: entry.title.clone(),
                matched_file: found.get(*code).map(|f| f.to_string()),
                status: MatchStatus::Matched,
                code_found: true,
                title_found: false,
            }
        })
        .collect();

    let missing: Vec<MissingEntry> = expected_codes
        .difference(&found_codes)
        .map(|code| MissingEntry {
            code: (*code).clone(),
            title: expected_by_code[*code].title.clone(),
        })
        .collect();

    let summary = summarize(
        (&matches, missing.len(), unexpected.len(), extraction_failures.len(), errors.len()),
        expected_by_code.len(),
        extracted.len(),
        config,
    );

    Report {
        summary,
        matches,
        missing,
        unexpected,
        extraction_failures,
        errors,
        generated_at: Utc::now(),
    }
}

/// エントリモードのレポート生成
///
/// 解決結果の順序（目録の順序）をそのまま保つ。
/// `Failed` は欠落ではなく `errors` に入る。
///
/// # Arguments
/// * `outcomes` - エントリと解決結果の組
/// * `total_documents` - 対象文書数
/// * `extraction_failures` - 読み取れなかった文書
/// * `errors` - 文書単位のエラー（エントリ単位のエラーはここに追加される）
/// * `config` - レポートに記録する有効設定
pub fn build_entry_report(
    outcomes: Vec<(Entry, Resolution)>,
    total_documents: usize,
    extraction_failures: Vec<String>,
    mut errors: Vec<RunError>,
    config: EffectiveConfig,
) -> Report {
    let total_expected = outcomes.len();
    let mut matches = Vec::new();
    let mut missing = Vec::new();

    for (entry, resolution) in outcomes {
        match resolution {
            Resolution::Found(result) => matches.push(result),
            Resolution::NotFound => missing.push(MissingEntry {
                code: entry.code,
                title: entry.title,
            }),
            Resolution::Failed(message) => errors.push(RunError {
                target: if entry.code.is_empty() { entry.title } else { entry.code },
                message,
            }),
        }
    }

    let summary = summarize(
        (&matches, missing.len(), 0, extraction_failures.len(), errors.len()),
        total_expected,
        total_documents,
        config,
    );

    Report {
        summary,
        matches,
        missing,
        unexpected: Vec::new(),
        extraction_failures,
        errors,
        generated_at: Utc::now(),
    }
}
