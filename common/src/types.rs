//! 照合の型定義
//!
//! CLIとライブラリで共有される型:
//! - Entry: 目録PDFから抽出した1行（期待される文書）
//! - ScannedDocument: 全文検索用に読み込んだ文書
//! - MatchResult: 1エントリの照合結果
//! - Report: 1回の実行結果（JSON出力の単位）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 目録の1行
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// 正規化済みコード（抽出できなければ空）
    pub code: String,
    pub title: String,
    pub raw_row: Vec<String>,
    pub headers: Vec<String>,
    /// 1始まりのページ番号
    pub page: Option<usize>,
    /// 抽出したバックエンド名
    pub source: String,
}

/// 全文検索用に読み込んだ文書
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannedDocument {
    pub filename: String,
    /// スキャンルートからの相対パス
    pub relative_path: String,
    pub text_upper: String,
    /// 英数字のみ
    pub text_compact: String,
    /// 空白を1つにまとめた小文字
    pub text_lower: String,
    /// 本文から復元できたコード（出現順・重複なし）
    pub codes: Vec<String>,
    pub pages_read: usize,
}

impl ScannedDocument {
    /// ページテキストから検索用の各表記を組み立てる
    pub fn from_pages(filename: &str, relative_path: &str, pages: &[String]) -> Self {
        let text = pages.join("\n");
        Self {
            filename: filename.to_string(),
            relative_path: relative_path.to_string(),
            text_upper: text.to_uppercase(),
            text_compact: crate::code::compact(&text),
            text_lower: crate::matching::normalize_words(&text),
            codes: crate::code::find_all_codes(&text),
            pages_read: pages.len(),
        }
    }
}

/// 照合状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// 必要な項目すべてが同じ文書で見つかった
    Matched,
    /// コードとタイトルが別々の文書で見つかった
    Partial,
    CodeFound,
    TitleFound,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Partial => "partial",
            MatchStatus::CodeFound => "code_found",
            MatchStatus::TitleFound => "title_found",
        }
    }
}

/// 1エントリの照合結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub code: String,
    pub title: String,
    /// 一致した文書の成果品フォルダからの相対パス（区切りは `/`）
    ///
    /// 意味検索では検索結果のメタデータにある出典をそのまま入れる
    pub matched_file: Option<String>,
    pub status: MatchStatus,
    pub code_found: bool,
    pub title_found: bool,
}

/// 照合に使う列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Columns {
    pub code: bool,
    pub title: bool,
}

impl Default for Columns {
    fn default() -> Self {
        Self { code: true, title: true }
    }
}

impl Columns {
    /// `["code", "title"]` のような列名リストから生成
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, Error> {
        let mut columns = Columns { code: false, title: false };
        for name in names {
            match name.as_ref().trim().to_lowercase().as_str() {
                "code" | "codice" => columns.code = true,
                "title" | "titolo" => columns.title = true,
                "" => {}
                other => return Err(Error::Config(format!("不明な列名: {}", other))),
            }
        }
        if !columns.code && !columns.title {
            return Err(Error::Config("照合する列が指定されていません".into()));
        }
        Ok(columns)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.code {
            names.push("code".to_string());
        }
        if self.title {
            names.push("title".to_string());
        }
        names
    }
}

/// 照合戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// 画像読み取り（Vision LLM）
    Vision,
    /// ローカル全文検索
    Text,
    /// 外部の意味検索
    Semantic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Vision => "vision",
            Strategy::Text => "text",
            Strategy::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vision" | "visual" => Ok(Strategy::Vision),
            "text" | "fulltext" => Ok(Strategy::Text),
            "semantic" | "rag" => Ok(Strategy::Semantic),
            other => Err(Error::Config(format!("不明な照合戦略: {}", other))),
        }
    }
}

// =============================================
// レポート
// =============================================

/// 実行時の有効設定（レポートに記録）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub strategy: String,
    pub columns: Vec<String>,
    pub recursive: bool,
    pub excluded_files: Vec<String>,
    pub collection_id: Option<String>,
    pub max_pages: Option<usize>,
    pub index_file: Option<String>,
}

/// 件数の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_expected: usize,
    pub total_documents: usize,
    pub matched: usize,
    pub partial: usize,
    pub code_found: usize,
    pub title_found: usize,
    pub missing: usize,
    pub unexpected: usize,
    pub extraction_failures: usize,
    pub errors: usize,
    pub config: EffectiveConfig,
}

/// 見つからなかったエントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingEntry {
    pub code: String,
    pub title: String,
}

/// 目録にないコードを持つ文書
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnexpectedDocument {
    pub filename: String,
    pub code: String,
}

/// 処理単位ごとのエラー（バッチは止めない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    /// エントリのコードまたはファイル名
    pub target: String,
    pub message: String,
}

/// 1回の実行結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub matches: Vec<MatchResult>,
    pub missing: Vec<MissingEntry>,
    pub unexpected: Vec<UnexpectedDocument>,
    pub extraction_failures: Vec<String>,
    /// 外部サービスの失敗などで判定できなかったもの（`missing` には重ねて数えない）
    pub errors: Vec<RunError>,
    pub generated_at: DateTime<Utc>,
}
