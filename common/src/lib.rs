//! Verifica Codici Common Library
//!
//! CLIとライブラリ本体で共有される、I/Oを伴わないロジック:
//! コード文法・目録テーブルの解釈・応答パース・プロンプト・照合・集計

pub mod code;
pub mod error;
pub mod export;
pub mod matching;
pub mod parser;
pub mod prompts;
pub mod reconcile;
pub mod table;
pub mod types;

pub use code::{
    compact, compare_codes, find_all_codes, normalize, normalize_segment, parse_from_free_text,
    validate_format, CodeComparison, ComparisonStatus,
};
pub use error::{Error, Result};
pub use parser::{extract_json, CodeReading};
pub use reconcile::{build_entry_report, reconcile_folder, Resolution};
pub use table::{entries_from_table, Table};
pub use types::{
    Columns, EffectiveConfig, Entry, MatchResult, MatchStatus, MissingEntry, Report, RunError,
    ScannedDocument, Strategy, Summary, UnexpectedDocument,
};
