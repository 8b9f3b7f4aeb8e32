//! プロンプト生成モジュール
//!
//! Vision LLMに渡すコード読み取り用プロンプトと応答スキーマ:
//! - build_standard_prompt: 通常の読み取り
//! - build_strict_prompt: 通常で読めなかった場合の再確認用
//! - code_reading_schema: 構造化出力のJSONスキーマ

use serde_json::{json, Value};

/// コード書式の説明（両プロンプト共通）
const CODE_FORMAT: &str = "\
The document code has exactly four dash-separated segments:
- segment 1: 6 letters followed by 2 digits (e.g. ADRPMV02)
- segment 2: 4 to 12 letters only (e.g. PEDSIIE)
- segment 3: 2 to 5 letters followed by 2 digits (e.g. RRC00)
- segment 4: a single digit, the revision (e.g. 1)";

/// 出力形式の説明（両プロンプト共通）
const OUTPUT_FORMAT: &str = r#"Reply with JSON only:
{
  "code_line": "the whole line as printed",
  "code": "SEG1-SEG2-SEG3-SEG4",
  "segments": ["SEG1", "SEG2", "SEG3", "SEG4"],
  "characters": ["each", "character", "in", "order"]
}
Leave a field out rather than guessing."#;

/// 通常プロンプト
pub fn build_standard_prompt() -> String {
    format!(
        r#"You are reading the title block of an engineering drawing or report.
Find the document code printed in the image and transcribe it exactly.

{CODE_FORMAT}

{OUTPUT_FORMAT}"#
    )
}

/// 再確認用プロンプト
///
/// 境界文字（各セグメントの先頭・末尾）とダッシュの連続を読み直させる
pub fn build_strict_prompt() -> String {
    format!(
        r#"You are reading the title block of an engineering drawing or report.
A previous reading of the document code failed validation. Read it again character by character.

{CODE_FORMAT}

Check carefully:
- the first and last character of every segment
- digits versus letters: 0 and O, 1 and I or L, 5 and S, 8 and B
- runs of dashes or long dashes between segments count as one separator
- spaces inside the code are not part of it

{OUTPUT_FORMAT}"#
    )
}

/// プロンプト列（先頭から順に試す）
pub fn prompt_variants() -> Vec<String> {
    vec![build_standard_prompt(), build_strict_prompt()]
}

/// 構造化出力のスキーマ
pub fn code_reading_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "code_line": { "type": "STRING" },
            "code": { "type": "STRING" },
            "segments": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            },
            "characters": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            }
        }
    })
}
