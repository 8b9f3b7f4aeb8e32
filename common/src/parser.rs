//! Vision応答パーサー
//!
//! モデル応答からJSONを抽出し、コード読み取り結果（CodeReading）を
//! 優先順位つきで解釈する

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::code::{normalize_segment, parse_from_free_text, validate_format, SEGMENT_COUNT};
use crate::error::{Error, Result};

/// 応答からJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. 生の [...] 配列
/// 4. エラー
///
/// # Examples
/// ```
/// use verifica_common::extract_json;
///
/// let response = "risultato: {\"code\": \"ADRPMV02-PEDSIIE-RRC00-1\"}";
/// let json = extract_json(response).unwrap();
/// assert!(json.starts_with('{'));
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (response.find(open), response.rfind(close)) {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// モデルが返すコード読み取り結果
///
/// すべて任意項目。解釈の優先順位は [`CodeReading::resolve`] を参照。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeReading {
    /// 読み取った行全体
    pub code_line: Option<String>,
    pub code: Option<String>,
    /// 4セグメント
    pub segments: Option<Vec<String>>,
    /// 1文字ずつの読み取り
    pub characters: Option<Vec<String>>,
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list_field(value: &Value, key: &str) -> Option<Vec<String>> {
    let items = value.get(key)?.as_array()?;
    let list: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();
    if list.is_empty() {
        None
    } else {
        Some(list)
    }
}

impl CodeReading {
    /// 構造化出力から読み取る（型が合わない項目は無視）
    pub fn from_value(value: &Value) -> Self {
        Self {
            code_line: string_field(value, "code_line"),
            code: string_field(value, "code"),
            segments: string_list_field(value, "segments"),
            characters: string_list_field(value, "characters"),
        }
    }

    /// テキスト応答から読み取る
    ///
    /// JSONが含まれなければ応答全体を `code_line` として扱う
    pub fn from_text(text: &str) -> Self {
        extract_json(text)
            .ok()
            .and_then(|json| serde_json::from_str::<Value>(json).ok())
            .filter(Value::is_object)
            .map(|value| Self::from_value(&value))
            .unwrap_or_else(|| Self {
                code_line: Some(text.trim().to_string()).filter(|s| !s.is_empty()),
                ..Default::default()
            })
    }

    /// 優先順位に従ってコードを確定する
    ///
    /// 1. `segments`（4つすべて修復・検証できた場合のみ）
    /// 2. `code`
    /// 3. `characters` を連結したもの
    /// 4. `code_line`
    ///
    /// 最初に有効なコードへ正規化できた候補を採用する
    pub fn resolve(&self) -> Option<String> {
        if let Some(segments) = &self.segments {
            if segments.len() == SEGMENT_COUNT {
                let repaired = segments
                    .iter()
                    .enumerate()
                    .map(|(idx, seg)| normalize_segment(seg, idx))
                    .collect::<Option<Vec<_>>>();
                if let Some(repaired) = repaired {
                    let code = repaired.join("-");
                    if validate_format(&code) {
                        return Some(code);
                    }
                }
            }
        }

        let joined_characters = self.characters.as_ref().map(|chars| chars.concat());
        let candidates: Vec<&str> = [self.code.as_deref(), joined_characters.as_deref(), self.code_line.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        let found = candidates
            .into_iter()
            .filter_map(parse_from_free_text)
            .find(|code| validate_format(code));
        found
    }
}
