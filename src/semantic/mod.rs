//! 意味検索による照合
//!
//! エントリのコードとタイトルで検索し、返ってきたパッセージを順位順に判定する。

pub mod client;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use verifica_common::matching::{evaluate, TextForms};
use verifica_common::{Columns, Entry, MatchResult, MatchStatus};

use crate::error::Result;

pub use client::HttpRetrievalClient;

/// 検索結果の1パッセージ
pub type RetrievedDocument = Value;

/// 本文として扱うフィールド
const TEXT_FIELDS: [&str; 6] = ["text", "content", "page_content", "chunk", "snippet", "title"];

/// 出典として扱う `metadata` のフィールド
const SOURCE_FIELDS: [&str; 2] = ["file_path", "source"];

/// 検索サービス
#[async_trait]
pub trait RetrievalOracle: Send + Sync {
    async fn query(&self, text: &str, collection_id: &str, limit: usize, mode: &str) -> Result<Vec<RetrievedDocument>>;
}

fn string_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// パッセージの本文と出典を1つのテキストにまとめる
pub fn flatten_passage(passage: &RetrievedDocument) -> String {
    let metadata = passage.get("metadata");
    TEXT_FIELDS
        .iter()
        .filter_map(|key| string_at(passage, key))
        .chain(
            SOURCE_FIELDS
                .iter()
                .filter_map(|key| metadata.and_then(|m| string_at(m, key))),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

/// パッセージの出典ファイル
fn passage_source(passage: &RetrievedDocument) -> Option<String> {
    let metadata = passage.get("metadata");
    SOURCE_FIELDS
        .iter()
        .find_map(|key| metadata.and_then(|m| string_at(m, key)))
        .or_else(|| string_at(passage, "filename"))
        .map(str::to_string)
}

/// 検索クエリ（コードとタイトルのうち空でないもの）
pub fn build_query(entry: &Entry) -> String {
    [entry.code.trim(), entry.title.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 意味検索の設定
#[derive(Debug, Clone)]
pub struct SemanticOptions {
    pub limit: usize,
    pub search_mode: String,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            search_mode: "standard".into(),
        }
    }
}

/// 意味検索による照合
pub struct SemanticMatcher {
    oracle: Arc<dyn RetrievalOracle>,
    options: SemanticOptions,
}

impl SemanticMatcher {
    pub fn new(oracle: Arc<dyn RetrievalOracle>, options: SemanticOptions) -> Self {
        Self { oracle, options }
    }

    /// 1エントリを照合する
    ///
    /// 必要な項目すべてを満たすパッセージがあればそれを採用し、
    /// なければいずれかを満たす最上位のパッセージを採用する。
    ///
    /// # Returns
    /// 見つからなければ `None`。検索サービスのエラーはそのまま返す
    pub async fn match_entry(&self, entry: &Entry, columns: Columns, collection_id: &str) -> Result<Option<MatchResult>> {
        let query = build_query(entry);
        if query.is_empty() {
            return Ok(None);
        }

        let passages = self
            .oracle
            .query(&query, collection_id, self.options.limit, &self.options.search_mode)
            .await?;

        let mut first_partial: Option<MatchResult> = None;
        for (rank, passage) in passages.iter().enumerate() {
            let forms = TextForms::from_text(&flatten_passage(passage));
            let hit = evaluate(&forms, entry);
            let Some(status) = hit.status(columns) else {
                continue;
            };

            let result = MatchResult {
                code: entry.code.clone(),
                title: entry.title.clone(),
                matched_file: passage_source(passage),
                status,
                code_found: hit.code_found,
                title_found: hit.title_found,
            };

            if status == MatchStatus::Matched {
                debug!(code = %entry.code, rank, "パッセージが一致");
                return Ok(Some(result));
            }
            if first_partial.is_none() {
                first_partial = Some(result);
            }
        }

        Ok(first_partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerificaError;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedRetrieval {
        documents: Vec<RetrievedDocument>,
        queries: Mutex<Vec<(String, String, usize, String)>>,
    }

    impl FixedRetrieval {
        fn new(documents: Vec<RetrievedDocument>) -> Arc<Self> {
            Arc::new(Self { documents, queries: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl RetrievalOracle for FixedRetrieval {
        async fn query(&self, text: &str, collection_id: &str, limit: usize, mode: &str) -> Result<Vec<RetrievedDocument>> {
            self.queries
                .lock()
                .unwrap()
                .push((text.into(), collection_id.into(), limit, mode.into()));
            Ok(self.documents.clone())
        }
    }

    struct DownRetrieval;

    #[async_trait]
    impl RetrievalOracle for DownRetrieval {
        async fn query(&self, _t: &str, _c: &str, _l: usize, _m: &str) -> Result<Vec<RetrievedDocument>> {
            Err(VerificaError::Oracle("検索に失敗 (503): down".into()))
        }
    }

    fn entry() -> Entry {
        Entry {
            code: "ADRPMV02-PEDSIIE-RRC00-1".into(),
            title: "Relazione di calcolo impianti".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_flatten_passage() {
        let passage = json!({
            "text": "corpo",
            "snippet": "estratto",
            "score": 0.9,
            "metadata": {"file_path": "docs/a.pdf"}
        });
        assert_eq!(flatten_passage(&passage), "corpo\nestratto\ndocs/a.pdf");
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query(&entry()), "ADRPMV02-PEDSIIE-RRC00-1 Relazione di calcolo impianti");
        let code_only = Entry { title: String::new(), ..entry() };
        assert_eq!(build_query(&code_only), "ADRPMV02-PEDSIIE-RRC00-1");
    }

    #[tokio::test]
    async fn test_code_only_in_third_passage() {
        let oracle = FixedRetrieval::new(vec![
            json!({"text": "Capitolato speciale d'appalto"}),
            json!({"content": "Planimetria generale"}),
            json!({"page_content": "Codice ADRPMV02-PEDSIIE-RRC00-1", "metadata": {"source": "rrc.pdf"}}),
        ]);
        let matcher = SemanticMatcher::new(oracle.clone(), SemanticOptions::default());
        let result = matcher.match_entry(&entry(), Columns::default(), "c1").await.unwrap().unwrap();

        assert_eq!(result.status, MatchStatus::CodeFound);
        assert!(result.code_found);
        assert!(!result.title_found);
        assert_eq!(result.matched_file.as_deref(), Some("rrc.pdf"));

        let queries = oracle.queries.lock().unwrap();
        assert_eq!(queries[0].1, "c1");
        assert_eq!(queries[0].2, 5);
        assert_eq!(queries[0].3, "standard");
    }

    #[tokio::test]
    async fn test_full_match_wins_over_earlier_partial() {
        let oracle = FixedRetrieval::new(vec![
            json!({"text": "Relazione di calcolo impianti"}),
            json!({"chunk": "ADRPMV02 PEDSIIE RRC00 1 - Relazione  di calcolo IMPIANTI", "metadata": {"file_path": "b.pdf"}}),
        ]);
        let matcher = SemanticMatcher::new(oracle, SemanticOptions::default());
        let result = matcher.match_entry(&entry(), Columns::default(), "c1").await.unwrap().unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.matched_file.as_deref(), Some("b.pdf"));
    }

    #[tokio::test]
    async fn test_first_partial_kept() {
        let oracle = FixedRetrieval::new(vec![
            json!({"text": "Relazione di calcolo impianti", "metadata": {"source": "t.pdf"}}),
            json!({"text": "ADRPMV02-PEDSIIE-RRC00-1", "metadata": {"source": "c.pdf"}}),
        ]);
        let matcher = SemanticMatcher::new(oracle, SemanticOptions::default());
        let result = matcher.match_entry(&entry(), Columns::default(), "c1").await.unwrap().unwrap();
        assert_eq!(result.status, MatchStatus::TitleFound);
        assert_eq!(result.matched_file.as_deref(), Some("t.pdf"));
    }

    #[tokio::test]
    async fn test_code_only_column_matches() {
        let oracle = FixedRetrieval::new(vec![json!({"text": "ADRPMV02-PEDSIIE-RRC00-1"})]);
        let matcher = SemanticMatcher::new(oracle, SemanticOptions::default());
        let columns = Columns { code: true, title: false };
        let result = matcher.match_entry(&entry(), columns, "c1").await.unwrap().unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let oracle = FixedRetrieval::new(vec![json!({"text": "altro"}), json!({"score": 1})]);
        let matcher = SemanticMatcher::new(oracle, SemanticOptions::default());
        assert!(matcher.match_entry(&entry(), Columns::default(), "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oracle_error_propagates() {
        let matcher = SemanticMatcher::new(Arc::new(DownRetrieval), SemanticOptions::default());
        let result = matcher.match_entry(&entry(), Columns::default(), "c1").await;
        assert!(matches!(result, Err(VerificaError::Oracle(_))));
    }
}
