//! 検索サービスへのHTTPクライアント

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{RetrievalOracle, RetrievedDocument};
use crate::config::RetrievalConfig;
use crate::error::{Result, VerificaError};

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    collection_name: &'a str,
    search_mode: &'a str,
    pipeline_version: &'a str,
    limit: usize,
}

/// 応答から `documents` を取り出す（リストでなければ空）
fn documents_from_response(body: Value) -> Vec<RetrievedDocument> {
    match body {
        Value::Object(mut map) => match map.remove("documents") {
            Some(Value::Array(docs)) => docs,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// HTTP経由の検索クライアント
pub struct HttpRetrievalClient {
    http: reqwest::Client,
    url: String,
    pipeline_version: String,
}

impl HttpRetrievalClient {
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| VerificaError::Configuration(format!("HTTPクライアント生成エラー: {}", e)))?;
        Ok(Self {
            http,
            url: config.url(),
            pipeline_version: config.pipeline_version.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RetrievalOracle for HttpRetrievalClient {
    async fn query(&self, text: &str, collection_id: &str, limit: usize, mode: &str) -> Result<Vec<RetrievedDocument>> {
        let request = QueryRequest {
            query: text,
            collection_name: collection_id,
            search_mode: mode,
            pipeline_version: &self.pipeline_version,
            limit,
        };

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(VerificaError::Oracle(format!("検索に失敗 ({}): {}", status.as_u16(), body)));
        }

        let body: Value = response.json().await?;
        let documents = documents_from_response(body);
        debug!(url = %self.url, collection = collection_id, hits = documents.len(), "検索結果を受信");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_payload() {
        let request = QueryRequest {
            query: "ADRPMV02-PEDSIIE-RRC00-1 Relazione",
            collection_name: "commessa-42",
            search_mode: "standard",
            pipeline_version: "v2",
            limit: 5,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "query": "ADRPMV02-PEDSIIE-RRC00-1 Relazione",
                "collection_name": "commessa-42",
                "search_mode": "standard",
                "pipeline_version": "v2",
                "limit": 5
            })
        );
    }

    #[test]
    fn test_documents_must_be_a_list() {
        assert_eq!(documents_from_response(json!({"documents": [{"text": "a"}]})).len(), 1);
        assert!(documents_from_response(json!({"documents": {"text": "a"}})).is_empty());
        assert!(documents_from_response(json!({"documents": null})).is_empty());
        assert!(documents_from_response(json!({})).is_empty());
        assert!(documents_from_response(json!([1, 2])).is_empty());
    }

    #[test]
    fn test_url_from_config() {
        let config = RetrievalConfig {
            endpoint: Some("http://rag:9000/search".into()),
            ..Default::default()
        };
        assert_eq!(HttpRetrievalClient::new(&config).unwrap().url(), "http://rag:9000/search");
    }
}
