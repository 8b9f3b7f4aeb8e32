//! Gemini API連携（画像からのコード読み取り）

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use verifica_common::extract_json;

use super::{VisionOracle, VisionReply};
use crate::config::VisionConfig;
use crate::error::{Result, VerificaError};
use crate::vision::preprocess::EncodedImage;

/// Gemini APIリクエスト
#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'a str,
    #[serde(rename = "responseSchema")]
    response_schema: &'a Value,
}

/// Gemini APIレスポンス
#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// 応答本文を構造化出力として読めればそれを、読めなければテキストとして返す
fn reply_from_text(text: String) -> VisionReply {
    match extract_json(&text)
        .ok()
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
    {
        Some(value) if value.is_object() => VisionReply::Structured(value),
        _ => VisionReply::Text(text),
    }
}

/// Gemini `generateContent` クライアント
pub struct GeminiVisionClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiVisionClient {
    pub fn new(api_key: String, config: &VisionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| VerificaError::Configuration(format!("HTTPクライアント生成エラー: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl VisionOracle for GeminiVisionClient {
    async fn generate(&self, prompt: &str, image: &EncodedImage, schema: &Value) -> Result<VisionReply> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let response = self
            .http
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VerificaError::Oracle(format!("Gemini API error {}: {}", status, body)));
        }

        let response: GeminiResponse = response.json().await?;
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| VerificaError::Oracle("Gemini API: 空の応答".into()))?;

        debug!(model = %self.model, len = text.len(), "Gemini応答を受信");
        Ok(reply_from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let schema = json!({"type": "OBJECT"});
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "leggi" },
                    Part::InlineData {
                        inline_data: InlineData { mime_type: "image/png", data: "AAAA" },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json",
                response_schema: &schema,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "leggi");
        assert_eq!(value["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_response_deserialization() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"code\":\"ADRPMV02-PEDSIIE-RRC00-1\"}"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let text = response.candidates[0].content.parts[0].text.clone();
        match reply_from_text(text) {
            VisionReply::Structured(v) => assert_eq!(v["code"], "ADRPMV02-PEDSIIE-RRC00-1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_reply() {
        assert!(matches!(
            reply_from_text("ADRPMV02-PEDSIIE-RRC00-1".into()),
            VisionReply::Text(_)
        ));
    }

    #[test]
    fn test_url() {
        let client = GeminiVisionClient::new("k".into(), &VisionConfig::default()).unwrap();
        assert_eq!(
            client.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
