//! 設定ファイルの読み書き
//!
//! `~/.config/verifica-codici/config.json` に保存し、環境変数で上書きする。

use crate::error::{Result, VerificaError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 切り出し範囲（PDFポイント、左上原点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Default for CropBox {
    fn default() -> Self {
        // 表題欄のコード行
        Self { x0: 28.32, y0: 591.36, x1: 516.96, y1: 625.44 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub dpi: u32,
    pub crop_box: CropBox,
    /// これより低い画像は先に拡大する
    pub min_height: u32,
    /// 長辺の上限
    pub max_dimension: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".into(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_seconds: 120,
            dpi: 300,
            crop_box: CropBox::default(),
            min_height: 600,
            max_dimension: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// 設定されていれば host + path より優先
    pub endpoint: Option<String>,
    pub host: String,
    pub path: String,
    pub timeout_seconds: u64,
    pub limit: usize,
    pub search_mode: String,
    pub pipeline_version: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            host: "http://host.docker.internal:8090".into(),
            path: "/query".into(),
            timeout_seconds: 60,
            limit: 5,
            search_mode: "standard".into(),
            pipeline_version: "v2".into(),
        }
    }
}

impl RetrievalConfig {
    /// 問い合わせ先URL
    pub fn url(&self) -> String {
        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            return endpoint.trim().to_string();
        }
        let host = self.host.trim_end_matches('/');
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}{}", host, path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub workers: usize,
    pub max_pages: usize,
    pub progress_every: usize,
    /// フォルダモードの同時API呼び出し数
    pub concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_pages: 5,
            progress_every: 10,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub vision: VisionConfig,
    pub retrieval: RetrievalConfig,
    pub scan: ScanConfig,
}

impl Config {
    /// 設定ファイルを読み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| VerificaError::Configuration("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("verifica-codici").join("config.json"))
    }

    /// 環境変数で上書き（環境変数を優先）
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.vision.api_key = Some(key);
        }
        if let Some(endpoint) = get("RAG_ENDPOINT") {
            self.retrieval.endpoint = Some(endpoint);
        }
        if let Some(host) = get("QUERY_HOST").or_else(|| get("RAG_QUERY_HOST")) {
            self.retrieval.host = host;
        }
        if let Some(path) = get("QUERY_ENDPOINT").or_else(|| get("RAG_QUERY_ENDPOINT")) {
            self.retrieval.path = path;
        }
        if let Some(timeout) = get("RAG_QUERY_TIMEOUT").and_then(|v| v.parse::<f64>().ok()) {
            if timeout > 0.0 {
                self.retrieval.timeout_seconds = timeout.ceil() as u64;
            }
        }
    }

    pub fn get_api_key(&self) -> Result<String> {
        self.vision
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                VerificaError::Configuration(
                    "APIキーが設定されていません。`verifica config --set-api-key YOUR_KEY` か GEMINI_API_KEY で設定してください".into(),
                )
            })
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.vision.api_key = Some(key);
        self.save()
    }
}
