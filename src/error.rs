//! エラー型の定義

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerificaError {
    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("PDFを読み込めません ({path}): {reason}")]
    ParseFailure { path: String, reason: String },

    #[error("外部サービスエラー: {0}")]
    Oracle(String),

    #[error("画像処理エラー: {0}")]
    Image(String),

    #[error("処理が中断されました")]
    Cancelled,

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] verifica_common::Error),
}

impl VerificaError {
    pub fn parse_failure(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        VerificaError::ParseFailure {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for VerificaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VerificaError::Oracle(format!("タイムアウト: {}", e))
        } else {
            VerificaError::Oracle(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, VerificaError>;
