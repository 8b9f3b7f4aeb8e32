//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use std::path::Path;
use tempfile::tempdir;
use verifica_codici::config::Config;
use verifica_codici::error::VerificaError;
use verifica_codici::master_list::MasterListExtractor;
use verifica_codici::scanner;

/// 存在しないフォルダを列挙した場合
#[test]
fn test_list_nonexistent_folder() {
    let result = scanner::list_pdfs(Path::new("/nonexistent/path/12345"), false, &[]);
    assert!(result.is_err());

    let err = result.unwrap_err();
    assert!(matches!(err, VerificaError::FolderNotFound(_)));
}

/// 空のフォルダを列挙した場合
#[test]
fn test_list_empty_folder() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = scanner::list_pdfs(dir.path(), true, &[]);

    // 空フォルダはエラーではなく空のVecを返す
    assert!(result.is_ok());
    assert!(result.unwrap().is_empty());
}

/// PDFのないフォルダを列挙した場合
#[test]
fn test_list_folder_no_pdfs() {
    let dir = tempdir().expect("Failed to create temp dir");

    std::fs::write(dir.path().join("test.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("data.json"), "{}").unwrap();

    let result = scanner::list_pdfs(dir.path(), false, &[]);
    assert!(result.is_ok());
    assert!(result.unwrap().is_empty());
}

/// 目録ファイルがない場合
#[test]
fn test_missing_index_is_parse_failure() {
    let err = MasterListExtractor::default()
        .extract(Path::new("/nonexistent/elenco.pdf"))
        .unwrap_err();
    assert!(matches!(err, VerificaError::ParseFailure { .. }));
    assert!(format!("{}", err).contains("elenco.pdf"));
}

/// VerificaErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        VerificaError::Configuration("テスト設定エラー".to_string()),
        VerificaError::FileNotFound("elenco.pdf".to_string()),
        VerificaError::FolderNotFound("/path/to/folder".to_string()),
        VerificaError::ParseFailure {
            path: "a.pdf".to_string(),
            reason: "壊れています".to_string(),
        },
        VerificaError::Oracle("検索に失敗 (503)".to_string()),
        VerificaError::Image("PNGエンコード失敗".to_string()),
        VerificaError::Cancelled,
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// APIキー未設定のメッセージ確認
#[test]
fn test_missing_api_key_message() {
    let err = Config::default().get_api_key().unwrap_err();
    let display = format!("{}", err);

    assert!(matches!(err, VerificaError::Configuration(_)));
    assert!(display.contains("APIキー"));
    assert!(display.contains("verifica config"));
}

/// エラーのDebug実装確認
#[test]
fn test_error_debug() {
    let err = VerificaError::Configuration("テスト".to_string());
    let debug = format!("{:?}", err);

    assert!(debug.contains("Configuration"));
    assert!(debug.contains("テスト"));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: VerificaError = io_err.into();

    assert!(matches!(err, VerificaError::Io(_)));
    let display = format!("{}", err);
    assert!(display.contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: VerificaError = json_err.into();

    assert!(matches!(err, VerificaError::Json(_)));
}

/// common::Errorからの変換（透過的エラー）
#[test]
fn test_common_error_transparent() {
    let common_err = verifica_common::Error::Config("設定エラー".to_string());
    let err: VerificaError = common_err.into();

    assert!(matches!(err, VerificaError::Common(_)));
    assert_eq!(format!("{}", err), "Config error: 設定エラー");
}
