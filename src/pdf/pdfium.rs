//! PDFiumライブラリの読み込み
//!
//! `Pdfium` は `Send` ではないため、呼び出しごとに読み込む。
//! 2回目以降はOSのライブラリキャッシュが効く。

use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::{Result, VerificaError};

/// 読み込み順序:
/// 1. 環境変数 `PDFIUM_DYNAMIC_LIB_PATH`
/// 2. 実行ファイルと同じディレクトリ
/// 3. システムのライブラリ検索パス
pub(crate) fn load_pdfium() -> Result<Pdfium> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "PDFiumを環境変数のパスから読み込み");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            VerificaError::Configuration(format!("PDFiumを読み込めません ({}): {}", path, e))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.to_path_buf())) {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %exe_dir.display(), "PDFiumを実行ファイルの隣から読み込み");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        VerificaError::Configuration(format!(
            "PDFiumが見つかりません。PDFIUM_DYNAMIC_LIB_PATH を設定してください: {}",
            e
        ))
    })?;
    Ok(Pdfium::new(bindings))
}
