//! 成果品フォルダの走査と全文読み込み
//!
//! 各ワーカーが1文書を最後まで担当し、失敗はその文書だけのエラーとして記録する。
//! 結果は全件終わってからファイル名順に並べる。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use verifica_common::{RunError, ScannedDocument};
use walkdir::WalkDir;

use crate::error::{Result, VerificaError};
use crate::pdf::{LopdfText, PdfExtractText, TextBackend};
use crate::progress::CancelFlag;

/// 走査対象のPDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFile {
    pub path: PathBuf,
    /// フォルダからの相対パス（区切りは `/`）
    pub relative_path: String,
    pub file_name: String,
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn is_excluded(file: &PdfFile, excluded: &[String]) -> bool {
    excluded.iter().any(|pattern| {
        let pattern = pattern.trim().replace('\\', "/");
        !pattern.is_empty()
            && (pattern.eq_ignore_ascii_case(&file.relative_path)
                || pattern.eq_ignore_ascii_case(&file.file_name))
    })
}

/// フォルダ内のPDFを列挙
///
/// # Arguments
/// * `folder` - 成果品フォルダ
/// * `recursive` - サブフォルダも含めるか（falseなら直下のみ）
/// * `excluded_files` - 除外するファイル名または相対パス（大文字小文字を区別しない）
///
/// # Returns
/// ファイル名順（同名は相対パス順）のPDF一覧
pub fn list_pdfs(folder: &Path, recursive: bool, excluded_files: &[String]) -> Result<Vec<PdfFile>> {
    if !folder.is_dir() {
        return Err(VerificaError::FolderNotFound(folder.display().to_string()));
    }

    let walker = if recursive {
        WalkDir::new(folder)
    } else {
        WalkDir::new(folder).max_depth(1)
    };

    let mut files: Vec<PdfFile> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| {
            let path = e.path().to_path_buf();
            let relative_path = path
                .strip_prefix(folder)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            PdfFile { path, relative_path, file_name }
        })
        .filter(|file| !is_excluded(file, excluded_files))
        .collect();

    files.sort_by(|a, b| {
        a.file_name
            .cmp(&b.file_name)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });

    Ok(files)
}

/// 走査の設定
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 1文書あたりの読み込みページ数の上限
    pub max_pages: usize,
    pub excluded_files: Vec<String>,
    pub recursive: bool,
    pub workers: usize,
    /// この件数ごとに進捗をログに出す
    pub progress_every: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_pages: 5,
            excluded_files: Vec::new(),
            recursive: false,
            workers: 4,
            progress_every: 10,
        }
    }
}

/// 走査結果
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub documents: Vec<ScannedDocument>,
    pub errors: Vec<RunError>,
}

/// 成果品フォルダの全文スキャナー
pub struct TextCorpusScanner {
    fast: Arc<dyn TextBackend>,
    slow: Option<Arc<dyn TextBackend>>,
}

impl Default for TextCorpusScanner {
    fn default() -> Self {
        Self::new(Arc::new(LopdfText), Some(Arc::new(PdfExtractText)))
    }
}

impl TextCorpusScanner {
    pub fn new(fast: Arc<dyn TextBackend>, slow: Option<Arc<dyn TextBackend>>) -> Self {
        Self { fast, slow }
    }

    /// 1文書を読む（速い方式で本文が取れなければ遅い方式）
    fn read_document(&self, file: &PdfFile, max_pages: usize) -> Result<ScannedDocument> {
        let fast = self.fast.page_texts(&file.path, max_pages);

        let has_text = matches!(&fast, Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()));
        let slow = match &self.slow {
            Some(slow) if !has_text => slow,
            _ => {
                let pages = fast?;
                return Ok(ScannedDocument::from_pages(&file.file_name, &file.relative_path, &pages));
            }
        };

        if let Err(e) = &fast {
            debug!(file = %file.relative_path, error = %e, backend = self.fast.name(), "速い方式で読めません");
        }

        match (slow.page_texts(&file.path, max_pages), fast) {
            (Ok(pages), _) => Ok(ScannedDocument::from_pages(&file.file_name, &file.relative_path, &pages)),
            // 本文のないPDF（スキャン画像など）は空の文書として扱う
            (Err(_), Ok(empty)) => Ok(ScannedDocument::from_pages(&file.file_name, &file.relative_path, &empty)),
            (Err(e), Err(_)) => Err(e),
        }
    }

    /// フォルダを走査して全文を読み込む
    ///
    /// 文書単位の失敗は `errors` に記録し、走査は続ける。
    /// フォルダがなければ `FolderNotFound`、中断されれば `Cancelled`。
    pub fn scan(&self, folder: &Path, options: &ScanOptions, cancel: &CancelFlag) -> Result<ScanOutcome> {
        let files = list_pdfs(folder, options.recursive, &options.excluded_files)?;
        let total = files.len();
        info!(folder = %folder.display(), total, "PDFを読み込み中");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .build()
            .map_err(|e| VerificaError::Configuration(format!("ワーカー生成エラー: {}", e)))?;

        let done = AtomicUsize::new(0);
        let every = options.progress_every.max(1);

        let results: Vec<Option<std::result::Result<ScannedDocument, RunError>>> = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let result = self.read_document(file, options.max_pages).map_err(|e| {
                        warn!(file = %file.relative_path, error = %e, "文書を読めません");
                        RunError {
                            target: file.relative_path.clone(),
                            message: e.to_string(),
                        }
                    });
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if n % every == 0 || n == total {
                        info!("{}/{} 文書を読み込み", n, total);
                    }
                    Some(result)
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(VerificaError::Cancelled);
        }

        let mut outcome = ScanOutcome::default();
        for result in results.into_iter().flatten() {
            match result {
                Ok(doc) => outcome.documents.push(doc),
                Err(e) => outcome.errors.push(e),
            }
        }
        outcome.documents.sort_by(|a, b| {
            a.filename
                .cmp(&b.filename)
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        outcome.errors.sort_by(|a, b| a.target.cmp(&b.target));

        info!(documents = outcome.documents.len(), errors = outcome.errors.len(), "読み込み完了");
        Ok(outcome)
    }
}
