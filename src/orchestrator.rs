//! 照合処理の全体制御
//!
//! 目録の抽出 → 戦略ごとの照合 → レポート生成までを1回の実行として扱う。
//! 外部サービスやPDFの読み込み口はすべてこの型が `Arc` で所有する。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use verifica_common::matching::{match_by_extracted_codes, match_in_documents};
use verifica_common::{
    build_entry_report, reconcile_folder, Columns, EffectiveConfig, Entry, Report, Resolution, RunError, Strategy,
};

use crate::config::{Config, ScanConfig};
use crate::error::{Result, VerificaError};
use crate::master_list::MasterListExtractor;
use crate::pdf::PdfiumRenderer;
use crate::progress::{report_progress, CancelFlag, NoProgress, ProgressSink};
use crate::scanner::{list_pdfs, PdfFile, ScanOptions, TextCorpusScanner};
use crate::semantic::{HttpRetrievalClient, SemanticMatcher, SemanticOptions};
use crate::vision::{GeminiVisionClient, VisionOptions, VisualCodeExtractor};

/// エントリモードの実行内容
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub index: PathBuf,
    /// 意味検索では不要
    pub folder: Option<PathBuf>,
    pub strategy: Strategy,
    pub columns: Columns,
    pub recursive: bool,
    pub excluded_files: Vec<String>,
    pub collection_id: Option<String>,
    /// 省略時は設定値
    pub max_pages: Option<usize>,
}

/// フォルダモードの実行内容
#[derive(Debug, Clone)]
pub struct FolderRequest {
    pub index: PathBuf,
    pub folder: PathBuf,
    pub recursive: bool,
    pub excluded_files: Vec<String>,
}

pub struct Orchestrator {
    master_list: Arc<MasterListExtractor>,
    scanner: Arc<TextCorpusScanner>,
    vision: Option<Arc<VisualCodeExtractor>>,
    semantic: Option<Arc<SemanticMatcher>>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelFlag,
    settings: ScanConfig,
}

impl Orchestrator {
    pub fn new(master_list: Arc<MasterListExtractor>, scanner: Arc<TextCorpusScanner>) -> Self {
        Self {
            master_list,
            scanner,
            vision: None,
            semantic: None,
            progress: Arc::new(NoProgress),
            cancel: CancelFlag::new(),
            settings: ScanConfig::default(),
        }
    }

    /// 設定から既定の読み込み口を組み立てる
    ///
    /// 戦略に必要な設定（APIキーなど）が欠けていればここで `Configuration` を返す
    pub fn from_config(config: &Config, strategy: Strategy, commessa: Option<String>) -> Result<Self> {
        let master_list = Arc::new(MasterListExtractor::default().with_commessa(commessa));
        let mut orchestrator =
            Self::new(master_list, Arc::new(TextCorpusScanner::default())).with_settings(config.scan.clone());

        match strategy {
            Strategy::Text => {}
            Strategy::Vision => {
                let api_key = config.get_api_key()?;
                let renderer = Arc::new(PdfiumRenderer::new()?);
                let client = Arc::new(GeminiVisionClient::new(api_key, &config.vision)?);
                orchestrator = orchestrator.with_vision(Arc::new(VisualCodeExtractor::new(
                    renderer,
                    client,
                    VisionOptions::from(&config.vision),
                )));
            }
            Strategy::Semantic => {
                let client = Arc::new(HttpRetrievalClient::new(&config.retrieval)?);
                orchestrator = orchestrator.with_semantic(Arc::new(SemanticMatcher::new(
                    client,
                    SemanticOptions {
                        limit: config.retrieval.limit,
                        search_mode: config.retrieval.search_mode.clone(),
                    },
                )));
            }
        }

        Ok(orchestrator)
    }

    pub fn with_vision(mut self, vision: Arc<VisualCodeExtractor>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_semantic(mut self, semantic: Arc<SemanticMatcher>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_settings(mut self, settings: ScanConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(VerificaError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 目録を読む（PDFの処理はブロッキングスレッドで行う）
    pub async fn load_entries(&self, index: &Path) -> Result<Vec<Entry>> {
        let extractor = Arc::clone(&self.master_list);
        let path = index.to_path_buf();
        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| VerificaError::parse_failure(index, format!("抽出タスク失敗: {}", e)))?
    }

    fn require_vision(&self) -> Result<&VisualCodeExtractor> {
        self.vision.as_deref().ok_or_else(|| {
            VerificaError::Configuration("画像読み取りが設定されていません（APIキーを確認してください）".into())
        })
    }

    /// エントリモード
    ///
    /// 目録の各エントリを指定の戦略で探し、見つかった/一部見つかった/見つからないに分類する
    pub async fn run_entry_mode(&self, request: &VerifyRequest) -> Result<Report> {
        // 設定の不足は作業開始前に返す
        let collection_id = match request.strategy {
            Strategy::Semantic => {
                let id = request
                    .collection_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| VerificaError::Configuration("意味検索にはコレクションIDが必要です".into()))?;
                if self.semantic.is_none() {
                    return Err(VerificaError::Configuration("検索サービスが設定されていません".into()));
                }
                Some(id.to_string())
            }
            Strategy::Vision => {
                self.require_vision()?;
                None
            }
            Strategy::Text => None,
        };
        let folder = match (request.strategy, &request.folder) {
            (Strategy::Semantic, folder) => folder.clone(),
            (_, Some(folder)) => Some(folder.clone()),
            (_, None) => {
                return Err(VerificaError::Configuration("成果品フォルダが指定されていません".into()));
            }
        };
        if let Some(folder) = &folder {
            if !folder.is_dir() {
                return Err(VerificaError::FolderNotFound(folder.display().to_string()));
            }
        }

        let max_pages = request.max_pages.unwrap_or(self.settings.max_pages).max(1);
        let config = EffectiveConfig {
            strategy: request.strategy.as_str().to_string(),
            columns: request.columns.names(),
            recursive: request.recursive,
            excluded_files: request.excluded_files.clone(),
            collection_id: collection_id.clone(),
            max_pages: (request.strategy == Strategy::Text).then_some(max_pages),
            index_file: Some(request.index.display().to_string()),
        };

        let entries = self.load_entries(&request.index).await?;
        info!(entries = entries.len(), strategy = %request.strategy, "照合を開始");
        self.check_cancelled()?;

        match (request.strategy, folder) {
            (Strategy::Text, Some(folder)) => self.entries_by_text(entries, &folder, request, max_pages, config).await,
            (Strategy::Vision, Some(folder)) => self.entries_by_vision(entries, &folder, request, config).await,
            (Strategy::Semantic, folder) => {
                let total_documents = match folder {
                    Some(folder) => list_pdfs(&folder, request.recursive, &request.excluded_files)?.len(),
                    None => 0,
                };
                let id = collection_id.unwrap_or_default();
                self.entries_by_semantic(entries, request.columns, &id, total_documents, config)
                    .await
            }
            (_, None) => Err(VerificaError::Configuration("成果品フォルダが指定されていません".into())),
        }
    }

    async fn entries_by_text(
        &self,
        entries: Vec<Entry>,
        folder: &Path,
        request: &VerifyRequest,
        max_pages: usize,
        config: EffectiveConfig,
    ) -> Result<Report> {
        let scanner = Arc::clone(&self.scanner);
        let cancel = self.cancel.clone();
        let owned_folder = folder.to_path_buf();
        let options = ScanOptions {
            max_pages,
            excluded_files: request.excluded_files.clone(),
            recursive: request.recursive,
            workers: self.settings.workers,
            progress_every: self.settings.progress_every,
        };

        let outcome = tokio::task::spawn_blocking(move || scanner.scan(&owned_folder, &options, &cancel))
            .await
            .map_err(|e| VerificaError::Configuration(format!("読み込みタスク失敗: {}", e)))??;

        let total = entries.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, entry) in entries.into_iter().enumerate() {
            self.check_cancelled()?;
            let resolution = match match_in_documents(&entry, &outcome.documents, request.columns) {
                Some(result) => Resolution::Found(result),
                None => Resolution::NotFound,
            };
            report_progress(self.progress.as_ref(), i + 1, total, &entry.code);
            outcomes.push((entry, resolution));
        }

        Ok(build_entry_report(
            outcomes,
            outcome.documents.len() + outcome.errors.len(),
            Vec::new(),
            outcome.errors,
            config,
        ))
    }

    async fn entries_by_vision(
        &self,
        entries: Vec<Entry>,
        folder: &Path,
        request: &VerifyRequest,
        config: EffectiveConfig,
    ) -> Result<Report> {
        let extractor = self.require_vision()?;
        let files = list_pdfs(folder, request.recursive, &request.excluded_files)?;
        let (extracted, errors) = self.extract_codes(extractor, &files).await?;

        let outcomes = entries
            .into_iter()
            .map(|entry| {
                let resolution = match match_by_extracted_codes(&entry, &extracted, request.columns) {
                    Some(result) => Resolution::Found(result),
                    None => Resolution::NotFound,
                };
                (entry, resolution)
            })
            .collect();

        let extraction_failures = extracted
            .iter()
            .filter(|(_, code)| code.is_none())
            .map(|(file, _)| file.clone())
            .collect();

        Ok(build_entry_report(outcomes, files.len(), extraction_failures, errors, config))
    }

    async fn entries_by_semantic(
        &self,
        entries: Vec<Entry>,
        columns: Columns,
        collection_id: &str,
        total_documents: usize,
        config: EffectiveConfig,
    ) -> Result<Report> {
        let matcher = self
            .semantic
            .as_deref()
            .ok_or_else(|| VerificaError::Configuration("検索サービスが設定されていません".into()))?;

        let total = entries.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, entry) in entries.into_iter().enumerate() {
            self.check_cancelled()?;
            let resolution = match matcher.match_entry(&entry, columns, collection_id).await {
                Ok(Some(result)) => Resolution::Found(result),
                Ok(None) => Resolution::NotFound,
                Err(e) => {
                    warn!(code = %entry.code, error = %e, "検索に失敗");
                    Resolution::Failed(e.to_string())
                }
            };
            report_progress(self.progress.as_ref(), i + 1, total, &entry.code);
            outcomes.push((entry, resolution));
        }

        Ok(build_entry_report(outcomes, total_documents, Vec::new(), Vec::new(), config))
    }

    /// 文書ごとにコードを読み取る
    ///
    /// 読み取りの失敗は文書単位のエラーとして記録し、その文書は `None` にする
    async fn extract_codes(
        &self,
        extractor: &VisualCodeExtractor,
        files: &[PdfFile],
    ) -> Result<(BTreeMap<String, Option<String>>, Vec<RunError>)> {
        let total = files.len();
        let cancel = &self.cancel;

        let mut results = stream::iter(files.iter().map(|file| async move {
            if cancel.is_cancelled() {
                return None;
            }
            Some((file, extractor.extract(&file.path).await))
        }))
        .buffer_unordered(self.settings.concurrency.max(1));

        let mut extracted = BTreeMap::new();
        let mut errors = Vec::new();
        let mut done = 0;
        while let Some(item) = results.next().await {
            let Some((file, result)) = item else {
                continue;
            };
            done += 1;
            let code = match result {
                Ok(Some(code)) => Some(code),
                Ok(None) => {
                    warn!(file = %file.relative_path, "コードを読み取れません");
                    None
                }
                Err(e) => {
                    warn!(file = %file.relative_path, error = %e, "読み取りに失敗");
                    errors.push(RunError {
                        target: file.relative_path.clone(),
                        message: e.to_string(),
                    });
                    None
                }
            };
            extracted.insert(file.relative_path.clone(), code);
            report_progress(self.progress.as_ref(), done, total, &file.file_name);
        }

        self.check_cancelled()?;
        errors.sort_by(|a, b| a.target.cmp(&b.target));
        Ok((extracted, errors))
    }

    /// フォルダモード
    ///
    /// 文書ごとに画像からコードを読み取り、目録のコード集合と突き合わせる
    pub async fn run_folder_mode(&self, request: &FolderRequest) -> Result<Report> {
        let extractor = self.require_vision()?;
        let files = list_pdfs(&request.folder, request.recursive, &request.excluded_files)?;

        let entries = self.load_entries(&request.index).await?;
        info!(entries = entries.len(), documents = files.len(), "フォルダ照合を開始");
        self.check_cancelled()?;

        let (extracted, errors) = self.extract_codes(extractor, &files).await?;

        let config = EffectiveConfig {
            strategy: Strategy::Vision.as_str().to_string(),
            columns: Columns { code: true, title: false }.names(),
            recursive: request.recursive,
            excluded_files: request.excluded_files.clone(),
            collection_id: None,
            max_pages: None,
            index_file: Some(request.index.display().to_string()),
        };

        Ok(reconcile_folder(&entries, &extracted, errors, config))
    }
}
