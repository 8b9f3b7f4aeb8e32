use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use verifica_codici::cli::{Cli, Commands};
use verifica_codici::config::Config;
use verifica_codici::master_list::MasterListExtractor;
use verifica_codici::progress::BarProgress;
use verifica_codici::{export, FolderRequest, Orchestrator, VerifyRequest};
use verifica_common::{Columns, Report, Strategy};

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn default_report_path(extension: &str) -> PathBuf {
    PathBuf::from(format!(
        "verifica_{}.{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        extension
    ))
}

fn print_summary(report: &Report) {
    let s = &report.summary;
    println!("結果:");
    println!("  目録エントリ: {}", s.total_expected);
    println!("  対象文書: {}", s.total_documents);
    println!("  一致: {}", s.matched);
    if s.partial + s.code_found + s.title_found > 0 {
        println!(
            "  一部一致: {} (別文書 {}, コードのみ {}, タイトルのみ {})",
            s.partial + s.code_found + s.title_found,
            s.partial,
            s.code_found,
            s.title_found
        );
    }
    println!("  見つからない: {}", s.missing);
    if s.unexpected > 0 {
        println!("  目録にない文書: {}", s.unexpected);
    }
    if s.extraction_failures > 0 {
        println!("  読み取り失敗: {}", s.extraction_failures);
    }
    if s.errors > 0 {
        println!("  エラー: {}", s.errors);
    }
}

fn save_report(report: &Report, output: Option<PathBuf>, xlsx: Option<PathBuf>) -> Result<()> {
    let json_path = export::output_path_for(
        &output.unwrap_or_else(|| default_report_path("json")),
        "report.json",
    );
    export::write_report_json(report, &json_path)?;
    println!("✔ JSON出力: {}", json_path.display());

    if let Some(xlsx) = xlsx {
        let xlsx_path = export::output_path_for(&xlsx, "report.xlsx");
        export::write_report_xlsx(report, &xlsx_path)?;
        println!("✔ Excel出力: {}", xlsx_path.display());
    }
    Ok(())
}

/// Ctrl-C で処理単位の境界から中断する
fn watch_ctrl_c(orchestrator: &Orchestrator) {
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n中断しています...");
            cancel.cancel();
        }
    });
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::List { index, commessa, output } => {
            println!("📄 verifica-codici - 目録抽出\n");

            println!("[1/1] 目録を読み込み中...");
            let extractor = MasterListExtractor::default().with_commessa(commessa);
            let path = index.clone();
            let entries = tokio::task::spawn_blocking(move || extractor.extract(&path))
                .await
                .context("目録抽出タスクが異常終了しました")??;
            println!("✔ {}件のエントリを検出\n", entries.len());

            match output {
                Some(output) => {
                    let path = export::output_path_for(&output, "elenco.json");
                    export::write_entries_json(&entries, &path)?;
                    println!("✔ 結果を保存: {}", path.display());
                }
                None => {
                    for entry in &entries {
                        println!("{}\t{}", entry.code, entry.title);
                    }
                }
            }
        }

        Commands::Verify {
            index,
            folder,
            strategy,
            collection_id,
            columns,
            recursive,
            exclude,
            max_pages,
            commessa,
            output,
            xlsx,
        } => {
            println!("🔎 verifica-codici - エントリ照合\n");

            let strategy: Strategy = strategy.parse()?;
            let columns = Columns::from_names(columns.as_slice())?;

            let progress = Arc::new(BarProgress::default());
            let orchestrator = Orchestrator::from_config(&config, strategy, commessa)?.with_progress(progress.clone());
            watch_ctrl_c(&orchestrator);

            println!("[1/2] 照合中... (戦略: {})", strategy);
            let report = orchestrator
                .run_entry_mode(&VerifyRequest {
                    index,
                    folder,
                    strategy,
                    columns,
                    recursive,
                    excluded_files: exclude,
                    collection_id,
                    max_pages,
                })
                .await;
            progress.finish();
            let report = report?;
            println!("✔ 照合完了\n");

            print_summary(&report);

            println!("\n[2/2] 結果を保存中...");
            save_report(&report, output, xlsx)?;
            println!("\n✅ 完了");
        }

        Commands::Folder {
            index,
            folder,
            recursive,
            exclude,
            commessa,
            output,
            xlsx,
        } => {
            println!("🖼  verifica-codici - フォルダ照合\n");

            let progress = Arc::new(BarProgress::default());
            let orchestrator =
                Orchestrator::from_config(&config, Strategy::Vision, commessa)?.with_progress(progress.clone());
            watch_ctrl_c(&orchestrator);

            println!("[1/2] 表題欄を読み取り中...");
            let report = orchestrator
                .run_folder_mode(&FolderRequest {
                    index,
                    folder,
                    recursive,
                    excluded_files: exclude,
                })
                .await;
            progress.finish();
            let report = report?;
            println!("✔ 読み取り完了\n");

            print_summary(&report);

            println!("\n[2/2] 結果を保存中...");
            save_report(&report, output, xlsx)?;
            println!("\n✅ 完了");
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!("  モデル: {}", config.vision.model);
                println!("  DPI: {}", config.vision.dpi);
                println!("  APIキー: {}", if config.vision.api_key.is_some() { "設定済み" } else { "未設定" });
                println!("  検索URL: {}", config.retrieval.url());
                println!("  検索タイムアウト: {}秒", config.retrieval.timeout_seconds);
                println!("  ワーカー数: {}", config.scan.workers);
                println!("  読み込みページ数: {}", config.scan.max_pages);
            }
        }
    }

    Ok(())
}
