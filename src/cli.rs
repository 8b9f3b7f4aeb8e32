use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "verifica")]
#[command(about = "Elenco Documenti と成果品フォルダの文書コード照合ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 目録PDFからエントリを抽出
    List {
        /// 目録PDF（Elenco Documenti）
        #[arg(required = true)]
        index: PathBuf,

        /// コミッサ（コード先頭）で絞り込み
        #[arg(long)]
        commessa: Option<String>,

        /// 出力JSONファイル（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 目録の各エントリを成果品から探す
    Verify {
        /// 目録PDF（Elenco Documenti）
        #[arg(required = true)]
        index: PathBuf,

        /// 成果品フォルダ（semantic では省略可）
        folder: Option<PathBuf>,

        /// 照合戦略 (text/vision/semantic)
        #[arg(short, long, default_value = "text")]
        strategy: String,

        /// 検索コレクションID（semantic で必須）
        #[arg(long)]
        collection_id: Option<String>,

        /// 照合に使う列（カンマ区切り: code,title）
        #[arg(long, value_delimiter = ',', default_value = "code,title")]
        columns: Vec<String>,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// 除外するファイル名または相対パス
        #[arg(long)]
        exclude: Vec<String>,

        /// 1文書あたりの読み込みページ数
        #[arg(long)]
        max_pages: Option<usize>,

        /// コミッサ（コード先頭）で絞り込み
        #[arg(long)]
        commessa: Option<String>,

        /// 出力JSONファイル
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力Excelファイル
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },

    /// 成果品ごとに表題欄のコードを読み取り、目録と突き合わせる
    Folder {
        /// 目録PDF（Elenco Documenti）
        #[arg(required = true)]
        index: PathBuf,

        /// 成果品フォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// 除外するファイル名または相対パス
        #[arg(long)]
        exclude: Vec<String>,

        /// コミッサ（コード先頭）で絞り込み
        #[arg(long)]
        commessa: Option<String>,

        /// 出力JSONファイル
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力Excelファイル
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },

    /// 設定を管理
    Config {
        /// Gemini APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}
