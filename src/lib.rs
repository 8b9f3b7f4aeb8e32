//! verifica-codici
//!
//! Elenco Documenti（目録PDF）と成果品フォルダの文書コードを照合する。

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod master_list;
pub mod orchestrator;
pub mod pdf;
pub mod progress;
pub mod scanner;
pub mod semantic;
pub mod vision;

pub use orchestrator::{FolderRequest, Orchestrator, VerifyRequest};
