//! レポートのファイル出力（JSON / Excel）

use std::path::{Path, PathBuf};

use verifica_common::export::excel_core::report_to_xlsx;
use verifica_common::{Entry, Report};

use crate::error::Result;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// 出力先がフォルダなら既定のファイル名を付ける
pub fn output_path_for(output: &Path, default_name: &str) -> PathBuf {
    if output.is_dir() {
        output.join(default_name)
    } else {
        output.to_path_buf()
    }
}

/// レポートをJSONで保存
pub fn write_report_json(report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// レポートをExcelで保存
pub fn write_report_xlsx(report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let bytes = report_to_xlsx(report)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// 目録のエントリをJSONで保存
pub fn write_entries_json(entries: &[Entry], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use verifica_common::{build_entry_report, EffectiveConfig, Resolution};

    fn report() -> Report {
        let entry = Entry {
            code: "ADRPMV02-PEDSIIE-RRC00-1".into(),
            title: "Relazione".into(),
            ..Default::default()
        };
        build_entry_report(
            vec![(entry, Resolution::NotFound)],
            0,
            Vec::new(),
            Vec::new(),
            EffectiveConfig::default(),
        )
    }

    #[test]
    fn test_write_report_json_creates_parent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        write_report_json(&report(), &path).unwrap();

        let loaded: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.summary.missing, 1);
        assert_eq!(loaded.missing[0].code, "ADRPMV02-PEDSIIE-RRC00-1");
    }

    #[test]
    fn test_write_report_xlsx() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        write_report_xlsx(&report(), &path).unwrap();
        assert_eq!(&std::fs::read(&path).unwrap()[..2], b"PK");
    }

    #[test]
    fn test_output_path_for_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(output_path_for(dir.path(), "report.json"), dir.path().join("report.json"));
        let file = dir.path().join("x.json");
        assert_eq!(output_path_for(&file, "report.json"), file);
    }
}
