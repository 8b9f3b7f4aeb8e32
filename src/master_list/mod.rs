//! 目録PDF（Elenco Documenti）からのエントリ抽出
//!
//! 1. 第一候補（ページ単位）で全ページを読む
//! 2. 1件も取れなければ第二候補（文書単位）を Lattice / Stream の2方式で実行し、表を合算
//! 3. 最初にエントリが取れた方式の結果だけを採用する（方式間のマージはしない）

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use verifica_common::{entries_from_table, normalize, Entry};

use crate::error::{Result, VerificaError};
use crate::pdf::{
    DocumentTableBackend, PageTable, PageTableBackend, PdfiumTables, TableFlavor, TextLayoutTables,
};

pub struct MasterListExtractor {
    primary: Arc<dyn PageTableBackend>,
    secondary: Option<Arc<dyn DocumentTableBackend>>,
    /// コミッサ（コード先頭）での絞り込み
    commessa: Option<String>,
}

impl Default for MasterListExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(PdfiumTables::default()),
            Some(Arc::new(TextLayoutTables::default())),
        )
    }
}

impl MasterListExtractor {
    pub fn new(
        primary: Arc<dyn PageTableBackend>,
        secondary: Option<Arc<dyn DocumentTableBackend>>,
    ) -> Self {
        Self {
            primary,
            secondary,
            commessa: None,
        }
    }

    pub fn with_commessa(mut self, commessa: Option<String>) -> Self {
        self.commessa = commessa
            .map(|c| normalize(&c))
            .filter(|c| !c.is_empty());
        self
    }

    /// 目録PDFからエントリを抽出
    ///
    /// # Returns
    /// 目録の順序どおりのエントリ。どの方式でも読めなければ `ParseFailure`
    pub fn extract(&self, path: &Path) -> Result<Vec<Entry>> {
        if !path.is_file() {
            return Err(VerificaError::parse_failure(path, "ファイルが見つかりません"));
        }

        let mut failures = Vec::new();

        let mut entries = match self.extract_primary(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(backend = self.primary.name(), error = %e, "第一候補で目録を読めません");
                failures.push(format!("{}: {}", self.primary.name(), e));
                Vec::new()
            }
        };

        if entries.is_empty() {
            if let Some(secondary) = &self.secondary {
                debug!(backend = secondary.name(), "第二候補で再抽出");
                match self.extract_secondary(secondary.as_ref(), path) {
                    Ok(found) => entries = found,
                    Err(e) => {
                        warn!(backend = secondary.name(), error = %e, "第二候補で目録を読めません");
                        failures.push(format!("{}: {}", secondary.name(), e));
                    }
                }
            }
        }

        let expected_failures = 1 + usize::from(self.secondary.is_some());
        if entries.is_empty() && failures.len() == expected_failures {
            return Err(VerificaError::parse_failure(path, failures.join(" / ")));
        }

        if let Some(prefix) = &self.commessa {
            let before = entries.len();
            entries.retain(|e| e.code.starts_with(prefix.as_str()));
            debug!(commessa = %prefix, before, after = entries.len(), "コミッサで絞り込み");
        }

        info!(path = %path.display(), entries = entries.len(), "目録を抽出");
        Ok(entries)
    }

    fn extract_primary(&self, path: &Path) -> Result<Vec<Entry>> {
        let backend = self.primary.as_ref();
        let page_count = backend.page_count(path)?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for page in 0..page_count {
            match backend.page_tables(path, page) {
                Ok(tables) => {
                    for table in tables {
                        entries.extend(entries_from_table(&table, Some(page + 1), backend.name(), &mut seen));
                    }
                }
                Err(e) => warn!(page = page + 1, error = %e, "ページの表を読めません"),
            }
        }
        Ok(entries)
    }

    fn extract_secondary(&self, backend: &dyn DocumentTableBackend, path: &Path) -> Result<Vec<Entry>> {
        let (lattice, stream) = rayon::join(
            || backend.document_tables(path, TableFlavor::Lattice),
            || backend.document_tables(path, TableFlavor::Stream),
        );

        let mut tables: Vec<(TableFlavor, PageTable)> = Vec::new();
        let mut last_error = None;
        for (flavor, result) in [(TableFlavor::Lattice, lattice), (TableFlavor::Stream, stream)] {
            match result {
                Ok(found) => {
                    debug!(flavor = flavor.as_str(), tables = found.len(), "第二候補の表");
                    tables.extend(found.into_iter().map(|t| (flavor, t)));
                }
                Err(e) => {
                    warn!(flavor = flavor.as_str(), error = %e, "第二候補の抽出に失敗");
                    last_error = Some(e);
                }
            }
        }

        if tables.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let mut seen = HashSet::new();
        let source = backend.name().to_string();
        Ok(tables
            .iter()
            .flat_map(|(flavor, table)| {
                entries_from_table(&table.rows, table.page, &format!("{}:{}", source, flavor.as_str()), &mut seen)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use verifica_common::Table;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    /// ページごとに決まった表を返す
    struct FakePages {
        pages: Vec<Vec<Table>>,
    }

    impl PageTableBackend for FakePages {
        fn name(&self) -> &str {
            "fake-pages"
        }

        fn page_count(&self, _path: &Path) -> Result<usize> {
            Ok(self.pages.len())
        }

        fn page_tables(&self, _path: &Path, page: usize) -> Result<Vec<Table>> {
            Ok(self.pages[page].clone())
        }
    }

    struct BrokenPages;

    impl PageTableBackend for BrokenPages {
        fn name(&self) -> &str {
            "broken"
        }

        fn page_count(&self, path: &Path) -> Result<usize> {
            Err(VerificaError::parse_failure(path, "読めません"))
        }

        fn page_tables(&self, path: &Path, _page: usize) -> Result<Vec<Table>> {
            Err(VerificaError::parse_failure(path, "読めません"))
        }
    }

    struct FakeDocument {
        by_flavor: HashMap<&'static str, Vec<PageTable>>,
    }

    impl DocumentTableBackend for FakeDocument {
        fn name(&self) -> &str {
            "fake-doc"
        }

        fn document_tables(&self, _path: &Path, flavor: TableFlavor) -> Result<Vec<PageTable>> {
            Ok(self.by_flavor.get(flavor.as_str()).cloned().unwrap_or_default())
        }
    }

    fn index_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    fn manifest_table() -> Table {
        vec![
            row(&["A", "B", "C"]),
            row(&["Codice elaborato", "Titolo", "Scala"]),
            row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale", "-"]),
            row(&["ADRPMV02-PEDGGEN-EED00-0", "Planimetria generale", "1:500"]),
        ]
    }

    #[test]
    fn test_extract_primary_pages() {
        let file = index_file();
        let extractor = MasterListExtractor::new(
            Arc::new(FakePages {
                pages: vec![vec![], vec![manifest_table()]],
            }),
            None,
        );

        let entries = extractor.extract(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, "ADRPMV02-PEDSIIE-RRC00-1");
        assert_eq!(entries[0].page, Some(2));
        assert_eq!(entries[0].source, "fake-pages");
    }

    #[test]
    fn test_extract_falls_back_and_unions_flavors() {
        let file = index_file();
        let mut by_flavor = HashMap::new();
        by_flavor.insert(
            "lattice",
            vec![PageTable {
                page: Some(1),
                rows: vec![
                    row(&["Codice elaborato", "Titolo"]),
                    row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale"]),
                ],
            }],
        );
        by_flavor.insert(
            "stream",
            vec![PageTable {
                page: Some(1),
                rows: vec![
                    row(&["Codice elaborato", "Titolo"]),
                    row(&["ADRPMV02-PEDSIIE-RRC00-1", "Relazione generale"]),
                    row(&["ADRPMV02-PEDGGEN-EED00-0", "Planimetria"]),
                ],
            }],
        );

        let extractor = MasterListExtractor::new(
            Arc::new(FakePages { pages: vec![vec![]] }),
            Some(Arc::new(FakeDocument { by_flavor })),
        );

        let entries = extractor.extract(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, "fake-doc:lattice");
        assert_eq!(entries[1].source, "fake-doc:stream");
    }

    #[test]
    fn test_extract_primary_error_uses_secondary() {
        let file = index_file();
        let mut by_flavor = HashMap::new();
        by_flavor.insert(
            "stream",
            vec![PageTable { page: Some(1), rows: manifest_table() }],
        );
        let extractor = MasterListExtractor::new(Arc::new(BrokenPages), Some(Arc::new(FakeDocument { by_flavor })));

        let entries = extractor.extract(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_extract_all_backends_fail() {
        let file = index_file();
        let extractor = MasterListExtractor::new(Arc::new(BrokenPages), None);
        let err = extractor.extract(file.path()).unwrap_err();
        assert!(matches!(err, VerificaError::ParseFailure { .. }));
    }

    #[test]
    fn test_extract_missing_file() {
        let extractor = MasterListExtractor::new(Arc::new(FakePages { pages: vec![] }), None);
        let err = extractor.extract(Path::new("/nonexistent/elenco.pdf")).unwrap_err();
        assert!(matches!(err, VerificaError::ParseFailure { .. }));
    }

    #[test]
    fn test_extract_commessa_filter() {
        let file = index_file();
        let mut table = manifest_table();
        table.push(row(&["XYZABC01-PEDSIIE-RRC00-1", "Altro progetto", "-"]));
        let extractor = MasterListExtractor::new(Arc::new(FakePages { pages: vec![vec![table]] }), None)
            .with_commessa(Some("adrpmv".into()));

        let entries = extractor.extract(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.code.starts_with("ADRPMV")));
    }
}
