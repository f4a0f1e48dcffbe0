//! Document and record collections
//!
//! Provides convenient collection interfaces for:
//! - Iterating over documents from a string, file, or glob pattern
//! - Extracting records from every document of a collection with one table
//! - Sequential and parallel iteration
//!
//! Unreadable files and malformed documents are logged and skipped.

use pariter::IteratorExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::extract::{DocumentParser, Record};
use crate::schema::Table;
use crate::tree::Document;
use crate::xml::{ReaderOptions, XmlError, XmlReader};

/// Error building a collection
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("Collection error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// Source of documents for a collection
#[derive(Debug, Clone)]
enum DocumentSource {
    /// In-memory XML text
    String(String),
    /// Single file path
    File(PathBuf),
    /// Multiple file paths (from glob or explicit paths)
    Files(Vec<PathBuf>),
}

/// Collection of documents from a string, file, or glob pattern
///
/// # Examples
///
/// ```no_run
/// use pathtable::DocumentSet;
///
/// let documents = DocumentSet::from_glob("data/*.xml").unwrap();
/// for doc in documents {
///     println!("document with {} elements", doc.nodes.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DocumentSet {
    source: DocumentSource,
    reader: XmlReader,
}

impl DocumentSet {
    fn with_source(source: DocumentSource) -> Self {
        Self {
            source,
            reader: XmlReader::default(),
        }
    }

    /// Create from an in-memory XML string
    pub fn from_string(text: &str) -> Self {
        Self::with_source(DocumentSource::String(text.to_string()))
    }

    /// Create from a single file path
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::with_source(DocumentSource::File(path.as_ref().to_path_buf()))
    }

    /// Create from a glob pattern
    ///
    /// Files are processed in sorted order for deterministic results.
    pub fn from_glob(pattern: &str) -> Result<Self, CollectionError> {
        let mut file_paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
        file_paths.sort();
        Ok(Self::from_paths(file_paths))
    }

    /// Create from explicit file paths
    pub fn from_paths(file_paths: Vec<PathBuf>) -> Self {
        Self::with_source(DocumentSource::Files(file_paths))
    }

    /// Use `options` when reading documents
    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.reader = XmlReader::new(options);
        self
    }

    /// File paths of this collection (empty for in-memory sources)
    pub fn paths(&self) -> Vec<PathBuf> {
        match &self.source {
            DocumentSource::String(_) => Vec::new(),
            DocumentSource::File(path) => vec![path.clone()],
            DocumentSource::Files(paths) => paths.clone(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Arc<Document>>> {
        self.clone().into_iter()
    }
}

impl IntoIterator for DocumentSet {
    type Item = Arc<Document>;
    type IntoIter = Box<dyn Iterator<Item = Self::Item>>;

    fn into_iter(self) -> Self::IntoIter {
        let reader = self.reader;
        match self.source {
            DocumentSource::String(text) => match reader.parse_str(&text) {
                Ok(doc) => Box::new(std::iter::once(Arc::new(doc))),
                Err(e) => {
                    log::warn!("Skipping unreadable document: {}", e);
                    Box::new(std::iter::empty())
                }
            },
            DocumentSource::File(path) => Box::new(open_document(&reader, &path).into_iter()),
            DocumentSource::Files(paths) => Box::new(
                paths
                    .into_iter()
                    .filter_map(move |path| open_document(&reader, &path)),
            ),
        }
    }
}

/// Records extracted from every document of a [`DocumentSet`]
///
/// # Examples
///
/// ```no_run
/// use pathtable::{DocumentSet, RecordSet, Table};
/// use std::sync::Arc;
///
/// let table = Table::new("report/row").unwrap().column("id", "id").unwrap();
/// let documents = DocumentSet::from_glob("data/*.xml").unwrap();
///
/// // Sequential iteration
/// for record in RecordSet::new(&documents, Arc::new(table.clone())) {
///     println!("{:?}", record.get("id"));
/// }
///
/// // Parallel iteration, one document per worker, in file order
/// let count = RecordSet::new(&documents, Arc::new(table)).par_iter().count();
/// ```
#[derive(Debug, Clone)]
pub struct RecordSet {
    documents: DocumentSet,
    table: Arc<Table>,
}

impl RecordSet {
    pub fn new(documents: &DocumentSet, table: Arc<Table>) -> Self {
        Self {
            documents: documents.clone(),
            table,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Record>> {
        self.clone().into_iter()
    }

    /// Read and extract documents on worker threads
    ///
    /// Records come out in the same order as [`RecordSet::iter`]. In-memory
    /// sources are processed on the calling thread.
    pub fn par_iter(&self) -> Box<dyn Iterator<Item = Record>> {
        if let DocumentSource::String(_) = self.documents.source {
            return self.iter();
        }

        let reader = self.documents.reader.clone();
        let table = Arc::clone(&self.table);
        let iter = self
            .documents
            .paths()
            .into_iter()
            .parallel_map(move |path| {
                open_document(&reader, &path)
                    .map(|doc| DocumentParser::new(&table).parse(&doc))
                    .unwrap_or_default()
            })
            .flatten();
        Box::new(iter)
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = Box<dyn Iterator<Item = Self::Item>>;

    fn into_iter(self) -> Self::IntoIter {
        let table = self.table;
        let iter = self.documents.into_iter().flat_map(move |doc| {
            let records: Vec<Record> = DocumentParser::new(&table).parse(&doc);
            records
        });
        Box::new(iter)
    }
}

/// Helper: read one document
///
/// Logs read errors and returns None on error.
fn open_document(reader: &XmlReader, path: &Path) -> Option<Arc<Document>> {
    match reader.read_file(path) {
        Ok(doc) => Some(Arc::new(doc)),
        Err(XmlError::FileOpen { path, source }) => {
            log::warn!("Failed to open {:?}: {}", path, source);
            None
        }
        Err(e) => {
            log::warn!("Skipping {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ROW_XML: &str = "<report><row><id>1</id></row><row><id>2</id></row></report>";
    const ONE_ROW_XML: &str = "<report><row><id>3</id></row></report>";

    fn table() -> Arc<Table> {
        Arc::new(Table::new("report/row").unwrap().column("id", "id").unwrap())
    }

    fn ids(records: impl IntoIterator<Item = Record>) -> Vec<String> {
        records
            .into_iter()
            .map(|r| r.get("id").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_document_set_from_string() {
        let docs: Vec<_> = DocumentSet::from_string(TWO_ROW_XML).into_iter().collect();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].nodes.len(), 5);
    }

    #[test]
    fn test_document_set_skips_malformed_string() {
        let docs: Vec<_> = DocumentSet::from_string("<report>").into_iter().collect();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_record_set_from_string() {
        let documents = DocumentSet::from_string(TWO_ROW_XML);
        let records = RecordSet::new(&documents, table());

        assert_eq!(ids(records.iter()), vec!["1", "2"]);
        assert_eq!(ids(records.par_iter()), vec!["1", "2"]);
    }

    #[test]
    fn test_with_options() {
        let documents = DocumentSet::from_string("<report><row><id> 1 </id></row></report>")
            .with_options(ReaderOptions { trim_text: true });
        let records = RecordSet::new(&documents, table());

        assert_eq!(ids(records), vec!["1"]);
    }

    mod multi_file {
        use super::*;
        use std::fs;
        use tempfile::{TempDir, tempdir};

        /// Helper to create test files with given content
        fn create_test_files(contents: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
            let dir = tempdir().unwrap();
            let mut paths = Vec::new();

            for (filename, content) in contents {
                let path = dir.path().join(filename);
                fs::write(&path, content).unwrap();
                paths.push(path);
            }

            (dir, paths)
        }

        #[test]
        fn test_document_set_from_paths() {
            let (_dir, paths) =
                create_test_files(&[("a.xml", TWO_ROW_XML), ("b.xml", ONE_ROW_XML)]);

            let docs: Vec<_> = DocumentSet::from_paths(paths.clone()).into_iter().collect();
            assert_eq!(docs.len(), 2);
            assert_eq!(DocumentSet::from_paths(paths).paths().len(), 2);
        }

        #[test]
        fn test_document_set_from_glob() {
            let (dir, _paths) = create_test_files(&[
                ("b.xml", ONE_ROW_XML),
                ("a.xml", TWO_ROW_XML),
                ("other.txt", "ignored"),
            ]);

            let pattern = format!("{}/*.xml", dir.path().display());
            let documents = DocumentSet::from_glob(&pattern).unwrap();
            let files: Vec<_> = documents
                .paths()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();

            assert_eq!(files, vec!["a.xml", "b.xml"]);
        }

        #[test]
        fn test_invalid_glob() {
            assert!(matches!(
                DocumentSet::from_glob("data/[*.xml"),
                Err(CollectionError::Glob(_))
            ));
        }

        #[test]
        fn test_record_set_in_file_order() {
            let (_dir, paths) =
                create_test_files(&[("a.xml", TWO_ROW_XML), ("b.xml", ONE_ROW_XML)]);

            let records = RecordSet::new(&DocumentSet::from_paths(paths), table());
            assert_eq!(ids(records), vec!["1", "2", "3"]);
        }

        #[test]
        fn test_skips_bad_files() {
            let (dir, paths) = create_test_files(&[
                ("good.xml", ONE_ROW_XML),
                ("broken.xml", "<report><row>"),
            ]);

            let good = paths[0].clone();
            let broken = paths[1].clone();
            let missing = dir.path().join("missing.xml");
            let documents = DocumentSet::from_paths(vec![good.clone(), missing, broken, good]);

            assert_eq!(documents.iter().count(), 2);
            assert_eq!(ids(RecordSet::new(&documents, table())), vec!["3", "3"]);
        }

        #[test]
        fn test_record_set_par_iter() {
            let (_dir, paths) = create_test_files(&[
                ("a.xml", TWO_ROW_XML),
                ("b.xml", ONE_ROW_XML),
                ("c.xml", "<report><row><id>4</id></row><row><id>5</id></row></report>"),
            ]);

            let documents = DocumentSet::from_paths(paths);
            let records = RecordSet::new(&documents, table());

            assert_eq!(ids(records.par_iter()), vec!["1", "2", "3", "4", "5"]);
            assert_eq!(ids(records.par_iter()), ids(records.iter()));
        }
    }
}
