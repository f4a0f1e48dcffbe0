//! Python bindings for pathtable
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::collection::{CollectionError, DocumentSet, RecordSet};
use crate::extract::Record;
use crate::schema::{SchemaError, Table as RustTable};
use crate::xml::{ReaderOptions, XmlError, XmlReader};

/// Convert SchemaError to Python exception
impl From<SchemaError> for PyErr {
    fn from(err: SchemaError) -> PyErr {
        match err {
            SchemaError::Load { path, source } => PyIOError::new_err(format!(
                "Failed to read schema {}: {}",
                path.display(),
                source
            )),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// Convert XmlError to Python exception
impl From<XmlError> for PyErr {
    fn from(err: XmlError) -> PyErr {
        match err {
            XmlError::Io(e) => PyIOError::new_err(e.to_string()),
            XmlError::FileOpen { path, source } => PyIOError::new_err(format!(
                "Failed to open file {}: {}",
                path.display(),
                source
            )),
            other => PyValueError::new_err(format!("Parse error: {}", other)),
        }
    }
}

impl From<CollectionError> for PyErr {
    fn from(err: CollectionError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn record_to_dict(record: Record) -> HashMap<String, String> {
    record.into_map().into_iter().collect()
}

/// A table definition: a row path and its named columns.
///
/// Column paths are relative to the row path. All paths are validated when
/// the table is built.
#[pyclass(name = "Table")]
#[derive(Clone)]
pub struct PyTable {
    inner: Arc<RustTable>,
}

#[pymethods]
impl PyTable {
    /// Create a Table.
    ///
    /// Args:
    ///     path: Row path expression (e.g., "report/#/row")
    ///     columns: List of (name, path) pairs
    ///
    /// Raises:
    ///     ValueError: If any path expression is malformed
    #[new]
    #[pyo3(signature = (path, columns=Vec::new()))]
    fn new(path: &str, columns: Vec<(String, String)>) -> PyResult<Self> {
        let mut table = RustTable::new(path)?;
        for (name, column_path) in &columns {
            table.add_column(name, column_path)?;
        }
        Ok(PyTable {
            inner: Arc::new(table),
        })
    }

    /// Load a Table from a .json, .yaml/.yml or .xml schema file.
    #[classmethod]
    fn from_file(_cls: &Bound<'_, pyo3::types::PyType>, file_path: &str) -> PyResult<Self> {
        Ok(PyTable {
            inner: Arc::new(RustTable::load(file_path)?),
        })
    }

    #[getter]
    fn path(&self) -> String {
        self.inner.path().to_string()
    }

    #[getter]
    fn columns(&self) -> Vec<(String, String)> {
        self.inner
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.path().to_string()))
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.inner.column_names().map(str::to_string).collect()
    }

    /// Extract records from an XML string.
    ///
    /// Returns:
    ///     List of dicts mapping column name to value
    fn extract(&self, text: &str) -> PyResult<Vec<HashMap<String, String>>> {
        extract_str(text, self, false)
    }

    fn __repr__(&self) -> String {
        format!(
            "<Table path='{}' columns={}>",
            self.inner.path(),
            self.inner.columns().len()
        )
    }
}

/// Iterator over records from a set of documents.
#[pyclass(name = "RecordIterator", unsendable)]
struct PyRecordIterator {
    inner: Box<dyn Iterator<Item = Record>>,
}

#[pymethods]
impl PyRecordIterator {
    fn __iter__(slf: PyRef<Self>) -> PyRef<Self> {
        slf
    }

    fn __next__(&mut self) -> Option<HashMap<String, String>> {
        self.inner.next().map(record_to_dict)
    }
}

/// Extract records from an XML string.
///
/// Args:
///     text: XML document text
///     table: Table to extract
///     trim_text: If True, trim whitespace around text content
///
/// Returns:
///     List of dicts mapping column name to value
///
/// Raises:
///     ValueError: If the document is malformed
#[pyfunction]
#[pyo3(signature = (text, table, trim_text=false))]
fn extract_str(
    text: &str,
    table: &PyTable,
    trim_text: bool,
) -> PyResult<Vec<HashMap<String, String>>> {
    let doc = XmlReader::new(ReaderOptions { trim_text }).parse_str(text)?;
    Ok(crate::extract::extract(&doc, &table.inner)
        .into_iter()
        .map(record_to_dict)
        .collect())
}

/// Extract records from an XML file.
///
/// Automatically detects and handles gzip-compressed files (.xml.gz).
///
/// Raises:
///     IOError: If the file cannot be opened
///     ValueError: If the document is malformed
#[pyfunction]
#[pyo3(signature = (path, table, trim_text=false))]
fn extract_file(
    path: &str,
    table: &PyTable,
    trim_text: bool,
) -> PyResult<Vec<HashMap<String, String>>> {
    let doc = XmlReader::new(ReaderOptions { trim_text }).read_file(PathBuf::from(path))?;
    Ok(crate::extract::extract(&doc, &table.inner)
        .into_iter()
        .map(record_to_dict)
        .collect())
}

/// Extract records from every file matching a glob pattern.
///
/// Files are processed in sorted order. Unreadable or malformed files are
/// skipped with a warning.
///
/// Args:
///     glob_pattern: Glob pattern (e.g., "data/*.xml")
///     table: Table to extract
///     parallel: If True, read and extract files on worker threads
///
/// Returns:
///     Iterator over record dicts
///
/// Raises:
///     ValueError: If glob pattern is invalid
#[pyfunction]
#[pyo3(signature = (glob_pattern, table, parallel=false, trim_text=false))]
fn extract_files(
    glob_pattern: &str,
    table: &PyTable,
    parallel: bool,
    trim_text: bool,
) -> PyResult<PyRecordIterator> {
    let documents =
        DocumentSet::from_glob(glob_pattern)?.with_options(ReaderOptions { trim_text });
    let records = RecordSet::new(&documents, Arc::clone(&table.inner));
    let inner = if parallel {
        records.par_iter()
    } else {
        records.iter()
    };
    Ok(PyRecordIterator { inner })
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn pathtable(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTable>()?;
    m.add_class::<PyRecordIterator>()?;

    m.add_function(wrap_pyfunction!(extract_str, m)?)?;
    m.add_function(wrap_pyfunction!(extract_file, m)?)?;
    m.add_function(wrap_pyfunction!(extract_files, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
