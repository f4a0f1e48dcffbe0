//! Pathtable: Tabular record extraction from XML documents
//!
//! A table names a repeating row path and a set of columns, each a path
//! relative to the row. Paths may use `*` (exactly one element) and `#`
//! (one or more elements), and may end in `.attr` to select an attribute
//! instead of text content. Core implementation in Rust with Python bindings.

// Core modules
pub mod bytes; // Byte-level helpers for the XML reader
pub mod collection; // Document and record collections
pub mod extract; // Document traversal and record extraction
pub mod parser; // Path expression parser
pub mod pattern; // Compiled path patterns
pub mod schema; // Table and column definitions
pub mod tree; // Document tree
pub mod xml; // XML reader

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use collection::{CollectionError, DocumentSet, RecordSet};
pub use extract::{DocumentParser, Record, Records, TraversalState, extract};
pub use parser::{PathError, PathExpr, Step, parse_path};
pub use pattern::PathPattern;
pub use schema::{Column, ColumnDef, SchemaError, Table, TableDef};
pub use tree::{Document, Node, NodeId};
pub use xml::{ReaderOptions, XmlError, XmlReader, parse_str, read_file};
