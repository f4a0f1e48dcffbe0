//! Table schemas
//!
//! A [`Table`] names the path of a repeating row and an ordered list of
//! [`Column`]s, each a path relative to the row. Every path expression is
//! parsed and compiled when the table is built, so a `Table` that exists is
//! valid. Tables can also be loaded from JSON, YAML, or XML schema files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parser::PathError;
use crate::pattern::PathPattern;
use crate::tree::Document;
use crate::xml::{self, XmlError};

/// Error type for schema construction and loading
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema error: invalid path expression `{expr}`: {source}")]
    Path {
        expr: String,
        #[source]
        source: PathError,
    },

    #[error("Schema error: pattern for `{expr}` cannot be compiled: {source}")]
    Regex {
        expr: String,
        #[source]
        source: regex::Error,
    },

    #[error("Schema error: {0}")]
    InvalidDefinition(String),

    #[error("Schema error: failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Schema error: {0}")]
    Xml(#[from] XmlError),

    #[error("Schema error: unknown schema format for {0} (expected .json, .yaml, .yml or .xml)")]
    UnknownFormat(PathBuf),
}

/// One output column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    path: String,
    pattern: PathPattern,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path expression relative to the row, as declared
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Compiled `row/column` pattern
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn attribute_name(&self) -> Option<&str> {
        self.pattern.attribute_name()
    }
}

/// A row pattern plus its columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    row: PathPattern,
    columns: Vec<Column>,
}

impl Table {
    /// Create a table with no columns
    pub fn new(path: &str) -> Result<Self, SchemaError> {
        let row = PathPattern::new(path)?;
        log::debug!("compiled row pattern `{}`", row);
        Ok(Self {
            row,
            columns: Vec::new(),
        })
    }

    /// Builder form of [`Table::add_column`]
    pub fn column(mut self, name: &str, path: &str) -> Result<Self, SchemaError> {
        self.add_column(name, path)?;
        Ok(self)
    }

    /// Add a column; `path` is relative to the row path
    pub fn add_column(&mut self, name: &str, path: &str) -> Result<(), SchemaError> {
        let pattern = PathPattern::join(&self.row, path)?;
        if self.columns.iter().any(|c| c.name == name) {
            log::warn!(
                "duplicate column name `{}` in table `{}`; later matches overwrite earlier ones",
                name,
                self.row
            );
        }
        log::debug!("compiled column `{}` as `{}`", name, pattern);
        self.columns.push(Column {
            name: name.to_string(),
            path: path.to_string(),
            pattern,
        });
        Ok(())
    }

    /// Row path expression, as declared
    pub fn path(&self) -> &str {
        self.row.as_str()
    }

    pub fn row(&self) -> &PathPattern {
        &self.row
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Build a table from its serializable definition
    pub fn from_def(def: &TableDef) -> Result<Self, SchemaError> {
        let mut table = Table::new(&def.path)?;
        for column in &def.columns {
            table.add_column(&column.name, &column.path)?;
        }
        Ok(table)
    }

    /// Serializable definition of this table
    pub fn to_def(&self) -> TableDef {
        TableDef {
            path: self.path().to_string(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnDef {
                    name: c.name.clone(),
                    path: c.path.clone(),
                })
                .collect(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let def: TableDef = serde_json::from_str(text)?;
        Self::from_def(&def)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let def: TableDef = serde_yaml::from_str(text)?;
        Self::from_def(&def)
    }

    /// Load from the XML layout
    /// `<Table path=".."><Columns><Column name=".." path=".."/></Columns></Table>`
    pub fn from_xml_str(text: &str) -> Result<Self, SchemaError> {
        let doc = xml::parse_str(text)?;
        Self::from_def(&table_def_from_xml(&doc)?)
    }

    /// Load a schema file, choosing the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SchemaError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("xml") => Self::from_xml_str(&text),
            _ => Err(SchemaError::UnknownFormat(path.to_path_buf())),
        }
    }
}

/// Serializable table definition (the schema file format)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub path: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub path: String,
}

fn table_def_from_xml(doc: &Document) -> Result<TableDef, SchemaError> {
    let Some(root) = doc.root() else {
        return Err(SchemaError::InvalidDefinition(
            "schema document has no root element".to_string(),
        ));
    };
    if doc.name(root) != "Table" {
        return Err(SchemaError::InvalidDefinition(format!(
            "expected <Table> root element, found <{}>",
            doc.name(root)
        )));
    }
    let Some(path) = doc.attribute(root, "path") else {
        return Err(SchemaError::InvalidDefinition(
            "<Table> is missing the `path` attribute".to_string(),
        ));
    };

    // Columns may sit under a <Columns> wrapper or directly under <Table>
    let column_nodes = doc.children(root).flat_map(|child| match doc.name(child) {
        "Columns" => doc.children(child).collect::<Vec<_>>(),
        _ => vec![child],
    });

    let mut columns = Vec::new();
    for node in column_nodes.filter(|n| doc.name(n) == "Column") {
        let (Some(name), Some(column_path)) =
            (doc.attribute(node, "name"), doc.attribute(node, "path"))
        else {
            return Err(SchemaError::InvalidDefinition(
                "<Column> needs both `name` and `path` attributes".to_string(),
            ));
        };
        columns.push(ColumnDef {
            name: name.to_string(),
            path: column_path.to_string(),
        });
    }

    Ok(TableDef {
        path: path.to_string(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_table_creation() {
        let table = Table::new("report/row")
            .unwrap()
            .column("id", "id")
            .unwrap()
            .column("status", "meta.status")
            .unwrap();

        assert_eq!(table.path(), "report/row");
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.columns()[0].name(), "id");
        assert_eq!(table.columns()[0].attribute_name(), None);
        assert_eq!(table.columns()[1].path(), "meta.status");
        assert_eq!(table.columns()[1].attribute_name(), Some("status"));
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["id", "status"]
        );
    }

    #[test]
    fn test_invalid_paths_fail_fast() {
        assert!(matches!(
            Table::new("report//row"),
            Err(SchemaError::Path { .. })
        ));

        let mut table = Table::new("report/row").unwrap();
        assert!(table.add_column("id", "id/").is_err());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn test_duplicate_column_names_are_kept() {
        let table = Table::new("r")
            .unwrap()
            .column("v", "a")
            .unwrap()
            .column("v", "b")
            .unwrap();
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_from_json() {
        let table = Table::from_json_str(
            r#"{"path": "report/row", "columns": [{"name": "id", "path": "id"}]}"#,
        )
        .unwrap();

        assert_eq!(table.path(), "report/row");
        assert_eq!(table.columns()[0].name(), "id");
    }

    #[test]
    fn test_from_yaml() {
        let yaml = "path: a/#/row\ncolumns:\n  - name: status\n    path: row.status\n";
        let table = Table::from_yaml_str(yaml).unwrap();

        assert_eq!(table.path(), "a/#/row");
        assert_eq!(table.columns()[0].attribute_name(), Some("status"));
    }

    #[test]
    fn test_from_yaml_without_columns() {
        let table = Table::from_yaml_str("path: report/row\n").unwrap();
        assert!(table.columns().is_empty());
    }

    #[test]
    fn test_from_xml() {
        let xml = r#"<?xml version="1.0"?>
<Table path="report/row">
    <Columns>
        <Column name="id" path="id"/>
        <Column name="status" path="meta.status"/>
    </Columns>
</Table>"#;
        let table = Table::from_xml_str(xml).unwrap();

        assert_eq!(table.path(), "report/row");
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["id", "status"]
        );
    }

    #[test]
    fn test_from_xml_errors() {
        assert!(matches!(
            Table::from_xml_str("<Schema path=\"a\"/>"),
            Err(SchemaError::InvalidDefinition(_))
        ));
        assert!(matches!(
            Table::from_xml_str("<Table/>"),
            Err(SchemaError::InvalidDefinition(_))
        ));
        assert!(matches!(
            Table::from_xml_str("<Table path=\"a\"><Column name=\"x\"/></Table>"),
            Err(SchemaError::InvalidDefinition(_))
        ));
        assert!(matches!(
            Table::from_xml_str("<Table path=\"a\">"),
            Err(SchemaError::Xml(_))
        ));
    }

    #[test]
    fn test_def_round_trip() {
        let table = Table::new("report/row")
            .unwrap()
            .column("id", "id")
            .unwrap();
        let again = Table::from_def(&table.to_def()).unwrap();
        assert_eq!(table, again);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("schema.json");
        let mut file = fs::File::create(&json_path).unwrap();
        write!(file, r#"{{"path": "r", "columns": [{{"name": "a", "path": "a"}}]}}"#).unwrap();
        assert_eq!(Table::load(&json_path).unwrap().columns().len(), 1);

        let yml_path = dir.path().join("schema.yml");
        fs::write(&yml_path, "path: r\n").unwrap();
        assert_eq!(Table::load(&yml_path).unwrap().path(), "r");

        let txt_path = dir.path().join("schema.txt");
        fs::write(&txt_path, "path: r\n").unwrap();
        assert!(matches!(
            Table::load(&txt_path),
            Err(SchemaError::UnknownFormat(_))
        ));

        assert!(matches!(
            Table::load(dir.path().join("missing.json")),
            Err(SchemaError::Load { .. })
        ));
    }
}
