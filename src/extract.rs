//! Table extraction over a document tree
//!
//! [`DocumentParser`] walks a document depth-first, in document order, while
//! keeping the slash-joined path of the current node. A node whose path
//! matches the table's row pattern closes the record being built; a node
//! below a row whose path matches a column pattern contributes that
//! column's value. The last open record is emitted when the walk ends.
//!
//! The walk uses an explicit stack, so deeply nested documents do not recurse
//! on the call stack, and records are produced lazily by [`Records`].

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::schema::{Column, Table};
use crate::tree::{Content, DOCUMENT_NODE_NAME, Document, Node};

/// One extracted row: column name -> value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: FxHashMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, returning the previous one
    pub fn insert(&mut self, name: &str, value: String) -> Option<String> {
        self.fields.insert(name.to_string(), value)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over (name, value) pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values in the table's column order (None for columns without a value)
    pub fn row<'a>(&'a self, table: &'a Table) -> Vec<Option<&'a str>> {
        table.column_names().map(|name| self.get(name)).collect()
    }

    /// View that serializes as a map in the table's column order
    pub fn ordered<'a>(&'a self, table: &'a Table) -> OrderedRecord<'a> {
        OrderedRecord {
            record: self,
            table,
        }
    }

    pub fn into_map(self) -> FxHashMap<String, String> {
        self.fields
    }
}

/// A [`Record`] serialized with keys in column order; missing keys are omitted
pub struct OrderedRecord<'a> {
    record: &'a Record,
    table: &'a Table,
}

impl Serialize for OrderedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        let mut seen: Vec<&str> = Vec::new();
        for name in self.table.column_names() {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            if let Some(value) = self.record.get(name) {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

/// Slash-joined path of node names from the root to the current node
#[derive(Debug, Clone, Default)]
pub struct PathStack {
    path: String,
    /// Length of `path` before each push
    marks: Vec<usize>,
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str) {
        self.marks.push(self.path.len());
        if !self.path.is_empty() {
            self.path.push('/');
        }
        self.path.push_str(name);
    }

    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.path.truncate(mark);
        }
    }

    /// Number of names on the stack
    pub fn depth(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

/// Mutable state of one traversal: the path stack and the open record
#[derive(Debug, Clone, Default)]
pub struct TraversalState {
    path: PathStack,
    open: Option<Record>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// The record being built, if any value was captured since the last flush
    pub fn open_record(&self) -> Option<&Record> {
        self.open.as_ref()
    }

    fn capture(&mut self, column: &Column, value: String) {
        self.open
            .get_or_insert_with(Record::new)
            .insert(column.name(), value);
    }

    fn flush(&mut self) -> Option<Record> {
        self.open.take()
    }
}

/// Extracts the records of one [`Table`] from documents
#[derive(Debug, Clone, Copy)]
pub struct DocumentParser<'t> {
    table: &'t Table,
}

impl<'t> DocumentParser<'t> {
    pub fn new(table: &'t Table) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'t Table {
        self.table
    }

    /// Extract all records, in document order
    pub fn parse(&self, doc: &Document) -> Vec<Record> {
        let records: Vec<Record> = self.records(doc).collect();
        log::debug!(
            "extracted {} records for row pattern `{}`",
            records.len(),
            self.table.row()
        );
        records
    }

    /// Lazily extract records; dropping the iterator stops the walk
    pub fn records<'d>(&self, doc: &'d Document) -> Records<'t, 'd> {
        Records {
            parser: *self,
            doc,
            state: TraversalState::new(),
            frames: Vec::new(),
            root: effective_root(doc),
            finished: false,
        }
    }

    /// Handle entry into `node`, whose name is already on the path.
    /// Returns the record closed by a row boundary, if there was one open.
    fn enter(&self, doc: &Document, node: &Node, state: &mut TraversalState) -> Option<Record> {
        let row = self.table.row();

        if row.matches(state.path()) {
            return state.flush();
        }

        if row.starts_with(state.path()) {
            for column in self.table.columns() {
                if !column.pattern().matches(state.path()) {
                    continue;
                }
                if let Some(value) = column_value(doc, node, column) {
                    state.capture(column, value);
                }
            }
        }

        None
    }
}

/// Extract the records of `table` from `doc`
pub fn extract(doc: &Document, table: &Table) -> Vec<Record> {
    DocumentParser::new(table).parse(doc)
}

/// Value of `column` at `node`: an attribute, or the non-empty text content
fn column_value(doc: &Document, node: &Node, column: &Column) -> Option<String> {
    match column.attribute_name() {
        Some(attribute) => doc.attribute(node, attribute).map(str::to_string),
        None => Some(doc.text_content(node)).filter(|text| !text.is_empty()),
    }
}

/// Root to start from, skipping a synthetic `#document` wrapper
fn effective_root(doc: &Document) -> Option<&Node> {
    let root = doc.root()?;
    if doc.name(root) == DOCUMENT_NODE_NAME {
        if let Some(first) = doc.first_child(root) {
            return Some(first);
        }
    }
    Some(root)
}

/// A node on the walk stack and the position of its next content item
#[derive(Debug)]
struct Frame<'d> {
    node: &'d Node,
    cursor: usize,
}

impl<'d> Frame<'d> {
    fn next_child(&mut self, doc: &'d Document) -> Option<&'d Node> {
        let node: &'d Node = self.node;
        while let Some(item) = node.content.get(self.cursor) {
            self.cursor += 1;
            if let Content::Element(id) = item {
                return doc.get_node(*id);
            }
        }
        None
    }
}

/// Lazy record iterator returned by [`DocumentParser::records`]
#[derive(Debug)]
pub struct Records<'t, 'd> {
    parser: DocumentParser<'t>,
    doc: &'d Document,
    state: TraversalState,
    /// One frame per name on `state.path`
    frames: Vec<Frame<'d>>,
    /// Root not yet entered
    root: Option<&'d Node>,
    finished: bool,
}

impl<'t, 'd> Records<'t, 'd> {
    /// Enter `node`: push its name and frame together. Every `descend` is
    /// undone by exactly one `ascend` once the frame runs out of children.
    fn descend(&mut self, node: &'d Node) -> Option<Record> {
        self.state.path.push(self.doc.name(node));
        self.frames.push(Frame { node, cursor: 0 });
        self.parser.enter(self.doc, node, &mut self.state)
    }

    /// Leave the innermost node: pop its frame and its name together
    fn ascend(&mut self) {
        self.frames.pop();
        self.state.path.pop();
    }

    /// Traversal state at the current point of the walk
    pub fn state(&self) -> &TraversalState {
        &self.state
    }
}

impl Iterator for Records<'_, '_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            if let Some(root) = self.root.take() {
                if let Some(record) = self.descend(root) {
                    return Some(record);
                }
                continue;
            }

            let doc = self.doc;
            let Some(frame) = self.frames.last_mut() else {
                if self.finished {
                    return None;
                }
                self.finished = true;
                return self.state.flush();
            };

            match frame.next_child(doc) {
                Some(child) => {
                    if let Some(record) = self.descend(child) {
                        return Some(record);
                    }
                }
                None => self.ascend(),
            }
        }
    }
}
