//! XML document reader
//!
//! Builds a [`Document`] from XML text. This is a small, non-validating
//! reader: elements, attributes, text, CDATA sections, character and
//! predefined entity references are supported; comments, processing
//! instructions and the DOCTYPE declaration are skipped. Input is read as
//! UTF-8 (invalid sequences are replaced). Files ending in `.gz` are
//! decompressed transparently.

use flate2::read::MultiGzDecoder;
use memchr::{memchr, memchr2, memmem};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bytes::{decode_entities, is_name_byte, is_xml_space, line_at, trim_xml_space};
use crate::tree::{Document, NodeId};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Error during XML reading
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("XML error at line {line}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("XML error: unexpected end of input inside {0}")]
    UnexpectedEof(String),
}

/// Reader options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Trim whitespace around every text run and drop runs that become empty
    pub trim_text: bool,
}

/// Parse an XML string with default options
pub fn parse_str(text: &str) -> Result<Document, XmlError> {
    XmlReader::default().parse_bytes(text.as_bytes())
}

/// Read an XML file with default options
pub fn read_file(path: impl AsRef<Path>) -> Result<Document, XmlError> {
    XmlReader::default().read_file(path)
}

/// XML reader configured with [`ReaderOptions`]
#[derive(Debug, Clone, Default)]
pub struct XmlReader {
    options: ReaderOptions,
}

impl XmlReader {
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn parse_str(&self, text: &str) -> Result<Document, XmlError> {
        self.parse_bytes(text.as_bytes())
    }

    pub fn parse_bytes(&self, input: &[u8]) -> Result<Document, XmlError> {
        Scanner::new(input, &self.options).run()
    }

    /// Read everything from `reader` and parse it
    pub fn read<R: Read>(&self, mut reader: R) -> Result<Document, XmlError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.parse_bytes(&buf)
    }

    /// Read a file; `.gz` files are decompressed
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<Document, XmlError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| XmlError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        if path.extension().is_some_and(|ext| ext == "gz") {
            self.read(MultiGzDecoder::new(reader))
        } else {
            self.read(reader)
        }
    }
}

/// Single-pass scanner over the input bytes
struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
    options: &'a ReaderOptions,
    doc: Document,
    /// Open elements: node id and raw name
    open: Vec<(NodeId, &'a [u8])>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a [u8], options: &'a ReaderOptions) -> Self {
        let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
        Self {
            input,
            pos: 0,
            options,
            doc: Document::new(),
            open: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Document, XmlError> {
        let input = self.input;
        loop {
            let rest = &input[self.pos..];
            let Some(lt) = memchr(b'<', rest) else {
                self.text(rest);
                break;
            };
            self.text(&rest[..lt]);
            self.pos += lt;

            let markup = &input[self.pos..];
            if markup.starts_with(b"<!--") {
                self.skip_past(b"-->", "comment")?;
            } else if markup.starts_with(b"<![CDATA[") {
                self.cdata()?;
            } else if markup.starts_with(b"<!") {
                self.doctype()?;
            } else if markup.starts_with(b"<?") {
                self.skip_past(b"?>", "processing instruction")?;
            } else if markup.starts_with(b"</") {
                self.end_tag()?;
            } else {
                self.start_tag()?;
            }
        }

        if let Some((_, name)) = self.open.last() {
            return Err(XmlError::UnexpectedEof(format!(
                "<{}>",
                String::from_utf8_lossy(name)
            )));
        }
        Ok(self.doc)
    }

    fn syntax(&self, message: impl Into<String>) -> XmlError {
        XmlError::Syntax {
            line: line_at(self.input, self.pos),
            message: message.into(),
        }
    }

    /// Attach a raw text run to the innermost open element
    fn text(&mut self, raw: &[u8]) {
        let raw = if self.options.trim_text {
            trim_xml_space(raw)
        } else {
            raw
        };
        if raw.is_empty() {
            return;
        }
        // Text outside the root element is ignored
        if let Some(&(parent, _)) = self.open.last() {
            let text = decode_entities(raw);
            self.doc.append_text(parent, &text);
        }
    }

    fn skip_past(&mut self, terminator: &[u8], what: &str) -> Result<(), XmlError> {
        match memmem::find(&self.input[self.pos..], terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(XmlError::UnexpectedEof(what.to_string())),
        }
    }

    fn cdata(&mut self) -> Result<(), XmlError> {
        let input = self.input;
        let start = self.pos + b"<![CDATA[".len();
        let Some(end) = memmem::find(&input[start..], b"]]>") else {
            return Err(XmlError::UnexpectedEof("CDATA section".to_string()));
        };
        let raw = &input[start..start + end];
        self.pos = start + end + 3;

        if let Some(&(parent, _)) = self.open.last() {
            let raw = if self.options.trim_text {
                trim_xml_space(raw)
            } else {
                raw
            };
            self.doc.append_text(parent, &String::from_utf8_lossy(raw));
        }
        Ok(())
    }

    /// Skip `<!DOCTYPE ...>`, including a bracketed internal subset
    fn doctype(&mut self) -> Result<(), XmlError> {
        let rest = &self.input[self.pos..];
        let Some(i) = memchr2(b'>', b'[', rest) else {
            return Err(XmlError::UnexpectedEof("DOCTYPE declaration".to_string()));
        };
        if rest[i] == b'>' {
            self.pos += i + 1;
            return Ok(());
        }
        self.pos += i;
        self.skip_past(b"]", "DOCTYPE internal subset")?;
        self.skip_past(b">", "DOCTYPE declaration")
    }

    fn name(&mut self) -> &'a [u8] {
        let input: &'a [u8] = self.input;
        let start = self.pos;
        let len = input[start..]
            .iter()
            .position(|b| !is_name_byte(*b))
            .unwrap_or(input.len() - start);
        self.pos += len;
        &input[start..start + len]
    }

    fn skip_space(&mut self) {
        while self.pos < self.input.len() && is_xml_space(self.input[self.pos]) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn start_tag(&mut self) -> Result<(), XmlError> {
        self.pos += 1; // '<'
        let name = self.name();
        if name.is_empty() {
            return Err(self.syntax("expected element name after '<'"));
        }

        let id = match self.open.last() {
            Some(&(parent, _)) => self
                .doc
                .append_element(parent, &String::from_utf8_lossy(name)),
            None if self.doc.is_empty() => self.doc.create_root(&String::from_utf8_lossy(name)),
            None => return Err(self.syntax("more than one root element")),
        };

        loop {
            self.skip_space();
            match self.peek() {
                None => return Err(XmlError::UnexpectedEof("start tag".to_string())),
                Some(b'>') => {
                    self.pos += 1;
                    self.open.push((id, name));
                    return Ok(());
                }
                Some(b'/') => {
                    if self.input.get(self.pos + 1) != Some(&b'>') {
                        return Err(self.syntax("expected '>' after '/'"));
                    }
                    self.pos += 2;
                    return Ok(());
                }
                Some(_) => self.attribute(id)?,
            }
        }
    }

    fn attribute(&mut self, node: NodeId) -> Result<(), XmlError> {
        let name = self.name();
        if name.is_empty() {
            return Err(self.syntax("expected attribute name"));
        }
        self.skip_space();
        if self.peek() != Some(b'=') {
            return Err(self.syntax(format!(
                "expected '=' after attribute {}",
                String::from_utf8_lossy(name)
            )));
        }
        self.pos += 1;
        self.skip_space();

        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            None => return Err(XmlError::UnexpectedEof("attribute value".to_string())),
            Some(_) => return Err(self.syntax("attribute value must be quoted")),
        };
        self.pos += 1;
        let input = self.input;
        let Some(len) = memchr(quote, &input[self.pos..]) else {
            return Err(XmlError::UnexpectedEof("attribute value".to_string()));
        };
        let raw = &input[self.pos..self.pos + len];
        self.pos += len + 1;

        let value = decode_entities(raw);
        self.doc
            .set_attribute(node, &String::from_utf8_lossy(name), &value);
        Ok(())
    }

    fn end_tag(&mut self) -> Result<(), XmlError> {
        self.pos += 2; // "</"
        let name = self.name();
        self.skip_space();
        if self.peek() != Some(b'>') {
            return Err(match self.peek() {
                None => XmlError::UnexpectedEof("end tag".to_string()),
                Some(_) => self.syntax("expected '>' to close end tag"),
            });
        }
        self.pos += 1;

        match self.open.pop() {
            Some((_, expected)) if expected == name => Ok(()),
            Some((_, expected)) => Err(XmlError::MismatchedTag {
                line: line_at(self.input, self.pos),
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: String::from_utf8_lossy(name).into_owned(),
            }),
            None => Err(self.syntax(format!(
                "unexpected end tag </{}>",
                String::from_utf8_lossy(name)
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_document() {
        let doc = parse_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<report>
  <row status="open"><id>1</id><name>Ada</name></row>
  <row><id>2</id><name>Grace</name></row>
</report>"#,
        )
        .unwrap();

        let root = doc.root().unwrap();
        assert_eq!(doc.name(root), "report");

        let rows: Vec<_> = doc.children(root).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(doc.attribute(rows[0], "status"), Some("open"));
        assert_eq!(doc.attribute(rows[1], "status"), None);
        assert_eq!(doc.text_content(rows[1]), "2Grace");
    }

    #[test]
    fn test_whitespace_text_is_kept_by_default() {
        let doc = parse_str("<a>\n  <b>x</b>\n</a>").unwrap();
        assert_eq!(doc.text_content(doc.root().unwrap()), "\n  x\n");

        let reader = XmlReader::new(ReaderOptions { trim_text: true });
        let doc = reader.parse_str("<a>\n  <b> x </b>\n</a>").unwrap();
        assert_eq!(doc.text_content(doc.root().unwrap()), "x");
    }

    #[test]
    fn test_entities_cdata_comments() {
        let doc = parse_str(
            "<!DOCTYPE a [ <!ENTITY e \"x\"> ]><a t='1 &lt; 2'>x &amp; y<!-- skip --><![CDATA[<raw> &amp;]]></a>",
        )
        .unwrap();
        let root = doc.root().unwrap();

        assert_eq!(doc.attribute(root, "t"), Some("1 < 2"));
        assert_eq!(doc.text_content(root), "x & y<raw> &amp;");
    }

    #[test]
    fn test_self_closing_and_namespaced() {
        let doc = parse_str(r#"<ns:feed xmlns:ns="urn:x"><ns:entry id="7"/><ns:entry /></ns:feed>"#)
            .unwrap();
        let root = doc.root().unwrap();

        assert_eq!(doc.name(root), "ns:feed");
        let entries: Vec<_> = doc.children(root).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(doc.name(entries[0]), "ns:entry");
        assert_eq!(doc.attribute(entries[0], "id"), Some("7"));
    }

    #[test]
    fn test_empty_input_gives_empty_document() {
        assert!(parse_str("").unwrap().is_empty());
        assert!(parse_str("  <!-- nothing -->\n").unwrap().is_empty());
    }

    #[test]
    fn test_bom_is_skipped() {
        let doc = XmlReader::default()
            .parse_bytes(b"\xEF\xBB\xBF<a>x</a>")
            .unwrap();
        assert_eq!(doc.name(doc.root().unwrap()), "a");
    }

    #[test]
    fn test_mismatched_tag() {
        let err = parse_str("<a>\n<b></c></a>").unwrap_err();
        match err {
            XmlError::MismatchedTag {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 2);
                assert_eq!(expected, "b");
                assert_eq!(found, "c");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_str("<a><b></a>").unwrap_err(),
            XmlError::MismatchedTag { .. }
        ));
        assert!(matches!(
            parse_str("<a>").unwrap_err(),
            XmlError::UnexpectedEof(_)
        ));
        assert!(matches!(
            parse_str("<a x=1/>").unwrap_err(),
            XmlError::Syntax { .. }
        ));
        assert!(matches!(
            parse_str("<a/><b/>").unwrap_err(),
            XmlError::Syntax { .. }
        ));
        assert!(matches!(
            parse_str("</a>").unwrap_err(),
            XmlError::Syntax { .. }
        ));
        assert!(matches!(
            parse_str("<a x=\"1>").unwrap_err(),
            XmlError::UnexpectedEof(_)
        ));
    }

    #[test]
    fn test_read_file_and_gzip() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let dir = tempfile::tempdir().unwrap();
        let xml = "<report><row><id>1</id></row></report>";

        let plain = dir.path().join("doc.xml");
        std::fs::write(&plain, xml).unwrap();
        let doc = read_file(&plain).unwrap();
        assert_eq!(doc.nodes.len(), 3);

        let gz = dir.path().join("doc.xml.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        encoder.finish().unwrap();
        let doc = read_file(&gz).unwrap();
        assert_eq!(doc.nodes.len(), 3);

        assert!(matches!(
            read_file(dir.path().join("missing.xml")),
            Err(XmlError::FileOpen { .. })
        ));
    }
}
