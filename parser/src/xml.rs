//! Header XML reading.
//!
//! Two parse paths produce the same owned [`Document`] model. Version 3.0
//! headers already follow canonical XML conventions and are read
//! directly. Legacy version 2.2 headers encode typed name/value pairs as
//! attributes of a single `<properties>` element, which no schema can
//! describe; [`parse_legacy_header`] rewrites that element on the fly:
//!
//! ```text
//! <properties Datum:xTagWidth="128.000000 s" sourceId="from_das1"/>
//! ```
//!
//! becomes, as if the following had been read,
//!
//! ```text
//! <properties>
//!   <p name="xTagWidth" type="Datum">128.000000 s</p>
//!   <p name="sourceId">from_das1</p>
//! </properties>
//! ```
//!
//! The source line of the original `<properties>` element is carried onto
//! every synthesized `<p>` child so that downstream schema diagnostics
//! keep pointing at real input lines.
use das2_core::xml::{Document, Element};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

/// An error reading a header document.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The header content is not text.
    #[snafu(display("Header content is not valid UTF-8 text"))]
    BadUtf8 {
        source: std::str::Utf8Error,
        backtrace: Backtrace,
    },
    /// The header content is not well formed XML.
    #[snafu(display("Malformed header XML at line {}", line))]
    Syntax {
        line: u32,
        source: quick_xml::Error,
        backtrace: Backtrace,
    },
    /// An element carries a malformed attribute list.
    #[snafu(display("Malformed attribute list at line {}", line))]
    Attributes {
        line: u32,
        source: quick_xml::events::attributes::AttrError,
        backtrace: Backtrace,
    },
    /// A legacy property attribute key is not in `Name` or `Type:Name`
    /// form.
    #[snafu(display("Malformed property attribute `{}` at line {}", key, line))]
    MalformedProperty {
        key: String,
        line: u32,
        backtrace: Backtrace,
    },
    /// A literal `<p>` element appeared in a legacy header, where only
    /// synthesized ones are admissible.
    #[snafu(display("Unexpected element `p` at line {}", line))]
    UnexpectedElement { line: u32, backtrace: Backtrace },
    /// The content ended without a root element.
    #[snafu(display("Header document has no root element"))]
    EmptyDocument { backtrace: Backtrace },
}

/// Type alias for a result from this module.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Parse a version 3.0 header document.
pub fn parse_header(content: &[u8]) -> Result<Document> {
    let text = std::str::from_utf8(content).context(BadUtf8Snafu)?;
    parse_with(text, false)
}

/// Parse a legacy version 2.2 header document,
/// normalizing attribute-form `<properties>` elements into `<p>` children.
pub fn parse_legacy_header(content: &[u8]) -> Result<Document> {
    let text = std::str::from_utf8(content).context(BadUtf8Snafu)?;
    parse_with(text, true)
}

fn parse_with(text: &str, normalize: bool) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    // whitespace-only character data never reaches the tree,
    // consistent with the legacy emitter
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let checkpoint = reader.buffer_position();
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let line = line_at(text, reader.error_position());
                return Err(e).context(SyntaxSnafu { line });
            }
        };
        match event {
            Event::Start(start) => {
                let line = line_at(text, reader.buffer_position());
                stack.push(open_element(&start, line, normalize)?);
            }
            Event::Empty(start) => {
                let line = line_at(text, reader.buffer_position());
                let element = open_element(&start, line, normalize)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(data) => {
                let line = line_at(text, checkpoint);
                let decoded = data
                    .decode()
                    .map_err(quick_xml::Error::from)
                    .context(SyntaxSnafu { line })?;
                let data = quick_xml::escape::unescape(&decoded)
                    .map(|s| s.into_owned())
                    .map_err(quick_xml::Error::from)
                    .context(SyntaxSnafu { line })?;
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(data.trim());
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(String::from_utf8_lossy(&data).trim());
                }
            }
            Event::Eof => break,
            // declarations, comments and processing instructions
            // do not contribute to the tree
            _ => {}
        }
    }

    Ok(Document::new(root.context(EmptyDocumentSnafu)?))
}

fn open_element(start: &BytesStart<'_>, line: u32, normalize: bool) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    if normalize {
        // don't let the stream itself contain `p` elements
        ensure!(name != "p", UnexpectedElementSnafu { line });
        if name == "properties" {
            return normalized_properties(start, line);
        }
    }

    let mut element = Element::new(name, line);
    for attr in start.attributes() {
        let attr = attr.context(AttributesSnafu { line })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().context(SyntaxSnafu { line })?;
        element.push_attr(key, value.into_owned());
    }
    Ok(element)
}

/// Break the legacy property attributes out into `<p>` sub-elements.
fn normalized_properties(start: &BytesStart<'_>, line: u32) -> Result<Element> {
    let mut properties = Element::new("properties", line);
    for attr in start.attributes() {
        let attr = attr.context(AttributesSnafu { line })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().context(SyntaxSnafu { line })?;

        let mut p = Element::new("p", line);
        if key.contains(':') {
            let parts: Vec<_> = key.split(':').map(str::trim).collect();
            ensure!(
                parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty(),
                MalformedPropertySnafu { key: &*key, line }
            );
            p.push_attr("name", parts[1]);
            // strings are the default datum kind, drop the prefix
            if parts[0] != "String" {
                p.push_attr("type", parts[0]);
            }
        } else {
            p.push_attr("name", key);
        }
        p.push_text(value.trim());
        properties.push_element(p);
    }
    Ok(properties)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.push_element(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

fn line_at(text: &str, position: u64) -> u32 {
    let end = (position as usize).min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_property_attributes() {
        let content = b"<stream>\n  <properties Datum:xTagWidth=\"128.000000 s\"\n     double:zFill=\"-1.000000e+31\" sourceId=\"from_das1\"/>\n</stream>";
        let doc = parse_legacy_header(content).unwrap();

        let properties = doc.root().child("properties").unwrap();
        assert!(properties.attributes().is_empty());
        let ps: Vec<_> = properties.children().collect();
        assert_eq!(ps.len(), 3);

        assert_eq!(ps[0].attr("name"), Some("xTagWidth"));
        assert_eq!(ps[0].attr("type"), Some("Datum"));
        assert_eq!(ps[0].text(), "128.000000 s");

        assert_eq!(ps[1].attr("name"), Some("zFill"));
        assert_eq!(ps[1].attr("type"), Some("double"));
        assert_eq!(ps[1].text(), "-1.000000e+31");

        // strings are the default, no type attribute
        assert_eq!(ps[2].attr("name"), Some("sourceId"));
        assert_eq!(ps[2].attr("type"), None);
        assert_eq!(ps[2].text(), "from_das1");
    }

    #[test]
    fn properties_line_is_carried_onto_children() {
        let content = b"<stream>\n\n  <properties a=\"1\" b=\"2\"/>\n</stream>";
        let doc = parse_legacy_header(content).unwrap();
        let properties = doc.root().child("properties").unwrap();
        assert_eq!(properties.line(), 3);
        for p in properties.children() {
            assert_eq!(p.line(), 3);
        }
    }

    #[test]
    fn string_type_prefix_is_elided() {
        let doc = parse_legacy_header(b"<properties String:label=\"Voltage\"/>").unwrap();
        let p = doc.root().children().next().unwrap();
        assert_eq!(p.attr("name"), Some("label"));
        assert_eq!(p.attr("type"), None);
        assert_eq!(p.text(), "Voltage");
    }

    #[test]
    fn malformed_property_keys_are_rejected() {
        for content in [
            &b"<properties a:b:c=\"1\"/>"[..],
            &b"<properties :name=\"1\"/>"[..],
        ] {
            assert!(matches!(
                parse_legacy_header(content),
                Err(Error::MalformedProperty { .. })
            ));
        }
    }

    #[test]
    fn literal_p_element_is_rejected() {
        let content = b"<stream><properties a=\"1\"/><p name=\"fake\">x</p></stream>";
        assert!(matches!(
            parse_legacy_header(content),
            Err(Error::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn canonical_input_passes_through_unchanged() {
        // a tree with no attribute-form properties normalizes to itself
        let content = b"<stream>\n  <x units=\"s\">2012-01-01</x>\n</stream>";
        let direct = parse_header(content).unwrap();
        let normalized = parse_legacy_header(content).unwrap();
        assert_eq!(direct, normalized);
    }

    #[test]
    fn character_data_is_trimmed() {
        let doc = parse_header(b"<comment>\n   watch out   \n</comment>").unwrap();
        assert_eq!(doc.root().text(), "watch out");
    }

    #[test]
    fn non_utf8_content_is_rejected() {
        assert!(matches!(
            parse_header(&[b'<', 0xFF, 0xFE, b'>']),
            Err(Error::BadUtf8 { .. })
        ));
    }

    #[test]
    fn malformed_xml_is_a_syntax_error() {
        let err = parse_header(b"<stream \n  id=\"1").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn empty_content_has_no_root() {
        assert!(matches!(
            parse_header(b"   "),
            Err(Error::EmptyDocument { .. })
        ));
    }
}
