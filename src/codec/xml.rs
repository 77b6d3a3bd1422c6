//! XML tree codec
//!
//! Records are written under a synthetic root element. Keys that are purely
//! numeric (sequence positions) become `<item>` elements, nested records and
//! lists become child elements, and scalar text is escaped. Decoding reverses
//! this: each child of the root is a record, repeated child names collapse
//! into a list, and an element whose children are all `<item>` is read back
//! as a list. Positional indices are not recoverable, only their order.
//!
//! Leaf text is kept exactly as written, surrounding whitespace included.
//! Whitespace between child elements is indentation and is dropped. An empty
//! list has no `<item>` children to tell it apart from empty text, so it
//! encodes as an empty element and decodes as empty text.

use std::io::Write;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::config::{Config, Format};
use crate::error::{ConvertError, Result};
use crate::model::{CellValue, Record, RecordSet};

use super::Codec;

/// Tag used in place of numeric keys
pub const ITEM_TAG: &str = "item";

/// Key under which element attributes are kept
pub const ATTRIBUTES_KEY: &str = "@attributes";

/// Codec for XML documents
pub struct XmlCodec;

impl Codec for XmlCodec {
    fn format(&self) -> Format {
        Format::Xml
    }

    fn decode(&self, text: &str, _config: &Config) -> Result<RecordSet> {
        decode(text)
    }

    fn encode(&self, records: &RecordSet, config: &Config) -> Result<String> {
        encode_with(records, &config.xml_root, config.xml_indent)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "xml")
    }
}

/// An element tree, built in full before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    content: Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Empty,
    Text(String),
    Children(Vec<Element>),
}

impl Element {
    fn new(name: String, content: Content) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            content,
        }
    }
}

/// Encode records under a `<root>` element with two-space indentation.
pub fn encode(records: &RecordSet) -> Result<String> {
    encode_with(records, "root", 2)
}

fn encode_with(records: &RecordSet, root: &str, indent: usize) -> Result<String> {
    if !is_valid_element_name(root) {
        return Err(ConvertError::InvalidElementName(root.to_string()));
    }

    let children = records
        .iter()
        .enumerate()
        .map(|(idx, record)| build_record_element(&idx.to_string(), record))
        .collect::<Result<Vec<_>>>()?;
    let content = if children.is_empty() {
        Content::Empty
    } else {
        Content::Children(children)
    };
    let tree = Element::new(root.to_string(), content);

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
        .map_err(ConvertError::markup)?;
    write_element(&mut writer, &tree)?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    tracing::debug!(rows = records.len(), bytes = out.len(), "encoded XML document");
    String::from_utf8(out).map_err(ConvertError::markup)
}

/// Element name for a record key
fn tag_for(key: &str) -> Result<String> {
    if is_numeric_key(key) {
        Ok(ITEM_TAG.to_string())
    } else if is_valid_element_name(key) {
        Ok(key.to_string())
    } else {
        Err(ConvertError::InvalidElementName(key.to_string()))
    }
}

fn build_record_element(key: &str, record: &Record) -> Result<Element> {
    let mut element = Element::new(tag_for(key)?, Content::Empty);
    let mut children = Vec::new();

    for (k, v) in record.iter() {
        match (k, v) {
            (ATTRIBUTES_KEY, CellValue::Record(attrs)) => {
                for (name, value) in attrs.iter() {
                    if !is_valid_element_name(name) {
                        return Err(ConvertError::InvalidElementName(name.to_string()));
                    }
                    element
                        .attributes
                        .push((name.to_string(), value.flatten().unwrap_or_default()));
                }
            }
            _ => children.push(build_element(k, v)?),
        }
    }

    if !children.is_empty() {
        element.content = Content::Children(children);
    }
    Ok(element)
}

fn build_element(key: &str, value: &CellValue) -> Result<Element> {
    match value {
        CellValue::Null => Ok(Element::new(tag_for(key)?, Content::Empty)),
        CellValue::Text(s) if s.is_empty() => Ok(Element::new(tag_for(key)?, Content::Empty)),
        CellValue::Text(s) => Ok(Element::new(tag_for(key)?, Content::Text(s.clone()))),
        CellValue::List(items) => {
            let children = items
                .iter()
                .enumerate()
                .map(|(idx, item)| build_element(&idx.to_string(), item))
                .collect::<Result<Vec<_>>>()?;
            let content = if children.is_empty() {
                Content::Empty
            } else {
                Content::Children(children)
            };
            Ok(Element::new(tag_for(key)?, content))
        }
        CellValue::Record(record) => build_record_element(key, record),
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (name, value) in &element.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    match &element.content {
        Content::Empty => writer
            .write_event(Event::Empty(start))
            .map_err(ConvertError::markup)?,
        Content::Text(text) => {
            writer
                .write_event(Event::Start(start))
                .map_err(ConvertError::markup)?;
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(ConvertError::markup)?;
            writer
                .write_event(Event::End(BytesEnd::new(element.name.as_str())))
                .map_err(ConvertError::markup)?;
        }
        Content::Children(children) => {
            writer
                .write_event(Event::Start(start))
                .map_err(ConvertError::markup)?;
            for child in children {
                write_element(writer, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(element.name.as_str())))
                .map_err(ConvertError::markup)?;
        }
    }
    Ok(())
}

/// Decode an XML document whose root children are records.
pub fn decode(text: &str) -> Result<RecordSet> {
    let root = parse_tree(text)?;

    let records = match root.content {
        Content::Empty => Vec::new(),
        Content::Text(t) if t.trim().is_empty() => Vec::new(),
        Content::Text(_) => {
            return Err(ConvertError::MalformedMarkup(format!(
                "root element <{}> holds text instead of records",
                root.name
            )))
        }
        Content::Children(children) => children
            .into_iter()
            .map(record_from_element)
            .collect::<Result<Vec<_>>>()?,
    };

    tracing::debug!(rows = records.len(), "decoded XML document");
    Ok(RecordSet::new(records))
}

fn parse_tree(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ConvertError::MalformedMarkup(format!(
                "parse error at position {}: {}",
                reader.error_position(),
                e
            ))
        })?;

        match event {
            Event::Start(ref e) => stack.push(element_from_start(e)?),
            Event::Empty(ref e) => {
                let element = element_from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ConvertError::markup("unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(ConvertError::markup)?;
                push_text(&mut stack, &text);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConvertError::MalformedMarkup(format!(
            "element <{}> is never closed",
            open.name
        )));
    }
    root.ok_or_else(|| ConvertError::markup("document has no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name, Content::Empty);
    for attr in start.attributes() {
        let attr = attr.map_err(ConvertError::markup)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(ConvertError::markup)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            match &mut parent.content {
                Content::Children(children) => children.push(element),
                // Mixed content: child elements win over stray text
                content => *content = Content::Children(vec![element]),
            }
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ConvertError::markup("document has more than one root element")),
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    if let Some(parent) = stack.last_mut() {
        match &mut parent.content {
            Content::Empty => parent.content = Content::Text(text.to_string()),
            Content::Text(existing) => existing.push_str(text),
            Content::Children(_) => {}
        }
    }
}

fn record_from_element(element: Element) -> Result<Record> {
    let mut record = Record::new();
    if !element.attributes.is_empty() {
        record.insert(ATTRIBUTES_KEY, attributes_record(&element.attributes));
    }

    match element.content {
        Content::Empty => {}
        Content::Text(t) if t.trim().is_empty() => {}
        Content::Text(_) => {
            return Err(ConvertError::MalformedMarkup(format!(
                "record element <{}> holds text instead of fields",
                element.name
            )))
        }
        Content::Children(children) => {
            for (name, value) in group_children(children) {
                record.insert(name, value);
            }
        }
    }
    Ok(record)
}

/// Group children by name, keeping first-seen order. Repeated names become a
/// list.
fn group_children(children: Vec<Element>) -> IndexMap<String, CellValue> {
    let mut grouped: IndexMap<String, Vec<CellValue>> = IndexMap::new();
    for child in children {
        let name = child.name.clone();
        grouped.entry(name).or_default().push(element_value(child));
    }

    grouped
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                CellValue::List(values)
            };
            (name, value)
        })
        .collect()
}

fn element_value(element: Element) -> CellValue {
    match element.content {
        // Attributes on text-only elements are dropped
        Content::Text(text) => CellValue::Text(text),
        Content::Empty if element.attributes.is_empty() => CellValue::Text(String::new()),
        Content::Empty => {
            let mut record = Record::new();
            record.insert(ATTRIBUTES_KEY, attributes_record(&element.attributes));
            CellValue::Record(record)
        }
        Content::Children(children) => {
            if element.attributes.is_empty() && children.iter().all(|c| c.name == ITEM_TAG) {
                return CellValue::List(children.into_iter().map(element_value).collect());
            }
            let mut record = Record::new();
            if !element.attributes.is_empty() {
                record.insert(ATTRIBUTES_KEY, attributes_record(&element.attributes));
            }
            for (name, value) in group_children(children) {
                record.insert(name, value);
            }
            CellValue::Record(record)
        }
    }
}

fn attributes_record(attributes: &[(String, String)]) -> Record {
    attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// Whether a key reads as a number, e.g. `0`, `-3`, `1.5`, `2e3`
fn is_numeric_key(key: &str) -> bool {
    let trimmed = key.trim_start();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    unsigned
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_digit() || b == b'.')
        && unsigned.parse::<f64>().is_ok()
}

/// Whether a string can be used as an element or attribute name. A single
/// namespace prefix (`dc:title`) is allowed.
fn is_valid_element_name(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_local_name(prefix) && is_valid_local_name(local),
        None => is_valid_local_name(name),
    }
}

fn is_valid_local_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_encode_layout() {
        let data = RecordSet::new(vec![
            record(&[("id", "1"), ("name", "Ann")]),
            record(&[("id", "2"), ("name", "Bo")]),
        ]);
        let expected = "<?xml version=\"1.0\"?>\n\
                        <root>\n  \
                          <item>\n    <id>1</id>\n    <name>Ann</name>\n  </item>\n  \
                          <item>\n    <id>2</id>\n    <name>Bo</name>\n  </item>\n\
                        </root>\n";
        assert_eq!(encode(&data).unwrap(), expected);
    }

    #[test]
    fn test_encode_escapes_text() {
        let data = RecordSet::new(vec![record(&[("expr", "a < b & \"c\"")])]);
        let xml = encode(&data).unwrap();
        assert!(xml.contains("<expr>a &lt; b &amp; "), "got: {xml}");
        assert_eq!(decode(&xml).unwrap(), data);
    }

    #[test]
    fn test_encode_list_uses_item_tags() {
        let mut r = Record::new();
        r.insert("id", "1");
        r.insert(
            "tags",
            CellValue::List(vec!["x".into(), "y".into(), "z".into()]),
        );
        let data = RecordSet::new(vec![r]);
        let xml = encode(&data).unwrap();
        assert!(xml.contains("<tags>\n      <item>x</item>\n      <item>y</item>\n      <item>z</item>\n    </tags>"), "got: {xml}");

        let back = decode(&xml).unwrap();
        assert_eq!(
            back.records()[0].get("tags"),
            Some(&CellValue::List(vec!["x".into(), "y".into(), "z".into()]))
        );
    }

    #[test]
    fn test_numeric_record_keys_become_item() {
        let data = RecordSet::new(vec![record(&[("0", "a"), ("1", "b")])]);
        let xml = encode(&data).unwrap();
        assert!(xml.contains("<item>a</item>"));
        assert!(xml.contains("<item>b</item>"));
    }

    #[test]
    fn test_invalid_element_name() {
        let data = RecordSet::new(vec![record(&[("first name", "Ann")])]);
        assert!(matches!(
            encode(&data).unwrap_err(),
            ConvertError::InvalidElementName(name) if name == "first name"
        ));
    }

    #[test]
    fn test_empty_set_is_empty_root() {
        let xml = encode(&RecordSet::default()).unwrap();
        assert_eq!(xml, "<?xml version=\"1.0\"?>\n<root/>\n");
        assert!(decode(&xml).unwrap().is_empty());
    }

    #[test]
    fn test_decode_nested_and_repeated() {
        let xml = r#"<?xml version="1.0"?>
            <people>
              <person id="7">
                <name>Ann</name>
                <phone>1</phone>
                <phone>2</phone>
                <address><city>Oslo</city></address>
                <note><![CDATA[<raw>]]></note>
              </person>
            </people>"#;
        let data = decode(xml).unwrap();
        assert_eq!(data.len(), 1);
        let person = &data.records()[0];

        assert_eq!(
            person.keys().collect::<Vec<_>>(),
            [ATTRIBUTES_KEY, "name", "phone", "address", "note"]
        );
        assert_eq!(
            person.get(ATTRIBUTES_KEY),
            Some(&CellValue::Record(record(&[("id", "7")])))
        );
        assert_eq!(
            person.get("phone"),
            Some(&CellValue::List(vec!["1".into(), "2".into()]))
        );
        assert_eq!(
            person.get("address"),
            Some(&CellValue::Record(record(&[("city", "Oslo")])))
        );
        assert_eq!(person.get("note"), Some(&CellValue::from("<raw>")));
    }

    #[test]
    fn test_attributes_round_trip() {
        let data = decode(r#"<root><row id="7"><v>x</v></row></root>"#).unwrap();
        let xml = encode(&data).unwrap();
        assert!(xml.contains("<item id=\"7\">"), "got: {xml}");
        assert_eq!(decode(&xml).unwrap(), data);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode("<root><a></root>").unwrap_err(),
            ConvertError::MalformedMarkup(_)
        ));
        assert!(matches!(
            decode("<root>just text</root>").unwrap_err(),
            ConvertError::MalformedMarkup(_)
        ));
        assert!(matches!(
            decode("").unwrap_err(),
            ConvertError::MalformedMarkup(_)
        ));
    }

    #[test]
    fn test_leaf_whitespace_round_trip() {
        let data = RecordSet::new(vec![record(&[("name", "  Ann  "), ("pad", "   ")])]);
        let xml = encode(&data).unwrap();
        assert!(xml.contains("<name>  Ann  </name>"), "got: {xml}");
        assert_eq!(decode(&xml).unwrap(), data);
    }

    #[test]
    fn test_indentation_between_elements_is_dropped() {
        let xml = "<root>\n  <row>\n    <a> 1</a>\n    <b/>\n  </row>\n</root>\n";
        let data = decode(xml).unwrap();
        assert_eq!(data.records()[0], record(&[("a", " 1"), ("b", "")]));
        assert!(decode("<root>\n</root>").unwrap().is_empty());
    }

    #[test]
    fn test_empty_list_decodes_as_empty_text() {
        let mut r = Record::new();
        r.insert("tags", CellValue::List(Vec::new()));
        let xml = encode(&RecordSet::new(vec![r])).unwrap();
        assert!(xml.contains("<tags/>"), "got: {xml}");
        assert_eq!(
            decode(&xml).unwrap().records()[0].get("tags"),
            Some(&CellValue::from(""))
        );
    }

    #[test]
    fn test_prefixed_names_round_trip() {
        let data = decode(r#"<root><row xml:lang="en"><dc:title>x</dc:title></row></root>"#).unwrap();
        let xml = encode(&data).unwrap();
        assert!(xml.contains("<dc:title>x</dc:title>"), "got: {xml}");
        assert!(xml.contains("xml:lang=\"en\""), "got: {xml}");
        assert!(!is_valid_element_name("a:b:c"));
        assert!(!is_valid_element_name(":a"));
    }

    #[test]
    fn test_is_numeric_key() {
        assert!(is_numeric_key("0"));
        assert!(is_numeric_key("12"));
        assert!(is_numeric_key("-3"));
        assert!(is_numeric_key("1.5"));
        assert!(!is_numeric_key("id"));
        assert!(!is_numeric_key("inf"));
        assert!(!is_numeric_key(""));
        assert!(!is_numeric_key("1a"));
    }
}
