//! XML alert documents.
//!
//! Documents are parsed into a small element tree. Lookups go by local name,
//! so `<ns:eventType>` and `<eventType>` are the same field.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{DecodeError, Result};
use crate::event::{is_target_pair, DecodedEvent, FrameEncoding};

/// One parsed element: local name, concatenated text, children in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(local: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(local).into_owned(),
            ..Self::default()
        }
    }

    /// First element with local name `name`, depth-first in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Trimmed text of the first `name` element, if it has any.
    pub fn find_text(&self, name: &str) -> Option<&str> {
        self.find(name)
            .map(|el| el.text.trim())
            .filter(|text| !text.is_empty())
    }
}

/// Parse one document into an element tree.
///
/// Truncated documents, mismatched end tags and input without a root
/// element fail with [`DecodeError::MalformedMarkup`].
pub fn parse_tree(body: &str) -> Result<Element> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Element::named(start.local_name().as_ref())),
            Ok(Event::Empty(empty)) => {
                attach(&mut stack, &mut root, Element::named(empty.local_name().as_ref()));
            }
            Ok(Event::End(_)) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| DecodeError::MalformedMarkup("unexpected end tag".into()))?;
                attach(&mut stack, &mut root, done);
            }
            Ok(Event::Text(text)) => {
                if let Some(open) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|err| malformed(reader.buffer_position(), err))?;
                    open.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(malformed(reader.buffer_position(), err)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(DecodeError::MalformedMarkup(format!(
            "document ends inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| DecodeError::MalformedMarkup("no root element".into()))
}

/// Decode an XML alert body.
pub(crate) fn decode(body: &str) -> Result<DecodedEvent> {
    let root = parse_tree(body)?;

    let event_type = root
        .find_text("eventType")
        .ok_or(DecodeError::MissingClassification)?;
    let minor = root
        .find_text("minorEventType")
        .or_else(|| root.find_text("subEventType"));

    let code = match minor {
        Some(minor) => format!("{event_type}/{minor}"),
        None => event_type.to_string(),
    };

    if !is_target_pair(event_type, minor) {
        return Ok(DecodedEvent::rejected(FrameEncoding::Markup, code));
    }

    let name = root.find_text("name").map(str::to_string);
    let id = root
        .find_text("employeeNoString")
        .or_else(|| root.find_text("employeeNo"))
        .map(str::to_string);

    let serial = root.find_text("serialNo").map(str::to_string);

    Ok(DecodedEvent::matched(FrameEncoding::Markup, code, name, id).with_serial_no(serial))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        // Trailing siblings of the root are ignored.
        None if root.is_none() => *root = Some(element),
        None => {}
    }
}

fn malformed(position: impl std::fmt::Display, err: quick_xml::Error) -> DecodeError {
    DecodeError::MalformedMarkup(format!("at byte {position}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATCH: &str = "<EventNotificationAlert><eventType>AccessControlEvent</eventType><minorEventType>75</minorEventType><name>John</name><employeeNoString>7</employeeNoString></EventNotificationAlert>";

    #[test]
    fn parses_nested_tree_by_local_name() {
        let root = parse_tree(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <isapi:EventNotificationAlert xmlns:isapi="http://www.isapi.org/ver20/XMLSchema">
                <isapi:eventType>AccessControllerEvent</isapi:eventType>
                <AccessControllerEvent>
                    <subEventType>75</subEventType>
                    <name><![CDATA[Ana & Co]]></name>
                    <picture/>
                </AccessControllerEvent>
            </isapi:EventNotificationAlert>"#,
        )
        .unwrap();

        assert_eq!(root.name, "EventNotificationAlert");
        assert_eq!(root.find_text("eventType"), Some("AccessControllerEvent"));
        assert_eq!(root.find_text("subEventType"), Some("75"));
        assert_eq!(root.find_text("name"), Some("Ana & Co"));
        assert!(root.find("picture").is_some());
        assert_eq!(root.find_text("picture"), None);
    }

    #[test]
    fn unescapes_entities() {
        let root = parse_tree("<a><name>R&amp;D</name></a>").unwrap();
        assert_eq!(root.find_text("name"), Some("R&D"));
    }

    #[test]
    fn truncated_document_is_malformed() {
        let cut = &MATCH[..MATCH.len() - 30];
        assert!(matches!(parse_tree(cut), Err(DecodeError::MalformedMarkup(_))));
    }

    #[test]
    fn mismatched_end_tag_is_malformed() {
        let err = parse_tree("<a><b>x</c></a>").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedMarkup(_)));
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(matches!(parse_tree("  "), Err(DecodeError::MalformedMarkup(_))));
    }

    #[test]
    fn decodes_target_document() {
        let event = decode(MATCH).unwrap();

        assert!(event.is_target_event);
        assert_eq!(event.encoding, FrameEncoding::Markup);
        assert_eq!(event.classification_code, "AccessControlEvent/75");
        assert_eq!(event.identity_name.as_deref(), Some("John"));
        assert_eq!(event.identity_id.as_deref(), Some("7"));
        assert!(event.serial_no.is_none());
    }

    #[test]
    fn serial_number_is_read_when_present() {
        let doc = MATCH.replace("<name>", "<serialNo>901</serialNo><name>");
        assert_eq!(decode(&doc).unwrap().serial_no.as_deref(), Some("901"));
    }

    #[test]
    fn other_minor_code_is_rejected_without_identity() {
        let doc = MATCH.replace("<minorEventType>75<", "<minorEventType>76<");
        let event = decode(&doc).unwrap();

        assert!(!event.is_target_event);
        assert_eq!(event.classification_code, "AccessControlEvent/76");
        assert!(event.identity_name.is_none());
        assert!(event.identity_id.is_none());
    }

    #[test]
    fn employee_no_is_the_fallback_id() {
        let doc = "<EventNotificationAlert><eventType>AccessControlEvent</eventType><minorEventType>75</minorEventType><employeeNo>42</employeeNo></EventNotificationAlert>";
        let event = decode(doc).unwrap();

        assert_eq!(event.identity_id.as_deref(), Some("42"));
        assert!(event.identity_name.is_none());
    }

    #[test]
    fn missing_event_type_is_reported() {
        let err = decode("<EventNotificationAlert><name>x</name></EventNotificationAlert>").unwrap_err();
        assert!(matches!(err, DecodeError::MissingClassification));
    }
}
