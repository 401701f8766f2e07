//! The canonical response envelope and its JSON/XML forms.
//!
//! XML text is written with every tab, newline and carriage return, and any
//! space at either end of a value, as a character reference. Readers trim
//! literal whitespace around text nodes; references survive, so messages read
//! back exactly as written. Characters XML 1.0 cannot carry are replaced with
//! U+FFFD.

use std::fmt::Write as _;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prolog written ahead of every XML envelope.
pub const XML_PROLOG: &str = "<?xml version='1.0' encoding='UTF-8'?>\n";

/// `Response` wrapper carried on both success and error paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Response")]
pub struct Envelope {
    #[serde(rename = "PoLineNumber", default, skip_serializing_if = "Option::is_none")]
    pub po_line_number: Option<String>,

    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "Code", default)]
    pub code: String,

    #[serde(rename = "Message", default)]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("JSON envelope error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML envelope error: {0}")]
    Xml(String),
}

impl Envelope {
    pub fn success(po_line_number: impl Into<String>) -> Self {
        Self {
            po_line_number: Some(po_line_number.into()),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            po_line_number: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Serialize as an XML document, prolog included.
    pub fn to_xml(&self) -> Result<String, EnvelopeError> {
        let mut writer = Writer::new(Vec::new());
        self.write_xml(&mut writer).map_err(|e| EnvelopeError::Xml(e.to_string()))?;
        let body = String::from_utf8(writer.into_inner()).map_err(|e| EnvelopeError::Xml(e.to_string()))?;
        Ok(format!("{XML_PROLOG}{body}"))
    }

    fn write_xml(&self, writer: &mut Writer<Vec<u8>>) -> std::io::Result<()> {
        writer.write_event(Event::Start(BytesStart::new("Response")))?;
        if let Some(po_line_number) = &self.po_line_number {
            write_text_element(writer, "PoLineNumber", po_line_number)?;
        }
        if let Some(error) = &self.error {
            writer.write_event(Event::Start(BytesStart::new("Error")))?;
            write_text_element(writer, "Code", &error.code)?;
            write_text_element(writer, "Message", &error.message)?;
            writer.write_event(Event::End(BytesEnd::new("Error")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Response")))
    }

    pub fn from_xml(input: &str) -> Result<Self, EnvelopeError> {
        quick_xml::de::from_str(input).map_err(|e| EnvelopeError::Xml(e.to_string()))
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::from_escaped(escape_text(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

/// Escape `text` for an element body so that it reads back unchanged.
fn escape_text(text: &str) -> String {
    let leading = text.len() - text.trim_start_matches(' ').len();
    let trailing = text.trim_end_matches(' ').len().max(leading);

    let mut escaped = String::with_capacity(text.len());
    for (at, c) in text.char_indices() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            ' ' if at < leading || at >= trailing => escaped.push_str("&#x20;"),
            '\t' | '\n' | '\r' => {
                let _ = write!(escaped, "&#x{:X};", u32::from(c));
            }
            c if is_xml_char(c) => escaped.push(c),
            _ => escaped.push(char::REPLACEMENT_CHARACTER),
        }
    }
    escaped
}

/// Characters allowed in XML 1.0 content, other than tab, newline and carriage return.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}
