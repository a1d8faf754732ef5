//! A minimal structural reader for the S-Program document format. This sits
//! on top of quick-xml's event stream and produces a plain element tree,
//! with a [Span] on every element so that the parser and validator can
//! report positioned errors.

use crate::{
    consts::EL_PROGRAM,
    error::CompileError,
    util::Span,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// One element of the document: name, attributes, direct children, and the
/// concatenated text content.
#[derive(Clone, Debug, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<Element>,
    pub text: String,
    pub span: Span,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Direct children with the given element name, in document order.
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// The first direct child with the given element name, if any.
    pub fn child_named<'a>(&'a self, name: &'a str) -> Option<&'a Element> {
        self.children_named(name).next()
    }
}

/// Read a document into its root element. Returns the first structural
/// problem encountered, positioned at the offending byte.
pub(crate) fn parse_document(
    src: &str,
) -> Result<Element, (CompileError, Span)> {
    let mut reader = Reader::from_str(src);
    {
        let config = reader.config_mut();
        config.trim_text_start = true;
        config.trim_text_end = true;
    }

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut last_pos: usize = 0;
    loop {
        let event = reader
            .read_event()
            .map_err(|err| syntax_error(src, last_pos, &err.to_string()))?;
        let pos = reader.buffer_position() as usize;
        match event {
            Event::Start(start) => {
                stack.push(element_from(src, last_pos, pos, &start)?);
            }
            Event::Empty(start) => {
                let element = element_from(src, last_pos, pos, &start)?;
                attach(&mut stack, &mut root, element, src, pos)?;
            }
            Event::End(_) => {
                // Mismatched closing tags are caught by quick-xml itself;
                // a spare closing tag leaves the stack empty here.
                let element = stack.pop().ok_or_else(|| {
                    syntax_error(src, last_pos, "unexpected closing tag")
                })?;
                attach(&mut stack, &mut root, element, src, pos)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let value = text.unescape().map_err(|err| {
                        syntax_error(src, last_pos, &err.to_string())
                    })?;
                    parent.text.push_str(&value);
                }
            }
            Event::Eof => break,
            // Declarations, comments, CDATA and processing instructions are
            // irrelevant to the program schema
            _ => {}
        }
        last_pos = pos;
    }

    if !stack.is_empty() {
        return Err(syntax_error(src, src.len(), "unclosed element"));
    }
    root.ok_or_else(|| {
        (
            CompileError::MissingElement {
                expected: EL_PROGRAM,
            },
            Span::from_offset(src, 0, 0),
        )
    })
}

/// Build an element from a start tag. `from`/`to` bound the raw bytes the
/// event was read from; the span starts at the `<` within that window.
fn element_from(
    src: &str,
    from: usize,
    to: usize,
    start: &BytesStart<'_>,
) -> Result<Element, (CompileError, Span)> {
    let window = &src[from.min(src.len())..to.min(src.len())];
    let offset = from + window.find('<').unwrap_or(0);
    let span = Span::from_offset(src, offset, to.saturating_sub(offset));

    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = HashMap::new();
    for attr in start.attributes() {
        let attr =
            attr.map_err(|err| syntax_error(src, offset, &err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| syntax_error(src, offset, &err.to_string()))?
            .into_owned();
        attributes.insert(key, value);
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
        span,
    })
}

/// Attach a completed element to its parent, or make it the root.
fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    element: Element,
    src: &str,
    pos: usize,
) -> Result<(), (CompileError, Span)> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(syntax_error(src, pos, "multiple root elements")),
    }
}

fn syntax_error(
    src: &str,
    offset: usize,
    detail: &str,
) -> (CompileError, Span) {
    (
        CompileError::Syntax {
            detail: detail.into(),
        },
        Span::from_offset(src, offset, 0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_document() {
        let doc = parse_document(
            r#"<S-Program name="p">
  <S-Instructions>
    <S-Instruction type="basic" name="INCREASE">
      <S-Variable>y</S-Variable>
    </S-Instruction>
  </S-Instructions>
</S-Program>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "S-Program");
        assert_eq!(doc.attr("name"), Some("p"));
        let instructions = doc.child_named("S-Instructions").unwrap();
        assert_eq!(instructions.children.len(), 1);
        let instruction = &instructions.children[0];
        assert_eq!(instruction.attr("type"), Some("basic"));
        assert_eq!(instruction.attr("name"), Some("INCREASE"));
        assert_eq!(
            instruction.child_named("S-Variable").unwrap().text.trim(),
            "y"
        );
        // The instruction element starts on line 3
        assert_eq!(instruction.span.start_line, 3);
    }

    #[test]
    fn test_empty_elements_and_escapes() {
        let doc = parse_document(
            r#"<S-Program name="a &amp; b"><S-Instructions/></S-Program>"#,
        )
        .unwrap();
        assert_eq!(doc.attr("name"), Some("a & b"));
        assert!(doc.child_named("S-Instructions").unwrap().children.is_empty());
    }

    #[test]
    fn test_unclosed_element() {
        let err = parse_document("<S-Program><S-Instructions>").unwrap_err();
        assert!(matches!(err.0, CompileError::Syntax { .. }));
    }

    #[test]
    fn test_empty_document() {
        let err = parse_document("").unwrap_err();
        assert!(matches!(err.0, CompileError::MissingElement { .. }));
    }
}
