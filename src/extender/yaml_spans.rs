//! Source positions of scalars inside a YAML document.
//!
//! Lets the YAML codec rewrite single scalars in place, so comments,
//! quoting and indentation around them stay as written.

use crate::edit::Edit;
use crate::path::Step;
use serde_yaml::Value;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

#[derive(Debug)]
enum Node {
    Scalar {
        /// Character index of the first character, quote included
        start: usize,
        value: String,
        style: TScalarStyle,
    },
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
    Alias,
}

enum Frame {
    Sequence(Vec<Node>),
    /// Keys and values, alternating
    Mapping(Vec<Node>),
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    root: Option<Node>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::Sequence(items) | Frame::Mapping(items)) => items.push(node),
            // first document only
            None if self.root.is_none() => self.root = Some(node),
            None => {}
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, mark: Marker) {
        match event {
            Event::Scalar(value, style, ..) => self.push(Node::Scalar {
                start: mark.index(),
                value,
                style,
            }),
            Event::Alias(..) => self.push(Node::Alias),
            Event::SequenceStart(..) => self.stack.push(Frame::Sequence(Vec::new())),
            Event::MappingStart(..) => self.stack.push(Frame::Mapping(Vec::new())),
            Event::SequenceEnd | Event::MappingEnd => {
                let node = match self.stack.pop() {
                    Some(Frame::Sequence(items)) => Node::Sequence(items),
                    Some(Frame::Mapping(flat)) => {
                        let mut flat = flat.into_iter();
                        let mut entries = Vec::new();
                        while let (Some(key), Some(value)) = (flat.next(), flat.next()) {
                            entries.push((key, value));
                        }
                        Node::Mapping(entries)
                    }
                    None => return,
                };
                self.push(node);
            }
            _ => {}
        }
    }
}

/// Scalar positions of one YAML text.
pub(crate) struct ScalarSpans<'t> {
    text: &'t str,
    root: Node,
    /// Byte offset of every character
    offsets: Vec<usize>,
}

impl<'t> ScalarSpans<'t> {
    /// `None` when the text does not scan as YAML.
    pub(crate) fn scan(text: &'t str) -> Option<Self> {
        let mut builder = TreeBuilder::default();
        Parser::new(text.chars()).load(&mut builder, false).ok()?;
        Some(Self {
            text,
            root: builder.root?,
            offsets: text.char_indices().map(|(offset, _)| offset).collect(),
        })
    }

    /// Edit replacing the scalar at `location` with `value` in the style
    /// the scalar is written in.
    ///
    /// `None` when the scalar spans several lines, is a block scalar, or the
    /// new value cannot be written on one line.
    pub(crate) fn edit(&self, location: &[Step], value: &Value) -> Option<Edit> {
        let Node::Scalar {
            start,
            value: current,
            style,
        } = find(&self.root, location)?
        else {
            return None;
        };
        let begin = *self.offsets.get(*start)?;
        let rest = self.text.get(begin..)?;
        let end = begin + raw_len(rest, current, *style)?;
        let replacement = render(value, *style)?;
        Some(Edit::new(
            begin,
            end,
            replacement,
            self.text[begin..end].as_bytes(),
        ))
    }
}

fn find<'n>(mut node: &'n Node, location: &[Step]) -> Option<&'n Node> {
    for step in location {
        node = match (node, step) {
            (Node::Mapping(entries), Step::Key(key)) => entries
                .iter()
                .find(|(k, _)| matches!(k, Node::Scalar { value, .. } if value == key))
                .map(|(_, v)| v)?,
            (Node::Sequence(items), Step::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Byte length of the scalar written at the start of `rest`.
fn raw_len(rest: &str, value: &str, style: TScalarStyle) -> Option<usize> {
    let len = match style {
        TScalarStyle::Plain => rest.starts_with(value).then_some(value.len())?,
        TScalarStyle::SingleQuoted => {
            let quoted = single_quoted(value);
            rest.starts_with(&quoted).then_some(quoted.len())?
        }
        TScalarStyle::DoubleQuoted => closing_quote(rest)? + 1,
        _ => return None,
    };
    (len > 0 && !rest[..len].contains('\n')).then_some(len)
}

fn closing_quote(rest: &str) -> Option<usize> {
    let mut bytes = rest.bytes().enumerate().skip(1);
    while let Some((index, byte)) = bytes.next() {
        match byte {
            b'\\' => {
                bytes.next();
            }
            b'"' => return Some(index),
            b'\n' => return None,
            _ => {}
        }
    }
    None
}

fn single_quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn render(value: &Value, style: TScalarStyle) -> Option<String> {
    match (value, style) {
        (Value::String(text), TScalarStyle::SingleQuoted) if !text.contains('\n') => {
            Some(single_quoted(text))
        }
        (Value::String(text), TScalarStyle::DoubleQuoted) => serde_json::to_string(text).ok(),
        _ => {
            let rendered = serde_yaml::to_string(value).ok()?;
            let rendered = rendered.strip_suffix('\n')?;
            (!rendered.contains('\n')).then(|| rendered.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "\
# settings
plain: main # branch
single: 'it''s'
double: \"a \\\"b\\\"\"
hosts:
  - a.example.com
  - \"b.example.com\"
block: |
  text
";

    fn key(name: &str) -> Step {
        Step::Key(name.to_string())
    }

    fn replace(location: &[Step], value: &str) -> Option<String> {
        let spans = ScalarSpans::scan(TEXT)?;
        let edit = spans.edit(location, &Value::String(value.to_string()))?;
        edit.apply(TEXT.as_bytes())
            .ok()
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn plain_scalar_stops_before_comment() {
        let out = replace(&[key("plain")], "deploy/citest").unwrap();
        assert!(out.contains("plain: deploy/citest # branch\n"), "{out}");
        assert!(out.starts_with("# settings\n"));
    }

    #[test]
    fn quoted_scalars_keep_their_quotes() {
        let out = replace(&[key("single")], "o'k").unwrap();
        assert!(out.contains("single: 'o''k'\n"), "{out}");

        let out = replace(&[key("double")], "c").unwrap();
        assert!(out.contains("double: \"c\"\n"), "{out}");

        let out = replace(&[key("hosts"), Step::Index(1)], "c.example.com").unwrap();
        assert!(out.contains("  - \"c.example.com\"\n"), "{out}");
    }

    #[test]
    fn ambiguous_plain_value_is_quoted() {
        let out = replace(&[key("plain")], "true").unwrap();
        assert!(out.contains("plain: 'true' # branch\n"), "{out}");
    }

    #[test]
    fn block_scalars_and_collections_are_not_spanned() {
        assert!(replace(&[key("block")], "other").is_none());
        assert!(replace(&[key("hosts")], "other").is_none());
        assert!(replace(&[key("missing")], "other").is_none());
    }
}
