//! Aligned rendering of arbitrary JSON documents.
//!
//! Rendering is two-pass: [`measure`] walks the whole tree first and returns
//! the key column width for the top level, shrinking by two for every level of
//! nesting. Because the indent grows by exactly the amount the width shrinks,
//! every value in the document starts in the same global column.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

/// Indentation added per nesting level.
const INDENT_STEP: usize = 2;
/// Gap between a key cell and its value.
const KEY_GAP: &str = "   ";

/// Leaf value of a decoded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Integer representable as `i64`.
    Integer(i64),
    /// Integer above `i64::MAX`.
    Unsigned(u64),
    /// Any non-integral number.
    Float(f64),
    /// JSON string.
    Text(String),
}

impl Display for Scalar {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => formatter.write_str("null"),
            Self::Bool(value) => write!(formatter, "{value}"),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Unsigned(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::Text(value) => formatter.write_str(value),
        }
    }
}

/// A decoded document: scalar, ordered sequence, or key-sorted mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureNode {
    /// Leaf value.
    Scalar(Scalar),
    /// Ordered list of nodes.
    Sequence(Vec<StructureNode>),
    /// Mapping iterated in lexicographic key order.
    Mapping(BTreeMap<String, StructureNode>),
}

impl<'de> Deserialize<'de> for StructureNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = StructureNode;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Bool(value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Integer(value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        let scalar = i64::try_from(value).map_or(Scalar::Unsigned(value), Scalar::Integer);
        Ok(StructureNode::Scalar(scalar))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Float(value)))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Text(value.to_owned())))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Text(value)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(StructureNode::Scalar(Scalar::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        StructureNode::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or_default());
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(StructureNode::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, StructureNode>()? {
            entries.insert(key, value);
        }
        Ok(StructureNode::Mapping(entries))
    }
}

/// Key column width needed to align `node` when rendered at the top level.
#[must_use]
pub fn measure(node: &StructureNode) -> usize {
    match node {
        StructureNode::Scalar(_) => 0,
        StructureNode::Sequence(items) => items
            .iter()
            .map(nested_width)
            .fold(index_width(items.len()), usize::max),
        StructureNode::Mapping(entries) => entries
            .iter()
            .map(|(key, value)| key.chars().count().max(nested_width(value)))
            .max()
            .unwrap_or_default(),
    }
}

fn nested_width(child: &StructureNode) -> usize {
    match measure(child) {
        0 => 0,
        width => width + INDENT_STEP,
    }
}

/// Number of digits needed for the largest zero-based index of `count` items.
///
/// Empty collections need no index column at all.
#[must_use]
pub(crate) fn index_width(count: usize) -> usize {
    count
        .checked_sub(1)
        .map_or(0, |largest| largest.to_string().len())
}

/// Render `node` with keys starting at `indent` in a cell of `width + 1`.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn render(
    node: &StructureNode,
    indent: usize,
    width: usize,
    out: &mut dyn Write,
) -> io::Result<()> {
    let child_width = width.saturating_sub(INDENT_STEP);
    match node {
        StructureNode::Scalar(value) => writeln!(out, "{value}"),
        StructureNode::Sequence(items) => {
            writeln!(out)?;
            for (index, item) in items.iter().enumerate() {
                write_key(out, indent, width, &index.to_string())?;
                render(item, indent + INDENT_STEP, child_width, out)?;
            }
            Ok(())
        }
        StructureNode::Mapping(entries) => {
            writeln!(out)?;
            for (key, value) in entries {
                write_key(out, indent, width, &key.replace('_', " "))?;
                render(value, indent + INDENT_STEP, child_width, out)?;
            }
            Ok(())
        }
    }
}

/// Render a titled document, e.g. `queue jobs:` followed by its attributes.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn render_element(title: &str, node: &StructureNode, out: &mut dyn Write) -> io::Result<()> {
    write!(out, "{title}:")?;
    render(node, INDENT_STEP, measure(node), out)
}

fn write_key(out: &mut dyn Write, indent: usize, width: usize, label: &str) -> io::Result<()> {
    write!(
        out,
        "{:indent$}{:<cell$}{KEY_GAP}",
        "",
        format!("{label}:"),
        cell = width + 1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> StructureNode {
        serde_json::from_str(raw).expect("valid JSON")
    }

    fn rendered(title: &str, raw: &str) -> String {
        let mut out = Vec::new();
        render_element(title, &parse(raw), &mut out).expect("render to buffer");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn decodes_every_json_shape() {
        let node = parse(
            r#"{"n": null, "b": true, "i": -3, "u": 18446744073709551615,
                "f": 0.5, "s": "x", "l": [1]}"#,
        );
        let StructureNode::Mapping(entries) = node else {
            panic!("expected mapping");
        };
        assert_eq!(entries["n"], StructureNode::Scalar(Scalar::Null));
        assert_eq!(entries["b"], StructureNode::Scalar(Scalar::Bool(true)));
        assert_eq!(entries["i"], StructureNode::Scalar(Scalar::Integer(-3)));
        assert_eq!(
            entries["u"],
            StructureNode::Scalar(Scalar::Unsigned(u64::MAX))
        );
        assert_eq!(entries["f"], StructureNode::Scalar(Scalar::Float(0.5)));
        assert_eq!(
            entries["s"],
            StructureNode::Scalar(Scalar::Text("x".into()))
        );
        assert_eq!(
            entries["l"],
            StructureNode::Sequence(vec![StructureNode::Scalar(Scalar::Integer(1))])
        );
    }

    #[test]
    fn mapping_keys_render_in_lexicographic_order() {
        assert_eq!(rendered("x", r#"{"b": 1, "a": 2}"#), "x:\n  a:   2\n  b:   1\n");
    }

    #[test]
    fn underscores_render_as_spaces() {
        assert_eq!(
            rendered("queue jobs", r#"{"queue_name": "jobs"}"#),
            "queue jobs:\n  queue name:   jobs\n"
        );
    }

    #[test]
    fn measure_accounts_for_nesting() {
        assert_eq!(measure(&parse("42")), 0);
        assert_eq!(measure(&parse("[]")), 0);
        assert_eq!(measure(&parse("{}")), 0);
        assert_eq!(measure(&parse(r#"{"deep": "v"}"#)), 4);
        assert_eq!(measure(&parse(r#"[true, {"deep": "v"}]"#)), 6);
        assert_eq!(measure(&parse(r#"{"x": {"a_much_longer_key": 1}}"#)), 19);
        assert_eq!(measure(&parse("[0,1,2,3,4,5,6,7,8,9,10]")), 2);
    }

    #[test]
    fn index_width_handles_small_counts() {
        assert_eq!(index_width(0), 0);
        assert_eq!(index_width(1), 1);
        assert_eq!(index_width(10), 1);
        assert_eq!(index_width(11), 2);
        assert_eq!(index_width(12), 2);
        assert_eq!(index_width(101), 3);
    }

    #[test]
    fn values_share_one_column_at_every_depth() {
        let text = rendered(
            "overview",
            r#"{"a": 1, "long_key_name": {"x": [true, {"deep": "v"}]}, "z": []}"#,
        );
        let value_columns: Vec<usize> = text
            .lines()
            .skip(1)
            .filter(|line| !line.ends_with(' '))
            .map(|line| line.rfind(KEY_GAP).expect("key gap") + KEY_GAP.len())
            .collect();

        assert_eq!(value_columns, vec![19, 19, 19]);
        let gap = |pad: usize| " ".repeat(pad + KEY_GAP.len());
        assert!(text.contains(&format!("\n  long key name:{}\n", gap(0))));
        assert!(text.contains(&format!("\n      0:{}true\n", gap(8))));
        assert!(text.contains(&format!("\n        deep:{}v\n", gap(3))));
        assert!(text.ends_with(&format!("\n  z:{}\n", gap(12))));
    }

    #[test]
    fn empty_collections_render_without_entries() {
        assert_eq!(rendered("e", "[]"), "e:\n");
        assert_eq!(rendered("e", "{}"), "e:\n");
    }
}
