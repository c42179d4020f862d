//! Pure SVG document builder
//!
//! A minimal tree of tagged nodes plus a serializer, decoupled from any live
//! DOM so the vector compositor stays testable. Attribute and text values are
//! XML-escaped on serialization; `raw` children are inserted verbatim and are
//! reserved for markup that already passed through the XML scanner.

use std::fmt::Write;

/// One element in an SVG document tree
#[derive(Debug, Clone)]
pub struct SvgNode {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<SvgChild>,
}

#[derive(Debug, Clone)]
enum SvgChild {
    Node(SvgNode),
    Raw(String),
    Text(String),
}

impl SvgNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Numeric attribute, formatted without trailing zeros
    pub fn attr_f(self, key: impl Into<String>, value: f64) -> Self {
        self.attr(key, fmt_num(value))
    }

    pub fn child(mut self, node: SvgNode) -> Self {
        self.children.push(SvgChild::Node(node));
        self
    }

    /// Insert pre-scanned markup verbatim
    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(SvgChild::Raw(markup.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(SvgChild::Text(text.into()));
        self
    }

    /// Serialize the tree to a markup string
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                SvgChild::Node(node) => node.write_to(out),
                SvgChild::Raw(markup) => out.push_str(markup),
                SvgChild::Text(text) => out.push_str(&escape(text)),
            }
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

/// Escape a string for use in XML attribute values or text content
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format a float compactly: integers lose the fraction, the rest keep up to
/// three decimals
pub fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
