//! HTML-to-XML normalization for ESJ Zone pages.
//!
//! Pages are parsed with the HTML5 algorithm, so malformed markup (unclosed tags,
//! stray end tags, bare ampersands) still produces a complete tree. [XmlDocument::to_xml]
//! writes that tree back out as well-formed XML.

use scraper::{ElementRef, Html, Node, Selector};
use std::borrow::Cow;
use thiserror::Error;

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Error)]
pub enum HtmlError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Text fragments under `node`, one per descendant text node in document order.
///
/// Fragments are trimmed, non-breaking spaces become plain spaces, and whitespace-only
/// fragments are dropped.
pub fn get_node_texts(node: ElementRef<'_>) -> Vec<String> {
    node.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('\u{a0}', " "))
        .collect()
}

/// Parse `html` into a document tree. Never fails; markup errors are repaired and recorded.
pub fn html_to_xml(html: &str) -> XmlDocument {
    let html = Html::parse_document(html);
    if !html.errors.is_empty() {
        tracing::debug!(errors = html.errors.len(), "repaired malformed HTML");
    }
    XmlDocument { html }
}

/// Parsed page. Nodes are borrowed from the document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    html: Html,
}

impl XmlDocument {
    /// The `<html>` element.
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// All elements matching a CSS selector, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<ElementRef<'_>>, HtmlError> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).collect())
    }

    /// First element matching a CSS selector.
    pub fn select_first(&self, selector: &str) -> Result<Option<ElementRef<'_>>, HtmlError> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).next())
    }

    /// Parse errors the HTML parser repaired.
    pub fn parse_errors(&self) -> &[Cow<'static, str>] {
        &self.html.errors
    }

    /// Serialize the whole tree as well-formed XML with an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(self.root(), "", &mut out);
        out
    }
}

/// Serialize one element and its subtree as XML (no declaration), assuming an XHTML parent.
///
/// An element whose tag name cannot be an XML name is written as its content only.
pub fn element_to_xml(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_element(element, XHTML_NS, &mut out);
    out
}

fn parse_selector(selector: &str) -> Result<Selector, HtmlError> {
    Selector::parse(selector).map_err(|e| HtmlError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn write_element(element: ElementRef<'_>, parent_ns: &str, out: &mut String) {
    let el = element.value();
    let name = el.name();
    if !is_ncname(name) {
        // Tag names like `p"x` survive HTML tokenizing but have no XML form; keep the content.
        write_children(element, parent_ns, out);
        return;
    }
    let ns: &str = &el.name.ns;

    out.push('<');
    out.push_str(name);
    for (attr, value) in xml_attributes(el, ns != parent_ns) {
        out.push(' ');
        out.push_str(&attr);
        out.push_str("=\"");
        push_escaped(&value, true, out);
        out.push('"');
    }

    if element.children().next().is_none() && VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    write_children(element, ns, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn write_children(element: ElementRef<'_>, ns: &str, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_escaped(text, false, out),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    write_element(child_el, ns, out);
                }
            }
            // Comments, doctypes and processing instructions are dropped.
            _ => {}
        }
    }
}

/// Attributes as XML would spell them, unique by name: the element's default namespace
/// (when it changes), prefix declarations, then the rest, each group sorted by name.
///
/// Source `xmlns` and `xmlns:*` attributes are ignored; declarations are derived from the
/// namespaces the parser actually assigned, so they cannot contradict the prefixes used.
fn xml_attributes(el: &scraper::node::Element, declare_ns: bool) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    if declare_ns {
        attrs.push(("xmlns".to_string(), el.name.ns.to_string()));
    }
    for (qual, value) in el.attrs.iter() {
        let local: &str = &qual.local;
        if !is_ncname(local) {
            continue;
        }
        let written = match qual.prefix.as_deref() {
            None if local == "xmlns" => continue,
            None => local.to_string(),
            Some("xmlns") => continue,
            Some(prefix) if !is_ncname(prefix) => continue,
            Some("xml") => format!("xml:{local}"),
            Some(prefix) => {
                push_unique(&mut attrs, format!("xmlns:{prefix}"), qual.ns.to_string());
                format!("{prefix}:{local}")
            }
        };
        push_unique(&mut attrs, written, value.to_string());
    }
    attrs.sort_by(|(a, _), (b, _)| attr_rank(a).cmp(&attr_rank(b)).then_with(|| a.cmp(b)));
    attrs
}

fn push_unique(attrs: &mut Vec<(String, String)>, name: String, value: String) {
    if !attrs.iter().any(|(n, _)| *n == name) {
        attrs.push((name, value));
    }
}

fn attr_rank(name: &str) -> u8 {
    if name == "xmlns" {
        0
    } else if name.starts_with("xmlns:") {
        1
    } else {
        2
    }
}

/// Escape markup characters and drop characters XML 1.0 does not allow.
fn push_escaped(s: &str, in_attr: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            // Attribute-value normalization would turn these into spaces.
            '\t' if in_attr => out.push_str("&#9;"),
            '\n' if in_attr => out.push_str("&#10;"),
            '\r' if in_attr => out.push_str("&#13;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{fffe}' || c == '\u{ffff}' => {}
            c => out.push(c),
        }
    }
}

/// XML name without a colon. Rejects names HTML accepts from broken markup, e.g. `"foo"`.
fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
