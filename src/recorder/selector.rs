//! Unique CSS selector synthesis
//!
//! Given an element of a DOM snapshot, produce one CSS selector that matches
//! only that element in the snapshot. Strategies are tried in a fixed order and
//! the first one that is unique wins:
//!
//! `#id` > `[name]` > `[aria-label]` > `[placeholder]` > `tag.c1.c2.c3` >
//! parent selector + `> tag:nth-child(k)` > bare tag
//!
//! Uniqueness is checked against the snapshot only. A selector may stop being
//! unique on a later load of the same page.

use super::dom::{Document, DomNode, NodePath};

/// Attributes tried after `id`, in order
const UNIQUE_ATTRIBUTES: [&str; 3] = ["name", "aria-label", "placeholder"];

/// Classes used for the compound selector
const MAX_CLASSES: usize = 3;

pub struct SelectorSynthesizer<'a> {
    document: &'a Document,
}

impl<'a> SelectorSynthesizer<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Selector for the element at `path`, `None` if the path doesn't resolve
    pub fn synthesize(&self, path: &NodePath) -> Option<String> {
        let element = self.document.node(path)?;
        Some(self.synthesize_node(element, path))
    }

    fn synthesize_node(&self, element: &DomNode, path: &NodePath) -> String {
        if let Some(selector) = self.by_id(element) {
            return selector;
        }

        for attribute in UNIQUE_ATTRIBUTES {
            if let Some(selector) = self.by_attribute(element, attribute) {
                return selector;
            }
        }

        if let Some(selector) = self.by_classes(element) {
            return selector;
        }

        // Structural fallback, bounded by document depth
        if let (Some(parent_path), Some(position)) = (path.parent(), path.position()) {
            if let Some(parent) = self.document.node(&parent_path) {
                let parent_selector = self.synthesize_node(parent, &parent_path);
                return format!(
                    "{} > {}:nth-child({})",
                    parent_selector,
                    element.tag_name(),
                    position + 1
                );
            }
        }

        element.tag_name()
    }

    fn by_id(&self, element: &DomNode) -> Option<String> {
        let id = element.attr("id")?;
        let matches = self.document.count(|n| n.attr("id") == Some(id));
        (matches == 1).then(|| format!("#{}", css_escape(id)))
    }

    fn by_attribute(&self, element: &DomNode, attribute: &str) -> Option<String> {
        let value = element.attr(attribute)?;
        let matches = self.document.count(|n| n.attr(attribute) == Some(value));
        (matches == 1).then(|| attribute_selector(attribute, value))
    }

    fn by_classes(&self, element: &DomNode) -> Option<String> {
        let classes: Vec<&str> = element.classes().take(MAX_CLASSES).collect();
        if classes.is_empty() {
            return None;
        }

        let tag = element.tag_name();
        let matches = self.document.count(|n| {
            n.tag_name() == tag && classes.iter().all(|class| n.has_class(class))
        });
        if matches != 1 {
            return None;
        }

        let compound: String = classes
            .iter()
            .map(|class| format!(".{}", css_escape(class)))
            .collect();
        Some(format!("{}{}", tag, compound))
    }
}

/// `[attr="value"]` with the value quoted for a CSS string
pub fn attribute_selector(attribute: &str, value: &str) -> String {
    let quoted = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{}=\"{}\"]", attribute, quoted)
}

/// Escape an identifier the way the browser's `CSS.escape` does
pub fn css_escape(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len());

    for (i, &c) in chars.iter().enumerate() {
        let code = c as u32;
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1F}' | '\u{7F}' => out.push_str(&format!("\\{:x} ", code)),
            '0'..='9' if i == 0 || (i == 1 && chars[0] == '-') => {
                out.push_str(&format!("\\{:x} ", code))
            }
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if code >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }

    out
}
