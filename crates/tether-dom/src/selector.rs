#![forbid(unsafe_code)]

//! A small CSS selector engine.
//!
//! Supported: type selectors, `*`, `#id`, `.class`, `[attr]`,
//! `[attr=value]` (value bare or quoted), compound selectors, the descendant
//! (whitespace) and child (`>`) combinators, and selector lists (`,`).
//! Type selectors match case-insensitively.
//!
//! Matching runs right to left against any [`SelectorTree`].

use crate::document::NodeId;
use crate::error::DomError;

/// Read access a selector needs from a node tree.
pub trait SelectorTree {
    /// Tag name for elements, `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<&str>;
    /// Attribute value on an element.
    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;
    /// Parent element, if any.
    fn parent_element(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, tree: &impl SelectorTree, node: NodeId) -> bool {
        let Some(tag) = tree.tag_name(node) else {
            return false;
        };
        if let Some(want) = &self.tag
            && !want.eq_ignore_ascii_case(tag)
        {
            return false;
        }
        if let Some(id) = &self.id
            && tree.attribute(node, "id") != Some(id.as_str())
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attribute(node, "class").unwrap_or_default();
            let has = |c: &String| class_attr.split_whitespace().any(|have| have == c);
            if !self.classes.iter().all(has) {
                return false;
            }
        }
        self.attrs.iter().all(|attr| {
            match (tree.attribute(node, &attr.name), &attr.value) {
                (Some(_), None) => true,
                (Some(have), Some(want)) => have == want,
                (None, _) => false,
            }
        })
    }
}

/// Compounds joined by combinators; `combinators[i]` sits between
/// `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches(&self, tree: &impl SelectorTree, node: NodeId) -> bool {
        self.matches_at(tree, self.compounds.len() - 1, node)
    }

    fn matches_at(&self, tree: &impl SelectorTree, idx: usize, node: NodeId) -> bool {
        if !self.compounds[idx].matches(tree, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => tree
                .parent_element(node)
                .is_some_and(|parent| self.matches_at(tree, idx - 1, parent)),
            Combinator::Descendant => {
                let mut cursor = tree.parent_element(node);
                while let Some(ancestor) = cursor {
                    if self.matches_at(tree, idx - 1, ancestor) {
                        return true;
                    }
                    cursor = tree.parent_element(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

impl SelectorList {
    /// Parse `input`. Fails with [`DomError::InvalidSelector`].
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector(input.to_owned());
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
        };
        let mut selectors = Vec::new();
        loop {
            selectors.push(parser.complex().ok_or_else(invalid)?);
            parser.skip_whitespace();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(_) => return Err(invalid()),
            }
        }
        Ok(Self { selectors })
    }

    /// Whether `node` matches any selector in the list.
    pub fn matches(&self, tree: &impl SelectorTree, node: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(tree, node))
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn complex(&mut self) -> Option<Complex> {
        self.skip_whitespace();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(_) => return None,
            };
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }
        Some(Complex {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Option<Compound> {
        let start = self.pos;
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
        } else if let Some(tag) = self.ident() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                _ => break,
            }
        }
        (self.pos > start).then_some(compound)
    }

    fn attribute(&mut self) -> Option<AttrMatch> {
        self.skip_whitespace();
        let name = self.ident()?;
        self.skip_whitespace();
        let value = if self.peek() == Some('=') {
            self.pos += 1;
            self.skip_whitespace();
            let value = match self.peek() {
                Some(quote @ ('"' | '\'')) => self.quoted(quote)?,
                _ => self.ident()?,
            };
            self.skip_whitespace();
            Some(value)
        } else {
            None
        };
        if self.peek() != Some(']') {
            return None;
        }
        self.pos += 1;
        Some(AttrMatch { name, value })
    }

    fn quoted(&mut self, quote: char) -> Option<String> {
        self.pos += 1;
        let start = self.pos;
        while self.peek()? != quote {
            self.pos += 1;
        }
        let value: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Some(value)
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn fixture() -> (Document, NodeId, NodeId, NodeId) {
        let doc = Document::new();
        let list = doc.create_element("ul");
        doc.set_attribute(list, "id", "menu").unwrap();
        doc.set_attribute(list, "class", "nav main").unwrap();
        let item = doc.create_element("li");
        doc.set_attribute(item, "data-key", "home").unwrap();
        let link = doc.create_element("a");
        doc.add_class(link, "active").unwrap();
        doc.append_child(doc.body(), list).unwrap();
        doc.append_child(list, item).unwrap();
        doc.append_child(item, link).unwrap();
        (doc, list, item, link)
    }

    #[test]
    fn simple_selectors() {
        let (doc, list, item, link) = fixture();
        assert_eq!(doc.query_selector("ul").unwrap(), Some(list));
        assert_eq!(doc.query_selector("UL").unwrap(), Some(list));
        assert_eq!(doc.query_selector("#menu").unwrap(), Some(list));
        assert_eq!(doc.query_selector(".main").unwrap(), Some(list));
        assert_eq!(doc.query_selector("[data-key]").unwrap(), Some(item));
        assert_eq!(doc.query_selector("[data-key=home]").unwrap(), Some(item));
        assert_eq!(doc.query_selector("[data-key='home']").unwrap(), Some(item));
        assert_eq!(doc.query_selector("a.active").unwrap(), Some(link));
        assert_eq!(doc.query_selector("[data-key=away]").unwrap(), None);
    }

    #[test]
    fn compound_requires_every_part() {
        let (doc, list, ..) = fixture();
        assert_eq!(doc.query_selector("ul.nav.main#menu").unwrap(), Some(list));
        assert_eq!(doc.query_selector("ul.nav.other").unwrap(), None);
        assert_eq!(doc.query_selector("ol#menu").unwrap(), None);
    }

    #[test]
    fn combinators() {
        let (doc, _, item, link) = fixture();
        assert_eq!(doc.query_selector("#menu a").unwrap(), Some(link));
        assert_eq!(doc.query_selector("#menu > li").unwrap(), Some(item));
        assert_eq!(doc.query_selector("#menu > a").unwrap(), None);
        assert_eq!(doc.query_selector("body ul>li > a").unwrap(), Some(link));
    }

    #[test]
    fn lists_and_universal() {
        let (doc, list, item, link) = fixture();
        assert_eq!(doc.query_selector_all("li, a").unwrap(), vec![item, link]);
        assert_eq!(doc.query_selector_all("#menu *").unwrap(), vec![item, link]);
        assert_eq!(doc.query_selector("a, ul").unwrap(), Some(list));
    }

    #[test]
    fn rejects_malformed() {
        let (doc, ..) = fixture();
        for bad in ["", "  ", "ul >", "#", ".", "[x", "[=v]", "a,", "a!b", "[x='v]"] {
            assert!(
                matches!(doc.query_selector(bad), Err(DomError::InvalidSelector(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn text_nodes_never_match() {
        let doc = Document::new();
        let text = doc.create_text("hello");
        doc.append_child(doc.body(), text).unwrap();
        assert!(doc.query_selector_all("*").unwrap().iter().all(|n| *n != text));
    }
}
