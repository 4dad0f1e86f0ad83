//! Selectors
//!
//! Compound simple selectors (`tag`, `#id`, `.class`, `*` and combinations
//! such as `div.scroller#feed`). Enough to locate an observation root;
//! combinators are not supported.

use crate::ElementData;

/// Parsed compound selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// Parse a selector string
    ///
    /// Returns `None` for empty input, combinators, or empty components
    /// (`"div."`, `"#"`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.contains(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ',')) {
            return None;
        }

        let mut selector = Selector::default();
        let mut rest = s;

        // Leading type selector
        let tag_end = rest.find(is_marker).unwrap_or(rest.len());
        let (tag, tail) = rest.split_at(tag_end);
        match tag {
            "" | "*" => {}
            tag => selector.tag = Some(tag.to_ascii_lowercase()),
        }
        rest = tail;

        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(is_marker).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                '#' => selector.id = Some(name.to_string()),
                _ => selector.classes.push(name.to_string()),
            }
            rest = &body[end..];
        }

        Some(selector)
    }

    /// Check if element data matches
    pub fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|class| element.classes.iter().any(|c| c == class))
    }
}

fn is_marker(c: char) -> bool {
    c == '#' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, id: Option<&str>, classes: &[&str]) -> ElementData {
        ElementData {
            tag: tag.to_string(),
            id: id.map(str::to_string),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_simple() {
        assert!(Selector::parse("div").is_some());
        assert!(Selector::parse("#main").is_some());
        assert!(Selector::parse(".scroller").is_some());
        assert!(Selector::parse("*").is_some());
    }

    #[test]
    fn test_parse_rejects() {
        assert!(Selector::parse("").is_none());
        assert!(Selector::parse("   ").is_none());
        assert!(Selector::parse("div .item").is_none());
        assert!(Selector::parse("ul > li").is_none());
        assert!(Selector::parse("div.").is_none());
        assert!(Selector::parse("#").is_none());
    }

    #[test]
    fn test_compound_match() {
        let sel = Selector::parse("div.scroller#feed").unwrap();
        assert!(sel.matches(&element("DIV", Some("feed"), &["scroller", "dark"])));
        assert!(!sel.matches(&element("div", Some("other"), &["scroller"])));
        assert!(!sel.matches(&element("div", Some("feed"), &[])));
        assert!(!sel.matches(&element("section", Some("feed"), &["scroller"])));
    }

    #[test]
    fn test_universal_matches_everything() {
        let sel = Selector::parse("*").unwrap();
        assert!(sel.matches(&element("img", None, &[])));
    }
}
