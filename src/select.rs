//! Element selector paths.
//!
//! A selector identifies which elements a visitor applies to: by local name,
//! namespace prefix, ancestor path, wildcard (`*` single level, `**` any
//! depth), positional index predicate (`[n]`, 1-based) or a terminal
//! `text()` token. This is the compiled form the dispatch engine consumes;
//! full XPath compilation lives outside this crate.

use crate::error::{FilterError, Result};
use crate::event::QName;

/// Name test for one selector step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    /// Literal local name
    Name(String),
    /// Any element, one level
    Star,
    /// Any element, any depth
    StarStar,
}

impl NameTest {
    /// Check a local name against this test.
    pub fn matches(&self, local: &str) -> bool {
        match self {
            NameTest::Name(n) => n == local,
            NameTest::Star | NameTest::StarStar => true,
        }
    }

    /// Whether this is one of the wildcard tests.
    #[inline]
    pub fn is_star(&self) -> bool {
        matches!(self, NameTest::Star | NameTest::StarStar)
    }
}

/// One step of a selector path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorStep {
    pub test: NameTest,
    /// Namespace prefix constraint, if any
    pub prefix: Option<String>,
    /// Positional predicate `[n]`, 1-based
    pub index: Option<usize>,
}

impl SelectorStep {
    fn matches(&self, name: &QName) -> bool {
        if !self.test.matches(name.local_name()) {
            return false;
        }
        match &self.prefix {
            Some(p) => name.prefix.as_deref() == Some(p.as_str()),
            None => true,
        }
    }
}

/// A compiled selector path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    steps: Vec<SelectorStep>,
    /// Selector ends in a `text()` token
    text_token: bool,
}

impl SelectorPath {
    /// Parse a selector expression, e.g. `order/item[2]` or `**/price/text()`.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(invalid(expr, "empty selector"));
        }

        let mut steps = Vec::new();
        let mut text_token = false;
        let parts: Vec<&str> = trimmed.split('/').collect();
        for (i, part) in parts.iter().enumerate() {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid(expr, "empty step"));
            }
            if part == "text()" {
                if i + 1 != parts.len() {
                    return Err(invalid(expr, "text() must be the last step"));
                }
                if steps.is_empty() {
                    return Err(invalid(expr, "text() requires a target element"));
                }
                text_token = true;
                continue;
            }
            steps.push(Self::parse_step(expr, part)?);
        }
        if steps.is_empty() {
            return Err(invalid(expr, "no element step"));
        }
        Ok(SelectorPath { steps, text_token })
    }

    fn parse_step(expr: &str, part: &str) -> Result<SelectorStep> {
        let (name_part, index) = match part.find('[') {
            Some(open) => {
                let close = part
                    .rfind(']')
                    .ok_or_else(|| invalid(expr, "unterminated predicate"))?;
                let num: usize = part[open + 1..close]
                    .trim()
                    .parse()
                    .map_err(|_| invalid(expr, "predicate must be a positive integer"))?;
                if num == 0 {
                    return Err(invalid(expr, "index predicates are 1-based"));
                }
                (&part[..open], Some(num))
            }
            None => (part, None),
        };

        let (prefix, local) = match name_part.find(':') {
            Some(pos) => (Some(name_part[..pos].to_string()), &name_part[pos + 1..]),
            None => (None, name_part),
        };

        let test = match local {
            "**" => NameTest::StarStar,
            "*" => NameTest::Star,
            n if !n.is_empty() => NameTest::Name(n.to_string()),
            _ => return Err(invalid(expr, "empty name test")),
        };

        Ok(SelectorStep {
            test,
            prefix,
            index,
        })
    }

    /// All steps in order, outermost first.
    pub fn steps(&self) -> &[SelectorStep] {
        &self.steps
    }

    /// The step the selector targets (last element step).
    pub fn target_step(&self) -> &SelectorStep {
        self.steps.last().expect("selector has at least one step")
    }

    /// Whether the selector ends in a `text()` token.
    #[inline]
    pub fn accesses_text(&self) -> bool {
        self.text_token
    }

    /// Whether the target step is a wildcard.
    pub fn targets_star(&self) -> bool {
        self.target_step().test.is_star()
    }

    /// Whether the target step is the any-depth wildcard.
    pub fn targets_star_star(&self) -> bool {
        matches!(self.target_step().test, NameTest::StarStar)
    }

    /// Steps carrying a positional index predicate, with their step offsets.
    pub fn indexed_steps(&self) -> impl Iterator<Item = (usize, &SelectorStep)> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.index.is_some())
    }

    /// Stable identity for a step, shared by every binding referencing it.
    ///
    /// Rendered without predicates so `order/item[1]` and `order/item[2]`
    /// share one occurrence counter.
    pub fn step_key(&self, step_offset: usize) -> String {
        let mut key = String::new();
        for step in &self.steps[..=step_offset.min(self.steps.len() - 1)] {
            if !key.is_empty() {
                key.push('/');
            }
            if let Some(p) = &step.prefix {
                key.push_str(p);
                key.push(':');
            }
            match &step.test {
                NameTest::Name(n) => key.push_str(n),
                NameTest::Star => key.push('*'),
                NameTest::StarStar => key.push_str("**"),
            }
        }
        key
    }

    /// A sub-selector covering the steps up to and including `step_offset`.
    pub fn truncate_at(&self, step_offset: usize) -> SelectorPath {
        SelectorPath {
            steps: self.steps[..=step_offset.min(self.steps.len() - 1)].to_vec(),
            text_token: false,
        }
    }

    /// Match this selector against an element in context.
    ///
    /// `ancestors` is ordered nearest-first (parent, grandparent, ...).
    /// Selectors are unanchored: a matched path may start at any depth.
    pub fn matches_context(&self, element: &QName, ancestors: &[QName]) -> bool {
        let (target, rest) = self
            .steps
            .split_last()
            .expect("selector has at least one step");
        if !target.matches(element) {
            return false;
        }
        match_ancestors(rest, ancestors)
    }
}

/// Match the remaining steps (deepest last) against an ancestor chain
/// ordered nearest-first.
fn match_ancestors(steps: &[SelectorStep], ancestors: &[QName]) -> bool {
    let Some((deepest, rest)) = steps.split_last() else {
        return true;
    };
    match deepest.test {
        NameTest::StarStar => {
            // Absorbs zero or more ancestors.
            (0..=ancestors.len()).any(|k| match_ancestors(rest, &ancestors[k..]))
        }
        _ => match ancestors.first() {
            Some(parent) => deepest.matches(parent) && match_ancestors(rest, &ancestors[1..]),
            None => false,
        },
    }
}

impl std::fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            if let Some(p) = &step.prefix {
                write!(f, "{p}:")?;
            }
            match &step.test {
                NameTest::Name(n) => f.write_str(n)?,
                NameTest::Star => f.write_str("*")?,
                NameTest::StarStar => f.write_str("**")?,
            }
            if let Some(n) = step.index {
                write!(f, "[{n}]")?;
            }
        }
        if self.text_token {
            f.write_str("/text()")?;
        }
        Ok(())
    }
}

fn invalid(selector: &str, message: &str) -> FilterError {
    FilterError::Selector {
        selector: selector.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str) -> QName {
        QName::new(name)
    }

    #[test]
    fn test_parse_simple() {
        let path = SelectorPath::parse("order/item").unwrap();
        assert_eq!(path.steps().len(), 2);
        assert_eq!(path.target_step().test, NameTest::Name("item".into()));
        assert!(!path.accesses_text());
    }

    #[test]
    fn test_parse_index_predicate() {
        let path = SelectorPath::parse("order/item[2]").unwrap();
        assert_eq!(path.target_step().index, Some(2));
        assert_eq!(path.step_key(1), "order/item");
    }

    #[test]
    fn test_parse_text_token() {
        let path = SelectorPath::parse("order/price/text()").unwrap();
        assert!(path.accesses_text());
        assert_eq!(path.target_step().test, NameTest::Name("price".into()));
    }

    #[test]
    fn test_parse_rejects_zero_index() {
        assert!(SelectorPath::parse("item[0]").is_err());
    }

    #[test]
    fn test_parse_rejects_interior_text() {
        assert!(SelectorPath::parse("a/text()/b").is_err());
    }

    #[test]
    fn test_parse_namespaced_star() {
        let path = SelectorPath::parse("ns:*").unwrap();
        assert!(path.targets_star());
        assert_eq!(path.target_step().prefix.as_deref(), Some("ns"));
    }

    #[test]
    fn test_context_match_unanchored() {
        let path = SelectorPath::parse("order/item").unwrap();
        // <shop><order><item/></order></shop>, ancestors nearest-first
        assert!(path.matches_context(&q("item"), &[q("order"), q("shop")]));
        assert!(!path.matches_context(&q("item"), &[q("shop")]));
    }

    #[test]
    fn test_context_match_star_star_gap() {
        let path = SelectorPath::parse("shop/**/price").unwrap();
        assert!(path.matches_context(&q("price"), &[q("item"), q("order"), q("shop")]));
        assert!(path.matches_context(&q("price"), &[q("shop")]));
        assert!(!path.matches_context(&q("price"), &[q("basket")]));
    }

    #[test]
    fn test_context_match_single_star() {
        let path = SelectorPath::parse("order/*/price").unwrap();
        assert!(path.matches_context(&q("price"), &[q("item"), q("order")]));
        assert!(!path.matches_context(&q("price"), &[q("order")]));
    }

    #[test]
    fn test_display_round_trip() {
        let path = SelectorPath::parse("order/item[2]/price/text()").unwrap();
        assert_eq!(path.to_string(), "order/item[2]/price/text()");
    }
}
