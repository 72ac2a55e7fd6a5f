use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Quantifier {
    pub fn min(self) -> usize {
        match self {
            Quantifier::One | Quantifier::OneOrMore => 1,
            Quantifier::Optional | Quantifier::ZeroOrMore => 0,
        }
    }

    pub fn max(self) -> Option<usize> {
        match self {
            Quantifier::One | Quantifier::Optional => Some(1),
            Quantifier::ZeroOrMore | Quantifier::OneOrMore => None,
        }
    }
}

/// One `name[quantifier]` element of a content expression. `name` is either a
/// node type name or a group name; the schema resolves it to `candidates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTerm {
    pub name: String,
    pub quantifier: Quantifier,
    pub candidates: Vec<String>,
}

/// A parsed content expression such as `"paragraph block*"` or `"list_item+"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentExpr {
    source: String,
    terms: Vec<ContentTerm>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentParseError(pub String);

impl fmt::Display for ContentParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ContentExpr {
    pub fn parse(source: &str) -> Result<Self, ContentParseError> {
        let mut terms = Vec::new();
        for token in source.split_whitespace() {
            let (name, quantifier) = match token.chars().last() {
                Some('*') => (&token[..token.len() - 1], Quantifier::ZeroOrMore),
                Some('+') => (&token[..token.len() - 1], Quantifier::OneOrMore),
                Some('?') => (&token[..token.len() - 1], Quantifier::Optional),
                _ => (token, Quantifier::One),
            };
            if name.is_empty() {
                return Err(ContentParseError(format!(
                    "quantifier without a name in {source:?}"
                )));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(ContentParseError(format!(
                    "unexpected token {token:?} in {source:?}"
                )));
            }
            terms.push(ContentTerm {
                name: name.to_string(),
                quantifier,
                candidates: Vec::new(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            terms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn terms(&self) -> &[ContentTerm] {
        &self.terms
    }

    pub(crate) fn terms_mut(&mut self) -> &mut [ContentTerm] {
        &mut self.terms
    }

    /// Leaf types: no content at all.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Every node kind that may appear anywhere in this expression.
    pub fn allowed_kinds(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .flat_map(|t| t.candidates.iter().map(String::as_str))
    }

    pub fn allows(&self, kind: &str) -> bool {
        self.allowed_kinds().any(|k| k == kind)
    }

    /// Whether the sequence of child kinds satisfies the expression.
    pub fn matches<S: AsRef<str>>(&self, kinds: &[S]) -> bool {
        match_from(&self.terms, 0, kinds, 0)
    }
}

fn match_from<S: AsRef<str>>(terms: &[ContentTerm], term_ix: usize, kinds: &[S], at: usize) -> bool {
    let Some(term) = terms.get(term_ix) else {
        return at == kinds.len();
    };

    let mut taken = 0usize;
    let mut ends = vec![at];
    let mut cursor = at;
    loop {
        if let Some(max) = term.quantifier.max() {
            if taken >= max {
                break;
            }
        }
        let Some(kind) = kinds.get(cursor) else {
            break;
        };
        if !term.candidates.iter().any(|c| c == kind.as_ref()) {
            break;
        }
        taken += 1;
        cursor += 1;
        ends.push(cursor);
    }

    // Greedy first, backtrack towards the minimum.
    for (count, end) in ends.iter().enumerate().rev() {
        if count < term.quantifier.min() {
            break;
        }
        if match_from(terms, term_ix + 1, kinds, *end) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(source: &str, groups: &[(&str, &[&str])]) -> ContentExpr {
        let mut expr = ContentExpr::parse(source).unwrap();
        for term in expr.terms_mut() {
            term.candidates = groups
                .iter()
                .find(|(name, _)| *name == term.name)
                .map(|(_, kinds)| kinds.iter().map(|k| k.to_string()).collect())
                .unwrap_or_else(|| vec![term.name.clone()]);
        }
        expr
    }

    #[test]
    fn parses_quantifiers() {
        let expr = ContentExpr::parse("paragraph block* caption? item+").unwrap();
        let quantifiers: Vec<_> = expr.terms().iter().map(|t| t.quantifier).collect();
        assert_eq!(
            quantifiers,
            vec![
                Quantifier::One,
                Quantifier::ZeroOrMore,
                Quantifier::Optional,
                Quantifier::OneOrMore
            ]
        );
    }

    #[test]
    fn rejects_dangling_quantifier() {
        assert!(ContentExpr::parse("paragraph +").is_err());
        assert!(ContentExpr::parse("(a|b)").is_err());
    }

    #[test]
    fn backtracks_when_greedy_term_overlaps_next() {
        let expr = resolved("block* paragraph", &[("block", &["paragraph", "heading"])]);
        assert!(expr.matches(&["heading", "paragraph"]));
        assert!(expr.matches(&["paragraph"]));
        assert!(!expr.matches(&["paragraph", "heading"]));
    }

    #[test]
    fn one_or_more_requires_a_child() {
        let expr = resolved("list_item+", &[]);
        assert!(!expr.matches::<&str>(&[]));
        assert!(expr.matches(&["list_item", "list_item"]));
        assert!(!expr.matches(&["paragraph"]));
    }
}
