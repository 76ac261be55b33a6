/* Builds grammars out of combinators. Matchers live in an arena owned by the
 * Grammar and are handed out as copyable indices, so rules can refer to each
 * other (and to themselves) without any ownership cycles. Once every rule is
 * defined, `build` freezes the grammar into a Parser. */

use crate::Parser;

use log::debug;
use serde_json::Value;
use thiserror::Error;

use std::collections::HashMap;
use std::fmt;
use std::ops::{Bound, RangeBounds, RangeInclusive};


/* Public Interface */

/* Handle to a matcher inside the grammar (and later the parser) that created it.
 * Handles from one grammar mean nothing to another. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Matcher(pub(crate) usize);

/* Anything a combinator accepts as a sub-matcher. Strings become literals and
 * inclusive char ranges become character classes. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatcherSpec {
    Literal(String),
    CharRange(char, char),
    Matcher(Matcher),
}

impl From<&str> for MatcherSpec {
    fn from(word: &str) -> Self {
        MatcherSpec::Literal(word.to_string())
    }
}

impl From<String> for MatcherSpec {
    fn from(word: String) -> Self {
        MatcherSpec::Literal(word)
    }
}

impl From<char> for MatcherSpec {
    fn from(ch: char) -> Self {
        MatcherSpec::Literal(ch.to_string())
    }
}

impl From<RangeInclusive<char>> for MatcherSpec {
    fn from(range: RangeInclusive<char>) -> Self {
        MatcherSpec::CharRange(*range.start(), *range.end())
    }
}

impl From<Matcher> for MatcherSpec {
    fn from(matcher: Matcher) -> Self {
        MatcherSpec::Matcher(matcher)
    }
}

/* Mistakes in the grammar itself. These are found while building, never while
 * parsing. */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("rule `{0}` is already defined")]
    DuplicateRule(String),
    #[error("rule `{0}` is applied but never defined")]
    UndefinedRule(String),
    #[error("character range '{lo}'..'{hi}' matches nothing")]
    EmptyRange { lo: char, hi: char },
    #[error("repetition range {min}..{max_exclusive} allows no repetition count")]
    InvalidRepeat { min: usize, max_exclusive: usize },
}

/* Turns a rule's matched text into the value stored in its tree node. */
pub type Rewrite = Box<dyn Fn(&str) -> Value + Send + Sync>;

#[derive(Default)]
pub struct Grammar {
    nodes: Vec<Draft>,
    rules: Vec<RuleDefinition>,
    names: HashMap<String, usize>,
    /* Problems found while constructing matchers; reported by build(). */
    deferred: Vec<ConfigurationError>,
}

impl Grammar {
    pub fn new() -> Self {
        Grammar::default()
    }

    /* Matches `word` exactly. */
    pub fn literal(&mut self, word: impl Into<String>) -> Matcher {
        self.push(Node::Literal(word.into()))
    }

    /* Matches one character between lo and hi, inclusive. */
    pub fn char_range(&mut self, lo: char, hi: char) -> Matcher {
        if lo > hi {
            self.deferred.push(ConfigurationError::EmptyRange { lo, hi });
        }
        self.push(Node::CharRange(lo, hi))
    }

    /* Matches only at the end of input, consuming nothing. */
    pub fn end(&mut self) -> Matcher {
        self.push(Node::End)
    }

    pub fn sequence<I, S>(&mut self, parts: I) -> Matcher
    where
        I: IntoIterator<Item = S>,
        S: Into<MatcherSpec>,
    {
        let parts = parts.into_iter()
            .map(|part| self.resolve(part))
            .collect();
        self.push(Node::Sequence(parts))
    }

    /* Ordered choice: the first alternative that matches wins. */
    pub fn choice<I, S>(&mut self, alternatives: I) -> Matcher
    where
        I: IntoIterator<Item = S>,
        S: Into<MatcherSpec>,
    {
        let alternatives = alternatives.into_iter()
            .map(|alternative| self.resolve(alternative))
            .collect();
        self.push(Node::Choice(alternatives))
    }

    /* Greedy repetition with bounds, e.g. `2..=4`, `1..` or `..`. */
    pub fn repeat(&mut self, inner: impl Into<MatcherSpec>, times: impl RangeBounds<usize>) -> Matcher {
        let inner = self.resolve(inner);

        let min = match times.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let max_exclusive = match times.end_bound() {
            Bound::Included(&n) => Some(n.saturating_add(1)),
            Bound::Excluded(&n) => Some(n),
            Bound::Unbounded => None,
        };

        if let Some(max_exclusive) = max_exclusive.filter(|&max_exclusive| max_exclusive <= min) {
            self.deferred.push(ConfigurationError::InvalidRepeat { min, max_exclusive });
        }

        self.push(Node::Repeat { inner, min, max: max_exclusive.map(|n| n.saturating_sub(1)) })
    }

    /* Zero or more. */
    pub fn any(&mut self, inner: impl Into<MatcherSpec>) -> Matcher {
        self.repeat(inner, ..)
    }

    /* One or more. */
    pub fn some(&mut self, inner: impl Into<MatcherSpec>) -> Matcher {
        self.repeat(inner, 1..)
    }

    pub fn optional(&mut self, inner: impl Into<MatcherSpec>) -> Matcher {
        self.repeat(inner, ..=1)
    }

    /* Consumes a single character, provided `inner` does not match here. */
    pub fn not(&mut self, inner: impl Into<MatcherSpec>) -> Matcher {
        let inner = self.resolve(inner);
        self.push(Node::Not(inner))
    }

    /* Everything up to (not including) the first place `inner` matches. */
    pub fn without(&mut self, inner: impl Into<MatcherSpec>) -> Matcher {
        let not = self.not(inner);
        self.any(not)
    }

    /* "\n", optionally preceded by carriage returns. */
    pub fn linebreak(&mut self) -> Matcher {
        let carriage_returns = self.any("\r");
        self.sequence([MatcherSpec::from(carriage_returns), "\n".into()])
    }

    /* At least `min` spaces or tabs. */
    pub fn whitespace(&mut self, min: usize) -> Matcher {
        let blank = self.choice([" ", "\t"]);
        self.repeat(blank, min..)
    }

    /* Registers `name` for `body` and returns a matcher applying the rule. */
    pub fn define(&mut self, name: &str, body: impl Into<MatcherSpec>) -> Result<Matcher, ConfigurationError> {
        self.register(name, body, None)
    }

    /* Like define, but the rule's node value is `rewrite` applied to the
     * matched text (only on success). */
    pub fn define_with<F>(&mut self, name: &str, body: impl Into<MatcherSpec>, rewrite: F) -> Result<Matcher, ConfigurationError>
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        self.register(name, body, Some(Box::new(rewrite)))
    }

    /* Applies the rule called `name`. The rule may be defined later; it only
     * has to exist by the time the grammar is built. */
    pub fn apply(&mut self, name: &str) -> Matcher {
        match self.names.get(name) {
            Some(&id) => self.rules[id].entry,
            None => {
                self.nodes.push(Draft::Apply(name.to_string()));
                Matcher(self.nodes.len() - 1)
            }
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /* Resolves every forward reference and freezes the grammar. */
    pub fn build(mut self) -> Result<Parser, ConfigurationError> {
        if !self.deferred.is_empty() {
            return Err(self.deferred.swap_remove(0));
        }

        let nodes = self.nodes.into_iter()
            .map(|draft| match draft {
                Draft::Ready(node) => Ok(node),
                Draft::Apply(name) => match self.names.get(&name) {
                    Some(&id) => Ok(Node::Call(id)),
                    None => Err(ConfigurationError::UndefinedRule(name)),
                },
            })
            .collect::<Result<Vec<Node>, ConfigurationError>>()?;

        debug!("built grammar with {} rules and {} matchers", self.rules.len(), nodes.len());

        Ok(Parser { nodes, rules: self.rules, names: self.names })
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("rules", &self.rules)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}


/* Private Implementation */

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Literal(String),
    CharRange(char, char),
    End,
    Sequence(Vec<Matcher>),
    Choice(Vec<Matcher>),
    Repeat { inner: Matcher, min: usize, max: Option<usize> },
    Not(Matcher),
    /* Application of the rule with this index. */
    Call(usize),
}

/* Grammar-side node. A rule applied before its definition is only known by
 * name until build(). */
#[derive(Debug, Clone, PartialEq, Eq)]
enum Draft {
    Ready(Node),
    Apply(String),
}

pub(crate) struct RuleDefinition {
    pub(crate) name: String,
    pub(crate) body: Matcher,
    /* The Call node applying this rule. */
    pub(crate) entry: Matcher,
    pub(crate) rewrite: Option<Rewrite>,
}

impl fmt::Debug for RuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDefinition")
            .field("name", &self.name)
            .field("body", &self.body)
            .field("rewrite", &self.rewrite.is_some())
            .finish()
    }
}

impl Grammar {
    fn push(&mut self, node: Node) -> Matcher {
        self.nodes.push(Draft::Ready(node));
        Matcher(self.nodes.len() - 1)
    }

    fn resolve(&mut self, spec: impl Into<MatcherSpec>) -> Matcher {
        match spec.into() {
            MatcherSpec::Literal(word) => self.literal(word),
            MatcherSpec::CharRange(lo, hi) => self.char_range(lo, hi),
            MatcherSpec::Matcher(matcher) => matcher,
        }
    }

    fn register(&mut self, name: &str, body: impl Into<MatcherSpec>, rewrite: Option<Rewrite>) -> Result<Matcher, ConfigurationError> {
        if self.names.contains_key(name) {
            return Err(ConfigurationError::DuplicateRule(name.to_string()));
        }

        let body = self.resolve(body);
        let id = self.rules.len();
        let entry = self.push(Node::Call(id));

        self.rules.push(RuleDefinition { name: name.to_string(), body, entry, rewrite });
        self.names.insert(name.to_string(), id);

        Ok(entry)
    }
}


/* Tests */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_rules_are_rejected() {
        let mut grammar = Grammar::new();
        grammar.define("digit", '0'..='9').expect("first definition");

        assert_eq!(
            grammar.define("digit", "x"),
            Err(ConfigurationError::DuplicateRule("digit".to_string()))
        );
        assert!(grammar.is_defined("digit"));
    }

    #[test]
    fn forward_references_resolve_at_build() {
        let mut grammar = Grammar::new();
        let later = grammar.apply("later");
        grammar.define("start", later).expect("defined");
        grammar.define("later", "x").expect("defined");

        let parser = grammar.build().expect("all rules defined");
        let start = parser.rules[0].body;
        assert_eq!(parser.nodes[start.0], Node::Call(1));
    }

    #[test]
    fn undefined_rules_fail_the_build() {
        let mut grammar = Grammar::new();
        let missing = grammar.apply("missing");
        grammar.define("start", missing).expect("defined");

        assert_eq!(
            grammar.build().err(),
            Some(ConfigurationError::UndefinedRule("missing".to_string()))
        );
    }

    #[test]
    fn apply_after_define_reuses_the_rule_entry() {
        let mut grammar = Grammar::new();
        let entry = grammar.define("a", "a").expect("defined");

        assert_eq!(grammar.apply("a"), entry);
    }

    #[test]
    fn bad_bounds_fail_the_build() {
        let mut grammar = Grammar::new();
        grammar.char_range('z', 'a');
        assert_eq!(
            grammar.build().err(),
            Some(ConfigurationError::EmptyRange { lo: 'z', hi: 'a' })
        );

        let mut grammar = Grammar::new();
        grammar.repeat("a", 3..3);
        assert_eq!(
            grammar.build().err(),
            Some(ConfigurationError::InvalidRepeat { min: 3, max_exclusive: 3 })
        );

        let mut grammar = Grammar::new();
        grammar.repeat("a", 0..=0);
        assert!(grammar.build().is_ok());
    }

    #[test]
    fn specs_normalize_into_nodes() {
        let mut grammar = Grammar::new();
        let sequence = grammar.sequence([MatcherSpec::from("ab"), ('0'..='9').into(), 'c'.into()]);

        assert_eq!(grammar.nodes[0], Draft::Ready(Node::Literal("ab".to_string())));
        assert_eq!(grammar.nodes[1], Draft::Ready(Node::CharRange('0', '9')));
        assert_eq!(grammar.nodes[2], Draft::Ready(Node::Literal("c".to_string())));
        assert_eq!(grammar.nodes[sequence.0], Draft::Ready(Node::Sequence(vec![Matcher(0), Matcher(1), Matcher(2)])));

        let repeat = grammar.some(sequence);
        assert_eq!(grammar.nodes[repeat.0], Draft::Ready(Node::Repeat { inner: sequence, min: 1, max: None }));

        let optional = grammar.optional("x");
        assert!(matches!(grammar.nodes[optional.0], Draft::Ready(Node::Repeat { min: 0, max: Some(1), .. })));

        let pending = grammar.apply("later");
        assert_eq!(grammar.nodes[pending.0], Draft::Apply("later".to_string()));
    }
}
