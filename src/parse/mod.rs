mod packrat_parser;



use packrat_parser::{Context, Stats};

use crate::grammar::{ConfigurationError, Matcher, Node, RuleDefinition};
use crate::report::quote;
use crate::{Position, RuleTree};

use log::debug;
use thiserror::Error;

use std::collections::HashMap;


/* Public Interface */

/* A frozen grammar, built by Grammar::build(). Parsing never mutates it, so one
 * Parser can serve any number of threads at once; each call to execute keeps
 * its own memo table. */
#[derive(Debug)]
pub struct Parser {
    pub(crate) nodes: Vec<Node>,
    pub(crate) rules: Vec<RuleDefinition>,
    pub(crate) names: HashMap<String, usize>,
}

/* What every matcher produces. A match failed iff `errors` is non-empty; in
 * that case `value` holds the offending text and `next_offset` is meaningless. */
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub value: String,
    pub next_offset: usize,
    pub tree: RuleTree,
    /* Deepest failure first, followed by the context each enclosing
     * sequence, repetition and rule added on the way out. */
    pub errors: Vec<ParseError>,
}

/* One "expected X but got Y" entry of a failed match. */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {} but got {} at {position}", quote(.expected), quote(.actual))]
pub struct ParseError {
    pub offset: usize,
    /* Resolved from `offset` when execute returns. */
    pub position: Position,
    pub expected: String,
    pub actual: String,
}

impl Parser {
    /* Runs `matcher` against `input` from offset 0. The match does not have to
     * consume all input; sequence it with Grammar::end() for that.
     *
     * Panics if `matcher` was not created by the grammar this parser was built
     * from. */
    pub fn execute(&self, matcher: Matcher, input: &str) -> MatchResult {
        self.execute_with_stats(matcher, input).0
    }

    /* Parses `input` starting from the rule called `start_rule`. */
    pub fn parse_string(&self, input: &str, start_rule: &str) -> Result<MatchResult, ConfigurationError> {
        let start = self.rule(start_rule)
            .ok_or_else(|| ConfigurationError::UndefinedRule(start_rule.to_string()))?;
        Ok(self.execute(start, input))
    }

    /* A matcher applying the rule called `name`. */
    pub fn rule(&self, name: &str) -> Option<Matcher> {
        self.names.get(name).map(|&id| self.rules[id].entry)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name.as_str())
    }
}

impl Parser {
    pub(crate) fn execute_with_stats(&self, matcher: Matcher, input: &str) -> (MatchResult, Stats) {
        let mut context = Context::new(self, input);
        let mut result = context.run(matcher, 0);
        context.locate(&mut result.errors);

        let stats = context.stats();
        debug!(
            "parsed {} bytes: {} ({} rule evaluations, {} memo hits)",
            input.len(),
            if result.is_ok() { "ok" } else { "failed" },
            stats.evaluations,
            stats.memo_hits,
        );

        (result, stats)
    }
}

impl MatchResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /* The deepest, most specific failure. */
    pub fn error(&self) -> Option<&ParseError> {
        self.errors.first()
    }

    pub fn into_result(self) -> Result<RuleTree, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(self.tree)
        }
        else {
            Err(self.errors)
        }
    }

    pub(crate) fn success(value: String, next_offset: usize, tree: RuleTree) -> Self {
        MatchResult { value, next_offset, tree, errors: vec![] }
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::report::stringify(self))
    }
}
