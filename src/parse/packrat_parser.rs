use crate::grammar::{Matcher, Node};
use crate::input::Input;
use crate::tree::{RuleNode, RuleTree};
use crate::Position;
use super::{MatchResult, ParseError, Parser};

use log::trace;
use serde_json::Value;

use std::collections::HashMap;


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Stats {
    pub evaluations: usize,
    pub memo_hits: usize,
    /* Errors given a line and column. */
    pub located: usize,
}

/* State of a single execute() call. Nothing in here outlives the call, which
 * is what lets concurrent parses share one Parser. */
pub(crate) struct Context<'p, 'i> {
    parser: &'p Parser,
    input: Input<'i>,
    /* Keyed by (rule index, offset): every rule is evaluated at most once per
     * position. */
    memo: HashMap<(usize, usize), MatchResult>,
    stats: Stats,
}

impl<'p, 'i> Context<'p, 'i> {
    pub fn new(parser: &'p Parser, text: &'i str) -> Self {
        Context { parser, input: Input::new(text), memo: HashMap::new(), stats: Stats::default() }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /* Fills in the positions of the errors a finished parse reports. Failures
     * that were backtracked over never get one. */
    pub fn locate(&mut self, errors: &mut [ParseError]) {
        for error in errors {
            error.position = self.input.position(error.offset);
            self.stats.located += 1;
        }
    }

    pub fn run(&mut self, matcher: Matcher, offset: usize) -> MatchResult {
        let parser = self.parser;

        match &parser.nodes[matcher.0] {
            Node::Literal(word) => self.literal(word, offset),
            Node::CharRange(lo, hi) => self.char_range(*lo, *hi, offset),
            Node::End => self.end(offset),
            Node::Sequence(parts) => self.sequence(parts, offset),
            Node::Choice(alternatives) => self.choice(alternatives, offset),
            Node::Repeat { inner, min, max } => self.repeat(*inner, *min, *max, offset),
            Node::Not(inner) => self.not(*inner, offset),
            Node::Call(id) => self.apply_rule(*id, offset),
        }
    }

    fn literal(&mut self, word: &str, offset: usize) -> MatchResult {
        if self.input.starts_with(offset, word) {
            return MatchResult::success(word.to_string(), offset + word.len(), RuleTree::new());
        }

        let actual = self.input.take_chars(offset, word.chars().count()).to_string();
        self.failure(offset, actual, word.to_string())
    }

    fn char_range(&mut self, lo: char, hi: char, offset: usize) -> MatchResult {
        match self.input.char_at(offset) {
            Some(ch) if (lo..=hi).contains(&ch) =>
                MatchResult::success(ch.to_string(), offset + ch.len_utf8(), RuleTree::new()),
            found => {
                let actual = found.map(String::from).unwrap_or_default();
                self.failure(offset, actual, format!("[{lo}-{hi}]"))
            }
        }
    }

    fn end(&mut self, offset: usize) -> MatchResult {
        match self.input.char_at(offset) {
            None if offset >= self.input.len() => MatchResult::success(String::new(), offset, RuleTree::new()),
            found => {
                let actual = found.map(String::from).unwrap_or_default();
                self.failure(offset, actual, "[end of input]".to_string())
            }
        }
    }

    /* Short-circuits on the first failing part. The failure keeps the tree
     * built by the parts that matched before it. */
    fn sequence(&mut self, parts: &[Matcher], offset: usize) -> MatchResult {
        let mut value = String::new();
        let mut tree = RuleTree::new();
        let mut cursor = offset;

        for &part in parts {
            let result = self.run(part, cursor);

            if result.has_error() {
                let expected = format!(
                    "{value}{}",
                    result.errors.last().map(|error| error.expected.as_str()).unwrap_or_default()
                );
                value.push_str(&result.value);

                let mut errors = result.errors;
                errors.push(self.error(offset, expected, value.clone()));
                return MatchResult { value, next_offset: result.next_offset, tree, errors };
            }

            value.push_str(&result.value);
            cursor = result.next_offset;
            tree.merge(result.tree);
        }

        MatchResult::success(value, cursor, tree)
    }

    /* Every alternative starts from the same offset. If none matches, the
     * last alternative's failure is reported. */
    fn choice(&mut self, alternatives: &[Matcher], offset: usize) -> MatchResult {
        let mut last_failure = None;

        for &alternative in alternatives {
            let result = self.run(alternative, offset);
            if result.is_ok() {
                return result;
            }
            last_failure = Some(result);
        }

        last_failure.unwrap_or_else(|| MatchResult::success(String::new(), offset, RuleTree::new()))
    }

    fn repeat(&mut self, inner: Matcher, min: usize, max: Option<usize>, offset: usize) -> MatchResult {
        let mut value = String::new();
        let mut tree = RuleTree::new();
        let mut cursor = offset;
        let mut count = 0;

        while max.map_or(true, |max| count < max) {
            let result = self.run(inner, cursor);

            if result.has_error() {
                if count < min {
                    value.push_str(&result.value);

                    let mut errors = result.errors;
                    errors.push(self.error(offset, format!("{min} times or more"), value.clone()));
                    return MatchResult { value, next_offset: result.next_offset, tree, errors };
                }
                break;
            }

            count += 1;
            let consumed = result.next_offset > cursor;

            value.push_str(&result.value);
            cursor = result.next_offset;
            tree.merge(result.tree);

            /* Matching nothing once means matching nothing forever. */
            if !consumed {
                break;
            }
        }

        MatchResult::success(value, cursor, tree)
    }

    fn not(&mut self, inner: Matcher, offset: usize) -> MatchResult {
        let Some(ch) = self.input.char_at(offset) else {
            return self.failure(offset, String::new(), "[a char]".to_string());
        };

        let result = self.run(inner, offset);
        if result.is_ok() {
            let expected = format!("[not '{}']", result.value);
            return self.failure(offset, result.value, expected);
        }

        MatchResult::success(ch.to_string(), offset + ch.len_utf8(), RuleTree::new())
    }

    fn apply_rule(&mut self, id: usize, offset: usize) -> MatchResult {
        if let Some(cached) = self.memo.get(&(id, offset)) {
            self.stats.memo_hits += 1;
            trace!("memo hit for rule {} at {}", self.parser.rules[id].name, offset);
            return cached.clone();
        }

        let parser = self.parser;
        let rule = &parser.rules[id];
        trace!("evaluating rule {} at {}", rule.name, offset);

        /* A rule reached again at the same offset before finishing is left
         * recursive; it fails there instead of recursing forever. */
        let seed = self.failure(offset, String::new(), format!("[Rule {}]", rule.name));
        self.memo.insert((id, offset), seed);

        self.stats.evaluations += 1;
        let MatchResult { value, next_offset, tree: children, mut errors } = self.run(rule.body, offset);

        let node_value = match &rule.rewrite {
            Some(rewrite) if errors.is_empty() => rewrite(&value),
            _ => Value::String(value.clone()),
        };

        if !errors.is_empty() {
            errors.push(self.error(offset, format!("[Rule {}]", rule.name), value.clone()));
        }

        let node = RuleNode { value: node_value, span: offset..next_offset, children };
        let result = MatchResult {
            value,
            next_offset,
            tree: RuleTree::single(rule.name.as_str(), node),
            errors,
        };

        self.memo.insert((id, offset), result.clone());
        result
    }

    fn error(&self, offset: usize, expected: String, actual: String) -> ParseError {
        ParseError { offset, position: Position::default(), expected, actual }
    }

    fn failure(&self, offset: usize, actual: String, expected: String) -> MatchResult {
        let next_offset = offset + actual.len();
        let error = self.error(offset, expected, actual.clone());
        MatchResult { value: actual, next_offset, tree: RuleTree::new(), errors: vec![error] }
    }
}
