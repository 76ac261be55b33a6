/* Human readable renderings of a match result. */

use crate::tree::TreePrinter;
use crate::{MatchResult, ParseError};

use itertools::Itertools;
use serde_json::Value;


/* Public Interface */

/* One line per error, deepest first:
 *
 *     Error at 2.5: expected "]" but got ")"
 *     At 2.1: expected "[1, 2" but got "[1, 2)"
 *
 * Empty for a successful match. */
pub fn describe(result: &MatchResult) -> String {
    result.errors.iter()
        .enumerate()
        .map(|(index, error)| describe_error(error, index == 0))
        .join("\n")
}

/* The error description of a failed match, or the indented tree of a
 * successful one. */
pub fn stringify(result: &MatchResult) -> String {
    stringify_with(result, &TreePrinter::default())
}

pub fn stringify_with(result: &MatchResult, printer: &TreePrinter) -> String {
    if result.has_error() {
        return describe(result);
    }

    let tree = printer.render_at(&result.tree, printer.indent);
    format!("Tree\n----------\n{tree}")
}


/* Private Implementation */

fn describe_error(error: &ParseError, first: bool) -> String {
    format!(
        "{} {}: expected {} but got {}",
        if first { "Error at" } else { "At" },
        error.position,
        quote(&error.expected),
        quote(&error.actual),
    )
}

/* JSON string syntax, so quotes and control characters stay readable. */
pub(crate) fn quote(text: &str) -> String {
    Value::from(text).to_string()
}


/* Tests */

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Position, RuleNode, RuleTree};

    fn error(line: usize, column: usize, expected: &str, actual: &str) -> ParseError {
        ParseError {
            offset: 0,
            position: Position { line, column },
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    #[test]
    fn describes_every_error() {
        let result = MatchResult {
            value: "ab\n".to_string(),
            next_offset: 3,
            tree: RuleTree::new(),
            errors: vec![
                error(2, 1, "c", "\n"),
                error(1, 1, "ab\"c", "ab\n"),
            ],
        };

        assert_eq!(
            describe(&result),
            "Error at 2.1: expected \"c\" but got \"\\n\"\nAt 1.1: expected \"ab\\\"c\" but got \"ab\\n\""
        );
        assert_eq!(stringify(&result), describe(&result));
    }

    #[test]
    fn errors_display_with_the_same_quoting() {
        let error = error(1, 1, "ab\"c", "ab\n");
        assert_eq!(error.to_string(), "expected \"ab\\\"c\" but got \"ab\\n\" at 1.1");
    }

    #[test]
    fn successful_results_render_their_tree() {
        let node = RuleNode { value: Value::from("7"), span: 0..1, children: RuleTree::new() };
        let result = MatchResult {
            value: "7".to_string(),
            next_offset: 1,
            tree: RuleTree::single("digit", node),
            errors: vec![],
        };

        assert_eq!(describe(&result), "");
        assert_eq!(stringify(&result), "Tree\n----------\n  digit: \"7\"");
        assert_eq!(result.to_string(), stringify(&result));
    }
}
