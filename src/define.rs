/* Allows creation of a grammar from a string definition. Projects will
 * likely want to give that definition in a file, but we accept it as a string.
 *
 *     Rule : expression ;      # comments run to the end of the line
 *
 * Expressions are built from "literals" (with the usual escapes), "a".."z"
 * character ranges, rule names, END, grouping parentheses, sequences by
 * juxtaposition, ordered choice with |, and the postfix modifiers * + ? ~
 * (not) and {min,max}. */

use crate::{ConfigurationError, Grammar, Matcher};

use itertools::Itertools;
use thiserror::Error;


/* Public Interface */

pub fn define_grammar(definition: &str) -> Result<Grammar, DefinitionError> {
    let tokens = tokenize(definition)?;
    let rule_token_slices = tokens.split(|t| t == &DefinitionToken::Operator(Operator::Semicolon));

    match rule_token_slices.clone().last() {
        None => return Err(DefinitionError::Syntax("No rules defined".to_string())),
        Some(slice) if !slice.is_empty() => return Err(DefinitionError::Syntax("Missing final semicolon".to_string())),
        _ => ()
    }

    let rules = rule_token_slices
        .dropping_back(1)
        .map(parse_rule)
        .collect::<Result<Vec<(String, RuleExpression)>, DefinitionError>>()?;

    if rules.is_empty() {
        return Err(DefinitionError::Syntax("No rules defined".to_string()));
    }

    let mut grammar = Grammar::new();
    for (name, expression) in &rules {
        let body = compile(expression, &mut grammar);
        grammar.define(name, body)?;
    }

    Ok(grammar)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("{0}")]
    Syntax(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}


/* Private Implementation */

/* This is a token for the grammar definition language. This is completely
 * unrelated to the text the resulting parser consumes. */
#[derive(PartialEq, Eq, Debug, Clone, PartialOrd, Ord)]
enum DefinitionToken {
    Operator (Operator),
    Identifier (String),
    StringLiteral (String), // Escape sequences already processed.
    Repeat (usize, Option<usize>), // {min,max}; max None when left open
    LeftParenthesis,
    RightParenthesis,
}
// Note: Ord definition reflects precedence, so Operator has highest precedence


#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord)]
enum Operator {
    Colon,
    Semicolon,
    Bar,
    Plus,
    Star,
    QuestionMark,
    Tilde,
    Dot,
    Range,
}
// Note: Ord definition reflects precedence, so Bar has least precedence.

/* Describes what matches a specific rule. The name of the associated rule is
 * stored alongside it. */
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleExpression {
    Literal (String),
    CharRange (char, char),
    End,
    RuleName (String),
    Concatenation (Vec<RuleExpression>),
    Alternatives (Vec<RuleExpression>),
    Optional (Box<RuleExpression>),
    OneOrMore (Box<RuleExpression>),
    Many (Box<RuleExpression>),
    Not (Box<RuleExpression>),
    Repeat (Box<RuleExpression>, usize, Option<usize>),
}

/* Converts a string into tokens. Whitespace is removed, but considered in order
 * to differentiate adjacent identifiers. Also strips comments */
fn tokenize(definition: &str) -> Result<Vec<DefinitionToken>, DefinitionError> {
    let mut tokens = Vec::new();
    let mut curr_token = String::new();
    let mut quote_mode = false;
    let mut comment_mode = false;
    let mut slash_mode = false;
    let mut brace_mode = false;

    let push_curr_token = |curr_token: &mut String, tokens: &mut Vec<DefinitionToken>| -> Result<(), DefinitionError> {
        if !curr_token.is_empty() {
            tokens.push(string_to_token(curr_token.clone())?);
            curr_token.clear();
        }
        Ok(())
    };

    for char in definition.chars() {
        if comment_mode && char == '\n' {
            comment_mode = false;
        }
        else if comment_mode {
            continue;
        }
        else if slash_mode {
            slash_mode = false;
            curr_token.push(char);
        }
        else if char == '"' && !quote_mode {
            quote_mode = true;
            push_curr_token(&mut curr_token, &mut tokens)?;
            curr_token.push('"');
        }
        else if char == '"' && quote_mode {
            quote_mode = false;
            curr_token.push('"');
            push_curr_token(&mut curr_token, &mut tokens)?;
        }
        else if quote_mode && char == '\\' {
            slash_mode = true;
            curr_token.push('\\');
        }
        else if quote_mode {
            curr_token.push(char);
        }
        else if brace_mode {
            curr_token.push(char);
            if char == '}' {
                brace_mode = false;
                push_curr_token(&mut curr_token, &mut tokens)?;
            }
        }
        else if char == '{' {
            brace_mode = true;
            push_curr_token(&mut curr_token, &mut tokens)?;
            curr_token.push('{');
        }
        else if char == '#' {
            comment_mode = true;
            push_curr_token(&mut curr_token, &mut tokens)?;
        }
        else if char.is_whitespace() {
            push_curr_token(&mut curr_token, &mut tokens)?;
        }
        else if is_identifier_char(char) {
            curr_token.push(char);
        }
        else {
            push_curr_token(&mut curr_token, &mut tokens)?;

            // Two adjacent dots form the range operator
            if char == '.' && tokens.last() == Some(&DefinitionToken::Operator(Operator::Dot)) {
                tokens.pop();
                tokens.push(DefinitionToken::Operator(Operator::Range));
            }
            else {
                tokens.push(string_to_token(char.to_string())?);
            }
        }
    }

    if quote_mode {
        return Err(DefinitionError::Syntax("Unterminated string literal".to_string()));
    }
    if brace_mode {
        return Err(DefinitionError::Syntax("Unterminated repetition bounds".to_string()));
    }

    push_curr_token(&mut curr_token, &mut tokens)?;

    Ok(tokens)
}

// Weird semantics for efficiency within above algorithm
fn string_to_token(mut string: String) -> Result<DefinitionToken, DefinitionError> {
    match string.as_str() {
        ";" => Ok(DefinitionToken::Operator(Operator::Semicolon)),
        ":" => Ok(DefinitionToken::Operator(Operator::Colon)),
        "|" => Ok(DefinitionToken::Operator(Operator::Bar)),
        "+" => Ok(DefinitionToken::Operator(Operator::Plus)),
        "*" => Ok(DefinitionToken::Operator(Operator::Star)),
        "?" => Ok(DefinitionToken::Operator(Operator::QuestionMark)),
        "~" => Ok(DefinitionToken::Operator(Operator::Tilde)),
        "." => Ok(DefinitionToken::Operator(Operator::Dot)),
        "(" => Ok(DefinitionToken::LeftParenthesis),
        ")" => Ok(DefinitionToken::RightParenthesis),
        _ if string.len() >= 2 && string.starts_with('"') && string.ends_with('"')
            => {
                string.remove(string.len() - 1);
                string.remove(0);
                Ok(DefinitionToken::StringLiteral(deliteralize(&string)?))
            }
        _ if string.starts_with('{') && string.ends_with('}')
            => parse_bounds(&string[1..string.len() - 1]),
        _ if string.chars().all(is_identifier_char)
            => Ok(DefinitionToken::Identifier(string)),
        _ => Err(DefinitionError::Syntax(format!("Unrecognized token in grammar definition: \"{}\"", string)))
    }
}

fn is_identifier_char(char: char) -> bool {
    char.is_ascii_alphanumeric() || char == '_'
}

/* The inside of {min,max} or {min,}. */
fn parse_bounds(bounds: &str) -> Result<DefinitionToken, DefinitionError> {
    let bounds: String = bounds.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bad_bounds = || DefinitionError::Syntax(format!("Bad repetition bounds {{{}}}", bounds));

    let (min, max) = bounds.split_once(',').ok_or_else(bad_bounds)?;
    let min = min.parse::<usize>().map_err(|_| bad_bounds())?;
    let max = match max {
        "" => None,
        max => Some(max.parse::<usize>().map_err(|_| bad_bounds())?),
    };

    if max.is_some_and(|max| max < min) {
        return Err(bad_bounds());
    }

    Ok(DefinitionToken::Repeat(min, max))
}

/* Given a string that may have escape sequences, substitutes those escape sequences with
 * the characters they represent.
 *
 * Currently supports all single character escape sequences supported by Rust,
 * i.e. those that can be typed written as a backslash followed by a single character. */
fn deliteralize(string: &str) -> Result<String, DefinitionError> {
    let mut result = String::new();

    let mut slash_mode = false;
    for ch in string.chars() {
        if slash_mode {
            match ch {
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                'r' => result.push('\r'),
                't' => result.push('\t'),
                '0' => result.push('\0'),
                '\'' => result.push('\''),
                '"' => result.push('"'),
                _ => return Err(DefinitionError::Syntax("Bad escape sequence".to_owned())),
            }

            slash_mode = false;
        }
        else if ch == '\\' {
            slash_mode = true;
        }
        else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn parse_rule(tokens: &[DefinitionToken]) -> Result<(String, RuleExpression), DefinitionError> {
    if tokens.get(1).ok_or(DefinitionError::Syntax("Not enough tokens in rule".to_owned()))? != &DefinitionToken::Operator(Operator::Colon) {
        return Err(DefinitionError::Syntax("Second token in rule is not ':'. Syntax: <Rule> : <Rule Expression> ;".to_owned()));
    }

    let rule_name = match &tokens[0] {
        DefinitionToken::Identifier(name) if name != "END" => name.clone(),
        _ => return Err(DefinitionError::Syntax("First token of rule must be an identifier. Syntax: <Rule> : <Rule Expression> ;".to_owned()))
    };

    Ok((rule_name, parse_expression(&tokens[2..])?))
}

fn parse_expression(tokens: &[DefinitionToken]) -> Result<RuleExpression, DefinitionError> {
    if tokens.is_empty() {
        return Err(DefinitionError::Syntax("Encountered empty subexpression".to_string()));
    }

    if tokens[0] == DefinitionToken::RightParenthesis {
        return Err(DefinitionError::Syntax("Encountered right parenthesis at left of subexpression".to_string()));
    }

    if tokens[tokens.len() - 1] == DefinitionToken::LeftParenthesis {
        return Err(DefinitionError::Syntax("Encountered left parenthesis at right of subexpression".to_string()));
    }

    /* Scan and determine most relevant operator (least precedence!). */

    let mut min_precedence_indices = vec![];
    let mut paren_nesting = 0;
    for (i, token) in tokens.iter().enumerate() {
        if *token == DefinitionToken::LeftParenthesis {
            paren_nesting += 1;
        }
        else if *token == DefinitionToken::RightParenthesis {
            paren_nesting -= 1;
            if paren_nesting < 0 {
                return Err(DefinitionError::Syntax("Too many right parentheses in subexpression!".to_owned()));
            }
        }
        else if paren_nesting == 0 {
            /* The operator evaluated precedence as defined in the enum ordering. Technically,
             * all tokens have a precedence, though we really only care about certain operator */
            if min_precedence_indices.is_empty() || *token < tokens[min_precedence_indices[0]] {
                min_precedence_indices = vec![i];
            }
            else if *token == tokens[min_precedence_indices[0]] {
                min_precedence_indices.push(i);
            }
        }
    }

    if paren_nesting > 0 {
        return Err(DefinitionError::Syntax("Too many left parentheses in subexpression!".to_owned()));
    }

    match min_precedence_indices.first().map(|&i| &tokens[i]) {
        Some(DefinitionToken::Operator(Operator::Bar)) => {
            let delimiters = std::iter::once(-1)
                .chain(min_precedence_indices.into_iter().map(|u| u as i64))
                .chain(std::iter::once(tokens.len() as i64));

            let sub_expressions = delimiters.tuple_windows()
                .map(|(left, right)| parse_expression(&tokens[((left + 1) as usize)..(right as usize)]))
                .collect::<Result<Vec<RuleExpression>, DefinitionError>>()?;
            Ok(RuleExpression::Alternatives(sub_expressions))
        }

        Some(DefinitionToken::Operator(a @ (Operator::Colon | Operator::Semicolon)))
            => Err(DefinitionError::Syntax(format!("Bad operator {:?}", a))),

        // Everything else is a sequence of (possibly modified) atoms and groups
        _ => parse_concatenation(tokens),
    }
}

fn parse_concatenation(tokens: &[DefinitionToken]) -> Result<RuleExpression, DefinitionError> {
    let mut paren_nesting = 0;
    let mut curr_left_paren = 0;
    let mut range_start: Option<char> = None;

    let mut sub_expressions = vec![];

    for (i, token) in tokens.iter().enumerate() {
        match token {
            DefinitionToken::LeftParenthesis => {
                paren_nesting += 1;
                if paren_nesting == 1 {
                    curr_left_paren = i;
                }
            }
            DefinitionToken::RightParenthesis => {
                paren_nesting -= 1;
                if paren_nesting == 0 {
                    sub_expressions.push(parse_expression(&tokens[curr_left_paren + 1..i])?);
                }
            }
            _ if paren_nesting > 0 => (),

            DefinitionToken::Identifier(name) if name == "END"
                => sub_expressions.push(RuleExpression::End),
            DefinitionToken::Identifier(rule_name)
                => sub_expressions.push(RuleExpression::RuleName(rule_name.clone())),
            DefinitionToken::StringLiteral(literal) => match range_start.take() {
                Some(lo) => sub_expressions.push(RuleExpression::CharRange(lo, single_char(literal)?)),
                None => sub_expressions.push(literal_expression(literal)?),
            }
            DefinitionToken::Operator(Operator::Range) => match sub_expressions.pop() {
                Some(RuleExpression::Literal(literal)) if range_start.is_none()
                    => range_start = Some(single_char(&literal)?),
                _ => return Err(DefinitionError::Syntax("A range must start with a single character literal".to_owned())),
            }
            DefinitionToken::Operator(Operator::Plus)
                => modify_last(&mut sub_expressions, |e| RuleExpression::OneOrMore(Box::new(e)))?,
            DefinitionToken::Operator(Operator::Star)
                => modify_last(&mut sub_expressions, |e| RuleExpression::Many(Box::new(e)))?,
            DefinitionToken::Operator(Operator::QuestionMark)
                => modify_last(&mut sub_expressions, |e| RuleExpression::Optional(Box::new(e)))?,
            DefinitionToken::Operator(Operator::Tilde)
                => modify_last(&mut sub_expressions, |e| RuleExpression::Not(Box::new(e)))?,
            DefinitionToken::Repeat(min, max)
                => modify_last(&mut sub_expressions, |e| RuleExpression::Repeat(Box::new(e), *min, *max))?,
            DefinitionToken::Operator(a)
                => return Err(DefinitionError::Syntax(format!("Bad operator {:?}", a))),
        }
    }

    if range_start.is_some() {
        return Err(DefinitionError::Syntax("A range is missing its upper bound".to_owned()));
    }

    if sub_expressions.len() == 1 {
        return Ok(sub_expressions.remove(0));
    }

    Ok(RuleExpression::Concatenation(sub_expressions))
}

fn modify_last<F>(sub_expressions: &mut Vec<RuleExpression>, modifier: F) -> Result<(), DefinitionError>
where
    F: FnOnce(RuleExpression) -> RuleExpression,
{
    let last = sub_expressions.pop()
        .ok_or(DefinitionError::Syntax("Modifier without an expression to modify".to_owned()))?;
    sub_expressions.push(modifier(last));
    Ok(())
}

fn literal_expression(literal: &str) -> Result<RuleExpression, DefinitionError> {
    if literal.is_empty() {
        return Err(DefinitionError::Syntax("Matching the empty string is forbidden".to_string()));
    }
    Ok(RuleExpression::Literal(literal.to_string()))
}

fn single_char(literal: &str) -> Result<char, DefinitionError> {
    literal.chars()
        .exactly_one()
        .map_err(|_| DefinitionError::Syntax(format!("Range bound \"{}\" is not a single character", literal)))
}

/* Turns the parsed definition into combinators on `grammar`. */
fn compile(expression: &RuleExpression, grammar: &mut Grammar) -> Matcher {
    match expression {
        RuleExpression::Literal(word) => grammar.literal(word.as_str()),
        RuleExpression::CharRange(lo, hi) => grammar.char_range(*lo, *hi),
        RuleExpression::End => grammar.end(),
        RuleExpression::RuleName(name) => grammar.apply(name),
        RuleExpression::Concatenation(parts) => {
            let parts = parts.iter().map(|part| compile(part, grammar)).collect::<Vec<_>>();
            grammar.sequence(parts)
        }
        RuleExpression::Alternatives(alternatives) => {
            let alternatives = alternatives.iter().map(|alternative| compile(alternative, grammar)).collect::<Vec<_>>();
            grammar.choice(alternatives)
        }
        RuleExpression::Optional(inner) => {
            let inner = compile(inner, grammar);
            grammar.optional(inner)
        }
        RuleExpression::OneOrMore(inner) => {
            let inner = compile(inner, grammar);
            grammar.some(inner)
        }
        RuleExpression::Many(inner) => {
            let inner = compile(inner, grammar);
            grammar.any(inner)
        }
        RuleExpression::Not(inner) => {
            let inner = compile(inner, grammar);
            grammar.not(inner)
        }
        RuleExpression::Repeat(inner, min, max) => {
            let inner = compile(inner, grammar);
            match max {
                Some(max) => grammar.repeat(inner, *min..=*max),
                None => grammar.repeat(inner, *min..),
            }
        }
    }
}


/* Tests */
