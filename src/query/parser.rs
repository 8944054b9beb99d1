//! Query parser for converting query text to [`QueryNode`] trees.

use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PilumError, Result};
use crate::model::OperatorKind;
use crate::query::iop::ProximityKind;
use crate::query::node::{DEFAULT_FIELD, QueryNode};

static PROXIMITY_OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(near|window)(?:/(\d*))?$").expect("proximity operator pattern is valid")
});

/// Fields a `term.field` suffix may name.
pub const KNOWN_FIELDS: [&str; 5] = ["url", "keywords", "title", "body", "inlink"];

/// Parser for the structured query language.
///
/// Supported syntax:
/// - Terms: `apple`, or `apple.title` to search another field
/// - Score operators: `#and`, `#or`, `#sum`, `#score`
/// - Weighted operators, weight before each argument: `#wand( 0.7 apple 0.3 pie )`,
///   `#wsum( ... )`
/// - Proximity operators: `#near/k( a b )`, `#window/k( a b )`
///
/// Operator names are case-insensitive.
#[derive(Debug, Clone)]
pub struct QueryParser {
    default_field: String,
    fields: Vec<String>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParser {
    /// Create a parser searching `body` by default.
    pub fn new() -> Self {
        QueryParser {
            default_field: DEFAULT_FIELD.to_string(),
            fields: KNOWN_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Set the field searched by terms without a suffix.
    pub fn with_default_field<S: Into<String>>(mut self, field: S) -> Self {
        self.default_field = field.into();
        self
    }

    /// Get the default field.
    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    /// Parse text holding exactly one expression.
    pub fn parse(&self, text: &str) -> Result<QueryNode> {
        let mut args = self.parse_sequence(text)?;
        match args.len() {
            0 => Err(PilumError::parse("Empty query")),
            1 => Ok(args.remove(0)),
            n => Err(PilumError::parse(format!(
                "Expected a single expression but found {n}"
            ))),
        }
    }

    /// Parse raw query text as the arguments of `operator`.
    ///
    /// This is how query file lines are read: `apple #near/1(pie crust)` under
    /// `#and` becomes `#and( apple.body #near/1( pie.body crust.body ) )`.
    pub fn parse_with_default(&self, text: &str, operator: OperatorKind) -> Result<QueryNode> {
        let args = self.parse_sequence(text)?;
        if args.is_empty() {
            return Err(PilumError::parse("Empty query"));
        }
        Ok(QueryNode::operator(operator, args))
    }

    fn parse_sequence(&self, text: &str) -> Result<Vec<QueryNode>> {
        let mut parser = QueryTextParser::new(text, self);
        let mut args = Vec::new();
        loop {
            parser.skip_whitespace();
            match parser.chars.peek() {
                None => return Ok(args),
                Some(')') => return Err(PilumError::parse("Unbalanced parentheses: unexpected ')'")),
                Some(_) => args.push(parser.parse_expression()?),
            }
        }
    }
}

/// Internal parser over one query string.
struct QueryTextParser<'a> {
    chars: Peekable<Chars<'a>>,
    config: &'a QueryParser,
}

impl<'a> QueryTextParser<'a> {
    fn new(text: &'a str, config: &'a QueryParser) -> Self {
        QueryTextParser {
            chars: text.chars().peekable(),
            config,
        }
    }

    fn parse_expression(&mut self) -> Result<QueryNode> {
        self.skip_whitespace();
        match self.chars.peek() {
            Some('#') => self.parse_operator(),
            Some('(') => Err(PilumError::parse("Unexpected '(' without an operator")),
            Some(_) => {
                let word = self.consume_word()?;
                self.term(word)
            }
            None => Err(PilumError::parse("Expected an argument but found end of input")),
        }
    }

    fn parse_operator(&mut self) -> Result<QueryNode> {
        // Consume '#'
        self.chars.next();
        let name = self.consume_word()?.to_lowercase();

        self.skip_whitespace();
        if self.chars.peek() != Some(&'(') {
            return Err(PilumError::parse(format!("Expected '(' after #{name}")));
        }
        self.chars.next();

        if let Some(captures) = PROXIMITY_OPERATOR.captures(&name) {
            let kind = match &captures[1] {
                "near" => ProximityKind::Near,
                _ => ProximityKind::Window,
            };
            let distance = match captures.get(2).map(|m| m.as_str()) {
                Some(digits) if !digits.is_empty() => digits.parse::<u32>().map_err(|_| {
                    PilumError::parse(format!("Invalid distance in #{name}"))
                })?,
                _ => return Err(PilumError::parse(format!("Missing distance in #{name}"))),
            };
            let args = self.parse_arguments(false)?.into_iter().map(|(_, arg)| arg).collect();
            return Ok(QueryNode::Proximity {
                kind,
                distance,
                args,
            });
        }

        let kind = match name.as_str() {
            "and" => OperatorKind::And,
            "or" => OperatorKind::Or,
            "sum" => OperatorKind::Sum,
            "wand" => OperatorKind::WAnd,
            "wsum" => OperatorKind::WSum,
            "score" => OperatorKind::Score,
            _ => return Err(PilumError::parse(format!("Unknown operator #{name}"))),
        };

        let pairs = self.parse_arguments(kind.is_weighted())?;
        if kind.is_weighted() {
            Ok(QueryNode::weighted(
                kind,
                pairs
                    .into_iter()
                    .map(|(weight, arg)| (weight.unwrap_or(1.0), arg))
                    .collect(),
            ))
        } else {
            Ok(QueryNode::operator(
                kind,
                pairs.into_iter().map(|(_, arg)| arg).collect(),
            ))
        }
    }

    /// Parse arguments up to and including the closing parenthesis.
    fn parse_arguments(&mut self, weighted: bool) -> Result<Vec<(Option<f64>, QueryNode)>> {
        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                Some(')') => {
                    self.chars.next();
                    return Ok(args);
                }
                None => return Err(PilumError::parse("Unbalanced parentheses: missing ')'")),
                Some(_) => {}
            }

            let weight = if weighted {
                Some(self.parse_weight()?)
            } else {
                None
            };
            let arg = self.parse_expression()?;
            args.push((weight, arg));
        }
    }

    fn parse_weight(&mut self) -> Result<f64> {
        if self.chars.peek() == Some(&'#') {
            return Err(PilumError::parse("Expected a weight before the argument"));
        }
        let word = self.consume_word()?;
        word.parse::<f64>()
            .map_err(|_| PilumError::parse(format!("Expected a weight but found '{word}'")))
    }

    fn term(&self, word: String) -> Result<QueryNode> {
        if let Some((term, field)) = word.rsplit_once('.') {
            let field = field.to_lowercase();
            if self.config.fields.contains(&field) {
                if term.is_empty() {
                    return Err(PilumError::parse(format!("Missing term before .{field}")));
                }
                return Ok(QueryNode::term_in(field, term));
            }
        }
        Ok(QueryNode::term_in(self.config.default_field.as_str(), word))
    }

    fn consume_word(&mut self) -> Result<String> {
        let mut word = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            word.push(ch);
            self.chars.next();
        }

        if word.is_empty() {
            Err(PilumError::parse("Expected word but found end of input"))
        } else {
            Ok(word)
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|ch| ch.is_whitespace()) {
            self.chars.next();
        }
    }
}
