//! Condition text parser.
//!
//! Recursive descent parser for conditions such as
//! `sma(period=5) crosses_above close` and cross pairs such as
//! `ema(period=12) golden_cross ema(period=26)`. Parsing is purely syntactic;
//! `ConditionExpr::resolve` looks variable ids up in a `VariableCatalog`.

use crate::domain::condition::{Condition, Target};
use crate::domain::cross_signal::SignalType;
use crate::domain::error::{EngineError, ParseError};
use crate::domain::indicator::IndicatorRequest;
use crate::domain::operator::ComparisonOperator;
use crate::domain::variable::{Parameters, TradingVariable, VariableCatalog};

#[derive(Debug, Clone, PartialEq)]
pub enum OperandExpr {
    Number(f64),
    Variable { id: String, params: Parameters },
}

impl OperandExpr {
    fn resolve(&self, catalog: &VariableCatalog) -> Result<Option<TradingVariable>, EngineError> {
        match self {
            OperandExpr::Number(_) => Ok(None),
            OperandExpr::Variable { id, params } => catalog.resolve(id, params).map(Some),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpr {
    pub left: OperandExpr,
    pub operator: ComparisonOperator,
    pub right: OperandExpr,
}

impl ConditionExpr {
    /// Resolve variable ids against `catalog`. A literal on the left is moved
    /// to the right with the operator mirrored (`30 > rsi` is `rsi < 30`).
    pub fn resolve(&self, catalog: &VariableCatalog) -> Result<Condition, EngineError> {
        let left = self.left.resolve(catalog)?;
        let right = self.right.resolve(catalog)?;
        match (left, right, &self.left, &self.right) {
            (Some(l), Some(r), _, _) => Ok(Condition::against(l, self.operator, r)),
            (Some(l), None, _, OperandExpr::Number(v)) => {
                Ok(Condition::threshold(l, self.operator, *v))
            }
            (None, Some(r), OperandExpr::Number(v), _) => {
                Ok(Condition::new(r, mirrored(self.operator), Target::Value(*v)))
            }
            _ => Err(EngineError::ConditionParse(ParseError {
                message: "a condition needs at least one variable".to_string(),
                position: 0,
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossPairExpr {
    pub left: OperandExpr,
    pub signal_type: SignalType,
    pub right: OperandExpr,
}

impl CrossPairExpr {
    pub fn resolve(
        &self,
        catalog: &VariableCatalog,
    ) -> Result<(TradingVariable, TradingVariable), EngineError> {
        match (self.left.resolve(catalog)?, self.right.resolve(catalog)?) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(EngineError::ConditionParse(ParseError {
                message: "cross pairs compare two variables".to_string(),
                position: 0,
            })),
        }
    }
}

fn mirrored(op: ComparisonOperator) -> ComparisonOperator {
    match op {
        ComparisonOperator::Gt => ComparisonOperator::Lt,
        ComparisonOperator::Lt => ComparisonOperator::Gt,
        ComparisonOperator::Ge => ComparisonOperator::Le,
        ComparisonOperator::Le => ComparisonOperator::Ge,
        ComparisonOperator::CrossesAbove => ComparisonOperator::CrossesBelow,
        ComparisonOperator::CrossesBelow => ComparisonOperator::CrossesAbove,
        symmetric => symmetric,
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn found(&self) -> String {
        let word = self.peek_word();
        if !word.is_empty() {
            return word;
        }
        self.peek()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}', found '{}'", expected, self.found()))),
        }
    }

    fn peek_word(&self) -> String {
        self.remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect()
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();
        match word.chars().next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.pos += word.len();
                Ok(word.to_ascii_lowercase())
            }
            _ => Err(self.error(format!("expected variable name, found '{}'", self.found()))),
        }
    }

    /// `(name=value, ...)`, or nothing.
    fn parse_params(&mut self) -> Result<Parameters, ParseError> {
        let mut params = Parameters::new();
        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Ok(params);
        }
        self.advance();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(params);
        }
        loop {
            let name_pos = {
                self.skip_whitespace();
                self.pos
            };
            let name = self.parse_identifier()?;
            self.expect_char('=')?;
            let value = self.parse_number()?;
            if params.insert(name.clone(), value).is_some() {
                return Err(ParseError {
                    message: format!("parameter '{}' given twice", name),
                    position: name_pos,
                });
            }
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(')') => {
                    self.advance();
                    return Ok(params);
                }
                _ => {
                    return Err(
                        self.error(format!("expected ',' or ')', found '{}'", self.found()))
                    );
                }
            }
        }
    }

    fn parse_operand(&mut self) -> Result<OperandExpr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                Ok(OperandExpr::Number(self.parse_number()?))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let id = self.parse_identifier()?;
                let params = self.parse_params()?;
                Ok(OperandExpr::Variable { id, params })
            }
            _ => Err(self.error(format!("expected number or variable, found '{}'", self.found()))),
        }
    }

    fn parse_operator(&mut self) -> Result<ComparisonOperator, ParseError> {
        self.skip_whitespace();
        for symbol in [">=", "<=", "==", "!=", "~=", ">", "<"] {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return symbol.parse().map_err(|e: String| self.error(e));
            }
        }
        let word = self.peek_word();
        match word.parse::<ComparisonOperator>() {
            Ok(op) if !word.is_empty() => {
                self.pos += word.len();
                Ok(op)
            }
            _ => Err(self.error(format!("expected comparison operator, found '{}'", self.found()))),
        }
    }

    fn parse_signal_type(&mut self) -> Result<SignalType, ParseError> {
        self.skip_whitespace();
        let word = self.peek_word();
        match word.to_ascii_lowercase().as_str() {
            "golden_cross" | "death_cross" | "any_cross" => {
                let signal = word.parse().map_err(|e: String| self.error(e))?;
                self.pos += word.len();
                Ok(signal)
            }
            _ => Err(self.error(format!(
                "expected golden_cross, death_cross or any_cross, found '{}'",
                self.found()
            ))),
        }
    }

    fn parse_condition(&mut self) -> Result<ConditionExpr, ParseError> {
        let start = {
            self.skip_whitespace();
            self.pos
        };
        let left = self.parse_operand()?;
        let operator = self.parse_operator()?;
        let right = self.parse_operand()?;
        if matches!((&left, &right), (OperandExpr::Number(_), OperandExpr::Number(_))) {
            return Err(ParseError {
                message: "a condition needs at least one variable".to_string(),
                position: start,
            });
        }
        Ok(ConditionExpr {
            left,
            operator,
            right,
        })
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected '{}' after condition", self.found())))
        }
    }
}

pub fn parse_condition(input: &str) -> Result<ConditionExpr, ParseError> {
    let mut parser = Parser::new(input);
    let condition = parser.parse_condition()?;
    parser.expect_end()?;
    Ok(condition)
}

/// `;`-separated conditions. Empty input and a trailing `;` are allowed.
pub fn parse_condition_list(input: &str) -> Result<Vec<ConditionExpr>, ParseError> {
    let mut parser = Parser::new(input);
    let mut conditions = Vec::new();
    while !parser.at_end() {
        conditions.push(parser.parse_condition()?);
        if parser.at_end() {
            break;
        }
        parser.expect_char(';')?;
    }
    Ok(conditions)
}

pub fn parse_cross_pair(input: &str) -> Result<CrossPairExpr, ParseError> {
    let mut parser = Parser::new(input);
    let left = parser.parse_operand()?;
    let signal_type = parser.parse_signal_type()?;
    let right = parser.parse_operand()?;
    parser.expect_end()?;
    Ok(CrossPairExpr {
        left,
        signal_type,
        right,
    })
}

/// A bare parameter list, e.g. `period=5, std_dev=2`.
pub fn parse_parameter_list(input: &str) -> Result<Parameters, ParseError> {
    let wrapped = format!("({input})");
    let mut parser = Parser::new(&wrapped);
    let shift = |err: ParseError| ParseError {
        position: err.position.saturating_sub(1),
        ..err
    };
    let params = parser.parse_params().map_err(shift)?;
    parser.expect_end().map_err(shift)?;
    Ok(params)
}

/// An indicator with optional parameters, e.g. `MACD(fast=8, slow=21)`.
pub fn parse_indicator_request(input: &str) -> Result<IndicatorRequest, ParseError> {
    let mut parser = Parser::new(input);
    let name = parser.parse_identifier()?;
    let params = parser.parse_params()?;
    parser.expect_end()?;
    Ok(IndicatorRequest::new(&name, params))
}

/// A variable reference, e.g. `rsi(period=7)`, as `(id, params)`.
pub fn parse_variable(input: &str) -> Result<(String, Parameters), ParseError> {
    let mut parser = Parser::new(input);
    let id = parser.parse_identifier()?;
    let params = parser.parse_params()?;
    parser.expect_end()?;
    Ok((id, params))
}
