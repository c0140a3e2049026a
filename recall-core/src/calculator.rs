//! # Calculator tool
//!
//! Detects arithmetic requests and evaluates them.
//!
//! Input is gated on a character class before anything is parsed: only digits,
//! `+ - * /`, parentheses, dots and spaces get through. What passes the gate
//! is tokenized and evaluated by a small recursive-descent evaluator:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '//') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom ('**' unary)?
//! atom   := NUMBER | '(' expr ')'
//! ```
//!
//! Integers stay integers until `/` (always float) or a float operand shows up.
//! They are `i128`, not arbitrary precision: a literal or result past that
//! range (`2**200`, a 40-digit literal) is an "out of range" evaluation error
//! rather than a big integer.

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Characters an expression may contain
pub const ARITHMETIC_CLASS: &str = "0123456789+-*/ ().";

static PREFIXED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:calc|calculate|calculator)\s*[:\-]?\s*([0-9+\-*/().\s]+)$")
        .expect("static regex")
});

static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-*/ ().]+$").expect("static regex"));

/// Return the arithmetic expression carried by `text`, if any.
///
/// Accepts `CALCULATE: 2+2` style prefixes (case-insensitive, `calc`,
/// `calculate` or `calculator`) or text that is nothing but arithmetic.
pub fn extract_expression(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = PREFIXED_RE.captures(text) {
        return Some(caps[1].trim().to_string());
    }

    if BARE_RE.is_match(text) {
        return Some(text.to_string());
    }

    None
}

/// Whether every character of `expr` is allowed into the evaluator
pub fn is_arithmetic(expr: &str) -> bool {
    !expr.is_empty() && expr.chars().all(|c| ARITHMETIC_CLASS.contains(c))
}

/// Evaluate an arithmetic expression, returning its textual value.
///
/// Rejects anything outside [`ARITHMETIC_CLASS`] without parsing it. Every
/// other failure comes back as an `EvaluationFailed` error naming the cause.
pub fn evaluate(expr: &str) -> Result<String> {
    let expr = expr.trim();
    if !is_arithmetic(expr) {
        return Err(Error::unsafe_expression(expr).with_operation("calculator::evaluate"));
    }

    let tokens = tokenize(expr)
        .map_err(|cause| Error::evaluation_failed(cause).with_context("expression", expr))?;
    let mut parser = Parser { tokens: &tokens, pos: 0, depth: 0 };

    let value = parser
        .expr()
        .and_then(|value| match parser.peek() {
            None => Ok(value),
            Some(tok) => Err(EvalError::Syntax(format!("unexpected '{}'", tok))),
        })
        .map_err(|cause| Error::evaluation_failed(cause).with_context("expression", expr))?;

    Ok(value.to_string())
}

// ============================================================================
// Numbers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Float(f) => f == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

/// Shortest round-trip repr: fixed notation for exponents in `-4..16`,
/// scientific (`1e+16`, `1e-05`) outside it, `.0` on integral values.
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0".into() } else { "0.0".into() };
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. "1.2345e3"
    let sci = format!("{:e}", x);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    if (-4..16).contains(&exp) {
        let point = exp + 1;
        let body = if point <= 0 {
            format!("0.{}{}", "0".repeat((-point) as usize), digits)
        } else if (point as usize) >= digits.len() {
            format!("{}{}.0", digits, "0".repeat(point as usize - digits.len()))
        } else {
            let (int, frac) = digits.split_at(point as usize);
            format!("{}.{}", int, frac)
        };
        format!("{}{}", sign, body)
    } else {
        let (first, rest) = digits.split_at(1);
        let mantissa = if rest.is_empty() {
            first.to_string()
        } else {
            format!("{}.{}", first, rest)
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{}{}e{}{:02}", sign, mantissa, exp_sign, exp.abs())
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    DoubleStar,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", n),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::DoubleStar => f.write_str("**"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

#[derive(Debug)]
enum EvalError {
    Syntax(String),
    DivisionByZero,
    Overflow,
    Complex,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Syntax(msg) => write!(f, "invalid syntax: {}", msg),
            EvalError::DivisionByZero => f.write_str("division by zero"),
            EvalError::Overflow => f.write_str("numerical result out of range"),
            EvalError::Complex => f.write_str("complex result not supported"),
        }
    }
}

type EvalResult<T> = std::result::Result<T, EvalError>;

fn tokenize(expr: &str) -> EvalResult<Vec<Token>> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' => i += 1,
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' if bytes.get(i + 1) == Some(&b'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                tokens.push(Token::Num(parse_number(&expr[start..i])?));
            }
            _ => return Err(EvalError::Syntax(format!("unexpected character '{}'", c as char))),
        }
    }

    Ok(tokens)
}

fn parse_number(literal: &str) -> EvalResult<Number> {
    let invalid = || EvalError::Syntax(format!("invalid number '{}'", literal));

    if literal.contains('.') {
        if literal == "." || literal.matches('.').count() > 1 {
            return Err(invalid());
        }
        return literal.parse::<f64>().map(Number::Float).map_err(|_| invalid());
    }

    if literal.len() > 1 && literal.starts_with('0') && literal.bytes().any(|b| b != b'0') {
        return Err(EvalError::Syntax(format!(
            "leading zeros in decimal integer literals are not permitted: '{}'",
            literal
        )));
    }

    match literal.parse::<i128>() {
        Ok(i) => Ok(Number::Int(i)),
        Err(_) => Err(EvalError::Overflow),
    }
}

// ============================================================================
// Parser / evaluator
// ============================================================================

/// Deepest nesting of parentheses and unary signs accepted
const MAX_DEPTH: usize = 200;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::Syntax("expression is nested too deeply".into()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> EvalResult<Number> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    lhs = add(lhs, self.term()?)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    lhs = sub(lhs, self.term()?)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> EvalResult<Number> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    lhs = mul(lhs, self.unary()?)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    lhs = div(lhs, self.unary()?)?;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    lhs = floor_div(lhs, self.unary()?)?;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> EvalResult<Number> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            Some(Token::Minus) => {
                self.pos += 1;
                neg(self.nested(Self::unary)?)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> EvalResult<Number> {
        let base = self.atom()?;
        if let Some(Token::DoubleStar) = self.peek() {
            self.pos += 1;
            let exp = self.nested(Self::unary)?;
            return pow(base, exp);
        }
        Ok(base)
    }

    fn atom(&mut self) -> EvalResult<Number> {
        match self.next() {
            Some(Token::Num(n)) => Ok(*n),
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(tok) => Err(EvalError::Syntax(format!("expected ')', found '{}'", tok))),
                    None => Err(EvalError::Syntax("'(' was never closed".into())),
                }
            }
            Some(tok) => Err(EvalError::Syntax(format!("unexpected '{}'", tok))),
            None => Err(EvalError::Syntax("unexpected end of expression".into())),
        }
    }
}

fn float_result(x: f64) -> EvalResult<Number> {
    Ok(Number::Float(x))
}

fn add(a: Number, b: Number) -> EvalResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_add(y).map(Number::Int).ok_or(EvalError::Overflow),
        _ => float_result(a.as_f64() + b.as_f64()),
    }
}

fn sub(a: Number, b: Number) -> EvalResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_sub(y).map(Number::Int).ok_or(EvalError::Overflow),
        _ => float_result(a.as_f64() - b.as_f64()),
    }
}

fn mul(a: Number, b: Number) -> EvalResult<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_mul(y).map(Number::Int).ok_or(EvalError::Overflow),
        _ => float_result(a.as_f64() * b.as_f64()),
    }
}

fn div(a: Number, b: Number) -> EvalResult<Number> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    float_result(a.as_f64() / b.as_f64())
}

fn floor_div(a: Number, b: Number) -> EvalResult<Number> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let q = x.checked_div(y).ok_or(EvalError::Overflow)?;
            // Round toward negative infinity when signs differ and there is a remainder
            if (x % y != 0) && ((x < 0) != (y < 0)) {
                Ok(Number::Int(q - 1))
            } else {
                Ok(Number::Int(q))
            }
        }
        _ => float_result(float_floor_div(a.as_f64(), b.as_f64())),
    }
}

/// `a // b` on floats, derived from the remainder so that `1 // 0.1` is `9.0`
/// (plain `(a / b).floor()` rounds the quotient up to `10.0` first)
fn float_floor_div(a: f64, b: f64) -> f64 {
    let rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 && ((b < 0.0) != (rem < 0.0)) {
        div -= 1.0;
    }
    if div == 0.0 {
        return 0.0f64.copysign(a / b);
    }
    let floor = div.floor();
    if div - floor > 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

fn neg(a: Number) -> EvalResult<Number> {
    match a {
        Number::Int(x) => x.checked_neg().map(Number::Int).ok_or(EvalError::Overflow),
        Number::Float(x) => float_result(-x),
    }
}

fn pow(base: Number, exp: Number) -> EvalResult<Number> {
    match (base, exp) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| EvalError::Overflow)?;
            b.checked_pow(e).map(Number::Int).ok_or(EvalError::Overflow)
        }
        _ => {
            let (b, e) = (base.as_f64(), exp.as_f64());
            if b == 0.0 && e < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            if b < 0.0 && e.fract() != 0.0 {
                return Err(EvalError::Complex);
            }
            let value = b.powf(e);
            if value.is_infinite() && b.is_finite() && e.is_finite() {
                return Err(EvalError::Overflow);
            }
            float_result(value)
        }
    }
}
