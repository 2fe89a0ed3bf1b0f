//! Filter query grammar using nom
//!
//! Grammar:
//! ```text
//! expr       := or
//! or         := and (("OR" | "||") and)*
//! and        := unary (("AND" | "&&") unary)*
//! unary      := ("NOT" | "!") unary | "(" expr ")" | comparison | term
//! comparison := field op value | field ("IN" | "NOT IN") list
//! op         := "==" | "!=" | "<=" | ">=" | "<" | ">" | "LIKE"
//! field      := ident ("." ident)*
//! value      := string | number | "true" | "false" | "null" | list
//! list       := "[" (value ("," value)*)? "]"
//! term       := string | ident ("." ident)*
//! ```
//!
//! Keywords are case-insensitive. A bare term is a free-text search.
//! Nesting deeper than [`MAX_DEPTH`] is a syntax error.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    error::{Error, ErrorKind},
    IResult,
};
use serde_json::{Number, Value};

use crate::clause::CompareOp;
use crate::error::QueryError;

/// Deepest nesting of parentheses and negations a query may use
pub const MAX_DEPTH: usize = 64;

const RESERVED: &[&str] = &["and", "or", "not", "in", "like", "true", "false", "null"];

/// Parsed filter query, before field resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Both sides hold
    And(Box<Expr>, Box<Expr>),
    /// Either side holds
    Or(Box<Expr>, Box<Expr>),
    /// Negation
    Not(Box<Expr>),
    /// `field op value`
    Compare {
        /// Dotted field path
        field: Vec<String>,
        /// Operator
        op: CompareOp,
        /// Literal
        value: Value,
    },
    /// `field LIKE pattern`
    Like {
        /// Dotted field path
        field: Vec<String>,
        /// Pattern literal
        pattern: Value,
    },
    /// `field IN [..]` / `field NOT IN [..]`
    In {
        /// Dotted field path
        field: Vec<String>,
        /// Candidate values
        values: Vec<Value>,
        /// `NOT IN`
        negated: bool,
    },
    /// Free-text search term
    Term(String),
}

#[derive(Debug, Clone, Copy)]
enum Operator {
    Compare(CompareOp),
    Like,
}

/// Parse a filter query; blank input is no filter
///
/// # Errors
/// `QueryError::Syntax` for anything the grammar rejects
pub fn parse(query: &str) -> Result<Option<Expr>, QueryError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(None);
    }

    match all_consuming(ws(|i| or_expr(i, 0)))(query) {
        Ok((_, expr)) => Ok(Some(expr)),
        Err(err) => {
            tracing::debug!(query, error = %err, "filter query rejected");
            Err(QueryError::Syntax)
        }
    }
}

/// Parse whitespace
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword not followed by an identifier character
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(satisfy(is_ident_char)))
}

fn or_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) = many0(preceded(ws(alt((keyword("OR"), tag("||")))), |i| {
        and_expr(i, depth)
    }))(input)?;
    Ok((input, balance(first, rest, Expr::Or)))
}

fn and_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(preceded(ws(alt((keyword("AND"), tag("&&")))), |i| {
        unary(i, depth)
    }))(input)?;
    Ok((input, balance(first, rest, Expr::And)))
}

fn unary(input: &str, depth: usize) -> IResult<&str, Expr> {
    if depth >= MAX_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    ws(alt((
        map(
            preceded(ws(alt((keyword("NOT"), tag("!")))), |i| unary(i, depth + 1)),
            |e| Expr::Not(Box::new(e)),
        ),
        delimited(ws(char('(')), |i| or_expr(i, depth + 1), ws(char(')'))),
        comparison,
        map(term, Expr::Term),
    )))(input)
}

/// Join a chain of operands into a balanced tree
fn balance(first: Expr, mut rest: Vec<Expr>, join: fn(Box<Expr>, Box<Expr>) -> Expr) -> Expr {
    if rest.is_empty() {
        return first;
    }
    let mut upper = rest.split_off(rest.len() / 2);
    let head = upper.remove(0);
    let left = balance(first, rest, join);
    let right = balance(head, upper, join);
    join(Box::new(left), Box::new(right))
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, field) = ws(field_path)(input)?;

    if let Ok((rest, values)) = preceded(pair(ws(keyword("NOT")), ws(keyword("IN"))), list)(input) {
        return Ok((
            rest,
            Expr::In {
                field,
                values,
                negated: true,
            },
        ));
    }
    if let Ok((rest, values)) = preceded(ws(keyword("IN")), list)(input) {
        return Ok((
            rest,
            Expr::In {
                field,
                values,
                negated: false,
            },
        ));
    }

    let (input, op) = ws(operator)(input)?;
    let (input, value) = ws(literal)(input)?;
    let expr = match op {
        Operator::Compare(op) => Expr::Compare { field, op, value },
        Operator::Like => Expr::Like {
            field,
            pattern: value,
        },
    };
    Ok((input, expr))
}

fn operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Compare(CompareOp::Eq), tag("==")),
        value(Operator::Compare(CompareOp::Ne), tag("!=")),
        value(Operator::Compare(CompareOp::Le), tag("<=")),
        value(Operator::Compare(CompareOp::Ge), tag(">=")),
        value(Operator::Compare(CompareOp::Lt), tag("<")),
        value(Operator::Compare(CompareOp::Gt), tag(">")),
        value(Operator::Like, keyword("LIKE")),
    ))(input)
}

/// Identifier that is not a keyword
fn identifier(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(is_ident_char),
        )),
        |s: &str| !RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(s)),
    )(input)
}

fn field_path(input: &str) -> IResult<&str, Vec<String>> {
    map(separated_list1(char('.'), identifier), |parts| {
        parts.into_iter().map(str::to_string).collect()
    })(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        parse_number,
    )(input)
}

fn parse_number(text: &str) -> Result<Value, &'static str> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or("number out of range")
}

fn literal(input: &str) -> IResult<&str, Value> {
    alt((
        map(string_literal, |s| Value::String(s.to_string())),
        number,
        value(Value::Bool(true), keyword("true")),
        value(Value::Bool(false), keyword("false")),
        value(Value::Null, keyword("null")),
        map(list, Value::Array),
    ))(input)
}

fn list(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        ws(char('[')),
        separated_list0(ws(char(',')), ws(literal)),
        ws(char(']')),
    )(input)
}

fn term(input: &str) -> IResult<&str, String> {
    alt((
        map(string_literal, str::to_string),
        map(recognize(separated_list1(char('.'), identifier)), str::to_string),
    ))(input)
}
