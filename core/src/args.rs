//! Parser for function-argument expressions, the one textual grammar
//! embedded in the document format. An expression is a comma-separated list
//! of terms; each term is a variable name or a nested call of the form
//! `(Name, arg1, arg2, ...)`. Commas only split at parenthesis depth 0, and
//! whitespace between tokens is permitted. The empty string means "no
//! arguments".

use crate::ast::{ArgTerm, VarRef};
use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{all_consuming, map_res},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, tuple},
    IResult,
};

/// Parse a full `functionArguments` value into its top-level terms.
pub(crate) fn parse_terms(input: &str) -> Result<Vec<ArgTerm>, String> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    let result = all_consuming(separated_list0(
        char(','),
        delimited(multispace0, term, multispace0),
    ))(input);
    match result {
        Ok((_, terms)) => Ok(terms),
        Err(_) => Err(format!("malformed expression `{}`", input.trim())),
    }
}

fn term(input: &str) -> IResult<&str, ArgTerm> {
    alt((call_term, var_term))(input)
}

/// A bare identifier term is always a variable reference.
fn var_term(input: &str) -> IResult<&str, ArgTerm> {
    map_res(ident, |s: &str| {
        VarRef::parse(s).map(ArgTerm::Var).ok_or(())
    })(input)
}

/// A parenthesized call: `(Name, arg, ...)`. The argument list may be empty.
fn call_term(input: &str) -> IResult<&str, ArgTerm> {
    let (input, _) = char('(')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, function) = ident(input)?;
    let (input, args) = many0(preceded(
        tuple((multispace0, char(','), multispace0)),
        term,
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;
    Ok((
        input,
        ArgTerm::Call {
            function: function.to_string(),
            args,
        },
    ))
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> ArgTerm {
        ArgTerm::Var(VarRef::parse(name).unwrap())
    }

    #[test]
    fn test_empty() {
        assert_eq!(parse_terms("").unwrap(), vec![]);
        assert_eq!(parse_terms("   ").unwrap(), vec![]);
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            parse_terms("x1, z2 ,y").unwrap(),
            vec![var("x1"), var("z2"), var("y")]
        );
    }

    #[test]
    fn test_nested_calls() {
        assert_eq!(
            parse_terms("(S, x1)").unwrap(),
            vec![ArgTerm::Call {
                function: "S".into(),
                args: vec![var("x1")],
            }]
        );
        assert_eq!(
            parse_terms("( AND , x1, (NOT, z1) ), y").unwrap(),
            vec![
                ArgTerm::Call {
                    function: "AND".into(),
                    args: vec![
                        var("x1"),
                        ArgTerm::Call {
                            function: "NOT".into(),
                            args: vec![var("z1")],
                        },
                    ],
                },
                var("y"),
            ]
        );
    }

    #[test]
    fn test_zero_arity_call() {
        assert_eq!(
            parse_terms("(CONST0)").unwrap(),
            vec![ArgTerm::Call {
                function: "CONST0".into(),
                args: vec![],
            }]
        );
    }

    #[test]
    fn test_malformed() {
        // Bare identifiers must be variables
        assert!(parse_terms("foo").is_err());
        // Unbalanced parens
        assert!(parse_terms("(S, x1").is_err());
        // Trailing junk
        assert!(parse_terms("x1)").is_err());
        // Empty term between commas
        assert!(parse_terms("x1,,x2").is_err());
    }
}
