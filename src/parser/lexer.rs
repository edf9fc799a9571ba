// Shared tokens for the encoding shorthand

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, opt, recognize, value},
    multi::many0_count,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser so it skips whitespace on both sides.
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Bare name: a letter or underscore, then letters, digits or underscores.
pub fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        )),
        String::from,
    )(input)
}

/// Double-quoted string with `\"`, `\\` and `\n` escapes.
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                )),
            )),
            char('"'),
        ),
        Option::unwrap_or_default,
    )(input)
}
