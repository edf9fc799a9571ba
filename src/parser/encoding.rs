// Encoding shorthand parser
//
// Format: channel: [op(]field[, n)] [asc|desc] [domain[a, b, ...]], ...
// e.g.    x: category, y: sum(value) desc, color: "Region Name"

use super::ast::Binding;
use super::lexer::{identifier, string_literal, ws};
use crate::encoding::SortOrder;
use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, u32},
    combinator::{eof, map, opt, value},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, tuple},
    IResult,
};

#[derive(Debug, Clone)]
enum Modifier {
    Sort(SortOrder),
    Domain(Vec<String>),
}

/// Column reference: bare name or quoted string.
fn field_ref(input: &str) -> IResult<&str, String> {
    alt((string_literal, identifier))(input)
}

/// `op(field)`, `op(field, n)` or just `field`.
fn field_expr(input: &str) -> IResult<&str, (Option<String>, String, Option<u32>)> {
    alt((
        map(
            tuple((
                ws(identifier),
                ws(char('(')),
                ws(field_ref),
                opt(preceded(ws(char(',')), ws(u32))),
                ws(char(')')),
            )),
            |(op, _, field, n, _)| (Some(op), field, n),
        ),
        map(ws(field_ref), |field| (None, field, None)),
    ))(input)
}

fn domain_value(input: &str) -> IResult<&str, String> {
    alt((
        string_literal,
        map(
            take_while1(|c: char| !c.is_whitespace() && !matches!(c, ',' | ']' | '[' | '"')),
            String::from,
        ),
    ))(input)
}

fn modifier(input: &str) -> IResult<&str, Modifier> {
    alt((
        value(
            Modifier::Sort(SortOrder::Descending),
            ws(alt((tag_no_case("descending"), tag_no_case("desc")))),
        ),
        value(
            Modifier::Sort(SortOrder::Ascending),
            ws(alt((tag_no_case("ascending"), tag_no_case("asc")))),
        ),
        map(
            preceded(
                ws(tag_no_case("domain")),
                delimited(
                    ws(char('[')),
                    separated_list0(ws(char(',')), ws(domain_value)),
                    ws(char(']')),
                ),
            ),
            Modifier::Domain,
        ),
    ))(input)
}

/// Parse a single binding
/// Format: channel: field_expr modifiers*
pub fn parse_binding(input: &str) -> IResult<&str, Binding> {
    let (input, channel) = ws(identifier)(input)?;
    let (input, _) = ws(char(':'))(input)?;
    let (input, (operator, field, maxbins)) = field_expr(input)?;
    let (input, modifiers) = many0(modifier)(input)?;

    let mut binding = Binding {
        channel,
        field,
        operator,
        maxbins,
        ..Default::default()
    };
    for m in modifiers {
        match m {
            Modifier::Sort(order) => binding.sort = Some(order),
            Modifier::Domain(values) => binding.domain = Some(values),
        }
    }

    Ok((input, binding))
}

/// Parse a complete encoding
/// Format: binding, binding, ...
pub fn parse_encoding(input: &str) -> IResult<&str, Vec<Binding>> {
    let (input, bindings) = separated_list0(ws(char(',')), parse_binding)(input)?;
    let (input, _) = ws(eof)(input)?;
    Ok((input, bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_binding() {
        let (rest, b) = parse_binding("x: category").unwrap();
        assert_eq!(rest, "");
        assert_eq!(b.channel, "x");
        assert_eq!(b.field, "category");
        assert_eq!(b.operator, None);
    }

    #[test]
    fn test_parse_aggregate_binding() {
        let (_, b) = parse_binding("y: sum(value)").unwrap();
        assert_eq!(b.operator.as_deref(), Some("sum"));
        assert_eq!(b.field, "value");
    }

    #[test]
    fn test_parse_quoted_field() {
        let (_, b) = parse_binding(r#"color: "Region Name""#).unwrap();
        assert_eq!(b.field, "Region Name");

        let (_, b) = parse_binding(r#"y: mean( "Unit Price" )"#).unwrap();
        assert_eq!(b.operator.as_deref(), Some("mean"));
        assert_eq!(b.field, "Unit Price");
    }

    #[test]
    fn test_parse_bin_with_maxbins() {
        let (_, b) = parse_binding("x: bin(value, 20)").unwrap();
        assert!(b.is_bin());
        assert_eq!(b.maxbins, Some(20));

        let (_, b) = parse_binding("x: BIN(value)").unwrap();
        assert!(b.is_bin());
        assert_eq!(b.maxbins, None);
    }

    #[test]
    fn test_parse_modifiers() {
        let (_, b) = parse_binding("x: month asc domain[Jan, Feb, \"Mar 2\"]").unwrap();
        assert_eq!(b.sort, Some(SortOrder::Ascending));
        assert_eq!(
            b.domain,
            Some(vec!["Jan".to_string(), "Feb".to_string(), "Mar 2".to_string()])
        );

        let (_, b) = parse_binding("y: sum(value) desc").unwrap();
        assert_eq!(b.sort, Some(SortOrder::Descending));
    }

    #[test]
    fn test_parse_encoding() {
        let (_, bindings) =
            parse_encoding("x: category, y: sum(value) desc, color: \"Region Name\"").unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0].channel, "x");
        assert_eq!(bindings[1].sort, Some(SortOrder::Descending));
        assert_eq!(bindings[2].channel, "color");
    }

    #[test]
    fn test_parse_encoding_with_whitespace() {
        let (_, bindings) = parse_encoding("  x :category ,\n y: count( id )  ").unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].operator.as_deref(), Some("count"));
        assert_eq!(bindings[1].field, "id");
    }

    #[test]
    fn test_parse_encoding_empty() {
        let (_, bindings) = parse_encoding("   ").unwrap();
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_parse_encoding_missing_colon() {
        assert!(parse_encoding("x category").is_err());
    }

    #[test]
    fn test_parse_encoding_unclosed_paren() {
        assert!(parse_encoding("y: sum(value").is_err());
    }

    #[test]
    fn test_parse_encoding_trailing_garbage() {
        assert!(parse_encoding("x: category; y: value").is_err());
    }
}
