//! Parses the field type-expression grammar: `NAME`, `NAME?`,
//! `NAME[]`, `vector[NAME]`, and nested combinations (`string[]?`).
//!
//! A nested `pest_derive`-generated `Parser` behind a private module, and a
//! `parse` function that walks the resulting `Pairs` into a small AST.

use pest::Parser;

mod grammar {
    #[derive(pest_derive::Parser)]
    #[grammar = "type_expr.pest"]
    pub struct Parser;
}

/// The parsed form of a field's type-expression, before name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A reference to a type by name — primitive, struct, alias or custom.
    Name(String),
    /// `NAME?`
    Optional(Box<TypeExpr>),
    /// `NAME[]` or `vector[NAME]`
    Vector(Box<TypeExpr>),
    /// `set[NAME]`
    Set(Box<TypeExpr>),
    /// `map[K, V]`
    Map(Box<TypeExpr>, Box<TypeExpr>),
}

pub fn parse(input: &str) -> Result<TypeExpr, pest::error::Error<grammar::Rule>> {
    let entry = grammar::Parser::parse(grammar::Rule::entry, input)?
        .next()
        .unwrap();
    Ok(parse_type_expr(entry))
}

fn parse_type_expr(pair: pest::iterators::Pair<grammar::Rule>) -> TypeExpr {
    debug_assert_eq!(pair.as_rule(), grammar::Rule::type_expr);
    let mut inner = pair.into_inner();
    let primary = inner.next().unwrap();
    let mut expr = parse_primary(primary);
    for modifier in inner {
        expr = match modifier.as_str() {
            "?" => TypeExpr::Optional(Box::new(expr)),
            _ => TypeExpr::Vector(Box::new(expr)),
        };
    }
    expr
}

fn parse_primary(pair: pest::iterators::Pair<grammar::Rule>) -> TypeExpr {
    debug_assert_eq!(pair.as_rule(), grammar::Rule::primary);
    let child = pair.into_inner().next().unwrap();
    match child.as_rule() {
        grammar::Rule::ident => TypeExpr::Name(child.as_str().to_owned()),
        grammar::Rule::vector_form => {
            let inner_expr = child.into_inner().next().unwrap();
            TypeExpr::Vector(Box::new(parse_type_expr(inner_expr)))
        }
        grammar::Rule::set_form => {
            let inner_expr = child.into_inner().next().unwrap();
            TypeExpr::Set(Box::new(parse_type_expr(inner_expr)))
        }
        grammar::Rule::map_form => {
            let mut inner = child.into_inner();
            let key_expr = parse_type_expr(inner.next().unwrap());
            let value_expr = parse_type_expr(inner.next().unwrap());
            TypeExpr::Map(Box::new(key_expr), Box::new(value_expr))
        }
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name() {
        assert_eq!(parse("string").unwrap(), TypeExpr::Name("string".into()));
    }

    #[test]
    fn optional() {
        assert_eq!(
            parse("string?").unwrap(),
            TypeExpr::Optional(Box::new(TypeExpr::Name("string".into())))
        );
    }

    #[test]
    fn vector_sugar() {
        assert_eq!(
            parse("string[]").unwrap(),
            TypeExpr::Vector(Box::new(TypeExpr::Name("string".into())))
        );
    }

    #[test]
    fn vector_explicit() {
        assert_eq!(
            parse("vector[string]").unwrap(),
            TypeExpr::Vector(Box::new(TypeExpr::Name("string".into())))
        );
    }

    #[test]
    fn nested() {
        assert_eq!(
            parse("string[]?").unwrap(),
            TypeExpr::Optional(Box::new(TypeExpr::Vector(Box::new(TypeExpr::Name(
                "string".into()
            )))))
        );
    }

    #[test]
    fn invalid() {
        assert!(parse("").is_err());
        assert!(parse("string[").is_err());
        assert!(parse("vector[]").is_err());
    }

    #[test]
    fn set_form() {
        assert_eq!(
            parse("set[uint8]").unwrap(),
            TypeExpr::Set(Box::new(TypeExpr::Name("uint8".into())))
        );
    }

    #[test]
    fn map_form() {
        assert_eq!(
            parse("map[string, uint8]").unwrap(),
            TypeExpr::Map(
                Box::new(TypeExpr::Name("string".into())),
                Box::new(TypeExpr::Name("uint8".into()))
            )
        );
    }
}
