// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::*;
use crate::number::*;
use crate::value::*;

use core::str::FromStr;

use anyhow::{bail, Result};

#[derive(Clone)]
pub struct Parser<'source> {
    source: Source,
    lexer: Lexer<'source>,
    tok: Token,
    line: u32,
    end: u32,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source Source) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tok = lexer.next_token()?;
        Ok(Self {
            source: source.clone(),
            lexer,
            tok,
            line: 0,
            end: 0,
        })
    }

    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Number | TokenKind::Ident | TokenKind::Eof => {
                self.tok.1.text()
            }
            TokenKind::String => "",
        }
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.line = self.tok.1.line;
        self.end = self.tok.1.end;
        self.tok = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.source.error(self.tok.1.line, self.tok.1.col, &msg))
        }
    }

    fn parse_ident(&mut self) -> Result<Span> {
        let span = self.tok.1.clone();
        match self.tok.0 {
            TokenKind::Ident => {
                self.next_token()?;
                Ok(span)
            }
            _ => Err(self
                .source
                .error(self.tok.1.line, self.tok.1.col, "expecting identifier")),
        }
    }

    fn read_number(span: Span) -> Result<Expr> {
        match Number::from_str(span.text()) {
            Ok(v) => Ok(Expr::Number((span, Value::from(v)))),
            Err(_) => bail!(span.error("could not parse number")),
        }
    }

    fn parse_scalar_or_var(&mut self) -> Result<Expr> {
        let span = self.tok.1.clone();
        let node = match &self.tok.0 {
            TokenKind::Number => Self::read_number(span)?,
            TokenKind::String => {
                let v = Value::from(unescape(span.text()));
                Expr::String((span, v))
            }
            TokenKind::Ident => match self.token_text() {
                "null" => Expr::Null((span, Value::null())),
                "true" => Expr::Bool((span, Value::from(true))),
                "false" => Expr::Bool((span, Value::from(false))),
                _ => {
                    let ident = self.parse_ident()?;
                    let v = Value::from(ident.text());
                    return Ok(Expr::Var((ident, v)));
                }
            },
            _ => {
                return Err(self.source.error(
                    self.tok.1.line,
                    self.tok.1.col,
                    "expecting expression",
                ))
            }
        };
        self.next_token()?;
        Ok(node)
    }

    // Parses a comma separated sequence of expressions up to `delim`.
    // A trailing comma is allowed.
    fn parse_items(&mut self, delim: &str, context: &str) -> Result<Vec<Ref<Expr>>> {
        let mut items = vec![];
        if self.token_text() != delim {
            items.push(Ref::new(self.parse_expr()?));
            while self.token_text() == "," {
                self.next_token()?;
                if self.token_text() == delim || self.tok.0 == TokenKind::Eof {
                    break;
                }
                items.push(Ref::new(self.parse_expr()?));
            }
        }
        self.expect(delim, context)?;
        Ok(items)
    }

    fn parse_array(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        self.expect("[", "while parsing list")?;
        let items = self.parse_items("]", "while parsing list")?;
        span.end = self.end;
        Ok(Expr::Array { span, items })
    }

    // A bare identifier used as an object key is a literal string key.
    fn object_key(key: Expr) -> Expr {
        match key {
            Expr::Var((span, v)) => Expr::String((span, v)),
            k => k,
        }
    }

    fn is_object_separator(&self) -> bool {
        self.tok.0 == TokenKind::Symbol && matches!(self.token_text(), ":" | "=")
    }

    fn parse_set_or_object(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        self.expect("{", "while parsing set or object")?;

        // {} is an empty object.
        if self.token_text() == "}" {
            self.next_token()?;
            span.end = self.end;
            return Ok(Expr::Object {
                span,
                fields: vec![],
            });
        }

        let mut item_span = self.tok.1.clone();
        let first = self.parse_expr()?;

        if !self.is_object_separator() {
            // Parse as set.
            let mut items = vec![Ref::new(first)];
            while self.token_text() == "," {
                self.next_token()?;
                match self.token_text() {
                    "}" => break,
                    "" if self.tok.0 == TokenKind::Eof => break,
                    _ => items.push(Ref::new(self.parse_expr()?)),
                }
            }
            self.expect("}", "while parsing set")?;
            span.end = self.end;
            return Ok(Expr::Set { span, items });
        }

        // Parse as object.
        self.next_token()?;
        let mut fields = vec![];
        let value = self.parse_expr()?;
        item_span.end = self.end;
        fields.push((item_span, Ref::new(Self::object_key(first)), Ref::new(value)));

        while self.token_text() == "," {
            self.next_token()?;
            let mut item_span = self.tok.1.clone();
            let key = match self.token_text() {
                "}" => break,
                "" if self.tok.0 == TokenKind::Eof => break,
                _ => self.parse_expr()?,
            };

            if !self.is_object_separator() {
                return Err(self.source.error(
                    self.tok.1.line,
                    self.tok.1.col,
                    "expecting `:` or `=` while parsing object item",
                ));
            }
            self.next_token()?;
            let value = self.parse_expr()?;
            item_span.end = self.end;

            fields.push((item_span, Ref::new(Self::object_key(key)), Ref::new(value)));
        }

        self.expect("}", "while parsing object")?;
        span.end = self.end;

        Ok(Expr::Object { span, fields })
    }

    fn parse_empty_set(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        self.expect("set(", "while parsing empty set")?;
        self.expect(")", "while parsing empty set")?;
        span.end = self.end;
        Ok(Expr::Set {
            span,
            items: vec![],
        })
    }

    fn parse_parens_expr(&mut self) -> Result<Expr> {
        self.next_token()?;
        let expr = self.parse_expr()?;
        self.expect(")", "while parsing parenthesized expression")?;
        Ok(expr)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let mut span = self.tok.1.clone();
        self.next_token()?;
        let expr = self.parse_expr()?;
        span.end = self.end;
        Ok(Expr::UnaryExpr {
            span,
            expr: Ref::new(expr),
        })
    }

    fn parse_ref(&mut self) -> Result<Expr> {
        let first = self.tok.1.clone();
        let is_symbol = self.tok.0 == TokenKind::Symbol;
        let mut term = match self.token_text() {
            "[" if is_symbol => self.parse_array()?,
            "{" if is_symbol => self.parse_set_or_object()?,
            "(" if is_symbol => self.parse_parens_expr()?,
            "-" if is_symbol => return self.parse_unary_expr(),
            "set(" => self.parse_empty_set()?,
            _ => self.parse_scalar_or_var()?,
        };

        loop {
            let mut span = first.clone();
            if self.tok.0 != TokenKind::Symbol {
                break;
            }
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    let field = self.parse_ident()?;
                    span.end = self.end;
                    let fieldv = Value::from(field.text());
                    term = Expr::RefDot {
                        span,
                        refr: Ref::new(term),
                        field: (field, fieldv),
                    };
                }
                "[" => {
                    self.next_token()?;
                    let index = self.parse_expr()?;
                    self.expect("]", "while parsing index")?;
                    span.end = self.end;
                    term = Expr::RefBrack {
                        span,
                        refr: Ref::new(term),
                        index: Ref::new(index),
                    };
                }
                // Only a bare name can be called.
                "(" if matches!(term, Expr::Var(_)) => {
                    self.next_token()?;
                    let params = self.parse_items(")", "while parsing call expr")?;
                    span.end = self.end;
                    term = Expr::Call {
                        span,
                        fcn: Ref::new(term),
                        params,
                    };
                }
                _ => break,
            }
        }

        Ok(term)
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_ref()
    }

    /// Parses a complete expression. The whole source must be consumed.
    pub fn parse_expression(&mut self) -> Result<Ref<Expr>> {
        let expr = self.parse_expr()?;
        if self.tok.0 != TokenKind::Eof {
            return Err(self.source.error(
                self.tok.1.line,
                self.tok.1.col,
                "unexpected token after expression",
            ));
        }
        Ok(Ref::new(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Ref<Expr>> {
        let source = Source::from_contents("test.tf".to_string(), text.to_string())?;
        let mut parser = Parser::new(&source)?;
        parser.parse_expression()
    }

    #[test]
    fn set_and_object_literals() -> Result<()> {
        assert!(matches!(parse(r#"{"a", "b"}"#)?.as_ref(), Expr::Set { items, .. } if items.len() == 2));
        assert!(matches!(parse(r#"{"x": 1, y = 2}"#)?.as_ref(), Expr::Object { fields, .. } if fields.len() == 2));
        assert!(matches!(parse("{}")?.as_ref(), Expr::Object { fields, .. } if fields.is_empty()));
        assert!(matches!(parse("set()")?.as_ref(), Expr::Set { items, .. } if items.is_empty()));
        Ok(())
    }

    #[test]
    fn traversals_and_calls() -> Result<()> {
        assert!(matches!(parse("aws_instance.web[0].id")?.as_ref(), Expr::RefDot { .. }));
        assert!(matches!(parse("toset(var.names)")?.as_ref(), Expr::Call { params, .. } if params.len() == 1));
        Ok(())
    }

    #[test]
    fn trailing_tokens() {
        assert!(parse("var.a var.b").is_err());
        assert!(parse("{\"a\": }").is_err());
    }
}
