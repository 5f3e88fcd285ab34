//! Literal expression evaluation for `RETURN` projections.

use super::Bindings;
use crate::engine::{LogicalKind, RawValue};
use crate::value::temporal;

/// One projected column.
#[derive(Debug)]
pub(crate) struct Item {
    pub(crate) name: String,
    pub(crate) expr: Expr,
}

#[derive(Debug)]
pub(crate) enum Expr {
    Literal(RawValue),
    Param(String),
    List(Vec<Expr>),
    Struct(Vec<(String, Expr)>),
}

impl Expr {
    pub(crate) fn eval(&self, bindings: &Bindings) -> Result<RawValue, String> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Param(name) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| format!("Binder exception: Parameter {name} not found.")),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| item.eval(bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut element: Option<LogicalKind> = None;
                for value in &values {
                    if matches!(value, RawValue::Null) {
                        continue;
                    }
                    match element {
                        None => element = Some(value.kind()),
                        Some(kind) if kind == value.kind() => {}
                        Some(kind) => {
                            return Err(format!(
                                "Binder exception: Cannot bind LIST_CREATION with parameter type {kind} and {}.",
                                value.kind()
                            ))
                        }
                    }
                }
                Ok(RawValue::List(values))
            }
            Expr::Struct(fields) => fields
                .iter()
                .map(|(name, expr)| Ok((name.clone(), expr.eval(bindings)?)))
                .collect::<Result<Vec<_>, String>>()
                .map(RawValue::Struct),
        }
    }
}

/// Parses the comma-separated projection list that follows `RETURN`.
pub(crate) fn parse_items(text: &str) -> Result<Vec<Item>, String> {
    let mut parser = Parser { src: text, pos: 0 };
    let mut items = Vec::new();
    loop {
        parser.skip_ws();
        let start = parser.pos;
        let expr = parser.expr()?;
        let end = parser.pos;
        parser.skip_ws();
        let name = match parser.alias()? {
            Some(alias) => alias,
            None => text[start..end].trim().to_string(),
        };
        items.push(Item { name, expr });
        parser.skip_ws();
        match parser.peek() {
            None => break,
            Some(',') => parser.bump(),
            Some(_) => return Err(parser.error()),
        }
    }
    Ok(items)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self) -> String {
        let rest = self.src[self.pos..].trim();
        let token = rest.split_whitespace().next().unwrap_or("EOF");
        format!(
            "Parser exception: Invalid input <{token}>: expected rule oC_Expression (line: 1, offset: {})",
            self.pos
        )
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn alias(&mut self) -> Result<Option<String>, String> {
        let rest = &self.src[self.pos..];
        let is_as = rest
            .get(..2)
            .is_some_and(|head| head.eq_ignore_ascii_case("as"))
            && rest[2..].starts_with(char::is_whitespace);
        if !is_as {
            return Ok(None);
        }
        self.pos += 2;
        self.skip_ws();
        let name = if self.peek() == Some('`') {
            self.quoted('`')?
        } else {
            self.ident()
        };
        if name.is_empty() {
            return Err(self.error());
        }
        Ok(Some(name))
    }

    fn quoted(&mut self, quote: char) -> Result<String, String> {
        self.bump();
        let mut out = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error())?;
            self.bump();
            match c {
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| self.error())?;
                    self.bump();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('\'' | '"')) => Ok(Expr::Literal(RawValue::String(self.quoted(q)?))),
            Some('[') => {
                self.bump();
                let items = self.sequence(']', Self::expr)?;
                Ok(Expr::List(items))
            }
            Some('{') => {
                self.bump();
                let fields = self.sequence('}', |p| {
                    p.skip_ws();
                    let key = match p.peek() {
                        Some(q @ ('\'' | '"' | '`')) => p.quoted(q)?,
                        _ => p.ident(),
                    };
                    if key.is_empty() {
                        return Err(p.error());
                    }
                    p.expect(':')?;
                    Ok((key, p.expr()?))
                })?;
                Ok(Expr::Struct(fields))
            }
            Some('$') => {
                self.bump();
                let name = self.ident();
                if name.is_empty() {
                    return Err(self.error());
                }
                Ok(Expr::Param(name))
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.word(),
            _ => Err(self.error()),
        }
    }

    fn sequence<T>(
        &mut self,
        close: char,
        mut element: impl FnMut(&mut Self) -> Result<T, String>,
    ) -> Result<Vec<T>, String> {
        let mut out = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(out);
        }
        loop {
            out.push(element(self)?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.bump(),
                Some(c) if c == close => {
                    self.bump();
                    return Ok(out);
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn number(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        let mut float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' | 'e' | 'E' => float = true,
                '+' | '-' if float => {}
                _ => break,
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let value = if float {
            text.parse::<f64>().map(RawValue::Double).ok()
        } else {
            text.parse::<i64>()
                .map(RawValue::Int64)
                .or_else(|_| text.parse::<i128>().map(RawValue::Int128))
                .ok()
        };
        value.map(Expr::Literal).ok_or_else(|| {
            format!("Parser exception: Invalid input <{text}>: expected rule oC_NumberLiteral")
        })
    }

    fn word(&mut self) -> Result<Expr, String> {
        let word = self.ident();
        match word.to_ascii_uppercase().as_str() {
            "TRUE" => return Ok(Expr::Literal(RawValue::Bool(true))),
            "FALSE" => return Ok(Expr::Literal(RawValue::Bool(false))),
            "NULL" => return Ok(Expr::Literal(RawValue::Null)),
            _ => {}
        }
        self.expect('(')?;
        self.skip_ws();
        let arg = match self.peek() {
            Some(q @ ('\'' | '"')) => self.quoted(q)?,
            _ => return Err(self.error()),
        };
        self.expect(')')?;
        let value = match word.to_ascii_uppercase().as_str() {
            "DATE" => temporal::parse_date(&arg).map(|d| RawValue::Date(temporal::days_from_date(d))),
            "TIMESTAMP" => temporal::parse_timestamp(&arg)
                .and_then(temporal::micros_from_timestamp)
                .map(RawValue::Timestamp),
            "UUID" => parse_uuid(&arg).map(RawValue::Uuid),
            _ => {
                return Err(format!(
                    "Catalog exception: function {} does not exist.",
                    word.to_ascii_uppercase()
                ))
            }
        };
        value
            .map(Expr::Literal)
            .map_err(|err| format!("Conversion exception: {err}"))
    }
}

fn parse_uuid(text: &str) -> Result<String, crate::Error> {
    let groups: Vec<&str> = text.split('-').collect();
    let shaped = groups.iter().map(|g| g.len()).eq([8, 4, 4, 4, 12])
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_hexdigit()));
    if shaped {
        Ok(text.to_string())
    } else {
        Err(crate::Error::Conversion(format!("invalid UUID string: {text}")))
    }
}
