//! USDA (ASCII) parser.
//!
//! A tokenizer followed by a recursive-descent pass that builds a [`Layer`].
//!
//! # Supported Syntax
//!
//! - Layer metadata: `defaultPrim`, `startTimeCode`, `endTimeCode`, `timeCodesPerSecond`,
//!   `upAxis`, `metersPerUnit`, `doc`
//! - `def` / `over` / `class` prims with optional type and metadata (`active`, `kind`, ...)
//! - Attributes of every scalar and array type in [`TypeName`], with `custom` / `uniform`
//! - `.timeSamples = { t: value, ... }` and `.connect = </Path.prop>`
//! - Attribute metadata `interpolation` and `elementSize`
//! - `rel name = </Target>` and `rel name = [</A>, </B>]`
//!
//! Composition arcs (`references`, `payload`, `inherits`, `variants`) and variant sets are
//! skipped with a warning.

use sb_math::{Mat4, Mat4Ext, Quat, Vec2, Vec3, Vec4};
use thiserror::Error;

use super::attribute::{Attribute, Relationship};
use super::layer::{Layer, PrimSpec, Specifier};
use super::path::{ScenePath, Target};
use super::value::{TypeName, Value, ValueType};

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("missing '#usda' header")]
    MissingHeader,

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format at line {line}: {text}")]
    InvalidNumber { line: usize, text: String },

    #[error("Unterminated string starting at line {0}")]
    UnterminatedString(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse USDA text into a layer.
pub fn parse_usda(text: &str) -> ParseResult<Layer> {
    if !text.trim_start_matches('\u{feff}').trim_start().starts_with("#usda") {
        return Err(ParseError::MissingHeader);
    }
    let tokens = tokenize(text)?;
    UsdaParser::new(tokens).parse()
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(String),
    Str(String),
    Asset(String),
    Path(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
}

fn tokenize(text: &str) -> ParseResult<Vec<Spanned>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() || c == '\u{feff}' => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let start_line = line;
                let triple = i + 2 < chars.len() && chars[i + 1] == c && chars[i + 2] == c;
                i += if triple { 3 } else { 1 };
                let mut value = String::new();
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(ParseError::UnterminatedString(start_line));
                    };
                    if ch == c {
                        if !triple {
                            i += 1;
                            break;
                        }
                        if chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c) {
                            i += 3;
                            break;
                        }
                    }
                    if ch == '\n' {
                        if !triple {
                            return Err(ParseError::UnterminatedString(start_line));
                        }
                        line += 1;
                    }
                    if ch == '\\' {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or(ParseError::UnterminatedString(start_line))?;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => *other,
                        });
                        i += 2;
                        continue;
                    }
                    value.push(ch);
                    i += 1;
                }
                tokens.push(Spanned {
                    tok: Tok::Str(value),
                    line: start_line,
                });
            }
            '@' => {
                let start = i + 1;
                let end = (start..chars.len())
                    .find(|&j| chars[j] == '@' || chars[j] == '\n')
                    .filter(|&j| chars[j] == '@')
                    .ok_or(ParseError::UnterminatedString(line))?;
                tokens.push(Spanned {
                    tok: Tok::Asset(chars[start..end].iter().collect()),
                    line,
                });
                i = end + 1;
            }
            '<' => {
                let start = i + 1;
                let end = (start..chars.len())
                    .find(|&j| chars[j] == '>' || chars[j] == '\n')
                    .filter(|&j| chars[j] == '>')
                    .ok_or_else(|| ParseError::Parse {
                        line,
                        message: "unterminated path".to_string(),
                    })?;
                tokens.push(Spanned {
                    tok: Tok::Path(chars[start..end].iter().collect()),
                    line,
                });
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+' || c == '.')
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let n = chars[i];
                    let exponent_sign =
                        (n == '-' || n == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if n.is_ascii_digit() || n == '.' || n == 'e' || n == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    tok: Tok::Number(chars[start..i].iter().collect()),
                    line,
                });
            }
            '-' if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic()) => {
                // -inf
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                tokens.push(Spanned {
                    tok: Tok::Number(chars[start..i].iter().collect()),
                    line,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | ':' | '.'))
                {
                    i += 1;
                }
                tokens.push(Spanned {
                    tok: Tok::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            '(' | ')' | '[' | ']' | '{' | '}' | '=' | ',' | ':' | ';' => {
                tokens.push(Spanned {
                    tok: Tok::Punct(c),
                    line,
                });
                i += 1;
            }
            other => {
                return Err(ParseError::Parse {
                    line,
                    message: format!("unexpected character '{}'", other),
                });
            }
        }
    }
    Ok(tokens)
}

/// A literal before it is coerced to its declared type.
#[derive(Debug, Clone)]
enum Literal {
    Number(String),
    Str(String),
    Asset(String),
    Path(String),
    Ident(String),
    Tuple(Vec<Literal>),
    List(Vec<Literal>),
    Dict,
}

const LIST_OPS: &[&str] = &["prepend", "append", "delete", "add", "reorder"];
const COMPOSITION_ARCS: &[&str] = &[
    "references",
    "payload",
    "inherits",
    "specializes",
    "variants",
    "variantSets",
];

/// USDA token stream parser.
struct UsdaParser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl UsdaParser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(&mut self) -> ParseResult<Layer> {
        let mut layer = Layer::new();
        if self.peek_punct('(') {
            self.parse_layer_metadata(&mut layer)?;
        }
        let root = ScenePath::root();
        while self.peek().is_some() {
            self.parse_prim(&mut layer, &root)?;
        }
        Ok(layer)
    }

    // --- token helpers ---------------------------------------------------

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|s| &s.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> ParseResult<Tok> {
        let tok = self
            .tokens
            .get(self.pos)
            .map(|s| s.tok.clone())
            .ok_or(ParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(tok)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn peek_punct(&self, c: char) -> bool {
        self.peek() == Some(&Tok::Punct(c))
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(w)) if w == word)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.peek_ident(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.next()? {
            Tok::Ident(word) => Ok(word),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, found {:?}", other)))
            }
        }
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.next()? {
            Tok::Str(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected string, found {:?}", other)))
            }
        }
    }

    // --- grammar ---------------------------------------------------------

    fn parse_layer_metadata(&mut self, layer: &mut Layer) -> ParseResult<()> {
        self.expect_punct('(')?;
        while !self.eat_punct(')') {
            if let Some(Tok::Str(_)) = self.peek() {
                layer.metadata.doc = Some(self.expect_string()?);
                continue;
            }
            if self.eat_punct(';') || self.eat_punct(',') {
                continue;
            }
            let mut key = self.expect_ident()?;
            if LIST_OPS.contains(&key.as_str()) {
                key = self.expect_ident()?;
            }
            self.expect_punct('=')?;
            let line = self.line();
            let literal = self.parse_literal()?;
            let meta = &mut layer.metadata;
            match key.as_str() {
                "defaultPrim" => meta.default_prim = literal_text(&literal),
                "doc" => meta.doc = literal_text(&literal),
                "upAxis" => meta.up_axis = literal_text(&literal),
                "startTimeCode" => meta.start_time_code = Some(literal_f64(&literal, line)?),
                "endTimeCode" => meta.end_time_code = Some(literal_f64(&literal, line)?),
                "timeCodesPerSecond" => {
                    meta.time_codes_per_second = Some(literal_f64(&literal, line)?)
                }
                "metersPerUnit" => meta.meters_per_unit = Some(literal_f64(&literal, line)?),
                other => log::debug!("Ignoring layer metadata '{}'", other),
            }
        }
        Ok(())
    }

    fn parse_prim(&mut self, layer: &mut Layer, parent: &ScenePath) -> ParseResult<()> {
        let specifier = match self.expect_ident()?.as_str() {
            "def" => Specifier::Def,
            "over" => Specifier::Over,
            "class" => Specifier::Class,
            other => return Err(self.error(format!("expected prim specifier, found '{}'", other))),
        };

        let mut spec = PrimSpec::new(specifier);
        if let Some(Tok::Ident(_)) = self.peek() {
            spec.type_name = Some(self.expect_ident()?);
        }
        let name = self.expect_string()?;
        let path = parent
            .child(&name)
            .map_err(|e| self.error(e.to_string()))?;

        if self.peek_punct('(') {
            self.parse_prim_metadata(&mut spec, &path)?;
        }
        if !layer.insert_spec(&path, spec) {
            return Err(self.error(format!("duplicate prim spec {}", path)));
        }

        self.expect_punct('{')?;
        loop {
            if self.eat_punct('}') {
                break;
            }
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEof);
            }
            if self.peek_ident("def") || self.peek_ident("over") || self.peek_ident("class") {
                self.parse_prim(layer, &path)?;
            } else if self.eat_ident("variantSet") {
                log::warn!("Skipping variantSet on {}: variants are not supported", path);
                self.expect_string()?;
                self.expect_punct('=')?;
                self.parse_literal()?;
            } else if self.eat_punct(';') {
                continue;
            } else {
                self.parse_property(layer, &path)?;
            }
        }
        Ok(())
    }

    fn parse_prim_metadata(&mut self, spec: &mut PrimSpec, path: &ScenePath) -> ParseResult<()> {
        self.expect_punct('(')?;
        while !self.eat_punct(')') {
            if let Some(Tok::Str(_)) = self.peek() {
                let doc = self.expect_string()?;
                spec.metadata.insert("doc".to_string(), Value::String(doc));
                continue;
            }
            if self.eat_punct(';') || self.eat_punct(',') {
                continue;
            }
            let mut key = self.expect_ident()?;
            if LIST_OPS.contains(&key.as_str()) {
                key = self.expect_ident()?;
            }
            self.expect_punct('=')?;
            let literal = self.parse_literal()?;
            match key.as_str() {
                "active" => spec.active = literal_bool(&literal),
                "kind" => spec.kind = literal_text(&literal),
                "apiSchemas" => {}
                arc if COMPOSITION_ARCS.contains(&arc) => {
                    log::warn!("Ignoring '{}' on {}: composition arcs are not supported", arc, path);
                }
                other => match literal_to_metadata(&literal) {
                    Some(value) => {
                        spec.metadata.insert(other.to_string(), value);
                    }
                    None => log::debug!("Ignoring metadata '{}' on {}", other, path),
                },
            }
        }
        Ok(())
    }

    fn parse_property(&mut self, layer: &mut Layer, path: &ScenePath) -> ParseResult<()> {
        let mut custom = false;
        let mut uniform = false;
        loop {
            if self.eat_ident("custom") {
                custom = true;
            } else if self.eat_ident("uniform") {
                uniform = true;
            } else if self.peek_ident("varying") || LIST_OPS.iter().any(|op| self.peek_ident(op)) {
                self.pos += 1;
            } else {
                break;
            }
        }

        let line = self.line();
        let type_word = self.expect_ident()?;
        if type_word == "rel" {
            return self.parse_relationship(layer, path, custom);
        }

        let array = if self.eat_punct('[') {
            self.expect_punct(']')?;
            true
        } else {
            false
        };
        let name = self.expect_ident()?;
        let type_name = TypeName::parse(&type_word).map(|t| if array { t.as_array() } else { t });

        let Some(type_name) = type_name else {
            log::warn!(
                "Skipping attribute '{}' on {} at line {}: unsupported type '{}'",
                name,
                path,
                line,
                type_word
            );
            if self.eat_punct('=') {
                self.parse_literal()?;
            }
            if self.peek_punct('(') {
                self.parse_literal()?;
            }
            return Ok(());
        };

        let (base_name, suffix) = match name.rsplit_once('.') {
            Some((base, suffix @ ("connect" | "timeSamples"))) => (base.to_string(), Some(suffix)),
            _ => (name.clone(), None),
        };

        let mut attr = Attribute::new(type_name);
        attr.custom = custom;
        attr.uniform = uniform;

        match suffix {
            Some("connect") => {
                self.expect_punct('=')?;
                let literal = self.parse_literal()?;
                attr.connections = self.literal_targets(&literal)?;
            }
            Some(_) => {
                self.expect_punct('=')?;
                self.expect_punct('{')?;
                while !self.eat_punct('}') {
                    let line = self.line();
                    let time = match self.next()? {
                        Tok::Number(text) => parse_f64(&text, line)?,
                        other => return Err(self.error(format!("expected sample time, found {:?}", other))),
                    };
                    self.expect_punct(':')?;
                    let line = self.line();
                    let literal = self.parse_literal()?;
                    if !matches!(&literal, Literal::Ident(w) if w == "None") {
                        let value = coerce(type_name, &literal).map_err(|message| ParseError::Parse { line, message })?;
                        attr.set_sample(time, value);
                    }
                    self.eat_punct(',');
                }
            }
            None => {
                if self.eat_punct('=') {
                    let line = self.line();
                    let literal = self.parse_literal()?;
                    if !matches!(&literal, Literal::Ident(w) if w == "None") {
                        attr.default = Some(
                            coerce(type_name, &literal)
                                .map_err(|message| ParseError::Parse { line, message })?,
                        );
                    }
                }
            }
        }

        if self.peek_punct('(') {
            self.parse_attribute_metadata(&mut attr)?;
        }

        let Some(spec) = layer.prim_mut(path) else {
            return Err(self.error(format!("no spec for {}", path)));
        };
        match spec.attributes.get_mut(&base_name) {
            Some(existing) => merge_declaration(existing, attr),
            None => {
                spec.attributes.insert(base_name, attr);
            }
        }
        Ok(())
    }

    fn parse_attribute_metadata(&mut self, attr: &mut Attribute) -> ParseResult<()> {
        self.expect_punct('(')?;
        while !self.eat_punct(')') {
            if let Some(Tok::Str(_)) = self.peek() {
                self.expect_string()?;
                continue;
            }
            if self.eat_punct(';') || self.eat_punct(',') {
                continue;
            }
            let key = self.expect_ident()?;
            self.expect_punct('=')?;
            let line = self.line();
            let literal = self.parse_literal()?;
            match key.as_str() {
                "interpolation" => attr.interpolation = literal_text(&literal),
                "elementSize" => attr.element_size = Some(literal_f64(&literal, line)? as i32),
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_relationship(
        &mut self,
        layer: &mut Layer,
        path: &ScenePath,
        custom: bool,
    ) -> ParseResult<()> {
        let name = self.expect_ident()?;
        let mut rel = Relationship {
            custom,
            targets: Vec::new(),
        };
        if self.eat_punct('=') {
            let literal = self.parse_literal()?;
            rel.targets = self.literal_targets(&literal)?;
        }
        if self.peek_punct('(') {
            self.parse_literal()?;
        }
        let Some(spec) = layer.prim_mut(path) else {
            return Err(self.error(format!("no spec for {}", path)));
        };
        spec.relationships.insert(name, rel);
        Ok(())
    }

    fn literal_targets(&self, literal: &Literal) -> ParseResult<Vec<Target>> {
        let parse = |text: &str| Target::parse(text).map_err(|e| self.error(e.to_string()));
        match literal {
            Literal::Path(text) => Ok(vec![parse(text)?]),
            Literal::List(items) => items
                .iter()
                .map(|item| match item {
                    Literal::Path(text) => parse(text),
                    other => Err(self.error(format!("expected path, found {:?}", other))),
                })
                .collect(),
            Literal::Ident(word) if word == "None" => Ok(Vec::new()),
            other => Err(self.error(format!("expected path, found {:?}", other))),
        }
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        match self.next()? {
            Tok::Number(text) => Ok(Literal::Number(text)),
            Tok::Str(text) => Ok(Literal::Str(text)),
            Tok::Asset(text) => {
                // `@file.usda@</Prim>` reference form: the prim target is dropped.
                if let Some(Tok::Path(_)) = self.peek() {
                    self.pos += 1;
                }
                Ok(Literal::Asset(text))
            }
            Tok::Path(text) => Ok(Literal::Path(text)),
            Tok::Ident(word) => Ok(Literal::Ident(word)),
            Tok::Punct('(') => Ok(Literal::Tuple(self.parse_sequence(')')?)),
            Tok::Punct('[') => Ok(Literal::List(self.parse_sequence(']')?)),
            Tok::Punct('{') => {
                let mut depth = 1;
                while depth > 0 {
                    match self.next()? {
                        Tok::Punct('{') => depth += 1,
                        Tok::Punct('}') => depth -= 1,
                        _ => {}
                    }
                }
                Ok(Literal::Dict)
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected value, found {:?}", other)))
            }
        }
    }

    fn parse_sequence(&mut self, close: char) -> ParseResult<Vec<Literal>> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct(close) {
                return Ok(items);
            }
            items.push(self.parse_literal()?);
            if !self.eat_punct(',') {
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }
}

/// Fold a repeated declaration (`x`, then `x.timeSamples`) into one attribute.
fn merge_declaration(existing: &mut Attribute, attr: Attribute) {
    existing.custom |= attr.custom;
    existing.uniform |= attr.uniform;
    if attr.default.is_some() {
        existing.default = attr.default;
    }
    for (time, value) in attr.time_samples {
        existing.set_sample(time, value);
    }
    if !attr.connections.is_empty() {
        existing.connections = attr.connections;
    }
    if attr.interpolation.is_some() {
        existing.interpolation = attr.interpolation;
    }
    if attr.element_size.is_some() {
        existing.element_size = attr.element_size;
    }
}

fn parse_f64(text: &str, line: usize) -> ParseResult<f64> {
    text.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        line,
        text: text.to_string(),
    })
}

fn literal_f64(literal: &Literal, line: usize) -> ParseResult<f64> {
    match literal {
        Literal::Number(text) | Literal::Ident(text) => parse_f64(text, line),
        other => Err(ParseError::Parse {
            line,
            message: format!("expected number, found {:?}", other),
        }),
    }
}

fn literal_text(literal: &Literal) -> Option<String> {
    match literal {
        Literal::Str(s) | Literal::Ident(s) | Literal::Asset(s) => Some(s.clone()),
        _ => None,
    }
}

fn literal_bool(literal: &Literal) -> Option<bool> {
    match literal {
        Literal::Ident(w) if w == "true" => Some(true),
        Literal::Ident(w) if w == "false" => Some(false),
        Literal::Number(n) => n.parse::<f64>().ok().map(|v| v != 0.0),
        _ => None,
    }
}

fn literal_to_metadata(literal: &Literal) -> Option<Value> {
    match literal {
        Literal::Str(s) => Some(Value::String(s.clone())),
        Literal::Asset(s) => Some(Value::Asset(s.clone())),
        Literal::Ident(_) => literal_bool(literal).map(Value::Bool),
        Literal::Number(n) => n.parse::<f64>().ok().map(Value::Double),
        _ => None,
    }
}

fn number(literal: &Literal) -> Result<f64, String> {
    match literal {
        Literal::Number(text) | Literal::Ident(text) => text
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{}'", text)),
        other => Err(format!("expected number, found {:?}", other)),
    }
}

fn integer(literal: &Literal) -> Result<i64, String> {
    if let Literal::Number(text) = literal {
        if let Ok(v) = text.parse::<i64>() {
            return Ok(v);
        }
    }
    let v = number(literal)?;
    if v.fract() != 0.0 {
        return Err(format!("expected integer, found {}", v));
    }
    Ok(v as i64)
}

fn tuple<const N: usize>(literal: &Literal) -> Result<[f32; N], String> {
    match literal {
        Literal::Tuple(items) if items.len() == N => {
            let mut out = [0.0; N];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = number(item)? as f32;
            }
            Ok(out)
        }
        other => Err(format!("expected {}-tuple, found {:?}", N, other)),
    }
}

fn coerce_scalar(ty: TypeName, literal: &Literal) -> Result<Value, String> {
    Ok(match ty.value_type {
        ValueType::Bool => Value::Bool(
            literal_bool(literal).ok_or_else(|| format!("expected bool, found {:?}", literal))?,
        ),
        ValueType::UChar => Value::UChar(integer(literal)? as u8),
        ValueType::Int => Value::Int(integer(literal)? as i32),
        ValueType::UInt => Value::UInt(integer(literal)? as u32),
        ValueType::Int64 => Value::Int64(integer(literal)?),
        ValueType::Float => Value::Float(number(literal)? as f32),
        ValueType::Double => Value::Double(number(literal)?),
        ValueType::String | ValueType::Token => {
            let text = match literal {
                Literal::Str(s) => s.clone(),
                other => return Err(format!("expected string, found {:?}", other)),
            };
            if ty.value_type == ValueType::String {
                Value::String(text)
            } else {
                Value::Token(text)
            }
        }
        ValueType::Asset => match literal {
            Literal::Asset(s) | Literal::Str(s) => Value::Asset(s.clone()),
            other => return Err(format!("expected asset path, found {:?}", other)),
        },
        ValueType::Float2 => Value::Float2(Vec2::from_array(tuple::<2>(literal)?)),
        ValueType::Float3 => Value::Float3(Vec3::from_array(tuple::<3>(literal)?)),
        ValueType::Float4 => Value::Float4(Vec4::from_array(tuple::<4>(literal)?)),
        ValueType::Quat => {
            let [w, x, y, z] = tuple::<4>(literal)?;
            Value::Quat(Quat::from_xyzw(x, y, z, w))
        }
        ValueType::Matrix4 => {
            let rows = match literal {
                Literal::Tuple(rows) if rows.len() == 4 => rows,
                other => return Err(format!("expected 4x4 matrix, found {:?}", other)),
            };
            let mut values = [0.0f64; 16];
            for (r, row) in rows.iter().enumerate() {
                let row = tuple::<4>(row)?;
                for (c, v) in row.iter().enumerate() {
                    values[r * 4 + c] = *v as f64;
                }
            }
            Value::Matrix4(Mat4::from_row_major(&values))
        }
    })
}

fn coerce(ty: TypeName, literal: &Literal) -> Result<Value, String> {
    if !ty.array {
        return coerce_scalar(ty, literal);
    }
    let items = match literal {
        Literal::List(items) => items,
        other => return Err(format!("expected array for {}, found {:?}", ty, other)),
    };
    let elem = ty.element();
    let values = items
        .iter()
        .map(|item| coerce_scalar(elem, item))
        .collect::<Result<Vec<_>, _>>()?;
    let values = values.into_iter();

    Ok(match ty.value_type {
        ValueType::Bool => Value::BoolArray(values.filter_map(|v| v.as_bool()).collect()),
        ValueType::UChar => {
            Value::UCharArray(values.filter_map(|v| v.as_i64()).map(|v| v as u8).collect())
        }
        ValueType::Int => {
            Value::IntArray(values.filter_map(|v| v.as_i64()).map(|v| v as i32).collect())
        }
        ValueType::UInt => {
            Value::UIntArray(values.filter_map(|v| v.as_i64()).map(|v| v as u32).collect())
        }
        ValueType::Int64 => Value::Int64Array(values.filter_map(|v| v.as_i64()).collect()),
        ValueType::Float => Value::FloatArray(values.filter_map(|v| v.as_f32()).collect()),
        ValueType::Double => Value::DoubleArray(values.filter_map(|v| v.as_f64()).collect()),
        ValueType::String => {
            Value::StringArray(values.filter_map(|v| v.as_str().map(String::from)).collect())
        }
        ValueType::Token => {
            Value::TokenArray(values.filter_map(|v| v.as_str().map(String::from)).collect())
        }
        ValueType::Asset => {
            Value::AssetArray(values.filter_map(|v| v.as_str().map(String::from)).collect())
        }
        ValueType::Float2 => Value::Float2Array(values.filter_map(|v| v.as_vec2()).collect()),
        ValueType::Float3 => Value::Float3Array(values.filter_map(|v| v.as_vec3()).collect()),
        ValueType::Float4 => Value::Float4Array(values.filter_map(|v| v.as_vec4()).collect()),
        ValueType::Quat => Value::QuatArray(values.filter_map(|v| v.as_quat()).collect()),
        ValueType::Matrix4 => Value::Matrix4Array(values.filter_map(|v| v.as_mat4()).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ScenePath {
        ScenePath::new(s).unwrap()
    }

    const CUBE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
    startTimeCode = 1
    endTimeCode = 24
    upAxis = "Y"
)

def Xform "World" (
    kind = "assembly"
)
{
    double3 xformOp:translate = (1, 2, 3)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Cube"
    {
        int[] faceVertexCounts = [4]
        int[] faceVertexIndices = [0, 1, 2, 3]
        point3f[] points = [(-1, -1, 0), (1, -1, 0), (1, 1, 0), (-1, 1, 0)]
        point3f[] points.timeSamples = {
            1: [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)],
            2: [(0, 0, 1), (1, 0, 1), (1, 1, 1), (0, 1, 1)],
        }
        texCoord2f[] primvars:st = [(0, 0), (1, 0), (1, 1), (0, 1)] (
            interpolation = "faceVarying"
        )
        rel material:binding = </World/Looks/Red>
        uniform token subdivisionScheme = "none"
    }

    def Scope "Looks" (
        active = false
    )
    {
        def Shader "Red"
        {
            uniform token info:id = "UsdPreviewSurface"
            color3f inputs:diffuseColor = (1, 0, 0)
            color3f inputs:emissiveColor.connect = </World/Looks/Tex.outputs:rgb>
            token outputs:surface
        }
    }
}
"#;

    #[test]
    fn test_parse_layer_metadata() {
        let layer = parse_usda(CUBE).unwrap();
        assert_eq!(layer.metadata.default_prim.as_deref(), Some("World"));
        assert_eq!(layer.metadata.start_time_code, Some(1.0));
        assert_eq!(layer.metadata.end_time_code, Some(24.0));
        assert_eq!(layer.metadata.up_axis.as_deref(), Some("Y"));
    }

    #[test]
    fn test_parse_hierarchy_and_metadata() {
        let layer = parse_usda(CUBE).unwrap();
        let world = layer.prim(&path("/World")).unwrap();
        assert_eq!(world.type_name.as_deref(), Some("Xform"));
        assert_eq!(world.kind.as_deref(), Some("assembly"));
        assert_eq!(world.children, vec!["Cube".to_string(), "Looks".to_string()]);
        assert_eq!(layer.prim(&path("/World/Looks")).unwrap().active, Some(false));
    }

    #[test]
    fn test_parse_attributes() {
        let layer = parse_usda(CUBE).unwrap();
        let cube = layer.prim(&path("/World/Cube")).unwrap();

        let counts = &cube.attributes["faceVertexCounts"];
        assert_eq!(counts.default, Some(Value::IntArray(vec![4])));

        let points = &cube.attributes["points"];
        assert_eq!(points.default.as_ref().and_then(|v| v.len()), Some(4));
        assert_eq!(points.time_samples.len(), 2);
        assert!(points.is_time_varying());

        let st = &cube.attributes["primvars:st"];
        assert_eq!(st.interpolation.as_deref(), Some("faceVarying"));
        assert_eq!(st.type_name.to_string(), "texCoord2f[]");

        assert!(cube.attributes["subdivisionScheme"].uniform);

        let binding = &cube.relationships["material:binding"];
        assert_eq!(binding.targets[0].prim.as_str(), "/World/Looks/Red");
    }

    #[test]
    fn test_parse_connections_and_declarations() {
        let layer = parse_usda(CUBE).unwrap();
        let shader = layer.prim(&path("/World/Looks/Red")).unwrap();
        let emissive = &shader.attributes["inputs:emissiveColor"];
        assert_eq!(emissive.connections[0].to_string(), "/World/Looks/Tex.outputs:rgb");
        assert!(emissive.default.is_none());

        let output = &shader.attributes["outputs:surface"];
        assert!(!output.has_value());
    }

    #[test]
    fn test_parse_matrix_and_quat() {
        let text = r#"#usda 1.0
def Xform "A"
{
    matrix4d xformOp:transform = ( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (5, 6, 7, 1) )
    quatf xformOp:orient = (1, 0, 0, 0)
    float inf_value = -inf
}
"#;
        let layer = parse_usda(text).unwrap();
        let spec = layer.prim(&path("/A")).unwrap();
        let m = spec.attributes["xformOp:transform"]
            .default
            .as_ref()
            .and_then(|v| v.as_mat4())
            .unwrap();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(5.0, 6.0, 7.0));
        assert_eq!(
            spec.attributes["xformOp:orient"].default,
            Some(Value::Quat(Quat::IDENTITY))
        );
        assert_eq!(
            spec.attributes["inf_value"].default,
            Some(Value::Float(f32::NEG_INFINITY))
        );
    }

    #[test]
    fn test_parse_over_and_class() {
        let text = r#"#usda 1.0
over "World"
{
    over "Cube" (
        active = false
    )
    {
    }
}
class "Template"
{
}
"#;
        let layer = parse_usda(text).unwrap();
        assert_eq!(layer.prim(&path("/World")).unwrap().specifier, Specifier::Over);
        assert_eq!(layer.prim(&path("/World/Cube")).unwrap().active, Some(false));
        assert_eq!(layer.prim(&path("/Template")).unwrap().specifier, Specifier::Class);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_usda("def Xform \"A\" {}"), Err(ParseError::MissingHeader)));
        assert!(matches!(
            parse_usda("#usda 1.0\ndef Xform \"A\" {"),
            Err(ParseError::UnexpectedEof)
        ));
        assert!(matches!(
            parse_usda("#usda 1.0\ndef Xform \"A\" {\n    float x = \"oops\"\n}"),
            Err(ParseError::Parse { line: 3, .. })
        ));
        assert!(parse_usda("#usda 1.0\ndef \"A\" {}\ndef \"A\" {}").is_err());
    }

    #[test]
    fn test_parse_skips_unknown_types_and_arcs() {
        let text = r#"#usda 1.0
def Xform "A" (
    prepend references = @other.usda@</Root>
    customData = { string note = "x" }
)
{
    dictionary extra = { }
    float x = 1
}
"#;
        let layer = parse_usda(text).unwrap();
        let spec = layer.prim(&path("/A")).unwrap();
        assert_eq!(spec.attributes.len(), 1);
        assert_eq!(spec.attributes["x"].default, Some(Value::Float(1.0)));
    }
}
