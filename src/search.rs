//! Extraction of named values from a message, for filter evaluation.
//!
//! [`extract_tokens`] turns a message into a [`TokenNode`] tree keyed by
//! member name. Typed accessors never coerce between kinds: reading an
//! `Int` token as a float, or a string as a number, is a
//! [`NanoLogError::TypeMismatch`].

use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{NanoLogError, Result};
use crate::loggable::Decimal;
use crate::message::LogMessage;
use crate::token::TokenType;
use crate::visitor::{self, MessageVisitor, VisitContext, VisitOutcome};

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Null,
    Bool(bool),
    Char(char),
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    String(String),
    Structured(Vec<(String, TokenNode)>),
}

/// One node of an extracted token tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenNode {
    value: TokenValue,
}

impl TokenNode {
    fn structured() -> Self {
        Self {
            value: TokenValue::Structured(Vec::new()),
        }
    }

    pub fn value(&self) -> &TokenValue {
        &self.value
    }

    /// Token kind as it was encoded.
    pub fn token_type(&self) -> TokenType {
        match &self.value {
            TokenValue::Null => TokenType::Null,
            TokenValue::Bool(true) => TokenType::BoolTrue,
            TokenValue::Bool(false) => TokenType::BoolFalse,
            TokenValue::Char(_) => TokenType::Char,
            TokenValue::Byte(_) => TokenType::Byte,
            TokenValue::Short(_) => TokenType::Short,
            TokenValue::UShort(_) => TokenType::UShort,
            TokenValue::Int(_) => TokenType::Int,
            TokenValue::UInt(_) => TokenType::UInt,
            TokenValue::Long(_) => TokenType::Long,
            TokenValue::ULong(_) => TokenType::ULong,
            TokenValue::Float(_) => TokenType::Float,
            TokenValue::Double(_) => TokenType::Double,
            TokenValue::Decimal(_) => TokenType::Decimal,
            TokenValue::DateTime(_) => TokenType::DateTime,
            TokenValue::Guid(_) => TokenType::Guid,
            TokenValue::String(_) => TokenType::String4,
            TokenValue::Structured(_) => TokenType::LogValue,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, TokenValue::Null)
    }

    /// Looks up a member of a structured node.
    pub fn get(&self, name: &str) -> Result<&TokenNode> {
        match &self.value {
            TokenValue::Structured(children) => children
                .iter()
                .find(|(child, _)| child == name)
                .map(|(_, node)| node)
                .ok_or_else(|| NanoLogError::MissingMember(name.to_string())),
            _ => Err(NanoLogError::NotStructured),
        }
    }

    /// Member names in encoding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let children: &[(String, TokenNode)] = match &self.value {
            TokenValue::Structured(children) => children,
            _ => &[],
        };
        children.iter().map(|(name, _)| name.as_str())
    }

    fn mismatch(&self, expected: &'static str) -> NanoLogError {
        NanoLogError::type_mismatch(expected, self.token_type())
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.value {
            TokenValue::Bool(v) => Ok(v),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn as_char(&self) -> Result<char> {
        match self.value {
            TokenValue::Char(v) => Ok(v),
            _ => Err(self.mismatch("char")),
        }
    }

    /// Any integer kind whose value fits in `i64`.
    pub fn as_i64(&self) -> Result<i64> {
        match self.value {
            TokenValue::Byte(v) => Ok(v as i64),
            TokenValue::Short(v) => Ok(v as i64),
            TokenValue::UShort(v) => Ok(v as i64),
            TokenValue::Int(v) => Ok(v as i64),
            TokenValue::UInt(v) => Ok(v as i64),
            TokenValue::Long(v) => Ok(v),
            TokenValue::ULong(v) => i64::try_from(v).map_err(|_| self.mismatch("i64")),
            _ => Err(self.mismatch("i64")),
        }
    }

    /// Any non-negative integer kind.
    pub fn as_u64(&self) -> Result<u64> {
        match self.value {
            TokenValue::ULong(v) => Ok(v),
            _ => {
                let signed = self.as_i64().map_err(|_| self.mismatch("u64"))?;
                u64::try_from(signed).map_err(|_| self.mismatch("u64"))
            }
        }
    }

    /// Float kinds only.
    pub fn as_f64(&self) -> Result<f64> {
        match self.value {
            TokenValue::Float(v) => Ok(v as f64),
            TokenValue::Double(v) => Ok(v),
            _ => Err(self.mismatch("f64")),
        }
    }

    pub fn as_decimal(&self) -> Result<Decimal> {
        match self.value {
            TokenValue::Decimal(v) => Ok(v),
            _ => Err(self.mismatch("decimal")),
        }
    }

    pub fn as_date_time(&self) -> Result<DateTime<Utc>> {
        match self.value {
            TokenValue::DateTime(v) => Ok(v),
            _ => Err(self.mismatch("datetime")),
        }
    }

    pub fn as_guid(&self) -> Result<Uuid> {
        match self.value {
            TokenValue::Guid(v) => Ok(v),
            _ => Err(self.mismatch("guid")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match &self.value {
            TokenValue::String(v) => Ok(v),
            _ => Err(self.mismatch("string")),
        }
    }
}

/// Builds a [`TokenNode`] tree while visiting a message.
///
/// Literals are ignored. When a name repeats at the same level the first
/// value is kept.
#[derive(Debug)]
pub struct TokenTreeVisitor {
    // open structured values, root first
    stack: Vec<(String, TokenNode)>,
}

impl TokenTreeVisitor {
    pub fn new() -> Self {
        Self {
            stack: vec![(String::new(), TokenNode::structured())],
        }
    }

    /// Returns the root of the tree. Unclosed values are attached as-is.
    pub fn finish(mut self) -> TokenNode {
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack
            .pop()
            .map(|(_, node)| node)
            .unwrap_or_else(TokenNode::structured)
    }

    fn add(&mut self, name: &str, value: TokenValue) -> ControlFlow<()> {
        if let Some((_, parent)) = self.stack.last_mut() {
            if let TokenValue::Structured(children) = &mut parent.value {
                if !children.iter().any(|(existing, _)| existing == name) {
                    children.push((name.to_string(), TokenNode { value }));
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn close(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        if let Some((name, node)) = self.stack.pop() {
            let _ = self.add(&name, node.value);
        }
    }
}

impl Default for TokenTreeVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageVisitor for TokenTreeVisitor {
    fn visit_literal(&mut self, _text: &str) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_null(&mut self, _cx: &VisitContext, name: &str) -> ControlFlow<()> {
        self.add(name, TokenValue::Null)
    }

    fn visit_bool(&mut self, _cx: &VisitContext, name: &str, value: bool) -> ControlFlow<()> {
        self.add(name, TokenValue::Bool(value))
    }

    fn visit_char(&mut self, _cx: &VisitContext, name: &str, value: char) -> ControlFlow<()> {
        self.add(name, TokenValue::Char(value))
    }

    fn visit_byte(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: u8,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Byte(value))
    }

    fn visit_short(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: i16,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Short(value))
    }

    fn visit_ushort(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: u16,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::UShort(value))
    }

    fn visit_int(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: i32,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Int(value))
    }

    fn visit_uint(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: u32,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::UInt(value))
    }

    fn visit_long(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: i64,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Long(value))
    }

    fn visit_ulong(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: u64,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::ULong(value))
    }

    fn visit_float(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: f32,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Float(value))
    }

    fn visit_double(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: f64,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Double(value))
    }

    fn visit_decimal(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: Decimal,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::Decimal(value))
    }

    fn visit_date_time(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: DateTime<Utc>,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::DateTime(value))
    }

    fn visit_guid(&mut self, _cx: &VisitContext, name: &str, value: Uuid) -> ControlFlow<()> {
        self.add(name, TokenValue::Guid(value))
    }

    fn visit_string(
        &mut self,
        _: &VisitContext,
        name: &str,
        _: Option<&str>,
        value: &str,
    ) -> ControlFlow<()> {
        self.add(name, TokenValue::String(value.to_string()))
    }

    fn begin_log_value(&mut self, _cx: &VisitContext, name: &str) -> ControlFlow<()> {
        self.stack.push((name.to_string(), TokenNode::structured()));
        ControlFlow::Continue(())
    }

    fn end_log_value(&mut self, _cx: &VisitContext) -> ControlFlow<()> {
        self.close();
        ControlFlow::Continue(())
    }
}

/// Extracts the named values of `message` into a tree.
///
/// A malformed message yields whatever was decoded before the fault.
pub fn extract_tokens(message: &LogMessage) -> TokenNode {
    let mut tree = TokenTreeVisitor::new();
    if visitor::visit(message, &mut tree) == VisitOutcome::Malformed {
        tracing::debug!("token extraction stopped at a malformed token");
    }
    tree.finish()
}
