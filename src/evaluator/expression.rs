//! Restricted boolean expression language for `custom-expression`
//! conditions.
//!
//! The grammar is a closed safe subset evaluated against a read-only
//! context — no scripting engine, no ambient host access:
//!
//! ```text
//! expr       := or
//! or         := and ( '||' and )*
//! and        := unary ( '&&' unary )*
//! unary      := '!' unary | comparison
//! comparison := operand ( ('==' | '!=' | '>' | '<' | '>=' | '<=') operand )?
//! operand    := literal | path | call | '(' expr ')'
//! call       := 'exists' '(' path ')'
//!             | 'contains' '(' operand ',' operand ')'
//!             | 'artifact' '(' string ')'
//! path       := ident ( '.' ident )*      e.g. state.retries, node.id
//! literal    := string | number | 'true' | 'false' | 'null'
//! ```
//!
//! Paths resolve against the snapshot: `state.<key>` (or a bare key) reads
//! mock state, `node.id` is the current node. Any parse or type failure
//! makes the whole expression `false` — one bad condition degrades one
//! edge, never the traversal.

use serde_json::Value;
use thiserror::Error;

use super::operators::{contains, value_to_f64, values_equal};
use super::SimState;

#[derive(Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("Unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
}

/// Evaluate an expression, absorbing all failures into `false`.
pub fn evaluate_expression(source: &str, state: &SimState, current_node: &str) -> bool {
    match parse(source) {
        Ok(expr) => truthy(&eval(&expr, state, current_node)),
        Err(err) => {
            tracing::warn!(expression = source, %err, "custom expression rejected; treating as false");
            false
        }
    }
}

// ================================
// Tokens
// ================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    LParen,
    RParen,
    Comma,
    Dot,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ExprError::UnterminatedString);
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                    j += 1;
                }
                let text: String = chars[start..j].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::UnexpectedChar(c, start))?;
                tokens.push(Token::Num(n));
                i = j;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let word: String = chars[start..j].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                });
                i = j;
            }
            other => return Err(ExprError::UnexpectedChar(other, i)),
        }
    }
    Ok(tokens)
}

// ================================
// AST
// ================================

#[derive(Debug, Clone, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Exists(Vec<String>),
    Contains(Box<Expr>, Box<Expr>),
    Artifact(String),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::UnexpectedToken(parser.pos));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Token, ExprError> {
        let t = self.tokens.get(self.pos).cloned().ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, token: Token) -> Result<(), ExprError> {
        if self.advance()? == token {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken(self.pos - 1))
        }
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.operand()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CmpOp::Eq,
            Some(Token::NotEq) => CmpOp::Ne,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::Le) => CmpOp::Le,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.operand()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn operand(&mut self) -> Result<Expr, ExprError> {
        match self.advance()? {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Num(n) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => self.ident_operand(name),
            _ => Err(ExprError::UnexpectedToken(self.pos - 1)),
        }
    }

    fn ident_operand(&mut self, name: String) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            return match name.as_str() {
                "exists" => {
                    let path = self.path_segments()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Exists(path))
                }
                "contains" => {
                    let haystack = self.operand()?;
                    self.expect(Token::Comma)?;
                    let needle = self.operand()?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::Contains(Box::new(haystack), Box::new(needle)))
                }
                "artifact" => {
                    let path = match self.advance()? {
                        Token::Str(s) => s,
                        _ => return Err(ExprError::UnexpectedToken(self.pos - 1)),
                    };
                    self.expect(Token::RParen)?;
                    Ok(Expr::Artifact(path))
                }
                _ => Err(ExprError::UnexpectedToken(self.pos - 1)),
            };
        }
        let mut segments = vec![name];
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            match self.advance()? {
                Token::Ident(seg) => segments.push(seg),
                _ => return Err(ExprError::UnexpectedToken(self.pos - 1)),
            }
        }
        Ok(Expr::Path(segments))
    }

    fn path_segments(&mut self) -> Result<Vec<String>, ExprError> {
        let mut segments = Vec::new();
        match self.advance()? {
            Token::Ident(seg) => segments.push(seg),
            _ => return Err(ExprError::UnexpectedToken(self.pos - 1)),
        }
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            match self.advance()? {
                Token::Ident(seg) => segments.push(seg),
                _ => return Err(ExprError::UnexpectedToken(self.pos - 1)),
            }
        }
        Ok(segments)
    }
}

// ================================
// Evaluation
// ================================

fn eval(expr: &Expr, state: &SimState, current_node: &str) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Path(segments) => resolve_path(segments, state, current_node),
        Expr::Not(inner) => Value::Bool(!truthy(&eval(inner, state, current_node))),
        Expr::And(l, r) => Value::Bool(
            truthy(&eval(l, state, current_node)) && truthy(&eval(r, state, current_node)),
        ),
        Expr::Or(l, r) => Value::Bool(
            truthy(&eval(l, state, current_node)) || truthy(&eval(r, state, current_node)),
        ),
        Expr::Compare(op, l, r) => {
            let a = eval(l, state, current_node);
            let b = eval(r, state, current_node);
            Value::Bool(compare_values(op, &a, &b))
        }
        Expr::Exists(segments) => {
            Value::Bool(!resolve_path(segments, state, current_node).is_null())
        }
        Expr::Contains(h, n) => {
            let haystack = eval(h, state, current_node);
            let needle = eval(n, state, current_node);
            Value::Bool(contains(&haystack, &needle))
        }
        Expr::Artifact(path) => Value::Bool(state.artifact_exists(path)),
    }
}

fn resolve_path(segments: &[String], state: &SimState, current_node: &str) -> Value {
    match segments {
        [first, rest @ ..] if first == "state" && !rest.is_empty() => state
            .get(&rest.join("."))
            .cloned()
            .unwrap_or(Value::Null),
        [first, second] if first == "node" && second == "id" => {
            Value::String(current_node.to_string())
        }
        [single] => state.get(single).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn compare_values(op: &CmpOp, a: &Value, b: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(a, b),
        CmpOp::Ne => !values_equal(a, b),
        CmpOp::Gt | CmpOp::Lt | CmpOp::Ge | CmpOp::Le => {
            let (Some(x), Some(y)) = (value_to_f64(a), value_to_f64(b)) else {
                return false;
            };
            match op {
                CmpOp::Gt => x > y,
                CmpOp::Lt => x < y,
                CmpOp::Ge => x >= y,
                CmpOp::Le => x <= y,
                _ => unreachable!(),
            }
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> SimState {
        let mut s = SimState::new();
        s.set("ok", json!(true));
        s.set("count", json!(7));
        s.set("tag", json!("release"));
        s.set("tags", json!(["fast", "safe"]));
        s.produce_artifact("report.md", crate::store::ValidationStatus::Unknown);
        s
    }

    fn run(src: &str) -> bool {
        evaluate_expression(src, &state(), "node-1")
    }

    #[test]
    fn test_literals_and_truthiness() {
        assert!(run("true"));
        assert!(!run("false"));
        assert!(!run("null"));
        assert!(run("1"));
        assert!(!run("0"));
        assert!(run("'x'"));
    }

    #[test]
    fn test_state_paths() {
        assert!(run("state.ok"));
        assert!(run("ok"));
        assert!(!run("state.missing"));
        assert!(run("state.count == 7"));
        assert!(run("state.tag == 'release'"));
    }

    #[test]
    fn test_node_id_path() {
        assert!(run("node.id == 'node-1'"));
        assert!(!run("node.id == 'other'"));
    }

    #[test]
    fn test_boolean_connectives() {
        assert!(run("state.count > 5 && state.count < 10"));
        assert!(run("state.count > 100 || state.ok"));
        assert!(run("!(state.count > 100)"));
        assert!(!run("!state.ok"));
    }

    #[test]
    fn test_comparisons() {
        assert!(run("state.count >= 7"));
        assert!(run("state.count <= 7"));
        assert!(run("state.count != 8"));
        // non-numeric ordering comparisons are false, never an error
        assert!(!run("state.tag > 3"));
    }

    #[test]
    fn test_builtin_calls() {
        assert!(run("exists(state.ok)"));
        assert!(!run("exists(state.missing)"));
        assert!(run("contains(state.tags, 'fast')"));
        assert!(run("contains(state.tag, 'rel')"));
        assert!(run("artifact(\"report.md\")"));
        assert!(!run("artifact(\"missing.md\")"));
    }

    #[test]
    fn test_parentheses_and_precedence() {
        // && binds tighter than ||
        assert!(run("false && false || true"));
        assert!(!run("false && (false || true)"));
    }

    #[test]
    fn test_malformed_expressions_are_false() {
        assert!(!run("state.count >"));
        assert!(!run("((("));
        assert!(!run("state.count === 7"));
        assert!(!run("delete(state)"));
        assert!(!run("'unterminated"));
        assert!(!run("state.count > 5 extra"));
    }

    #[test]
    fn test_no_host_access_identifiers_resolve_to_state_only() {
        // unknown bare identifiers are just absent state keys
        assert!(!run("process"));
        assert!(!run("window.location == 'x'"));
    }
}
