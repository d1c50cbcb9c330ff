use regex::Regex;

use super::value::Value;
use super::{BinaryOp, Method, Node, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Attribute(String),
    String(String),
    Number(Value),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Dot,
}

const OPERATORS: &[&str] = &[
    "==", "!=", "<>", "<=", ">=", "&&", "||", "=", "<", ">", "!", "+", "-", "*", "/", "%",
];

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, String> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '[' => {
                let mut name = String::new();
                i += 1;
                while i < chars.len() && chars[i].1 != ']' {
                    name.push(chars[i].1);
                    i += 1;
                }
                if i == chars.len() {
                    return Err(format!("unterminated attribute reference at {pos}"));
                }
                tokens.push((pos, Token::Attribute(name)));
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&(_, ch)) = chars.get(i) else {
                        return Err(format!("unterminated string at {pos}"));
                    };
                    i += 1;
                    match ch {
                        '\\' => {
                            if let Some(&(_, escaped)) = chars.get(i) {
                                text.push(escaped);
                                i += 1;
                            }
                        }
                        ch if ch == quote => break,
                        ch => text.push(ch),
                    }
                }
                tokens.push((pos, Token::String(text)));
            }
            '(' => {
                tokens.push((pos, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                i += 1;
            }
            ',' => {
                tokens.push((pos, Token::Comma));
                i += 1;
            }
            '.' if !chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_digit()) => {
                tokens.push((pos, Token::Dot));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].1.is_ascii_digit()
                        || chars[i].1 == '.'
                        || chars[i].1 == 'e'
                        || chars[i].1 == 'E'
                        || ((chars[i].1 == '-' || chars[i].1 == '+')
                            && matches!(chars[i - 1].1, 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| c).collect();
                let number = match text.parse::<i64>() {
                    Ok(v) => Value::Integer(v),
                    Err(_) => Value::Float(
                        text.parse::<f64>()
                            .map_err(|_| format!("invalid number '{text}' at {pos}"))?,
                    ),
                };
                tokens.push((pos, Token::Number(number)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|(_, c)| c).collect();
                tokens.push((pos, Token::Ident(ident)));
            }
            _ => {
                let rest = &input[pos..];
                for op in OPERATORS {
                    if rest.starts_with(op) {
                        tokens.push((pos, Token::Op(op)));
                        i += op.chars().count();
                        continue 'outer;
                    }
                }
                return Err(format!("unexpected character '{c}' at {pos}"));
            }
        }
    }

    Ok(tokens)
}

pub(super) fn parse(input: &str) -> Result<Node, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, index: 0 };
    let node = parser.or()?;
    if let Some((pos, token)) = parser.tokens.get(parser.index) {
        return Err(format!("unexpected {token:?} at {pos}"));
    }

    Ok(node)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(_, token)| token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).map(|(_, token)| token.clone());
        self.index += 1;
        token
    }

    fn accept_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.index += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(ident)) if ident.eq_ignore_ascii_case(keyword) => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    fn or(&mut self) -> Result<Node, String> {
        let mut left = self.and()?;
        while self.accept_keyword("or") || self.accept_op(&["||"]).is_some() {
            let right = self.and()?;
            left = Node::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn and(&mut self) -> Result<Node, String> {
        let mut left = self.not()?;
        while self.accept_keyword("and") || self.accept_op(&["&&"]).is_some() {
            let right = self.not()?;
            left = Node::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn not(&mut self) -> Result<Node, String> {
        if self.accept_keyword("not") || self.accept_op(&["!"]).is_some() {
            let operand = self.not()?;
            return Ok(Node::Unary(UnaryOp::Not, Box::new(operand)));
        }

        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node, String> {
        let left = self.additive()?;
        let op = match self.accept_op(&["=", "==", "!=", "<>", "<", "<=", ">", ">="]) {
            Some("=") | Some("==") => BinaryOp::Eq,
            Some("!=") | Some("<>") => BinaryOp::Neq,
            Some("<") => BinaryOp::Lt,
            Some("<=") => BinaryOp::Le,
            Some(">") => BinaryOp::Gt,
            Some(">=") => BinaryOp::Ge,
            _ => return Ok(left),
        };
        let right = self.additive()?;

        Ok(Node::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Node, String> {
        let mut left = self.multiplicative()?;
        while let Some(op) = self.accept_op(&["+", "-"]) {
            let op = if op == "+" {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            let right = self.multiplicative()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Node, String> {
        let mut left = self.unary()?;
        while let Some(op) = self.accept_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            };
            let right = self.unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Node, String> {
        if self.accept_op(&["-"]).is_some() {
            let operand = self.unary()?;
            return Ok(Node::Unary(UnaryOp::Neg, Box::new(operand)));
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, String> {
        let mut node = self.primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.index += 1;
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => return Err(format!("expected method name, found {other:?}")),
            };
            self.expect(Token::LParen)?;
            let mut args = Vec::new();
            if self.peek() != Some(&Token::RParen) {
                loop {
                    match self.next() {
                        Some(Token::String(arg)) => args.push(arg),
                        other => {
                            return Err(format!("expected string argument, found {other:?}"))
                        }
                    }
                    if self.peek() == Some(&Token::Comma) {
                        self.index += 1;
                    } else {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;

            let method = match (name.as_str(), args.as_slice()) {
                ("match", [pattern]) => Method::Match(compile(pattern)?),
                ("replace", [pattern, replacement]) => {
                    Method::Replace(compile(pattern)?, replacement.clone())
                }
                _ => return Err(format!("unknown method '{name}' with {} arguments", args.len())),
            };
            node = Node::Method(Box::new(node), method);
        }

        Ok(node)
    }

    fn primary(&mut self) -> Result<Node, String> {
        match self.next() {
            Some(Token::Attribute(name)) => Ok(Node::Attribute(name)),
            Some(Token::String(text)) => Ok(Node::Literal(Value::String(text))),
            Some(Token::Number(number)) => Ok(Node::Literal(number)),
            Some(Token::Ident(ident)) => match ident.to_ascii_lowercase().as_str() {
                "true" => Ok(Node::Literal(Value::Bool(true))),
                "false" => Ok(Node::Literal(Value::Bool(false))),
                "null" => Ok(Node::Literal(Value::Null)),
                _ => Err(format!("unexpected identifier '{ident}'")),
            },
            Some(Token::LParen) => {
                let node = self.or()?;
                self.expect(Token::RParen)?;
                Ok(node)
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|err| format!("invalid regular expression '{pattern}': {err}"))
}
