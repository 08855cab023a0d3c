//! Expression Lexer
//!
//! Splits expression source into tokens. Quoted text is extracted as whole
//! string tokens before anything else looks at it, so string contents can
//! never be mistaken for identifiers.

use std::fmt;

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),

    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Comma,
    Dot,
    Colon,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,

    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
    Coalesce,

    /// A lone `=`. Never valid, but lexed so the parser can report it.
    Assign,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Number(n) => return write!(f, "{n}"),
            Token::Str(s) => return write!(f, "{s:?}"),
            Token::Ident(name) => return f.write_str(name),
            Token::ParenOpen => "(",
            Token::ParenClose => ")",
            Token::BracketOpen => "[",
            Token::BracketClose => "]",
            Token::BraceOpen => "{",
            Token::BraceClose => "}",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Question => "?",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::StrictEq => "===",
            Token::StrictNotEq => "!==",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Coalesce => "??",
            Token::Assign => "=",
            Token::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Tokenize `source`. The result always ends with [`Token::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len())
    }

    fn run(mut self) -> Result<Vec<Spanned>, ExprError> {
        let mut tokens = Vec::new();
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            let position = self.offset();
            let Some(c) = self.peek() else {
                tokens.push(Spanned {
                    token: Token::Eof,
                    position,
                });
                return Ok(tokens);
            };

            let token = if c == '"' || c == '\'' {
                self.string(c)?
            } else if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.number()?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                self.ident()
            } else {
                self.punct(c)?
            };
            tokens.push(Spanned { token, position });
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, ExprError> {
        let start = self.offset();
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(ExprError::syntax(start, "unterminated string"));
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(Token::Str(out)),
                '\\' => {
                    let Some(escaped) = self.peek() else {
                        return Err(ExprError::syntax(start, "unterminated string"));
                    };
                    self.pos += 1;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        '0' => out.push('\0'),
                        'u' => out.push(self.unicode_escape()?),
                        other => out.push(other),
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, ExprError> {
        let start = self.offset();
        let digits: String = (0..4).filter_map(|i| self.peek_at(i)).collect();
        if digits.len() != 4 {
            return Err(ExprError::syntax(start, "invalid unicode escape"));
        }
        self.pos += 4;
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| ExprError::syntax(start, "invalid unicode escape"))
    }

    fn number(&mut self) -> Result<Token, ExprError> {
        let start = self.offset();
        let begin = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[begin..self.pos].iter().map(|(_, c)| *c).collect();
        text.parse()
            .map(Token::Number)
            .map_err(|_| ExprError::syntax(start, format!("invalid number `{text}`")))
    }

    fn ident(&mut self) -> Token {
        let begin = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        Token::Ident(self.chars[begin..self.pos].iter().map(|(_, c)| *c).collect())
    }

    fn punct(&mut self, c: char) -> Result<Token, ExprError> {
        let start = self.offset();
        let next = self.peek_at(1);
        let third = self.peek_at(2);
        let (token, width) = match (c, next, third) {
            ('=', Some('='), Some('=')) => (Token::StrictEq, 3),
            ('!', Some('='), Some('=')) => (Token::StrictNotEq, 3),
            ('=', Some('='), _) => (Token::Eq, 2),
            ('!', Some('='), _) => (Token::NotEq, 2),
            ('<', Some('='), _) => (Token::LessEq, 2),
            ('>', Some('='), _) => (Token::GreaterEq, 2),
            ('&', Some('&'), _) => (Token::And, 2),
            ('|', Some('|'), _) => (Token::Or, 2),
            ('?', Some('?'), _) => (Token::Coalesce, 2),
            ('=', _, _) => (Token::Assign, 1),
            ('!', _, _) => (Token::Bang, 1),
            ('<', _, _) => (Token::Less, 1),
            ('>', _, _) => (Token::Greater, 1),
            ('?', _, _) => (Token::Question, 1),
            ('(', _, _) => (Token::ParenOpen, 1),
            (')', _, _) => (Token::ParenClose, 1),
            ('[', _, _) => (Token::BracketOpen, 1),
            (']', _, _) => (Token::BracketClose, 1),
            ('{', _, _) => (Token::BraceOpen, 1),
            ('}', _, _) => (Token::BraceClose, 1),
            (',', _, _) => (Token::Comma, 1),
            ('.', _, _) => (Token::Dot, 1),
            (':', _, _) => (Token::Colon, 1),
            ('+', _, _) => (Token::Plus, 1),
            ('-', _, _) => (Token::Minus, 1),
            ('*', _, _) => (Token::Star, 1),
            ('/', _, _) => (Token::Slash, 1),
            ('%', _, _) => (Token::Percent, 1),
            (other, _, _) => {
                return Err(ExprError::syntax(start, format!("unexpected character `{other}`")))
            }
        };
        self.pos += width;
        Ok(token)
    }
}
