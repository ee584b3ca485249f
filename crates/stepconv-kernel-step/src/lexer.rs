//! Part 21 (STEP physical file) tokenizer.
//!
//! Recognizes keywords (including user-defined `!NAME` and hyphenated
//! section markers like `END-ISO-10303-21`), `#id` references, quoted
//! strings with `''` escapes, binary literals, reals, integers,
//! `.ENUM.` values, `/* */` comments, and punctuation.

use crate::error::StepError;

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or type name, upper-cased.
    Keyword(String),
    /// Entity reference `#123`.
    EntityRef(u64),
    /// String literal contents without quotes.
    String(String),
    /// Binary literal contents without quotes.
    Binary(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration `.NAME.` (name only).
    Enum(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `*` (derived value).
    Asterisk,
    /// `$` (unset value).
    Dollar,
}

/// A token and the line it starts on.
#[derive(Debug, Clone)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Line number (1-indexed).
    pub line: usize,
}

/// Byte-level tokenizer.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over raw file contents.
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, StepError> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(ch) = self.peek(0) else {
                return Ok(out);
            };
            let line = self.line;
            let token = self.token(ch)?;
            out.push(Spanned { token, line });
        }
    }

    fn token(&mut self, ch: u8) -> Result<Token, StepError> {
        let punct = match ch {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b',' => Some(Token::Comma),
            b';' => Some(Token::Semicolon),
            b'=' => Some(Token::Equals),
            b'*' => Some(Token::Asterisk),
            b'$' => Some(Token::Dollar),
            _ => None,
        };
        if let Some(tok) = punct {
            self.bump();
            return Ok(tok);
        }

        match ch {
            b'#' => self.entity_ref(),
            b'\'' => self.string(),
            b'"' => self.binary(),
            b'.' if self.peek(1).is_some_and(|c| c.is_ascii_alphabetic()) => self.enumeration(),
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.number(),
            b'!' | b'_' | b'A'..=b'Z' | b'a'..=b'z' => Ok(self.keyword()),
            _ => Err(self.error(format!("unexpected character '{}'", ch as char))),
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek(0)?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek(0).is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn error(&self, message: impl Into<String>) -> StepError {
        StepError::lexer(self.line, self.col, message)
    }

    fn skip_trivia(&mut self) -> Result<(), StepError> {
        loop {
            self.take_while(|c| c.is_ascii_whitespace());
            if self.peek(0) == Some(b'/') && self.peek(1) == Some(b'*') {
                let (line, col) = (self.line, self.col);
                self.bump();
                self.bump();
                loop {
                    match (self.peek(0), self.peek(1)) {
                        (Some(b'*'), Some(b'/')) => {
                            self.bump();
                            self.bump();
                            break;
                        }
                        (Some(_), _) => {
                            self.bump();
                        }
                        (None, _) => return Err(StepError::lexer(line, col, "unterminated comment")),
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn entity_ref(&mut self) -> Result<Token, StepError> {
        self.bump();
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error("expected digits after '#'"));
        }
        let text = String::from_utf8_lossy(digits);
        text.parse()
            .map(Token::EntityRef)
            .map_err(|_| self.error(format!("invalid entity id #{text}")))
    }

    fn string(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let mut content = Vec::new();
        loop {
            match self.bump() {
                None => return Err(StepError::lexer(line, col, "unterminated string")),
                Some(b'\'') if self.peek(0) == Some(b'\'') => {
                    self.bump();
                    content.push(b'\'');
                }
                Some(b'\'') => break,
                Some(ch) => content.push(ch),
            }
        }
        Ok(Token::String(String::from_utf8_lossy(&content).into_owned()))
    }

    fn binary(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let body = self.take_while(|c| c.is_ascii_hexdigit());
        let body = String::from_utf8_lossy(body).into_owned();
        if self.bump() != Some(b'"') {
            return Err(StepError::lexer(line, col, "unterminated binary literal"));
        }
        Ok(Token::Binary(body))
    }

    fn enumeration(&mut self) -> Result<Token, StepError> {
        self.bump();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        if self.bump() != Some(b'.') {
            return Err(self.error(format!("unterminated enumeration .{name}")));
        }
        Ok(Token::Enum(name))
    }

    fn number(&mut self) -> Result<Token, StepError> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);
        if matches!(self.peek(0), Some(b'-' | b'+')) {
            self.bump();
        }
        self.take_while(|c| c.is_ascii_digit());
        let mut real = false;
        if self.peek(0) == Some(b'.') {
            real = true;
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(0), Some(b'E' | b'e')) {
            real = true;
            self.bump();
            if matches!(self.peek(0), Some(b'-' | b'+')) {
                self.bump();
            }
            self.take_while(|c| c.is_ascii_digit());
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        let bad = || StepError::lexer(line, col, format!("invalid number '{text}'"));
        if real {
            // Part 21 allows a trailing '.' with no fraction digits ("10.").
            text.parse().map(Token::Real).map_err(|_| bad())
        } else {
            text.parse().map(Token::Integer).map_err(|_| bad())
        }
    }

    fn keyword(&mut self) -> Token {
        let start = self.pos;
        self.bump();
        self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-');
        Token::Keyword(String::from_utf8_lossy(&self.src[start..self.pos]).to_ascii_uppercase())
    }
}
