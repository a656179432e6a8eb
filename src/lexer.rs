use crate::{
    diagnostics::{error, ErrorKind, Result},
    value::{parse_date, Value},
};

/// A resumable lexer position. States are byte offsets into the source and
/// can be captured with [`Lexer::get_state`] and replayed with
/// [`Lexer::set_state`], which is how loops and function bodies re-run.
pub type State = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    End,
    Stmt,
    Comma,
    Assign,
    PlusSet,
    MinusSet,
    MulSet,
    DivSet,
    IDivSet,
    Plus,
    Minus,
    Multiply,
    Divide,
    IDiv,
    Mod,
    Power,
    Inc,
    Dec,
    BitAnd,
    BitOr,
    BitNot,
    LAnd,
    LOr,
    LNot,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    LPar,
    RPar,
    LCurly,
    RCurly,
    LSquare,
    RSquare,
    Dot,
    MDot,
    Apo,
    Colon,
    Question,
    Literal,
    Name,
    For,
    If,
    Else,
    Func,
    Object,
    New,
    My,
}

/// Single-token lookahead scanner with replayable state.
#[derive(Debug, Clone)]
pub struct Lexer {
    source: String,
    pos: usize,
    last_pos: usize,
    token: Token,
    value: Value,
    name: String,
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            source: String::new(),
            pos: 0,
            last_pos: 0,
            token: Token::End,
            value: Value::Empty,
            name: String::new(),
        }
    }

    pub fn init(&mut self, source: &str) -> Result<()> {
        self.source = source.to_owned();
        self.set_state(0)
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Literal payload of the current `Literal` token.
    pub fn value(&self) -> Value {
        self.value.clone()
    }

    /// Identifier payload of the current `Name` or `Dot` token.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset where the current token starts.
    pub fn get_state(&self) -> State {
        self.last_pos
    }

    pub fn set_state(&mut self, state: State) -> Result<()> {
        self.pos = state;
        self.token = Token::End;
        self.next()?;
        Ok(())
    }

    /// Raw source text between two captured states.
    pub fn content(&self, begin: State, end: State) -> &str {
        &self.source[begin..end]
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Expects the closing counterpart of `open` and consumes it.
    pub fn check_pair(&mut self, open: Token) -> Result<()> {
        let (close, text) = match open {
            Token::LPar => (Token::RPar, "')'"),
            Token::LSquare => (Token::RSquare, "']'"),
            _ => (Token::RCurly, "'}'"),
        };
        if self.token != close {
            return Err(error(ErrorKind::MissingCharacter, text));
        }
        self.next()?;
        Ok(())
    }

    pub fn next(&mut self) -> Result<Token> {
        let c = loop {
            self.last_pos = self.pos;
            match self.bump() {
                None => {
                    self.token = Token::End;
                    return Ok(self.token);
                }
                Some(c) if c.is_whitespace() => continue,
                Some(c) => break c,
            }
        };
        self.token = match c {
            '0'..='9' => self.read_number(c)?,
            '\'' | '"' => {
                let text = self.read_string(c)?;
                self.value = Value::Str(text);
                Token::Literal
            }
            '#' => {
                let text = self.read_string('#')?;
                self.value = Value::Date(parse_date(&text)?);
                Token::Literal
            }
            ';' => {
                while self.peek() == Some(';') {
                    self.bump();
                }
                Token::Stmt
            }
            ',' => Token::Comma,
            '+' => match self.peek() {
                Some('+') => self.bump_into(Token::Inc),
                Some('=') => self.bump_into(Token::PlusSet),
                _ => Token::Plus,
            },
            '-' => match self.peek() {
                Some('-') => self.bump_into(Token::Dec),
                Some('=') => self.bump_into(Token::MinusSet),
                _ => Token::Minus,
            },
            '*' => match self.peek() {
                Some('=') => self.bump_into(Token::MulSet),
                _ => Token::Multiply,
            },
            '/' => match self.peek() {
                Some('=') => self.bump_into(Token::DivSet),
                _ => Token::Divide,
            },
            '\\' => match self.peek() {
                Some('=') => self.bump_into(Token::IDivSet),
                _ => Token::IDiv,
            },
            '%' => Token::Mod,
            '^' => Token::Power,
            '~' => Token::BitNot,
            '<' => match self.peek() {
                Some('=') => self.bump_into(Token::Le),
                _ => Token::Lt,
            },
            '>' => match self.peek() {
                Some('=') => self.bump_into(Token::Ge),
                _ => Token::Gt,
            },
            '=' => match self.peek() {
                Some('=') => self.bump_into(Token::Eq),
                _ => Token::Assign,
            },
            '!' => match self.peek() {
                Some('=') => self.bump_into(Token::Ne),
                _ => Token::LNot,
            },
            '&' => match self.peek() {
                Some('&') => self.bump_into(Token::LAnd),
                _ => Token::BitAnd,
            },
            '|' => match self.peek() {
                Some('|') => self.bump_into(Token::LOr),
                _ => Token::BitOr,
            },
            '(' => Token::LPar,
            ')' => Token::RPar,
            '{' => Token::LCurly,
            '}' => Token::RCurly,
            '[' => Token::LSquare,
            ']' => Token::RSquare,
            '`' => Token::Apo,
            '\u{b7}' => Token::MDot,
            ':' => Token::Colon,
            '?' => Token::Question,
            '.' => {
                let first = self
                    .bump()
                    .ok_or_else(|| error(ErrorKind::UnexpectedEof, "member name"))?;
                self.read_name(first)?;
                Token::Dot
            }
            c => {
                self.read_name(c)?;
                match self.name.as_str() {
                    "for" => Token::For,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "sub" | "fn" => Token::Func,
                    "object" => Token::Object,
                    "new" => Token::New,
                    "my" => Token::My,
                    _ => Token::Name,
                }
            }
        };
        Ok(self.token)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_into(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn read_number(&mut self, first: char) -> Result<Token> {
        #[derive(PartialEq, PartialOrd)]
        enum Stage {
            Int,
            Frac,
            Exp,
            ExpDigits,
        }

        let mut mantissa = i64::from(first.to_digit(10).unwrap_or(0));
        let mut stage = Stage::Int;
        let mut frac_shift = 0i32;
        let mut exponent = 0i32;
        let mut exp_neg = false;
        let hex = first == '0' && matches!(self.peek(), Some('x') | Some('X'));
        if hex {
            self.bump();
        }
        loop {
            let Some(c) = self.peek() else { break };
            if hex {
                match c.to_digit(16) {
                    Some(d) => {
                        mantissa = mantissa
                            .checked_mul(16)
                            .and_then(|m| m.checked_add(i64::from(d)))
                            .ok_or_else(|| error(ErrorKind::ValueTooLarge, "number"))?;
                        self.bump();
                    }
                    None => break,
                }
                continue;
            }
            match c {
                '0'..='9' => {
                    let d = i64::from(c.to_digit(10).unwrap_or(0));
                    match stage {
                        Stage::Int => {
                            mantissa = mantissa
                                .checked_mul(10)
                                .and_then(|m| m.checked_add(d))
                                .ok_or_else(|| error(ErrorKind::ValueTooLarge, "number"))?;
                        }
                        Stage::Frac => {
                            // Fraction digits past the mantissa capacity are
                            // insignificant and get dropped.
                            if let Some(m) = mantissa.checked_mul(10).and_then(|m| m.checked_add(d))
                            {
                                mantissa = m;
                                frac_shift -= 1;
                            }
                        }
                        Stage::Exp | Stage::ExpDigits => {
                            exponent = exponent * 10 + d as i32;
                            stage = Stage::ExpDigits;
                        }
                    }
                    self.bump();
                }
                '.' if stage == Stage::Int => {
                    stage = Stage::Frac;
                    self.bump();
                }
                'e' | 'E' | 'd' | 'D' if stage <= Stage::Frac => {
                    stage = Stage::Exp;
                    self.bump();
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        exp_neg = self.bump() == Some('-');
                    }
                }
                _ => break,
            }
        }
        if stage == Stage::Exp {
            return Err(error(ErrorKind::SyntaxError, "exponent"));
        }
        self.value = if stage == Stage::Int {
            Value::Int(mantissa)
        } else {
            let power = frac_shift + if exp_neg { -exponent } else { exponent };
            Value::Double(mantissa as f64 * 10f64.powi(power))
        };
        Ok(Token::Literal)
    }

    fn read_string(&mut self, quote: char) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(error(ErrorKind::MissingCharacter, format!("'{quote}'"))),
                Some(c) if c == quote => {
                    // A doubled delimiter embeds a single one.
                    if self.peek() == Some(quote) {
                        self.bump();
                        text.push(quote);
                    } else {
                        break;
                    }
                }
                Some(c) => text.push(c),
            }
        }
        Ok(text)
    }

    fn read_name(&mut self, first: char) -> Result<()> {
        if !first.is_alphabetic() && first != '@' && first != '_' {
            return Err(error(ErrorKind::SyntaxError, format!("'{first}'")));
        }
        self.name.clear();
        self.name.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(())
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}
