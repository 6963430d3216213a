use std::{fmt::Display, io::BufRead};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    // Value-bearing tokens
    Number(i32),
    Id(String),
    Char(char),
    String(String),

    // Keywords
    Class,
    Return,
    If,
    Else,
    Def,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,

    // Two character operators
    Eq,
    NotEq,
    LessOrEq,
    GreaterOrEq,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// The variant of a [`Token`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    Id,
    Char,
    String,
    Class,
    Return,
    If,
    Else,
    Def,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,
    Eq,
    NotEq,
    LessOrEq,
    GreaterOrEq,
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Number(_) => TokenKind::Number,
            Token::Id(_) => TokenKind::Id,
            Token::Char(_) => TokenKind::Char,
            Token::String(_) => TokenKind::String,
            Token::Class => TokenKind::Class,
            Token::Return => TokenKind::Return,
            Token::If => TokenKind::If,
            Token::Else => TokenKind::Else,
            Token::Def => TokenKind::Def,
            Token::Print => TokenKind::Print,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::Not => TokenKind::Not,
            Token::None => TokenKind::None,
            Token::True => TokenKind::True,
            Token::False => TokenKind::False,
            Token::Eq => TokenKind::Eq,
            Token::NotEq => TokenKind::NotEq,
            Token::LessOrEq => TokenKind::LessOrEq,
            Token::GreaterOrEq => TokenKind::GreaterOrEq,
            Token::Newline => TokenKind::Newline,
            Token::Indent => TokenKind::Indent,
            Token::Dedent => TokenKind::Dedent,
            Token::Eof => TokenKind::Eof,
        }
    }

    pub fn as_number(&self) -> Option<i32> {
        match self {
            Token::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&str> {
        match self {
            Token::Id(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Token::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "Number{{{}}}", n),
            Token::Id(name) => write!(f, "Id{{{}}}", name),
            Token::Char(c) => write!(f, "Char{{{}}}", c),
            Token::String(s) => write!(f, "String{{{}}}", s),
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Lexer error on line {line}: {kind}")]
pub struct LexerError {
    pub line: usize,
    pub kind: LexerErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum LexerErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Indentation of {0} spaces is not a multiple of two")]
    BadIndentation(usize),
    #[error("Tab character in indentation")]
    TabIndentation,
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Unknown escape sequence: \\{0}")]
    UnknownEscape(char),
    #[error("Unexpected character: {0:?}")]
    UnexpectedCharacter(char),
    #[error("Number literal out of range: {0}")]
    NumberOutOfRange(String),
    #[error("Expected {expected} but found {found}")]
    UnexpectedToken { expected: String, found: Token },
}

impl LexerError {
    fn new(line: usize, kind: LexerErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Width of one indentation level, in spaces.
const INDENT_WIDTH: usize = 2;

/// Pull-based tokenizer over a line-oriented source.
///
/// Block structure is recovered from leading whitespace: every non-blank line
/// is measured in two-space units and the difference to the previous depth is
/// queued as `Indent`/`Dedent` tokens, which are drained one per call before
/// any content of that line. Each non-blank line ends in exactly one
/// `Newline`, and all open levels are closed before `Eof`.
pub struct Lexer<R> {
    input: R,
    current_token: Token,
    line: Option<String>,
    cursor: usize,
    indent: usize,
    pending: isize,
    finished: bool,
    line_number: usize,
}

impl<R> std::fmt::Debug for Lexer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("current_token", &self.current_token)
            .field("line", &self.line)
            .field("cursor", &self.cursor)
            .field("indent", &self.indent)
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl<R: BufRead> Lexer<R> {
    /// Creates a lexer and reads the first token, so that
    /// [`Lexer::current_token`] is valid right away.
    pub fn new(input: R) -> Result<Self, LexerError> {
        let mut lexer = Self {
            input,
            current_token: Token::Eof,
            line: None,
            cursor: 0,
            indent: 0,
            pending: 0,
            finished: false,
            line_number: 0,
        };
        lexer.next_token()?;
        Ok(lexer)
    }

    pub fn current_token(&self) -> &Token {
        &self.current_token
    }

    /// Physical line the lexer is currently on, starting at 1.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        let token = self.scan()?;
        tracing::trace!(line = self.line_number, %token, "token");
        self.current_token = token.clone();
        Ok(token)
    }

    pub fn expect(&self, kind: TokenKind) -> Result<&Token, LexerError> {
        if self.current_token.kind() == kind {
            Ok(&self.current_token)
        } else {
            Err(self.unexpected(kind.to_string()))
        }
    }

    pub fn expect_value(&self, expected: &Token) -> Result<(), LexerError> {
        if &self.current_token == expected {
            Ok(())
        } else {
            Err(self.unexpected(expected.to_string()))
        }
    }

    pub fn expect_next(&mut self, kind: TokenKind) -> Result<&Token, LexerError> {
        self.next_token()?;
        self.expect(kind)
    }

    pub fn expect_next_value(&mut self, expected: &Token) -> Result<(), LexerError> {
        self.next_token()?;
        self.expect_value(expected)
    }

    pub fn expect_id(&self) -> Result<&str, LexerError> {
        self.current_token
            .as_id()
            .ok_or_else(|| self.unexpected(TokenKind::Id.to_string()))
    }

    pub fn expect_next_id(&mut self) -> Result<&str, LexerError> {
        self.next_token()?;
        self.expect_id()
    }

    pub fn expect_char(&self, c: char) -> Result<(), LexerError> {
        self.expect_value(&Token::Char(c))
    }

    /// Turns the lexer into an iterator yielding the current token and every
    /// following one up to and including `Eof`. Iteration stops after the
    /// first error.
    pub fn tokens(self) -> Tokens<R> {
        Tokens {
            lexer: self,
            started: false,
            done: false,
        }
    }

    fn unexpected(&self, expected: String) -> LexerError {
        LexerError::new(
            self.line_number,
            LexerErrorKind::UnexpectedToken {
                expected,
                found: self.current_token.clone(),
            },
        )
    }

    fn scan(&mut self) -> Result<Token, LexerError> {
        loop {
            if self.pending > 0 {
                self.pending -= 1;
                return Ok(Token::Indent);
            }
            if self.pending < 0 {
                self.pending += 1;
                return Ok(Token::Dedent);
            }

            if let Some(line) = self.line.as_deref() {
                let rest = line[self.cursor..].trim_start_matches(is_blank);
                if rest.is_empty() {
                    self.line = None;
                    return Ok(Token::Newline);
                }
                let line_number = self.line_number;
                let (token, after) =
                    token(rest).map_err(|kind| LexerError::new(line_number, kind))?;
                self.cursor = line.len() - after.len();
                return Ok(token);
            }

            if self.finished {
                return Ok(Token::Eof);
            }

            match self.read_line()? {
                Some(line) => self.start_line(line)?,
                None => {
                    self.finished = true;
                    self.pending = -(self.indent as isize);
                    self.indent = 0;
                }
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, LexerError> {
        let mut buffer = String::new();
        let read = self
            .input
            .read_line(&mut buffer)
            .map_err(|e| LexerError::new(self.line_number, e.into()))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let len = buffer.trim_end_matches(|c: char| c == '\n' || c == '\r').len();
        buffer.truncate(len);
        Ok(Some(buffer))
    }

    /// Measures the indentation of a freshly read line and buffers its
    /// content. Blank and comment-only lines leave the state untouched.
    fn start_line(&mut self, mut line: String) -> Result<(), LexerError> {
        let content = strip_comment(&line);
        if content.trim().is_empty() {
            return Ok(());
        }

        let width = content.len() - content.trim_start_matches(' ').len();
        if content[width..].starts_with('\t') {
            return Err(LexerError::new(
                self.line_number,
                LexerErrorKind::TabIndentation,
            ));
        }
        if width % INDENT_WIDTH != 0 {
            return Err(LexerError::new(
                self.line_number,
                LexerErrorKind::BadIndentation(width),
            ));
        }

        let depth = width / INDENT_WIDTH;
        if depth != self.indent {
            tracing::trace!(line = self.line_number, from = self.indent, to = depth, "indentation");
        }
        self.pending = depth as isize - self.indent as isize;
        self.indent = depth;

        let end = content.len();
        line.truncate(end);
        self.line = Some(line);
        self.cursor = width;
        Ok(())
    }
}

pub struct Tokens<R> {
    lexer: Lexer<R>,
    started: bool,
    done: bool,
}

impl<R: BufRead> Iterator for Tokens<R> {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = if self.started {
            self.lexer.next_token()
        } else {
            self.started = true;
            Ok(self.lexer.current_token().clone())
        };
        if matches!(next, Ok(Token::Eof) | Err(_)) {
            self.done = true;
        }
        Some(next)
    }
}

/// Tokenizes a whole source text, up to and including `Eof`.
pub fn tokens(source: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::new(source.as_bytes())?.tokens().collect()
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Cuts a line at the first `#` that is not inside a string literal.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '#' => return &line[..i],
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
    }
    line
}

fn token(source: &str) -> Result<(Token, &str), LexerErrorKind> {
    let first = source
        .chars()
        .next()
        .ok_or(LexerErrorKind::UnexpectedCharacter('\0'))?;
    match first {
        '0'..='9' => number(source),
        '"' | '\'' => string(source),
        c if c.is_ascii_alphabetic() || c == '_' => Ok(identifier(source)),
        _ => operator(source).ok_or(LexerErrorKind::UnexpectedCharacter(first)),
    }
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word {
        "class" => Token::Class,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "def" => Token::Def,
        "print" => Token::Print,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "None" => Token::None,
        "True" => Token::True,
        "False" => Token::False,
        _ => return None,
    };
    Some(token)
}

fn identifier(source: &str) -> (Token, &str) {
    let len = source
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(source.len());
    let (word, rest) = source.split_at(len);
    let token = keyword(word).unwrap_or_else(|| Token::Id(word.to_string()));
    (token, rest)
}

fn number(source: &str) -> Result<(Token, &str), LexerErrorKind> {
    let len = source
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(source.len());
    let (digits, rest) = source.split_at(len);
    let value = digits
        .parse()
        .map_err(|_| LexerErrorKind::NumberOutOfRange(digits.to_string()))?;
    Ok((Token::Number(value), rest))
}

fn string(source: &str) -> Result<(Token, &str), LexerErrorKind> {
    let mut chars = source.char_indices();
    let (_, quote) = chars.next().ok_or(LexerErrorKind::UnterminatedString)?;
    let mut value = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((Token::String(value), &source[i + c.len_utf8()..])),
            '\\' => {
                let (_, escaped) = chars.next().ok_or(LexerErrorKind::UnterminatedString)?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '"' => '"',
                    '\'' => '\'',
                    '\\' => '\\',
                    other => return Err(LexerErrorKind::UnknownEscape(other)),
                });
            }
            '\n' | '\r' => return Err(LexerErrorKind::UnterminatedString),
            c => value.push(c),
        }
    }
    Err(LexerErrorKind::UnterminatedString)
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(Token, &str)> {
            source.strip_prefix($word).map(|rest| ($token, rest))
        }
    };
}

match_literal! { equal_equal, "==", Token::Eq }
match_literal! { bang_equal, "!=", Token::NotEq }
match_literal! { less_equal, "<=", Token::LessOrEq }
match_literal! { greater_equal, ">=", Token::GreaterOrEq }

const SINGLE_CHARACTERS: &str = ".,:;()[]{}+-*/%<>=!";

fn single_character(source: &str) -> Option<(Token, &str)> {
    let c = source.chars().next()?;
    if SINGLE_CHARACTERS.contains(c) {
        Some((Token::Char(c), &source[c.len_utf8()..]))
    } else {
        None
    }
}

fn operator(source: &str) -> Option<(Token, &str)> {
    // Two character operators win over their one character prefixes.
    let parsers: [fn(&str) -> Option<(Token, &str)>; 5] = [
        equal_equal,
        bang_equal,
        less_equal,
        greater_equal,
        single_character,
    ];
    parsers.iter().find_map(|parser| parser(source))
}
