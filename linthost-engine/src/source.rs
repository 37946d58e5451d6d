//! Tokenizing and bracket structure for the bundled engine
//!
//! The bundled rules work on tokens rather than a syntax tree. Besides the
//! token stream, [`SourceCode`] records for every token which kind of
//! bracket encloses it, which is enough to tell statements apart from object
//! literals and parenthesised expressions.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword,
    Punctuator,
    Number,
    String,
    Template,
    RegExp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    pub fn is_punct(&self, value: &str) -> bool {
        self.kind == TokenKind::Punctuator && self.value == value
    }

    pub fn is_keyword(&self, value: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == value
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Number | TokenKind::String | TokenKind::Template | TokenKind::RegExp
        ) || (self.kind == TokenKind::Keyword
            && matches!(self.value.as_str(), "true" | "false" | "null"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub block: bool,
    /// Text between the delimiters
    pub value: String,
    pub start: usize,
}

/// A tokenizer or bracket-matching failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// What kind of bracket a token sits directly inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enclosing {
    TopLevel,
    Block,
    Object,
    ClassBody,
    Paren,
    Bracket,
}

impl Enclosing {
    /// Statements live at the top level and inside blocks
    pub fn holds_statements(&self) -> bool {
        matches!(self, Enclosing::TopLevel | Enclosing::Block)
    }
}

const KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "let", "new", "null", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "<<", ">>", "**", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@", "#",
];

/// Keywords after which a `/` starts a regular expression
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "instanceof", "new", "delete", "void",
    "throw", "yield", "await",
];

/// A tokenized file with line information and bracket structure
#[derive(Debug)]
pub struct SourceCode {
    pub text: String,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    line_starts: Vec<usize>,
    enclosing: Vec<Enclosing>,
    header_close: Vec<bool>,
}

impl SourceCode {
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let (tokens, comments) = Lexer::new(text).run()?;
        let (enclosing, header_close) = analyze_brackets(&tokens, text.len())?;

        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );

        Ok(Self {
            text: text.to_string(),
            tokens,
            comments,
            line_starts,
            enclosing,
            header_close,
        })
    }

    /// 1-based line and column of a byte offset
    pub fn position(&self, offset: usize) -> (u32, u32) {
        position_in(&self.text, &self.line_starts, offset)
    }

    /// Bracket kind around token `index`; for brackets, the one outside them
    pub fn enclosing(&self, index: usize) -> Enclosing {
        self.enclosing
            .get(index)
            .copied()
            .unwrap_or(Enclosing::TopLevel)
    }

    /// `)` that closes a control-flow or function header, e.g. `if (x)`
    pub fn is_header_close(&self, index: usize) -> bool {
        self.header_close.get(index).copied().unwrap_or(false)
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Token before `index`, if any
    pub fn prev(&self, index: usize) -> Option<&Token> {
        index.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    pub fn next(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index + 1)
    }
}

/// 1-based line and column of `offset` in `text`, columns counted in chars
pub fn position_of(text: &str, offset: usize) -> (u32, u32) {
    let mut line_starts = vec![0];
    line_starts.extend(
        text.char_indices()
            .filter(|(_, c)| *c == '\n')
            .map(|(i, _)| i + 1),
    );
    position_in(text, &line_starts, offset)
}

fn position_in(text: &str, line_starts: &[usize], offset: usize) -> (u32, u32) {
    let offset = offset.min(text.len());
    let line = match line_starts.binary_search(&offset) {
        Ok(line) => line,
        Err(next) => next.saturating_sub(1),
    };
    let line_start = line_starts.get(line).copied().unwrap_or(0);
    let column = text
        .get(line_start..offset)
        .map(|prefix| prefix.chars().count())
        .unwrap_or(0);
    (line as u32 + 1, column as u32 + 1)
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    newline_before: bool,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            tokens: Vec::new(),
            comments: Vec::new(),
            newline_before: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, skip: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(skip)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str, offset: usize) -> SyntaxError {
        SyntaxError {
            message: message.to_string(),
            offset,
        }
    }

    fn run(mut self) -> Result<(Vec<Token>, Vec<Comment>), SyntaxError> {
        if self.text.starts_with("#!") {
            self.skip_line();
        }

        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                '\n' => {
                    self.bump();
                    self.newline_before = true;
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    self.pos += 2;
                    let body = self.pos;
                    self.skip_line();
                    self.comments.push(Comment {
                        block: false,
                        value: self.text[body..self.pos].to_string(),
                        start,
                    });
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    let Some(close) = self.text[self.pos..].find("*/") else {
                        return Err(self.error("Unterminated comment", start));
                    };
                    let value = &self.text[self.pos..self.pos + close];
                    if value.contains('\n') {
                        self.newline_before = true;
                    }
                    self.comments.push(Comment {
                        block: true,
                        value: value.to_string(),
                        start,
                    });
                    self.pos += close + 2;
                }
                '/' if self.regex_allowed() => self.regex(start)?,
                '"' | '\'' => self.string(start, c)?,
                '`' => self.template(start)?,
                c if c.is_ascii_digit() => self.number(start),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number(start),
                c if is_identifier_start(c) => self.identifier(start),
                _ => self.punctuator(start)?,
            }
        }

        Ok((self.tokens, self.comments))
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            value: self.text[start..self.pos].to_string(),
            start,
            end: self.pos,
            newline_before: std::mem::take(&mut self.newline_before),
        });
    }

    fn skip_line(&mut self) {
        match self.text[self.pos..].find('\n') {
            Some(newline) => self.pos += newline,
            None => self.pos = self.text.len(),
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(token) => match token.kind {
                TokenKind::Punctuator => !matches!(token.value.as_str(), ")" | "]" | "}"),
                TokenKind::Keyword => REGEX_PREFIX_KEYWORDS.contains(&token.value.as_str()),
                _ => false,
            },
        }
    }

    fn regex(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("Unterminated regular expression", start))
                }
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(is_identifier_part) {
            self.bump();
        }
        self.push(TokenKind::RegExp, start);
        Ok(())
    }

    fn string(&mut self, start: usize, quote: char) -> Result<(), SyntaxError> {
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("Unterminated string constant", start))
                }
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => break,
                Some(_) => {}
            }
        }
        self.push(TokenKind::String, start);
        Ok(())
    }

    fn template(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.bump();
        let mut depth = 0usize;
        loop {
            match self.bump() {
                None => return Err(self.error("Unterminated template", start)),
                Some('\\') => {
                    self.bump();
                }
                Some('$') if depth == 0 && self.peek() == Some('{') => {
                    self.bump();
                    depth += 1;
                }
                Some('{') if depth > 0 => depth += 1,
                Some('}') if depth > 0 => depth -= 1,
                Some('`') if depth == 0 => break,
                Some(_) => {}
            }
        }
        self.push(TokenKind::Template, start);
        Ok(())
    }

    fn number(&mut self, start: usize) {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            let c = self.bump();
            if matches!(c, Some('e') | Some('E'))
                && matches!(self.peek(), Some('+') | Some('-'))
                && !self.text[start..self.pos].starts_with("0x")
            {
                self.bump();
            }
        }
        self.push(TokenKind::Number, start);
    }

    fn identifier(&mut self, start: usize) {
        while self.peek().is_some_and(is_identifier_part) {
            self.bump();
        }
        let is_property = self
            .tokens
            .last()
            .is_some_and(|t| t.is_punct(".") || t.is_punct("?."));
        let word = &self.text[start..self.pos];
        let kind = if !is_property && KEYWORDS.contains(&word) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.push(kind, start);
    }

    fn punctuator(&mut self, start: usize) -> Result<(), SyntaxError> {
        let rest = &self.text[self.pos..];
        let Some(punct) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) else {
            let c = self.peek().unwrap_or_default();
            return Err(self.error(&format!("Unexpected character '{c}'"), start));
        };
        self.pos += punct.len();
        self.push(TokenKind::Punctuator, start);
        Ok(())
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_identifier_part(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

struct Open {
    token: usize,
    kind: Enclosing,
    header: bool,
}

fn analyze_brackets(
    tokens: &[Token],
    text_len: usize,
) -> Result<(Vec<Enclosing>, Vec<bool>), SyntaxError> {
    let mut stack: Vec<Open> = Vec::new();
    let mut enclosing = Vec::with_capacity(tokens.len());
    let mut header_close = vec![false; tokens.len()];

    let top = |stack: &[Open]| stack.last().map(|o| o.kind).unwrap_or(Enclosing::TopLevel);

    for (i, token) in tokens.iter().enumerate() {
        let outside = top(&stack);
        if token.kind != TokenKind::Punctuator {
            enclosing.push(outside);
            continue;
        }

        match token.value.as_str() {
            "(" => {
                enclosing.push(outside);
                stack.push(Open {
                    token: i,
                    kind: Enclosing::Paren,
                    header: opens_header(tokens, i, outside),
                });
            }
            "[" => {
                enclosing.push(outside);
                stack.push(Open {
                    token: i,
                    kind: Enclosing::Bracket,
                    header: false,
                });
            }
            "{" => {
                enclosing.push(outside);
                stack.push(Open {
                    token: i,
                    kind: classify_brace(tokens, i, &header_close, outside),
                    header: false,
                });
            }
            ")" | "]" | "}" => {
                let expected = match token.value.as_str() {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                match stack.pop() {
                    Some(open) if tokens[open.token].value == expected => {
                        header_close[i] = open.header;
                    }
                    _ => {
                        return Err(SyntaxError {
                            message: format!("Unexpected token {}", token.value),
                            offset: token.start,
                        })
                    }
                }
                enclosing.push(top(&stack));
            }
            _ => enclosing.push(outside),
        }
    }

    if !stack.is_empty() {
        return Err(SyntaxError {
            message: "Unexpected end of input".to_string(),
            offset: text_len,
        });
    }

    Ok((enclosing, header_close))
}

/// `(` of `if (...)`, `function f(...)` or a method header
fn opens_header(tokens: &[Token], index: usize, outside: Enclosing) -> bool {
    let Some(prev) = index.checked_sub(1).map(|i| &tokens[i]) else {
        return false;
    };
    if prev.kind == TokenKind::Keyword {
        return matches!(
            prev.value.as_str(),
            "if" | "for" | "while" | "switch" | "catch" | "with" | "function"
        );
    }
    if prev.kind != TokenKind::Identifier {
        return false;
    }

    let before = index.checked_sub(2).map(|i| &tokens[i]);
    if before.is_some_and(|t| t.is_keyword("function") || t.is_punct("*")) {
        return true;
    }
    // `for await (...)`
    if prev.value == "await" && before.is_some_and(|t| t.is_keyword("for")) {
        return true;
    }

    matches!(outside, Enclosing::Object | Enclosing::ClassBody)
        && before.map_or(true, |t| {
            t.is_punct("{")
                || t.is_punct(",")
                || t.is_punct("}")
                || t.is_punct(";")
                || t.is_keyword("static")
                || matches!(t.value.as_str(), "get" | "set" | "async")
        })
}

fn classify_brace(
    tokens: &[Token],
    index: usize,
    header_close: &[bool],
    outside: Enclosing,
) -> Enclosing {
    let Some(prev_index) = index.checked_sub(1) else {
        return Enclosing::Block;
    };
    let prev = &tokens[prev_index];

    if prev.is_punct(")") {
        return if header_close[prev_index] {
            Enclosing::Block
        } else {
            Enclosing::Object
        };
    }
    if prev.is_punct("=>") {
        return Enclosing::Block;
    }
    if prev.kind == TokenKind::Keyword
        && matches!(prev.value.as_str(), "else" | "try" | "finally" | "do")
    {
        return Enclosing::Block;
    }

    // `class Name extends Base {`
    let class_header = tokens[..index]
        .iter()
        .rev()
        .take_while(|t| !(t.is_punct("{") || t.is_punct("}") || t.is_punct(";")))
        .any(|t| t.is_keyword("class"));
    if class_header {
        return Enclosing::ClassBody;
    }

    if outside.holds_statements()
        && (prev.is_punct(";") || prev.is_punct("{") || prev.is_punct("}"))
    {
        return Enclosing::Block;
    }

    Enclosing::Object
}
