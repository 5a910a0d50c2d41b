use crate::ast::{Keyword, Token, TokenType};
use crate::warning::{Diagnostic, WarningKind};

const KNOWN_PUNCT: [char; 28] = [
    ';', ',', '(', ')', '=', '.', '*', '/', '+', '-', '<', '>', '%', '$', ':', '!', '|', '^', '~',
    '#', '@', '?', '[', ']', '{', '}', '`', '&',
];

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '&'
}

fn is_unrecognized(c: char) -> bool {
    !(c == '\0'
        || c.is_whitespace()
        || c.is_alphanumeric()
        || c == '_'
        || c == '\''
        || c == '"'
        || KNOWN_PUNCT.contains(&c))
}

pub struct Scanner {
    source_chars: Vec<char>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    start: usize,
    current: usize,
    line: u32,
    col: u32,
    start_line: u32,
    start_col: u32,
    at_statement_start: bool,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source_chars: source.chars().collect(),
            tokens: vec![],
            diagnostics: vec![],
            start: 0,
            current: 0,
            line: 1,
            col: 1,
            start_line: 1,
            start_col: 1,
            at_statement_start: true,
        }
    }

    pub fn tokens(&self) -> &Vec<Token> {
        &self.tokens
    }

    pub fn diagnostics(&self) -> &Vec<Diagnostic> {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Vec<Token>, Vec<Diagnostic>) {
        (self.tokens, self.diagnostics)
    }

    fn advance(&mut self) -> char {
        let c = self.source_chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source_chars.len()
    }

    fn peek(&self) -> char {
        self.peek_next_i(0)
    }

    fn peek_next_i(&self, i: usize) -> char {
        if self.current + i >= self.source_chars.len() {
            '\0'
        } else {
            self.source_chars[self.current + i]
        }
    }

    fn mark_start(&mut self) {
        self.start = self.current;
        self.start_line = self.line;
        self.start_col = self.col;
    }

    fn current_source_str(&self) -> String {
        self.source_chars[self.start..self.current].iter().collect()
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.at_statement_start = token_type == TokenType::Punct(';');
        self.tokens.push(Token {
            kind: token_type,
            lexeme: self.current_source_str(),
            line: self.start_line,
            col: self.start_col,
        });
    }

    fn warn(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::new(
            WarningKind::Lex,
            self.start_line,
            self.start_col,
            message,
        ));
    }

    fn reset(&mut self) {
        self.tokens.clear();
        self.diagnostics.clear();
        self.start = 0;
        self.current = 0;
        self.line = 1;
        self.col = 1;
        self.start_line = 1;
        self.start_col = 1;
        self.at_statement_start = true;
    }

    /// Scans the whole source. Never fails: anomalies are recorded as diagnostics
    /// and the token sequence always ends with a single `Eof`.
    pub fn scan(&mut self) {
        self.reset();
        while !self.is_at_end() {
            self.mark_start();
            self.scan_token();
        }
        self.mark_start();
        self.tokens.push(Token {
            kind: TokenType::Eof,
            lexeme: String::from("eof"),
            line: self.line,
            col: self.col,
        });
    }

    fn skip_block_comment(&mut self) {
        loop {
            if self.is_at_end() {
                self.warn("Found unterminated comment".to_owned());
                break;
            }
            if self.peek() == '*' && self.peek_next_i(1) == '/' {
                self.advance();
                self.advance();
                break;
            }
            self.advance();
        }
    }

    // `* text ;` comment statement
    fn skip_comment_statement(&mut self) {
        while !self.is_at_end() {
            if self.advance() == ';' {
                break;
            }
        }
    }

    fn match_string(&mut self, delimiter: char) {
        let mut value = String::new();
        let mut terminated = false;
        while !self.is_at_end() {
            let c = self.advance();
            if c == delimiter {
                if self.peek() == delimiter {
                    // Doubled delimiter is an escaped quote
                    self.advance();
                    value.push(c);
                    continue;
                }
                terminated = true;
                break;
            }
            value.push(c);
        }
        if !terminated {
            self.warn(format!("Found unterminated string starting with {}", delimiter));
        }
        self.add_token(TokenType::String(value));
    }

    fn consume_identifier_tail(&mut self) {
        loop {
            let peek_char = self.peek();
            if is_identifier_char(peek_char) {
                self.advance();
            } else if peek_char == '.' {
                let peek_next = self.peek_next_i(1);
                if is_identifier_char(peek_next) || peek_next == '.' {
                    self.advance();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    fn match_keyword_or_identifier(&mut self) {
        self.consume_identifier_tail();
        let identifier = self.current_source_str();
        let is_simple = identifier.chars().all(|c| c.is_alphanumeric() || c == '_');
        match identifier.parse::<Keyword>() {
            Ok(keyword) if is_simple => self.add_token(TokenType::Keyword(keyword)),
            _ => self.add_token(TokenType::Identifier(identifier)),
        }
    }

    // Numeric literals are only ever skipped by the parser, so they share the identifier token type.
    fn match_number(&mut self) {
        loop {
            let peek_char = self.peek();
            if peek_char.is_alphanumeric() || peek_char == '_' || peek_char == '.' {
                self.advance();
            } else {
                break;
            }
        }
        self.add_token(TokenType::Identifier(self.current_source_str()));
    }

    fn match_unrecognized(&mut self, first: char) {
        let line = self.start_line;
        let col = self.start_col;
        let mut span = String::from(first);
        self.add_token(TokenType::Punct(first));
        while !self.is_at_end() && is_unrecognized(self.peek()) {
            self.mark_start();
            let c = self.advance();
            span.push(c);
            self.add_token(TokenType::Punct(c));
        }
        self.diagnostics.push(Diagnostic::new(
            WarningKind::Lex,
            line,
            col,
            format!("Found unexpected characters while scanning: `{}`", span),
        ));
    }

    fn scan_token(&mut self) {
        let curr_char = self.advance();
        match curr_char {
            c if c.is_whitespace() => {}
            '/' if self.peek() == '*' => {
                self.advance();
                self.skip_block_comment();
            }
            '*' if self.at_statement_start => self.skip_comment_statement(),
            c if c == '\'' || c == '"' => self.match_string(c),
            c if c.is_alphabetic() || c == '_' => self.match_keyword_or_identifier(),
            '&' if self.peek().is_alphabetic() || self.peek() == '_' => {
                self.match_keyword_or_identifier()
            }
            c if c.is_ascii_digit() => self.match_number(),
            c if KNOWN_PUNCT.contains(&c) => self.add_token(TokenType::Punct(c)),
            c => self.match_unrecognized(c),
        }
    }
}

/// Tokenizes `text`, discarding lex diagnostics.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(text);
    scanner.scan();
    scanner.into_parts().0
}
