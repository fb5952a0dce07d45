//! Lexical Analysis
//!
//! Compiler pass that scans source text into a sequence of tokens, applying
//! token categories in a fixed priority order with longest match. Unmatched
//! characters are reported and skipped; the lexer never fails fatally.

use std::fmt;

use serde::Serialize;

use crate::compiler::diag::Diagnostic;

/// Reserved words of the language.
const KEYWORDS: [&str; 17] = [
    "int", "float", "bool", "void", "if", "else", "while", "for", "return", "true", "false",
    "print", "read", "switch", "case", "default", "break",
];

/// Multi-character operators, attempted before their single-character
/// prefixes.
const OPERATORS2: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];

/// Single-character operators.
const OPERATORS1: [u8; 9] = [b'+', b'-', b'*', b'/', b'%', b'=', b'<', b'>', b'!'];

/// Punctuation characters.
const PUNCTUATION: [u8; 9] = [b'(', b')', b'{', b'}', b'[', b']', b';', b',', b'.'];

/// Categories of lexical elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    String,
    Operator,
    Punctuation,
}

/// Minimal lexical element of the language.
///
/// `line` and `column` are 1-based and point at the token's first character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} {:?} at {}:{}",
            format!("{:?}", self.kind),
            self.lexeme,
            self.line,
            self.column
        )
    }
}

/// Cursor state over the source bytes.
struct Lexer<'a> {
    src: &'a [u8],
    cur: usize,
    // Index of the first byte of the current line (used to calculate the
    // current column).
    bol: usize,
    line: usize,
    tokens: Vec<Token>,
    errors: Vec<Diagnostic>,
}

/// Scans the given source text, returning the token sequence and any lexical
/// diagnostics encountered along the way.
#[must_use]
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer {
        src: source.as_bytes(),
        cur: 0,
        bol: 0,
        line: 1,
        tokens: vec![],
        errors: vec![],
    };

    lexer.run();

    (lexer.tokens, lexer.errors)
}

impl<'a> Lexer<'a> {
    fn run(&mut self) {
        while self.has_next() {
            match self.first() {
                b'\n' => {
                    self.cur += 1;
                    self.line += 1;
                    self.bol = self.cur;
                }
                b if b.is_ascii_whitespace() => {
                    self.cur += 1;
                }
                b'/' if self.second() == Some(b'/') => self.skip_line_comment(),
                b'/' if self.second() == Some(b'*') => self.skip_block_comment(),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_ident_or_keyword(),
                b'0'..=b'9' => self.scan_number(),
                b'"' => self.scan_string(),
                _ => {
                    if !self.scan_operator() && !self.scan_punctuation() {
                        let ch = self.current_char();
                        self.errors.push(Diagnostic::new(
                            format!("Unexpected character: {ch}"),
                            self.line,
                            self.column(),
                        ));
                        self.cur += ch.len_utf8();
                    }
                }
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.has_next() && self.first() != b'\n' {
            self.cur += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        let (start_line, start_col) = (self.line, self.column());

        // Skip the opening "/*".
        self.cur += 2;

        while self.has_next() {
            if self.first() == b'*' && self.second() == Some(b'/') {
                self.cur += 2;
                return;
            }

            if self.first() == b'\n' {
                self.line += 1;
                self.bol = self.cur + 1;
            }

            self.cur += 1;
        }

        self.errors.push(Diagnostic::new(
            "Unterminated block comment",
            start_line,
            start_col,
        ));
    }

    fn scan_ident_or_keyword(&mut self) {
        let start = self.cur;
        let column = self.column();

        while self.has_next() && (self.first().is_ascii_alphanumeric() || self.first() == b'_') {
            self.cur += 1;
        }

        let lexeme = self.slice(start, self.cur);
        let kind = if KEYWORDS.contains(&lexeme) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };

        self.push_token(kind, lexeme.to_string(), column);
    }

    fn scan_number(&mut self) {
        let start = self.cur;
        let column = self.column();

        while self.has_next() && self.first().is_ascii_digit() {
            self.cur += 1;
        }

        // A fractional part requires at least one digit after the dot;
        // otherwise the dot is left to be scanned as punctuation.
        if self.first_is(b'.') {
            if let Some(b'0'..=b'9') = self.second() {
                self.cur += 1;
                while self.has_next() && self.first().is_ascii_digit() {
                    self.cur += 1;
                }
            }
        }

        let lexeme = self.slice(start, self.cur).to_string();
        self.push_token(TokenKind::Number, lexeme, column);
    }

    fn scan_string(&mut self) {
        let start = self.cur;
        let column = self.column();
        let start_line = self.line;
        let start_bol = self.bol;

        // Attempt the full string pattern; on failure the cursor is restored
        // and the opening quote falls through as an unexpected character.
        let mut i = self.cur + 1;
        let mut closed = false;

        while i < self.src.len() {
            match self.src[i] {
                b'"' => {
                    closed = true;
                    i += 1;
                    break;
                }
                b'\\' => {
                    // An escape consumes the following character; a dangling
                    // backslash at end of input leaves the string unclosed.
                    if i + 1 >= self.src.len() {
                        i = self.src.len();
                        break;
                    }
                    i += 2;
                }
                b'\n' => {
                    self.line += 1;
                    self.bol = i + 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }

        if closed {
            let lexeme = self.slice(start, i).to_string();
            self.cur = i;
            self.tokens.push(Token {
                kind: TokenKind::String,
                lexeme,
                line: start_line,
                column,
            });
        } else {
            self.line = start_line;
            self.bol = start_bol;
            self.errors.push(Diagnostic::new(
                "Unexpected character: \"",
                start_line,
                column,
            ));
            self.cur = start + 1;
        }
    }

    fn scan_operator(&mut self) -> bool {
        let column = self.column();

        if self.cur + 2 <= self.src.len() {
            // A two-byte probe can land inside a multi-byte character, so
            // decode fallibly.
            if let Ok(pair) = std::str::from_utf8(&self.src[self.cur..self.cur + 2]) {
                if OPERATORS2.contains(&pair) {
                    let lexeme = pair.to_string();
                    self.cur += 2;
                    self.push_token(TokenKind::Operator, lexeme, column);
                    return true;
                }
            }
        }

        if OPERATORS1.contains(&self.first()) {
            let lexeme = (self.first() as char).to_string();
            self.cur += 1;
            self.push_token(TokenKind::Operator, lexeme, column);
            return true;
        }

        false
    }

    fn scan_punctuation(&mut self) -> bool {
        if PUNCTUATION.contains(&self.first()) {
            let column = self.column();
            let lexeme = (self.first() as char).to_string();
            self.cur += 1;
            self.push_token(TokenKind::Punctuation, lexeme, column);
            return true;
        }

        false
    }

    fn push_token(&mut self, kind: TokenKind, lexeme: String, column: usize) {
        self.tokens.push(Token {
            kind,
            lexeme,
            line: self.line,
            column,
        });
    }

    /// 1-based column of the current cursor position.
    #[inline]
    fn column(&self) -> usize {
        self.cur - self.bol + 1
    }

    /// Returns the byte at the current cursor position.
    ///
    /// # Panics
    ///
    /// Panics if the cursor position is out of bounds.
    #[inline]
    fn first(&self) -> u8 {
        self.src[self.cur]
    }

    /// Returns the byte one past the cursor position, if any.
    #[inline]
    fn second(&self) -> Option<u8> {
        self.src.get(self.cur + 1).copied()
    }

    #[inline]
    fn first_is(&self, b: u8) -> bool {
        self.has_next() && self.first() == b
    }

    /// Returns `true` if the cursor position is within bounds of `src`.
    #[inline]
    fn has_next(&self) -> bool {
        self.cur < self.src.len()
    }

    /// Decodes the character at the cursor position. The cursor only ever
    /// rests on character boundaries, so decoding cannot fail in practice.
    fn current_char(&self) -> char {
        std::str::from_utf8(&self.src[self.cur..])
            .ok()
            .and_then(|s| s.chars().next())
            .unwrap_or('\u{FFFD}')
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.src[start..end]).expect("source should be valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn lexemes(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.lexeme.as_str()).collect()
    }

    #[test]
    fn lexer_valid_minimal_program() {
        let (tokens, errors) = lex("int main() { return 0; }");

        assert!(errors.is_empty());
        assert_eq!(
            lexemes(&tokens),
            ["int", "main", "(", ")", "{", "return", "0", ";", "}"]
        );
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[6].kind, TokenKind::Number);
    }

    #[test]
    fn lexer_valid_positions_are_one_based() {
        let (tokens, errors) = lex("int x;\nx = 1;");

        assert!(errors.is_empty());
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 1));
    }

    #[test]
    fn lexer_valid_lexeme_matches_source_slice() {
        let source = "int main() {\n  float pi = 3.14; // comment\n}";
        let (tokens, errors) = lex(source);

        assert!(errors.is_empty());

        let lines: Vec<&str> = source.split('\n').collect();
        for token in &tokens {
            let line = lines[token.line - 1];
            let at = &line[token.column - 1..token.column - 1 + token.lexeme.len()];
            assert_eq!(at, token.lexeme);
        }
    }

    #[test]
    fn lexer_valid_multi_char_operators() {
        let (tokens, errors) = lex("a <= b == c && d || !e");

        assert!(errors.is_empty());
        assert_eq!(
            lexemes(&tokens),
            ["a", "<=", "b", "==", "c", "&&", "d", "||", "!", "e"]
        );
    }

    #[test]
    fn lexer_valid_number_without_fraction_keeps_dot() {
        let (tokens, errors) = lex("12.");

        assert!(errors.is_empty());
        assert_eq!(lexemes(&tokens), ["12", "."]);
        assert_eq!(kinds(&tokens), [TokenKind::Number, TokenKind::Punctuation]);
    }

    #[test]
    fn lexer_valid_float_literal() {
        let (tokens, errors) = lex("3.14");

        assert!(errors.is_empty());
        assert_eq!(lexemes(&tokens), ["3.14"]);
        assert_eq!(tokens[0].kind, TokenKind::Number);
    }

    #[test]
    fn lexer_valid_string_keeps_quotes() {
        let (tokens, errors) = lex(r#"print("hi\n");"#);

        assert!(errors.is_empty());
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].lexeme, r#""hi\n""#);
    }

    #[test]
    fn lexer_valid_comments_are_skipped() {
        let (tokens, errors) = lex("a // one\n/* two\nthree */ b");

        assert!(errors.is_empty());
        assert_eq!(lexemes(&tokens), ["a", "b"]);
        assert_eq!((tokens[1].line, tokens[1].column), (3, 10));
    }

    #[test]
    fn lexer_valid_keywords_are_tagged() {
        let (tokens, errors) = lex("while whilex switch");

        assert!(errors.is_empty());
        assert_eq!(
            kinds(&tokens),
            [TokenKind::Keyword, TokenKind::Identifier, TokenKind::Keyword]
        );
    }

    #[test]
    fn lexer_invalid_unexpected_character() {
        let (tokens, errors) = lex("int a @ b;");

        assert_eq!(lexemes(&tokens), ["int", "a", "b", ";"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unexpected character: @");
        assert_eq!((errors[0].line, errors[0].column), (1, 7));
    }

    #[test]
    fn lexer_invalid_unterminated_string() {
        let (tokens, errors) = lex("\"abc");

        // The quote is reported and skipped; the remainder lexes normally.
        assert_eq!(lexemes(&tokens), ["abc"]);
        assert_eq!(errors[0].message, "Unexpected character: \"");
    }

    #[test]
    fn lexer_invalid_unterminated_block_comment() {
        let (tokens, errors) = lex("a /* never closed");

        assert_eq!(lexemes(&tokens), ["a"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unterminated block comment");
        assert_eq!((errors[0].line, errors[0].column), (1, 3));
    }
}
