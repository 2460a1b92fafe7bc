//! Lexer for generated netlist text.
//!
//! Netlist statements are whitespace-separated words, one statement per
//! line. Lines starting with `*` are comments. Tokens keep their line and
//! column so highlights can point at a single node inside a line.

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
}

impl Token {
    /// Column just past the last character (1-indexed, exclusive).
    pub fn end_column(&self) -> usize {
        self.column + self.text.chars().count()
    }
}

/// Token types in netlist text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Element name, node, value or directive argument
    Word,
    /// A directive (line starts with '.')
    Directive,
    /// Newline
    Newline,
    /// End of input
    Eof,
}

/// Lexer for tokenizing netlist text.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start_line = self.line;
        let start_column = self.column;

        let Some(&ch) = self.chars.peek() else {
            return Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line: start_line,
                column: start_column,
            };
        };

        if ch == '\n' {
            self.advance();
            self.at_line_start = true;
            return Token {
                kind: TokenKind::Newline,
                text: "\n".to_string(),
                line: start_line,
                column: start_column,
            };
        }

        let first_on_line = self.at_line_start;
        self.at_line_start = false;
        let text = self.read_word();
        let kind = if first_on_line && text.starts_with('.') {
            TokenKind::Directive
        } else {
            TokenKind::Word
        };
        Token {
            kind,
            text,
            line: start_line,
            column: start_column,
        }
    }

    /// Collect all word and directive tokens.
    pub fn tokens(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => {}
                _ => tokens.push(token),
            }
        }
        tokens
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else if ch == '*' && self.at_line_start {
                // Skip comment until end of line
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text
    }
}

/// Tokenize a single line of netlist text.
pub fn tokenize_line(line: &str) -> Vec<Token> {
    Lexer::new(line).tokens()
}

/// Canonical form of netlist text: comments and blank lines dropped, words
/// joined by single spaces, lowercase.
pub fn normalize(text: &str) -> String {
    let mut lines: Vec<Vec<String>> = Vec::new();
    let mut current_line = 0;
    for token in Lexer::new(text).tokens() {
        if token.line != current_line {
            lines.push(Vec::new());
            current_line = token.line;
        }
        if let Some(words) = lines.last_mut() {
            words.push(token.text.to_lowercase());
        }
    }
    lines
        .iter()
        .map(|words| words.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a number with an optional SPICE scale suffix.
///
/// Suffixes are case-insensitive: `f p n u µ m k meg g t` (`meg` before
/// `m`, so `M` means milli). Trailing unit letters are ignored: `10uF`,
/// `1kohm`, `5V`.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Longest numeric prefix
    let bytes = text.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start || &text[digits_start..i] == "." {
        return None;
    }
    // Exponent, only if followed by digits
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'+') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }

    let number: f64 = text[..i].parse().ok()?;
    let rest = text[i..].to_lowercase();
    if !rest.chars().all(|c| c.is_alphabetic()) {
        return None;
    }

    let multiplier = if rest.starts_with("meg") {
        1e6
    } else if rest.starts_with("mil") {
        25.4e-6
    } else {
        match rest.chars().next() {
            Some('f') => 1e-15,
            Some('p') => 1e-12,
            Some('n') => 1e-9,
            Some('u') | Some('µ') => 1e-6,
            Some('m') => 1e-3,
            Some('k') => 1e3,
            Some('g') => 1e9,
            Some('t') => 1e12,
            _ => 1.0,
        }
    };

    Some(number * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_value() {
        assert_relative_eq!(parse_value("10k").unwrap(), 10_000.0);
        assert_relative_eq!(parse_value("100n").unwrap(), 100e-9);
        assert_relative_eq!(parse_value("4.7u").unwrap(), 4.7e-6);
        assert_relative_eq!(parse_value("1Meg").unwrap(), 1e6);
        assert_relative_eq!(parse_value("1M").unwrap(), 1e-3);
        assert_relative_eq!(parse_value("2.2").unwrap(), 2.2);
        assert_relative_eq!(parse_value("1e-9").unwrap(), 1e-9);
        assert_relative_eq!(parse_value("10uF").unwrap(), 10e-6);
        assert_relative_eq!(parse_value("5V").unwrap(), 5.0);
        assert_relative_eq!(parse_value("-.5").unwrap(), -0.5);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        assert!(parse_value("").is_none());
        assert!(parse_value("abc").is_none());
        assert!(parse_value(".").is_none());
        assert!(parse_value("1k2").is_none());
        assert!(parse_value("1-2").is_none());
    }

    #[test]
    fn test_lexer_columns() {
        let tokens = tokenize_line("R1  in out 1k");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["R1", "in", "out", "1k"]);
        assert_eq!(tokens[1].column, 5);
        assert_eq!(tokens[2].column, 8);
        assert_eq!(tokens[2].end_column(), 11);
    }

    #[test]
    fn test_lexer_directive_and_comment() {
        let tokens = Lexer::new("* title\n.tran 1u 1m\nR1 a b 1k . x").tokens();
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, ".tran");
        assert_eq!(tokens[0].line, 2);
        assert!(tokens.iter().skip(1).all(|t| t.kind == TokenKind::Word));
    }

    #[test]
    fn test_normalize() {
        let text = "* comment\nV1   IN 0 5\n\n.op\n";
        assert_eq!(normalize(text), "v1 in 0 5\n.op");
        assert_eq!(normalize(text), normalize("v1 in 0 5\n.OP"));
    }
}
