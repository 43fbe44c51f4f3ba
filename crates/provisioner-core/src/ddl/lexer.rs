use crate::error::SchemaParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Word(String),
    /// Backtick- or double-quoted identifier.
    Quoted(String),
    /// Single-quoted string literal, unescaped.
    Str(String),
    Number(String),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Symbol(char),
}

/// Token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    /// Identifier text for bare or quoted names.
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(word) | TokenKind::Quoted(word) => Some(word.as_str()),
            _ => None,
        }
    }
}

pub(crate) fn tokenize(sql: &str) -> Result<Vec<Token>, SchemaParseError> {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let offset_at = |idx: usize| chars.get(idx).map(|(pos, _)| *pos).unwrap_or(sql.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, ch) = chars[i];
        let next = chars.get(i + 1).map(|(_, ch)| *ch);

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch == '#' || (ch == '-' && next == Some('-') && is_comment_dash(&chars, i + 2)) {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        if ch == '/' && next == Some('*') {
            i += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(SchemaParseError::new(
                        &sql[start..],
                        "unterminated block comment",
                    ));
                }
                if chars[i].1 == '*' && chars[i + 1].1 == '/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let kind = match ch {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            '.' => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = kind {
            i += 1;
            tokens.push(Token {
                kind,
                start,
                end: offset_at(i),
            });
            continue;
        }

        if ch == '\'' || ch == '"' || ch == '`' {
            let (text, consumed) = read_quoted(&chars, i, ch).ok_or_else(|| {
                SchemaParseError::new(&sql[start..], "unterminated quoted text")
            })?;
            i += consumed;
            let kind = if ch == '\'' {
                TokenKind::Str(text)
            } else {
                TokenKind::Quoted(text)
            };
            tokens.push(Token {
                kind,
                start,
                end: offset_at(i),
            });
            continue;
        }

        if ch.is_ascii_digit() {
            let begin = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let text: String = chars[begin..i].iter().map(|(_, ch)| *ch).collect();
            tokens.push(Token {
                kind: TokenKind::Number(text),
                start,
                end: offset_at(i),
            });
            continue;
        }

        if is_word_char(ch) {
            let begin = i;
            while i < chars.len() && is_word_char(chars[i].1) {
                i += 1;
            }
            let text: String = chars[begin..i].iter().map(|(_, ch)| *ch).collect();
            tokens.push(Token {
                kind: TokenKind::Word(text),
                start,
                end: offset_at(i),
            });
            continue;
        }

        i += 1;
        tokens.push(Token {
            kind: TokenKind::Symbol(ch),
            start,
            end: offset_at(i),
        });
    }

    Ok(tokens)
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '@'
}

fn is_comment_dash(chars: &[(usize, char)], idx: usize) -> bool {
    chars.get(idx).map(|(_, ch)| ch.is_whitespace()).unwrap_or(true)
}

/// Read a quoted run starting at `idx`; returns the unescaped text and the
/// number of chars consumed including both quotes.
fn read_quoted(chars: &[(usize, char)], idx: usize, quote: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut i = idx + 1;
    while i < chars.len() {
        let ch = chars[i].1;
        if ch == '\\' && quote != '`' {
            let escaped = chars.get(i + 1)?.1;
            text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
            i += 2;
            continue;
        }
        if ch == quote {
            if chars.get(i + 1).map(|(_, next)| *next) == Some(quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return Some((text, i + 1 - idx));
        }
        text.push(ch);
        i += 1;
    }
    None
}
