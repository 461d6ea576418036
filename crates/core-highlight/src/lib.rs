//! core-highlight: the built-in fallback line tokenizer.
//!
//! Selected by the `lightHighlight` configuration flag when no host-side
//! syntax highlighter is available. One line in, classified byte spans out;
//! markup assembly and theming stay with the host. Classification is a
//! single regex pass: quoted strings, line/block comments, numbers, a fixed
//! keyword list, bare words, and punctuation. Spans are contiguous and cover
//! the whole line (gaps come back as `Plain`).

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Plain,
    String,
    Comment,
    Number,
    Keyword,
    Word,
    Punct,
}

/// Half-open byte range of one classified token within the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
    pub class: TokenClass,
}

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|`[^`]*`|//.*|/\*(?s:.*?)\*/|\b\d+\b|\b\w+\b|\S"#)
        .expect("token pattern is valid")
});

const KEYWORDS: &[&str] = &[
    "function", "const", "let", "var", "if", "else", "for", "while", "return", "import", "export",
    "class", "extends", "try", "catch", "finally", "throw", "switch", "case", "default", "break",
    "continue", "typeof", "instanceof", "void", "delete", "await", "async", "yield", "super",
    "this", "true", "false", "null", "undefined", "fn", "pub", "impl", "struct", "enum", "match",
    "mod", "use", "mut", "trait",
];

fn classify(token: &str) -> TokenClass {
    let first = token.chars().next().unwrap_or(' ');
    if matches!(first, '"' | '\'' | '`') {
        TokenClass::String
    } else if token.starts_with("//") || token.starts_with("/*") {
        TokenClass::Comment
    } else if token.chars().all(|c| c.is_ascii_digit()) {
        TokenClass::Number
    } else if KEYWORDS.contains(&token) {
        TokenClass::Keyword
    } else if first.is_alphanumeric() || first == '_' {
        TokenClass::Word
    } else {
        TokenClass::Punct
    }
}

/// Tokenize one line of text into contiguous classified spans.
pub fn tokenize_line(text: &str) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    let mut last = 0usize;
    for m in TOKEN_RE.find_iter(text) {
        if m.start() > last {
            spans.push(TokenSpan {
                start: last,
                end: m.start(),
                class: TokenClass::Plain,
            });
        }
        spans.push(TokenSpan {
            start: m.start(),
            end: m.end(),
            class: classify(m.as_str()),
        });
        last = m.end();
    }
    if last < text.len() {
        spans.push(TokenSpan {
            start: last,
            end: text.len(),
            class: TokenClass::Plain,
        });
    }
    trace!(target: "highlight", bytes = text.len(), spans = spans.len(), "tokenized");
    spans
}
