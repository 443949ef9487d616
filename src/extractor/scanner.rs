//! Brace-aware scanning over Jenkinsfile text.
//!
//! Nothing here understands Groovy beyond string literals, comments and the
//! three bracket kinds. Offsets are byte offsets into the comment-blanked
//! source, which keeps the same length and line layout as the original file.

use regex::Regex;

use crate::error::{PipelensError, Result};

fn is_quote(b: u8) -> bool {
    b == b'\'' || b == b'"'
}

/// Index just past the string literal that starts at `start`.
///
/// Handles `'...'`, `"..."`, `'''...'''` and `"""..."""` with backslash escapes.
/// Single-quote forms may not span lines. Returns `None` when unterminated.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let triple = bytes.len() >= start + 3 && bytes[start + 1] == quote && bytes[start + 2] == quote;

    if triple {
        let mut i = start + 3;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if i + 3 <= bytes.len() && bytes[i..i + 3].iter().all(|&b| b == quote) {
                return Some(i + 3);
            }
            i += 1;
        }
        return None;
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

enum Item {
    Code(usize, u8),
    Literal,
    Unterminated(usize),
}

/// Walks code bytes, stepping over string literals in one move.
struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CodeBytes<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
        }
    }
}

impl Iterator for CodeBytes<'_> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let i = self.pos;
        let b = self.bytes[i];
        if is_quote(b) {
            return Some(match string_end(self.bytes, i) {
                Some(end) => {
                    self.pos = end;
                    Item::Literal
                }
                None => {
                    self.pos = self.bytes.len();
                    Item::Unterminated(i)
                }
            });
        }
        self.pos += 1;
        Some(Item::Code(i, b))
    }
}

/// 1-based line number of a byte offset.
pub fn line_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Replaces `//` and `/* */` comments with spaces, keeping newlines and length.
pub fn blank_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if is_quote(b) {
            i = string_end(bytes, i).unwrap_or(i + 1);
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                out[i] = b' ';
                i += 1;
            }
            continue;
        }
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                if bytes[i] != b'\n' {
                    out[i] = b' ';
                }
                i += 1;
            }
            for slot in out.iter_mut().skip(i).take(2) {
                *slot = b' ';
            }
            i += 2;
            continue;
        }
        i += 1;
    }

    // Only whole comment runs were replaced, so multi-byte characters stay intact.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Verifies that braces, parentheses and brackets nest correctly.
pub fn check_balance(text: &str) -> Result<()> {
    let mut stack: Vec<(u8, usize)> = Vec::new();

    for item in CodeBytes::new(text, 0) {
        match item {
            Item::Code(i, b @ (b'{' | b'(' | b'[')) => stack.push((b, i)),
            Item::Code(i, b @ (b'}' | b')' | b']')) => {
                let expected = match b {
                    b'}' => b'{',
                    b')' => b'(',
                    _ => b'[',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(PipelensError::structural(
                            format!(
                                "`{}` closes `{}` opened on line {}",
                                b as char,
                                open as char,
                                line_of(text, at)
                            ),
                            line_of(text, i),
                        ))
                    }
                    None => {
                        return Err(PipelensError::structural(
                            format!("unmatched `{}`", b as char),
                            line_of(text, i),
                        ))
                    }
                }
            }
            Item::Unterminated(i) => {
                return Err(PipelensError::structural(
                    "unterminated string literal",
                    line_of(text, i),
                ))
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, at)) => Err(PipelensError::structural(
            format!("`{}` is never closed", open as char),
            line_of(text, at),
        )),
        None => Ok(()),
    }
}

/// Index of the bracket closing the one at `open`.
pub fn find_matching(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for item in CodeBytes::new(text, open) {
        match item {
            Item::Code(_, b'{' | b'(' | b'[') => depth += 1,
            Item::Code(i, b'}' | b')' | b']') => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            Item::Unterminated(_) => return None,
            _ => {}
        }
    }
    None
}

/// A `{ ... }` body with the absolute offset of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body<'a> {
    pub text: &'a str,
    pub offset: usize,
}

/// One top-level statement: `keyword args { body }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement<'a> {
    pub keyword: &'a str,
    pub args: &'a str,
    pub body: Option<Body<'a>>,
    pub text: &'a str,
    pub offset: usize,
}

impl<'a> Statement<'a> {
    fn parse(text: &'a str, offset: usize) -> Self {
        let keyword_len = text
            .char_indices()
            .find(|&(i, c)| {
                !(c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.' || (i == 0 && c == '@'))
            })
            .map_or(text.len(), |(i, _)| i);
        let keyword = &text[..keyword_len];
        let rest = &text[keyword_len..];

        let mut args = rest;
        let mut body = None;

        if let Some(open) = top_level_brace(rest) {
            if let Some(close) = find_matching(rest, open) {
                if rest[close + 1..].trim().is_empty() {
                    args = &rest[..open];
                    body = Some(Body {
                        text: &rest[open + 1..close],
                        offset: offset + keyword_len + open + 1,
                    });
                }
            }
        }

        Self {
            keyword,
            args: strip_parens(args.trim()),
            body,
            text,
            offset,
        }
    }
}

/// First `{` that is not inside parentheses or brackets.
fn top_level_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for item in CodeBytes::new(text, 0) {
        match item {
            Item::Code(_, b'(' | b'[') => depth += 1,
            Item::Code(_, b')' | b']') => depth = depth.saturating_sub(1),
            Item::Code(i, b'{') if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn strip_parens(args: &str) -> &str {
    if args.starts_with('(') && find_matching(args, 0) == Some(args.len() - 1) {
        args[1..args.len() - 1].trim()
    } else {
        args
    }
}

const CONTINUATION_SUFFIXES: [&str; 9] = [",", "&&", "||", "+", "\\", "=", "(", "[", "?"];
const CONTINUATION_WORDS: [&str; 3] = ["else", "catch", "finally"];

fn continues_past_newline(text: &str, start: usize, newline: usize) -> bool {
    let current = text[start..newline].trim();
    if current.is_empty() {
        return false;
    }
    if CONTINUATION_SUFFIXES.iter().any(|s| current.ends_with(s)) {
        return true;
    }
    let next = text[newline..].trim_start();
    next.starts_with('{')
        || next.starts_with('.')
        || next.starts_with("&&")
        || next.starts_with("||")
        || next.starts_with('?')
        || CONTINUATION_WORDS.iter().any(|w| {
            next.strip_prefix(w)
                .is_some_and(|tail| !tail.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'))
        })
}

/// Splits a block body into its top-level statements.
///
/// `base` is the absolute offset of `text` within the source.
pub fn split_statements(text: &str, base: usize) -> Vec<Statement<'_>> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for item in CodeBytes::new(text, 0) {
        if let Item::Code(i, b) = item {
            match b {
                b'{' | b'(' | b'[' => depth += 1,
                b'}' | b')' | b']' => depth -= 1,
                b';' if depth <= 0 => {
                    push_statement(text, base, start..i, &mut out);
                    start = i + 1;
                }
                b'\n' if depth <= 0 && !continues_past_newline(text, start, i) => {
                    push_statement(text, base, start..i, &mut out);
                    start = i + 1;
                }
                _ => {}
            }
        }
    }
    push_statement(text, base, start..text.len(), &mut out);

    out
}

fn push_statement<'a>(
    text: &'a str,
    base: usize,
    range: std::ops::Range<usize>,
    out: &mut Vec<Statement<'a>>,
) {
    let raw = &text[range.clone()];
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        let lead = raw.len() - raw.trim_start().len();
        out.push(Statement::parse(trimmed, base + range.start + lead));
    }
}

/// Inner text of a string literal when `text` is exactly one literal.
pub fn unquote(text: &str) -> Option<String> {
    let text = text.trim();
    let bytes = text.as_bytes();
    if bytes.is_empty() || !is_quote(bytes[0]) || string_end(bytes, 0) != Some(bytes.len()) {
        return None;
    }
    let triple = bytes.len() >= 6 && bytes[1] == bytes[0] && bytes[2] == bytes[0];
    let inner = if triple {
        &text[3..text.len() - 3]
    } else {
        &text[1..text.len() - 1]
    };
    Some(inner.to_string())
}

/// Value of a quoted `key: '...'` argument anywhere in `text`.
pub fn named_value(text: &str, key: &str) -> Option<String> {
    let pattern = format!(
        r#"\b{}\s*:\s*(?:'''([\s\S]*?)'''|"""([\s\S]*?)"""|'([^']*)'|"([^"]*)")"#,
        regex::escape(key)
    );
    let re = Regex::new(&pattern).expect("valid regex");
    let caps = re.captures(text)?;
    (1..=4)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().to_string())
}

/// Unquoted `key: value` argument, e.g. `time: 5`.
pub fn named_raw(text: &str, key: &str) -> Option<String> {
    let pattern = format!(r"\b{}\s*:\s*([^,)\]\s]+)", regex::escape(key));
    let re = Regex::new(&pattern).expect("valid regex");
    re.captures(text).map(|caps| caps[1].to_string())
}

/// Every single- or double-quoted literal in `text`, in order.
pub fn quoted_strings(text: &str) -> Vec<String> {
    let re = Regex::new(r#"'([^'\n]*)'|"([^"\n]*)""#).expect("valid regex");
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// First positional argument when it is a string literal.
pub fn first_string_arg(args: &str) -> Option<String> {
    let head = args.split(',').next()?.trim();
    unquote(head).or_else(|| unquote(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_comments_keeps_layout_and_urls() {
        let text = "a // note\nsh 'curl https://x.io/a' /* b\nc */ d";
        let blanked = blank_comments(text);
        assert_eq!(blanked.len(), text.len());
        assert!(blanked.contains("https://x.io/a"));
        assert!(!blanked.contains("note"));
        assert!(blanked.ends_with(" d"));
        assert_eq!(blanked.lines().count(), text.lines().count());
    }

    #[test]
    fn test_check_balance_ignores_braces_in_strings() {
        assert!(check_balance("steps { sh 'echo }' }").is_ok());
        assert!(check_balance("x = \"\"\"{\n{\"\"\"").is_ok());
    }

    #[test]
    fn test_check_balance_reports_line() {
        let err = check_balance("pipeline {\n  stages {\n    stage('a') {\n  }\n").unwrap_err();
        match err {
            PipelensError::StructuralParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_balance_mismatched_close() {
        let err = check_balance("a {\n  b(]\n}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_split_statements_handles_blocks_and_continuations() {
        let body = "\n  sh 'make'\n  withCredentials([string(credentialsId: 'x',\n      variable: 'Y')]) {\n    sh 'echo $Y'\n  }\n  junit 'out/*.xml'; echo 'done'\n";
        let statements = split_statements(body, 0);
        let keywords: Vec<_> = statements.iter().map(|s| s.keyword).collect();
        assert_eq!(keywords, vec!["sh", "withCredentials", "junit", "echo"]);
        let with_creds = &statements[1];
        assert!(with_creds.args.starts_with("[string("));
        assert_eq!(with_creds.body.map(|b| b.text.trim()), Some("sh 'echo $Y'"));
    }

    #[test]
    fn test_split_statements_brace_on_next_line() {
        let statements = split_statements("stage('Build')\n{\n  steps { sh 'x' }\n}", 0);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].args, "'Build'");
    }

    #[test]
    fn test_statement_offsets_are_absolute() {
        let text = "pipeline {\n  stages {\n  }\n}";
        let top = split_statements(text, 0);
        let body = top[0].body.unwrap();
        let inner = split_statements(body.text, body.offset);
        assert_eq!(line_of(text, inner[0].offset), 2);
    }

    #[test]
    fn test_unquote_forms() {
        assert_eq!(unquote("'a b'"), Some("a b".to_string()));
        assert_eq!(unquote("\"\"\"\nx\n\"\"\""), Some("\nx\n".to_string()));
        assert_eq!(unquote("'a' + b"), None);
        assert_eq!(unquote("scm"), None);
    }

    #[test]
    fn test_named_arguments() {
        let args = "credentialsId: 'docker-hub', usernameVariable: \"USER\", time: 5";
        assert_eq!(named_value(args, "credentialsId"), Some("docker-hub".to_string()));
        assert_eq!(named_value(args, "usernameVariable"), Some("USER".to_string()));
        assert_eq!(named_raw(args, "time"), Some("5".to_string()));
        assert_eq!(named_value(args, "missing"), None);
    }
}
