//! Line-oriented view of a source file and block boundary detection.
//!
//! Boundaries are heuristic:
//!
//! - brace families count `{`/`}` balance, skipping braces inside string
//!   literals and comments, and braces nested in parentheses before the
//!   body opens (destructured parameters);
//! - a statement that reaches `;` before any `{` ends there, and one that
//!   neither opens a block nor continues onto the next line ends on its
//!   own line;
//! - Python blocks end where indentation returns to the header level;
//! - Ruby blocks end at the matching-indentation `end`.

use crate::language::LanguageFamily;
use crate::models::ExportKind;

/// A matched construct, 1-based inclusive lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
    pub name: Option<String>,
    pub export_kind: Option<ExportKind>,
}

/// Source text split into lines with byte offsets for each line start.
pub struct SourceText<'a> {
    pub content: &'a str,
    pub family: LanguageFamily,
    lines: Vec<&'a str>,
    line_starts: Vec<usize>,
}

const CONTINUATION_SUFFIXES: &[&str] = &[
    ",", "(", "[", "=", "=>", "->", "|", "&", ":", "<", "+", "?", "\\", "where",
];
const CONTINUATION_PREFIXES: &[&str] = &["{", "|", "&", ".", "=>", "->", "?", ":", "where"];

impl<'a> SourceText<'a> {
    pub fn new(content: &'a str, family: LanguageFamily) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            content,
            family,
            lines: content.lines().collect(),
            line_starts,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The text of a 1-based line, without its terminator.
    pub fn line(&self, line: usize) -> &'a str {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .copied()
            .unwrap_or("")
    }

    /// 1-based line containing a byte offset.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Lines `start..=end` (1-based) joined with `\n`.
    pub fn slice(&self, start: usize, end: usize) -> String {
        if start == 0 || start > self.lines.len() || end < start {
            return String::new();
        }
        let end = end.min(self.lines.len());
        self.lines[start - 1..end].join("\n")
    }

    /// Last line (1-based) of the block whose header is on `start`.
    pub fn block_end(&self, start: usize, max_lines: usize) -> usize {
        if self.lines.is_empty() || start == 0 || start > self.lines.len() {
            return start;
        }
        let last = start
            .saturating_add(max_lines.max(1) - 1)
            .min(self.lines.len());
        if self.family.uses_braces() {
            self.brace_block_end(start, last)
        } else {
            match self.family {
                LanguageFamily::Python => self.indent_block_end(start, last),
                LanguageFamily::Ruby => self.end_keyword_block_end(start, last),
                _ => start,
            }
        }
    }

    fn continues_after(&self, line: usize) -> bool {
        let trimmed = self.line(line).trim_end();
        if CONTINUATION_SUFFIXES.iter().any(|s| trimmed.ends_with(s)) {
            return true;
        }
        let next = self.lines[line..].iter().map(|l| l.trim()).find(|l| !l.is_empty());
        match next {
            Some(next) => CONTINUATION_PREFIXES.iter().any(|p| next.starts_with(p)),
            None => false,
        }
    }

    fn brace_block_end(&self, start: usize, last: usize) -> usize {
        let single_quote_strings = !matches!(self.family, LanguageFamily::Rust);
        let mut depth = 0i32;
        let mut parens = 0i32;
        let mut opened = false;
        let mut in_block_comment = false;
        let mut in_template = false;

        for line_no in start..=last {
            let mut chars = self.line(line_no).chars().peekable();
            let mut quote = if in_template { Some('`') } else { None };

            while let Some(c) = chars.next() {
                if in_block_comment {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        in_block_comment = false;
                    }
                    continue;
                }
                if let Some(q) = quote {
                    if c == '\\' {
                        chars.next();
                    } else if c == q {
                        quote = None;
                    }
                    continue;
                }
                match c {
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        in_block_comment = true;
                    }
                    '"' | '`' => quote = Some(c),
                    '\'' if single_quote_strings => quote = Some(c),
                    '(' | '[' => parens += 1,
                    ')' | ']' => parens = (parens - 1).max(0),
                    '{' if depth == 0 && parens > 0 => {}
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' if depth > 0 => {
                        depth -= 1;
                        if depth == 0 && opened {
                            return line_no;
                        }
                    }
                    ';' if !opened && parens == 0 => return line_no,
                    _ => {}
                }
            }
            in_template = quote == Some('`');

            if !opened && parens == 0 && !self.continues_after(line_no) {
                return line_no;
            }
        }
        last
    }

    fn indent_block_end(&self, start: usize, last: usize) -> usize {
        let base = indent_of(self.line(start));

        // Header may span lines while parentheses are open.
        let mut header_end = start;
        let mut parens = 0i32;
        for line_no in start..=last {
            for c in self.line(line_no).chars() {
                match c {
                    '(' | '[' | '{' => parens += 1,
                    ')' | ']' | '}' => parens -= 1,
                    _ => {}
                }
            }
            header_end = line_no;
            if parens <= 0 {
                break;
            }
        }

        let mut end = header_end;
        for line_no in header_end + 1..=last {
            let line = self.line(line_no);
            if line.trim().is_empty() {
                continue;
            }
            if indent_of(line) > base {
                end = line_no;
            } else {
                break;
            }
        }
        end
    }

    fn end_keyword_block_end(&self, start: usize, last: usize) -> usize {
        let header = self.line(start).trim_end();
        if header.ends_with(" end") || header.ends_with(";end") {
            return start;
        }
        let base = indent_of(self.line(start));
        for line_no in start + 1..=last {
            let line = self.line(line_no);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let indent = indent_of(line);
            if indent <= base && (trimmed == "end" || trimmed.starts_with("end ") || trimmed.starts_with("end.")) {
                return line_no;
            }
            if indent < base {
                return line_no - 1;
            }
        }
        last
    }
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}
