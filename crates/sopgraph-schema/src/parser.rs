//! Best-effort parser for the `Table name { ... }` / `Ref: a.b > c.d` notation.
//!
//! Two independent passes run over the text once `'''` strings and comments
//! are blanked out:
//!
//! - table blocks: header regex, then a brace-depth scan to find the closing
//!   brace (braces inside quotes and `[...]` settings do not count);
//! - references: every `Ref` declaration anywhere in the text.
//!
//! Nothing here fails. Lines that do not look like a column are skipped and an
//! unterminated block simply ends at the next table header (or end of input).

use crate::model::{ColumnDef, ColumnRef, ForeignKeyEdge, SchemaModel};
use regex::Regex;
use std::sync::OnceLock;

const IDENT: &str = r"[A-Za-z_][A-Za-z0-9_]*";

fn table_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"\b[Tt]able\s+"?({IDENT})"?(?:\s+as\s+"?{IDENT}"?)?\s*(?:\[[^\]\n]*\])?\s*\{{"#
        ))
        .expect("table header pattern is valid")
    })
}

fn ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"\bRef(?:\s+"?{IDENT}"?)?\s*[:{{]\s*"?({IDENT})"?\."?({IDENT})"?\s*([<>-])\s*"?({IDENT})"?\."?({IDENT})"?"#
        ))
        .expect("ref pattern is valid")
    })
}

fn column_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"^"?({IDENT})"?\s+({IDENT}(?:\.{IDENT})?(?:\s*\([^)]*\))?(?:\[\])?(?:\s+{IDENT})*)\s*(?:\[(.*)\])?\s*,?$"#
        ))
        .expect("column pattern is valid")
    })
}

fn inline_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"^(?i:ref)\s*:\s*([<>-])\s*"?({IDENT})"?\."?({IDENT})"?$"#
        ))
        .expect("inline ref pattern is valid")
    })
}

/// Parse schema text into a [`SchemaModel`].
pub fn parse_schema(text: &str) -> SchemaModel {
    let clean = strip_comments(&blank_multiline_strings(text));
    let mut schema = SchemaModel::default();

    for block in table_blocks(&clean) {
        schema.add_table(block.name);

        let mut columns = Vec::new();
        for line in top_level_lines(block.body) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(parsed) = parse_column_line(line) else {
                tracing::debug!(table = block.name, line, "skipping non-column line");
                continue;
            };

            if parsed.column.primary_key {
                schema
                    .primary_keys
                    .entry(block.name.to_string())
                    .or_default()
                    .insert(parsed.column.name.clone());
            }

            let here = ColumnRef::new(block.name, parsed.column.name.as_str());
            for (op, table, column) in parsed.inline_refs {
                schema.add_foreign_key(directed_edge(here.clone(), op, ColumnRef::new(table, column)));
            }

            columns.push(parsed.column);
        }

        schema
            .columns
            .entry(block.name.to_string())
            .or_default()
            .extend(columns);
    }

    for caps in ref_re().captures_iter(&clean) {
        let left = ColumnRef::new(&caps[1], &caps[2]);
        let op = caps[3].chars().next().unwrap_or('>');
        let right = ColumnRef::new(&caps[4], &caps[5]);
        schema.add_foreign_key(directed_edge(left, op, right));
    }

    schema
}

/// `>` and `-` make the left side the child, `<` makes the right side the child.
fn directed_edge(left: ColumnRef, op: char, right: ColumnRef) -> ForeignKeyEdge {
    match op {
        '<' => ForeignKeyEdge::new(right, left),
        _ => ForeignKeyEdge::new(left, right),
    }
}

// ============================================================================
// Lexical helpers
// ============================================================================

/// Tracks quoted strings and `[...]` settings so structural braces can be told
/// apart from braces inside values. Quotes and brackets never span lines.
#[derive(Debug, Default)]
struct Lexical {
    quote: Option<char>,
    escaped: bool,
    bracket: usize,
}

impl Lexical {
    /// Feed one character; returns true when it is outside quotes and brackets.
    fn structural(&mut self, c: char) -> bool {
        if c == '\n' {
            self.quote = None;
            self.escaped = false;
            self.bracket = 0;
            return true;
        }

        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return false;
        }

        match c {
            '\'' | '"' | '`' => {
                self.quote = Some(c);
                false
            }
            '[' => {
                self.bracket += 1;
                false
            }
            ']' if self.bracket > 0 => {
                self.bracket -= 1;
                false
            }
            _ => self.bracket == 0,
        }
    }
}

/// Replace each closed `'''...'''` string with spaces, keeping newlines and
/// byte offsets. An unclosed `'''` is left as is.
pub fn blank_multiline_strings(text: &str) -> String {
    const DELIM: &str = "'''";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(DELIM) {
        let after = &rest[open + DELIM.len()..];
        let Some(close) = after.find(DELIM) else {
            break;
        };
        let end = open + 2 * DELIM.len() + close;

        out.push_str(&rest[..open]);
        for c in rest[open..end].chars() {
            if c == '\n' {
                out.push('\n');
            } else {
                out.extend(std::iter::repeat(' ').take(c.len_utf8()));
            }
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Remove `//` and `/* */` comments outside quoted strings, keeping newlines.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q || c == '\n' {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableBlock<'a> {
    name: &'a str,
    body: &'a str,
}

fn table_blocks(text: &str) -> Vec<TableBlock<'_>> {
    let headers: Vec<(usize, usize, &str)> = table_header_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some((whole.start(), whole.end(), name.as_str()))
        })
        .collect();

    let mut blocks = Vec::with_capacity(headers.len());
    for (idx, &(_, body_start, name)) in headers.iter().enumerate() {
        let limit = headers
            .get(idx + 1)
            .map(|&(next_start, _, _)| next_start)
            .unwrap_or(text.len());
        let region = &text[body_start..limit];

        let mut lex = Lexical::default();
        let mut depth = 1usize;
        let mut body_end = region.len();
        for (offset, c) in region.char_indices() {
            if !lex.structural(c) {
                continue;
            }
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        body_end = offset;
                        break;
                    }
                }
                _ => {}
            }
        }

        blocks.push(TableBlock {
            name,
            body: &region[..body_end],
        });
    }

    blocks
}

/// Lines of `body` at nesting depth zero. Lines that open or sit inside a
/// nested block (`indexes { ... }`, `Note { ... }`) are dropped.
fn top_level_lines(body: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut dropped = false;
    let mut depth = 0usize;
    let mut lex = Lexical::default();

    for c in body.chars() {
        let structural = lex.structural(c);

        if c == '\n' {
            if !dropped && depth == 0 {
                lines.push(std::mem::take(&mut current));
            }
            current.clear();
            dropped = depth > 0;
            continue;
        }

        if structural && c == '{' {
            depth += 1;
            dropped = true;
            continue;
        }
        if structural && c == '}' {
            depth = depth.saturating_sub(1);
            continue;
        }

        if depth == 0 {
            current.push(c);
        }
    }

    if !dropped && depth == 0 && !current.is_empty() {
        lines.push(current);
    }

    lines
}

// ============================================================================
// Column lines
// ============================================================================

#[derive(Debug)]
struct ParsedColumn {
    column: ColumnDef,
    inline_refs: Vec<(char, String, String)>,
}

fn parse_column_line(line: &str) -> Option<ParsedColumn> {
    let caps = column_line_re().captures(line)?;
    let name = caps.get(1)?.as_str().to_string();
    let data_type = caps.get(2)?.as_str().trim().to_string();

    let mut column = ColumnDef {
        name,
        data_type,
        primary_key: false,
        not_null: false,
    };
    let mut inline_refs = Vec::new();

    if let Some(settings) = caps.get(3) {
        for setting in split_settings(settings.as_str()) {
            let lowered = setting.to_ascii_lowercase();
            let normalized = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
            match normalized.as_str() {
                "pk" | "primary key" => column.primary_key = true,
                "not null" => column.not_null = true,
                _ => {
                    if let Some(r) = inline_ref_re().captures(setting) {
                        let op = r[1].chars().next().unwrap_or('>');
                        inline_refs.push((op, r[2].to_string(), r[3].to_string()));
                    }
                }
            }
        }
    }

    Some(ParsedColumn {
        column,
        inline_refs,
    })
}

/// Split a settings list on top-level commas (not inside quotes or parens).
fn split_settings(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut parens = 0usize;
    let mut start = 0usize;

    for (idx, c) in raw.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '{' => parens += 1,
            ')' | '}' => parens = parens.saturating_sub(1),
            ',' if parens == 0 => {
                parts.push(raw[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(raw[start..].trim());

    parts.into_iter().filter(|p| !p.is_empty()).collect()
}
