//! Command templates and phrasing patterns
//!
//! Both use `{name}` placeholders. Command templates are parsed once, at
//! load, into literal and placeholder segments; each placeholder remembers
//! the shell quoting context it sits in so substitution can quote the value
//! for exactly that context. Phrasing patterns are plain natural language
//! and are only scanned for placeholder names.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::shell::{QuoteContext, Shell};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder regex is valid"))
}

/// One piece of a parsed command template
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder { name: String, context: QuoteContext },
}

/// A command template parsed for a specific shell
#[derive(Clone, Debug)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    /// Parse `source`, tracking quote state with `shell`'s rules.
    ///
    /// Placeholders are recognized in every context, including inside
    /// single quotes. A backslash-escaped `{` is literal text.
    pub fn parse(source: &str, shell: Shell) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut context = QuoteContext::Bare;
        let mut chars = source.char_indices();

        while let Some((idx, ch)) = chars.next() {
            if ch == '{' {
                if let Some(name) = placeholder_at(&source[idx..]) {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder {
                        name: name.to_string(),
                        context,
                    });
                    // Skip the ASCII name and the closing brace.
                    for _ in 0..=name.len() {
                        chars.next();
                    }
                    continue;
                }
            }

            literal.push(ch);
            let escapes = match context {
                QuoteContext::Bare | QuoteContext::Double => true,
                QuoteContext::Single => shell.escapes_in_single_quotes(),
            };
            match (context, ch) {
                (_, '\\') if escapes => {
                    if let Some((_, next)) = chars.next() {
                        literal.push(next);
                    }
                }
                (QuoteContext::Bare, '\'') => context = QuoteContext::Single,
                (QuoteContext::Bare, '"') => context = QuoteContext::Double,
                (QuoteContext::Single, '\'') | (QuoteContext::Double, '"') => {
                    context = QuoteContext::Bare
                }
                _ => {}
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Distinct placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Substitute every placeholder with its quoted value.
    ///
    /// Returns the name of the first placeholder without a value; nothing
    /// is substituted in that case.
    pub fn substitute(
        &self,
        shell: Shell,
        values: &BTreeMap<String, String>,
    ) -> Result<String, String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, context } => {
                    let value = values.get(name).ok_or_else(|| name.clone())?;
                    out.push_str(&shell.quote(value, *context));
                }
            }
        }
        Ok(out)
    }
}

/// `s` starts with `{`; return the identifier if a placeholder follows
fn placeholder_at(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('{')?;
    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    if end == 0 || !rest[end..].starts_with('}') {
        return None;
    }
    Some(&rest[..end])
}

/// Distinct placeholder names in a phrasing pattern, in order of first appearance
pub fn pattern_placeholders(pattern: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(pattern) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Fill a phrasing pattern; placeholders without a value are left as written
pub fn render_pattern(pattern: &str, values: &BTreeMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(pattern, |caps: &regex::Captures| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
