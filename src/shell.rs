//! Target shell dialects and value quoting
//!
//! Resolved commands are handed to a shell, so every substituted value is
//! quoted for the context its placeholder sits in. Bash, zsh and sh share
//! the POSIX rules; fish differs inside single quotes and has no backtick
//! substitution.

use serde::{Deserialize, Serialize};

/// Shell whose quoting rules a resolved command must satisfy
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    #[default]
    Posix,
    Fish,
}

/// Quoting state at a point in a template
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteContext {
    Bare,
    Single,
    Double,
}

impl Shell {
    /// Detect the dialect from a shell path or name (`/usr/local/bin/fish`)
    pub fn detect(shell: &str) -> Self {
        let name = shell.rsplit('/').next().unwrap_or(shell).to_lowercase();
        if name.starts_with("fish") {
            Shell::Fish
        } else {
            Shell::Posix
        }
    }

    /// Detect from `$SHELL`, falling back to POSIX
    pub fn from_env() -> Self {
        std::env::var("SHELL")
            .map(|s| Self::detect(&s))
            .unwrap_or_default()
    }

    /// Program used to run a command string (`<program> -c <command>`)
    pub fn program(&self) -> &'static str {
        match self {
            Shell::Posix => "sh",
            Shell::Fish => "fish",
        }
    }

    /// Whether `\` escapes the following character inside single quotes
    pub(crate) fn escapes_in_single_quotes(&self) -> bool {
        matches!(self, Shell::Fish)
    }

    /// Quote `value` so it is literal text in the given context.
    ///
    /// The result never terminates the surrounding quotes and never
    /// introduces expansion, word splitting or globbing.
    pub fn quote(&self, value: &str, context: QuoteContext) -> String {
        match context {
            QuoteContext::Double => self.escape_double(value),
            QuoteContext::Single => self.escape_single(value),
            QuoteContext::Bare => self.quote_bare(value),
        }
    }

    fn escape_double(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for ch in value.chars() {
            let special = match self {
                Shell::Posix => matches!(ch, '"' | '\\' | '$' | '`'),
                Shell::Fish => matches!(ch, '"' | '\\' | '$'),
            };
            if special {
                out.push('\\');
            }
            out.push(ch);
        }
        out
    }

    fn escape_single(&self, value: &str) -> String {
        match self {
            // Close, emit an escaped quote, reopen.
            Shell::Posix => value.replace('\'', r"'\''"),
            Shell::Fish => value.replace('\\', r"\\").replace('\'', r"\'"),
        }
    }

    fn quote_bare(&self, value: &str) -> String {
        if value == "~" {
            return value.to_string();
        }
        // Keep tilde expansion working for home-relative paths.
        if let Some(rest) = value.strip_prefix("~/") {
            if rest.is_empty() {
                return value.to_string();
            }
            return format!("~/{}", self.quote_bare(rest));
        }
        if !value.is_empty() && value.chars().all(is_bare_safe) {
            return value.to_string();
        }
        format!("\"{}\"", self.escape_double(value))
    }
}

fn is_bare_safe(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_detection() {
        assert_eq!(Shell::detect("/bin/bash"), Shell::Posix);
        assert_eq!(Shell::detect("/usr/bin/zsh"), Shell::Posix);
        assert_eq!(Shell::detect("/opt/homebrew/bin/fish"), Shell::Fish);
        assert_eq!(Shell::detect("sh"), Shell::Posix);
    }

    #[test]
    fn test_posix_double_quote_escapes() {
        let quoted = Shell::Posix.quote(r#"say "hi" $HOME `id` \n"#, QuoteContext::Double);
        assert_eq!(quoted, r#"say \"hi\" \$HOME \`id\` \\n"#);
    }

    #[test]
    fn test_posix_single_quote_escapes() {
        assert_eq!(Shell::Posix.quote("it's", QuoteContext::Single), r"it'\''s");
    }

    #[test]
    fn test_bare_safe_value_untouched() {
        assert_eq!(Shell::Posix.quote("feature/login-2", QuoteContext::Bare), "feature/login-2");
    }

    #[test]
    fn test_bare_value_with_space_is_wrapped() {
        assert_eq!(Shell::Posix.quote("fix bug", QuoteContext::Bare), "\"fix bug\"");
        assert_eq!(Shell::Posix.quote("*.rs", QuoteContext::Bare), "\"*.rs\"");
        assert_eq!(Shell::Posix.quote("", QuoteContext::Bare), "\"\"");
    }

    #[test]
    fn test_bare_tilde_prefix_preserved() {
        assert_eq!(Shell::Posix.quote("~/Downloads", QuoteContext::Bare), "~/Downloads");
        assert_eq!(Shell::Posix.quote("~/My Files", QuoteContext::Bare), "~/\"My Files\"");
        assert_eq!(Shell::Posix.quote("~", QuoteContext::Bare), "~");
    }

    #[test]
    fn test_fish_rules() {
        assert_eq!(Shell::Fish.quote("a `b` $c", QuoteContext::Double), r"a `b` \$c");
        assert_eq!(Shell::Fish.quote(r"it's \x", QuoteContext::Single), r"it\'s \\x");
    }
}
