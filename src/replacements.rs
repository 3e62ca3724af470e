//! Ordered text substitutions
//!
//! Replacement rules are applied at three points: to the input filename before
//! parsing, to the synthesized filename, and to the full destination path when
//! moving files. Rules run left to right, each one sees the output of the
//! previous rule.

use crate::config::{ConfigValueError, ReplacementRuleConfig};
use regex::Regex;

/// Splits a filename into base name and extension using the configured pattern
#[derive(Debug, Clone)]
pub struct ExtensionSplitter {
    pattern: Regex,
}

impl ExtensionSplitter {
    /// Compiles the extension pattern
    pub fn new(pattern: &str) -> Result<Self, ConfigValueError> {
        Ok(Self {
            pattern: compile_regex("extension_pattern", pattern)?,
        })
    }

    /// Returns `(base, extension)`, the extension keeps its leading dot
    ///
    /// Names without a matching extension are returned whole as the base.
    pub fn split<'a>(&self, name: &'a str) -> (&'a str, &'a str) {
        match self.pattern.find(name) {
            Some(m) => name.split_at(m.start()),
            None => (name, ""),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

/// A compiled replacement rule
#[derive(Debug, Clone)]
pub struct ReplacementRule {
    matcher: Matcher,
    replacement: String,
    with_extension: bool,
}

impl ReplacementRule {
    fn substitute(&self, text: &str) -> String {
        match &self.matcher {
            Matcher::Literal(literal) if literal.is_empty() => text.to_string(),
            Matcher::Literal(literal) => text.replace(literal.as_str(), &self.replacement),
            Matcher::Regex(regex) => regex
                .replace_all(text, self.replacement.as_str())
                .into_owned(),
        }
    }
}

/// An ordered list of compiled replacement rules
#[derive(Debug, Clone, Default)]
pub struct Replacements {
    rules: Vec<ReplacementRule>,
}

impl Replacements {
    /// Compiles the rules configured under `key`
    pub fn compile(key: &str, rules: &[ReplacementRuleConfig]) -> Result<Self, ConfigValueError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let matcher = if rule.is_regex {
                    Matcher::Regex(compile_regex(key, &rule.pattern)?)
                } else {
                    Matcher::Literal(rule.pattern.clone())
                };

                Ok(ReplacementRule {
                    matcher,
                    replacement: rule.replacement.clone(),
                    with_extension: rule.with_extension,
                })
            })
            .collect::<Result<Vec<_>, ConfigValueError>>()?;

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule in order
    ///
    /// Unless a rule opts into `with_extension`, the extension is split off
    /// before the rule runs and reattached afterwards.
    pub fn apply(&self, text: &str, extension: &ExtensionSplitter) -> String {
        self.rules.iter().fold(text.to_string(), |current, rule| {
            if rule.with_extension {
                rule.substitute(&current)
            } else {
                let (base, ext) = extension.split(&current);
                let mut replaced = rule.substitute(base);
                replaced.push_str(ext);
                replaced
            }
        })
    }
}

pub(crate) fn compile_regex(key: &str, pattern: &str) -> Result<Regex, ConfigValueError> {
    Regex::new(pattern).map_err(|e| ConfigValueError::InvalidRegex {
        key: key.to_string(),
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
