// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config error diagnostics.
//!
//! Figment errors are turned into miette reports that point at the offending
//! line of `courier.toml`, including keys inside `[[messenger.connectors]]`
//! and `[[whatsapp.connectors]]` entries, and suggest the closest valid key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Name of a source given as a string rather than a file.
pub const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {section}")]
    #[diagnostic(
        code(courier::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Where the key was found, e.g. `[[whatsapp.connectors]] #2`.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a {section} key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(courier::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}` in {section}")]
    #[diagnostic(
        code(courier::config::missing_key),
        help("add `{key} = ...` to the {section} entry")
    )]
    MissingKey { key: String, section: String },

    #[error("validation error: {message}")]
    #[diagnostic(code(courier::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(courier::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Location of a key inside the TOML document.
///
/// Figment reports `["whatsapp", "connectors", "1", "mode"]` style paths;
/// numeric segments select the n-th entry of an array of tables.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyPath {
    /// Dotted table name, empty at the top level.
    table: String,
    /// Zero-based entry of an array of tables.
    index: Option<usize>,
}

impl KeyPath {
    fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let mut names = Vec::new();
        let mut index = None;
        for segment in segments {
            let segment = segment.as_ref();
            match segment.parse::<usize>() {
                Ok(i) => index = Some(i),
                Err(_) => names.push(segment),
            }
        }
        Self {
            table: names.join("."),
            index,
        }
    }

    /// Connector lists are the only arrays of tables in the config.
    fn is_array(&self) -> bool {
        self.table.ends_with(".connectors")
    }

    fn label(&self) -> String {
        match (self.table.as_str(), self.index) {
            ("", _) => "the top level".to_string(),
            (table, Some(i)) => format!("[[{table}]] #{}", i + 1),
            (table, None) if self.is_array() => format!("[[{table}]]"),
            (table, None) => format!("[{table}]"),
        }
    }
}

/// Convert a `figment::Error` into one diagnostic per underlying error.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let at = KeyPath::from_segments(&error.path);
                let (span, src) = locate(&error, &at, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    section: at.label(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
                section: KeyPath::from_segments(&error.path).label(),
            },
            Kind::InvalidType(actual, expected) => {
                let (parent, field) = match error.path.split_last() {
                    Some((field, parent)) => (KeyPath::from_segments(parent), field.as_str()),
                    None => (KeyPath::from_segments::<&str>(&[]), ""),
                };
                let (span, src) = locate(&error, &parent, field, toml_sources);
                ConfigError::InvalidType {
                    key: error.path.join("."),
                    found: actual.to_string(),
                    expected: expected.to_string(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Span of `field` in the source the error came from.
///
/// File sources are matched by path; anything else falls back to an
/// `<inline>` source when one was given.
fn locate(
    error: &figment::error::Error,
    at: &KeyPath,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ => INLINE_SOURCE.to_string(),
    };
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == origin) else {
        return (None, None);
    };
    match find_key(content, at, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the table `at` of a TOML document.
///
/// Table headers are matched by name, `[a.b]` and `[[a.b]]` alike. For an
/// array of tables with a known index only that entry is searched, otherwise
/// the first entry defining the key wins.
fn find_key(content: &str, at: &KeyPath, field: &str) -> Option<usize> {
    let mut in_table = at.table.is_empty();
    let mut seen_entries = 0usize;
    let mut offset = 0usize;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = table_header(trimmed) {
            in_table = header == at.table
                && match at.index {
                    Some(i) => {
                        seen_entries += 1;
                        seen_entries == i + 1
                    }
                    None => true,
                };
        } else if in_table && defines_key(trimmed, field) {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Name inside `[name]` or `[[name]]`, whitespace trimmed.
fn table_header(line: &str) -> Option<&str> {
    let line = line.split('#').next().unwrap_or_default().trim_end();
    let inner = line
        .strip_prefix("[[")
        .and_then(|l| l.strip_suffix("]]"))
        .or_else(|| line.strip_prefix('[').and_then(|l| l.strip_suffix(']')))?;
    Some(inner.trim())
}

fn defines_key(line: &str, field: &str) -> bool {
    line.strip_prefix(field)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render errors to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}
