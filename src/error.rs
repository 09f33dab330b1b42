//! Error types for the compile pipeline.
//!
//! Each stage has its own error type; [`CompileError`] wraps whichever one
//! stopped the compile. All of them carry the source span of the offending
//! construct and a snippet of its text.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use unicode_width::UnicodeWidthStr;

use crate::ast::SourceSpan;

const MAX_SNIPPET_CHARS: usize = 80;

/// The four ways a compile can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnsupportedSyntax,
    UnresolvedReference,
    CyclicDependency,
    NoRuleForConstruct,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnsupportedSyntax => "UnsupportedSyntax",
            ErrorKind::UnresolvedReference => "UnresolvedReference",
            ErrorKind::CyclicDependency => "CyclicDependency",
            ErrorKind::NoRuleForConstruct => "NoRuleForConstruct",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnsupportedSyntax,
}

/// The input is outside the accepted grammar subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported syntax at {span}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: SourceSpan,
    pub snippet: String,
    pub message: String,
}

impl ParseError {
    pub fn unsupported(span: SourceSpan, snippet: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::UnsupportedSyntax,
            span,
            snippet: snippet.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// A table-position name is neither a known CTE nor a qualified table.
    UnresolvedReference { name: String },
    /// CTE references form a cycle, or point forward/at themselves.
    CyclicDependency { cycle_path: Vec<String> },
}

impl fmt::Display for ExtractErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractErrorKind::UnresolvedReference { name } => {
                write!(f, "unresolved reference '{}'", name)
            }
            ExtractErrorKind::CyclicDependency { cycle_path } => {
                write!(f, "cyclic dependency {}", cycle_path.join(" -> "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {span}")]
pub struct ExtractError {
    pub kind: ExtractErrorKind,
    pub span: SourceSpan,
    pub snippet: String,
}

impl ExtractError {
    pub fn unresolved(name: impl Into<String>, span: SourceSpan) -> Self {
        let name = name.into();
        Self {
            snippet: name.clone(),
            kind: ExtractErrorKind::UnresolvedReference { name },
            span,
        }
    }

    pub fn cycle(cycle_path: Vec<String>, span: SourceSpan) -> Self {
        Self {
            snippet: cycle_path.first().cloned().unwrap_or_default(),
            kind: ExtractErrorKind::CyclicDependency { cycle_path },
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteErrorKind {
    /// No rule in the table matches the construct's name and shape.
    NoRuleForConstruct { name: String },
}

impl fmt::Display for RewriteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteErrorKind::NoRuleForConstruct { name } => {
                write!(f, "no rule for construct '{}'", name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {span}: {detail}")]
pub struct RewriteError {
    pub kind: RewriteErrorKind,
    pub span: SourceSpan,
    pub snippet: String,
    pub detail: String,
}

impl RewriteError {
    pub fn no_rule(
        name: impl Into<String>,
        span: SourceSpan,
        snippet: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: RewriteErrorKind::NoRuleForConstruct { name: name.into() },
            span,
            snippet: snippet.into(),
            detail: detail.into(),
        }
    }

    /// Name of the construct that had no rule.
    pub fn name(&self) -> &str {
        match &self.kind {
            RewriteErrorKind::NoRuleForConstruct { name } => name,
        }
    }
}

/// The single error a failed compile reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Parse(e) => match e.kind {
                ParseErrorKind::UnsupportedSyntax => ErrorKind::UnsupportedSyntax,
            },
            CompileError::Extract(e) => match e.kind {
                ExtractErrorKind::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
                ExtractErrorKind::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            },
            CompileError::Rewrite(_) => ErrorKind::NoRuleForConstruct,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            CompileError::Parse(e) => e.span,
            CompileError::Extract(e) => e.span,
            CompileError::Rewrite(e) => e.span,
        }
    }

    pub fn snippet(&self) -> &str {
        match self {
            CompileError::Parse(e) => &e.snippet,
            CompileError::Extract(e) => &e.snippet,
            CompileError::Rewrite(e) => &e.snippet,
        }
    }

    /// Replace the stage-rendered snippet with the exact source text, when
    /// the span points into `source`.
    pub fn with_source_snippet(mut self, source: &str) -> Self {
        let span = self.span();
        if span.is_empty() {
            return self;
        }
        let text = snippet(source, span);
        if text.is_empty() {
            return self;
        }
        match &mut self {
            CompileError::Parse(e) => e.snippet = text,
            CompileError::Extract(e) => e.snippet = text,
            CompileError::Rewrite(e) => e.snippet = text,
        }
        self
    }
}

/// Text covered by `span`, collapsed onto one line and truncated.
pub fn snippet(source: &str, span: SourceSpan) -> String {
    if span.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = source.lines().collect();
    let start_line = span.start.line as usize;
    let Some(first) = lines.get(start_line.saturating_sub(1)) else {
        return String::new();
    };

    let start_col = (span.start.column as usize).saturating_sub(1);
    let single_line = span.end.line == span.start.line && span.end.column > span.start.column;
    let mut text: String = if single_line {
        let len = span.end.column as usize - span.start.column as usize;
        first.chars().skip(start_col).take(len).collect()
    } else if span.end.line > span.start.line {
        let end_line = (span.end.line as usize).min(lines.len());
        let mut parts: Vec<String> = vec![first.chars().skip(start_col).collect()];
        for (idx, line) in lines.iter().enumerate().take(end_line).skip(start_line) {
            if idx + 1 == end_line {
                let end_col = (span.end.column as usize).saturating_sub(1);
                parts.push(line.chars().take(end_col).collect());
            } else {
                parts.push((*line).to_string());
            }
        }
        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        first.chars().skip(start_col).collect()
    };

    text = text.trim().to_string();
    if text.chars().count() > MAX_SNIPPET_CHARS {
        let truncated: String = text.chars().take(MAX_SNIPPET_CHARS).collect();
        text = format!("{}...", truncated.trim_end());
    }
    text
}

/// Two-line excerpt: the source line of `span.start` and a caret marker
/// under the offending columns.
pub fn render_excerpt(source: &str, span: SourceSpan) -> String {
    if span.is_empty() {
        return String::new();
    }
    let Some(line) = source.lines().nth((span.start.line as usize).saturating_sub(1)) else {
        return String::new();
    };

    let start_col = (span.start.column as usize).saturating_sub(1);
    let prefix: String = line.chars().take(start_col).collect();
    let marked_len = if span.end.line == span.start.line && span.end.column > span.start.column {
        (span.end.column - span.start.column) as usize
    } else {
        1
    };
    let marked: String = line.chars().skip(start_col).take(marked_len).collect();

    let gutter = format!("{} | ", span.start.line);
    format!(
        "{}{}\n{}{}",
        gutter,
        line,
        " ".repeat(gutter.len() + prefix.width()),
        "^".repeat(marked.width().max(1))
    )
}
