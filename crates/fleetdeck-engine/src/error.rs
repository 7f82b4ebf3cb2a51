//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::suggestions::{
    AVAILABLE_FILTERS, extract_quoted_name, suggest_unknown_filter, suggest_unknown_function,
};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller-correctable input problem, raised before any evaluation
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Failed to compile expression `{expression}`: {message}")]
    Compile { expression: String, message: String },

    #[error("Failed to evaluate expression `{expression}`: {message}")]
    Eval { expression: String, message: String },

    #[error("Failed to resolve placeholder `${{{expression}}}`: {source}")]
    Placeholder {
        expression: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn compile(expression: impl Into<String>, message: impl ToString) -> Self {
        Self::Compile {
            expression: expression.into(),
            message: message.to_string(),
        }
    }

    pub fn eval(expression: impl Into<String>, message: impl ToString) -> Self {
        Self::Eval {
            expression: expression.into(),
            message: message.to_string(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Whether the error was caused by malformed expression or template syntax
    pub fn is_syntax_error(&self) -> bool {
        match self {
            Self::Compile { .. } => true,
            Self::Template(t) => t.kind == TemplateErrorKind::SyntaxError,
            Self::Placeholder { source, .. } => source.is_syntax_error(),
            _ => false,
        }
    }
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    /// Convert to a code string for diagnostics
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UnknownFilter => "unknown_filter",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "render",
        }
    }
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(fleetdeck::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a new template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, name: &str, source: &str) -> Self {
        let kind = categorize(&err);
        let message = clean_message(&err.to_string());
        let span = err.line().and_then(|line| calculate_span(source, line));
        let suggestion = generate_suggestion(&err, kind, source);

        Self {
            message,
            kind,
            src: NamedSource::new(name, source.to_string()),
            span,
            suggestion,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    match err.kind() {
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    }
}

fn clean_message(msg: &str) -> String {
    msg.replace("invalid operation: ", "")
        .replace("syntax error: ", "")
}

/// Calculate the source span for a given line number
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, line) in source.lines().enumerate() {
        if index + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }

    None
}

fn generate_suggestion(
    err: &minijinja::Error,
    kind: TemplateErrorKind,
    source: &str,
) -> Option<String> {
    let detailed = format!("{:#}", err);

    match kind {
        TemplateErrorKind::UnknownFilter => extract_filter_from_display(&detailed)
            .or_else(|| find_unregistered_filter(source))
            .and_then(|name| suggest_unknown_filter(&name)),
        TemplateErrorKind::UnknownFunction => extract_quoted_name(&err.to_string())
            .and_then(|name| suggest_unknown_function(&name)),
        TemplateErrorKind::SyntaxError => Some(
            "Check the template syntax: expressions use `{{ ... }}` and blocks use `{% ... %}`"
                .to_string(),
        ),
        _ => None,
    }
}

/// Extract the filter name from MiniJinja's detailed display
///
/// The error line is marked with `>`, e.g.
/// `   1 > host: {{ global.region | uper }}`
fn extract_filter_from_display(display: &str) -> Option<String> {
    for line in display.lines() {
        let trimmed = line.trim_start();
        if !(trimmed.contains(" > ") || trimmed.starts_with("> ")) {
            continue;
        }
        let start = line.find("{{")?;
        let end = line[start..].find("}}")?;
        let expr = &line[start + 2..start + end];
        let pipe = expr.rfind('|')?;
        let name = expr[pipe + 1..]
            .trim()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()?;
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    None
}

/// First `| name` in the template source that is not a registered filter
fn find_unregistered_filter(source: &str) -> Option<String> {
    source
        .split('|')
        .skip(1)
        .filter_map(|rest| {
            let name: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            (!name.is_empty()).then_some(name)
        })
        .find(|name| !AVAILABLE_FILTERS.contains(&name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_span() {
        let source = "line one\nline two\nline three";
        let span = calculate_span(source, 2).unwrap();
        assert_eq!(span.offset(), 9);
        assert_eq!(span.len(), 8);
        assert!(calculate_span(source, 7).is_none());
    }

    #[test]
    fn test_extract_filter_from_display() {
        let display = "   1 > host: {{ global.region | uper }}\n     i          ^^^^ unknown filter";
        assert_eq!(
            extract_filter_from_display(display),
            Some("uper".to_string())
        );
    }

    #[test]
    fn test_find_unregistered_filter() {
        assert_eq!(
            find_unregistered_filter("{{ a | upper | toyml }}"),
            Some("toyml".to_string())
        );
        assert_eq!(find_unregistered_filter("{{ a | upper }}"), None);
    }

    #[test]
    fn test_placeholder_error_message() {
        let err = EngineError::Placeholder {
            expression: "global.missing".to_string(),
            source: Box::new(EngineError::eval("global.missing", "No such key: missing")),
        };
        let text = err.to_string();
        assert!(text.contains("${global.missing}"));
        assert!(text.contains("No such key"));
    }

    #[test]
    fn test_is_syntax_error() {
        assert!(EngineError::compile("1 +", "unexpected end").is_syntax_error());
        assert!(!EngineError::eval("a.b", "no such key").is_syntax_error());
    }
}
