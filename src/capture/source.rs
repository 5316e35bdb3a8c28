//! Source-context reading and path scrubbing for exception entries

use crate::error::{Result, TelescopeError};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Replaces the project root in captured paths and stacks
pub const PROJECT_ROOT_PLACEHOLDER: &str = "[PROJECT_ROOT]";

/// Lines read above the faulting line
pub const LINES_BEFORE: u32 = 2;
/// Lines read below the faulting line
pub const LINES_AFTER: u32 = 2;

const REDACTED: &str = "***";

static STRING_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).unwrap());

static CHAR_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:\\.|[^'\\])'").unwrap());

static SECRET_ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(password|passwd|secret|token|api_?key|auth|credential)(s?)(\s*[:=]\s*)([^,;\s)]+)",
    )
    .unwrap()
});

static LONG_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{6,}\b").unwrap());

/// Strip literal and secret-looking content from one source line
pub fn sanitize_line(line: &str) -> String {
    let line = STRING_LITERAL_RE.replace_all(line, format!("\"{}\"", REDACTED).as_str());
    let line = CHAR_LITERAL_RE.replace_all(&line, format!("'{}'", REDACTED).as_str());
    let line = SECRET_ASSIGNMENT_RE.replace_all(&line, format!("$1$2$3{}", REDACTED).as_str());
    let line = LONG_NUMBER_RE.replace_all(&line, REDACTED);
    line.trim_end().to_string()
}

/// Replace the project root with [`PROJECT_ROOT_PLACEHOLDER`]
pub fn scrub_project_root(text: &str, root: Option<&Path>) -> String {
    match root.map(|r| r.to_string_lossy()) {
        Some(root) if !root.is_empty() && root != "/" => {
            let root = root.trim_end_matches('/');
            text.replace(root, PROJECT_ROOT_PLACEHOLDER)
        }
        _ => text.to_string(),
    }
}

/// Read the sanitized lines around `line` (1-based), clipped to the file
pub async fn read_context(path: &Path, line: u32) -> Result<BTreeMap<String, String>> {
    if line == 0 {
        return Err(TelescopeError::CaptureFailure(
            "line numbers are 1-based".to_string(),
        ));
    }

    let source = tokio::fs::read_to_string(path).await.map_err(|e| {
        TelescopeError::CaptureFailure(format!("cannot read {}: {}", path.display(), e))
    })?;

    let context = context_window(&source, line);
    if context.is_empty() {
        return Err(TelescopeError::CaptureFailure(format!(
            "line {} is outside {}",
            line,
            path.display()
        )));
    }

    Ok(context)
}

fn context_window(source: &str, line: u32) -> BTreeMap<String, String> {
    let first = line.saturating_sub(LINES_BEFORE).max(1);
    let last = line.saturating_add(LINES_AFTER);

    source
        .lines()
        .enumerate()
        .map(|(idx, text)| (idx as u32 + 1, text))
        .filter(|(number, _)| (first..=last).contains(number))
        .map(|(number, text)| (number.to_string(), sanitize_line(text)))
        .collect()
}
