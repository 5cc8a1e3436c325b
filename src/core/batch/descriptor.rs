use crate::core::error::QmError;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// A batch-job definition file in the GUI folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDescriptor {
    /// File base name without extension; names the archive folder.
    pub name: String,
    pub file_name: String,
    pub path: PathBuf,
}

impl BatchDescriptor {
    pub fn from_path(path: &Path) -> Result<Self, QmError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| QmError::Config(format!("invalid descriptor path {}", path.display())))?
            .to_string();
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or(&file_name)
            .to_string();
        Ok(BatchDescriptor {
            name,
            file_name,
            path: path.to_path_buf(),
        })
    }
}

/// Compile-only descriptor that no sweep ever runs.
pub const COMPILATION_BATCH: &str = "batch_test_compilation.txt";

/// List the descriptors a sweep runs: those matching `pattern` in `gui_dir`,
/// minus [`COMPILATION_BATCH`] and the `excluded` file names.
///
/// Results are sorted by file name so sweeps run in a stable order.
pub fn discover(
    gui_dir: &Path,
    pattern: &str,
    excluded: &[String],
) -> Result<Vec<BatchDescriptor>, QmError> {
    matching(gui_dir, pattern, |file_name| {
        file_name == COMPILATION_BATCH || excluded.iter().any(|e| e == file_name)
    })
}

/// Resolve one descriptor by batch name (`batch_test_x`) or file name (`batch_test_x.txt`).
///
/// Exclusions do not apply here, an explicitly named batch always resolves.
pub fn find(gui_dir: &Path, pattern: &str, batch: &str) -> Result<BatchDescriptor, QmError> {
    let candidates = matching(gui_dir, pattern, |_| false)?;
    candidates
        .into_iter()
        .find(|d| d.name == batch || d.file_name == batch)
        .ok_or_else(|| {
            QmError::Config(format!(
                "no batch descriptor '{}' in {}",
                batch,
                gui_dir.display()
            ))
        })
}

fn matching(
    gui_dir: &Path,
    pattern: &str,
    skip: impl Fn(&str) -> bool,
) -> Result<Vec<BatchDescriptor>, QmError> {
    let matcher = pattern_to_regex(pattern)?;
    let entries = fs::read_dir(gui_dir).map_err(|e| {
        QmError::io(
            format!("failed to list batch descriptors in {}", gui_dir.display()),
            e,
        )
    })?;

    let mut descriptors = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !matcher.is_match(file_name) || skip(file_name) {
            continue;
        }
        descriptors.push(BatchDescriptor::from_path(&path)?);
    }
    descriptors.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(descriptors)
}

/// Translate a `*`/`?` file name pattern into an anchored regex.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex, QmError> {
    if pattern.trim().is_empty() {
        return Err(QmError::Config("paths.batch_pattern cannot be empty".to_string()));
    }
    if pattern.contains('/') || pattern.contains('\\') {
        return Err(QmError::Config(format!(
            "paths.batch_pattern '{}' must not contain directories",
            pattern
        )));
    }

    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| QmError::Config(format!("paths.batch_pattern: {}", e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Directive {
        key: String,
        value: String,
        /// Original text, dropped once the value is changed.
        raw: Option<String>,
    },
    Text(String),
}

/// A descriptor parsed into ordered `key = value` directives and opaque lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveSet {
    lines: Vec<Line>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl DirectiveSet {
    pub fn parse(content: &str) -> Self {
        let line_ending = if content.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        let lines = content.lines().map(parse_line).collect();
        DirectiveSet {
            lines,
            line_ending,
            trailing_newline: content.ends_with('\n'),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Value of the first directive named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Directive { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set every directive named `key`; returns how many lines matched.
    pub fn set(&mut self, key: &str, new_value: &str) -> usize {
        self.update(key, |_| true, new_value)
    }

    /// Set directives named `key` whose value equals `from` (ASCII case-insensitive).
    pub fn replace_value(&mut self, key: &str, from: &str, to: &str) -> usize {
        self.update(key, |value| value.eq_ignore_ascii_case(from), to)
    }

    fn update<F>(&mut self, key: &str, matches: F, new_value: &str) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut count = 0;
        for line in &mut self.lines {
            if let Line::Directive { key: k, value, raw } = line {
                if k == key && matches(value) {
                    count += 1;
                    if value != new_value {
                        *value = new_value.to_string();
                        *raw = None;
                    }
                }
            }
        }
        count
    }

    pub fn serialize(&self) -> String {
        let ending = self.line_ending.as_str();
        let mut out = String::new();
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                out.push_str(ending);
            }
            match line {
                Line::Directive {
                    raw: Some(raw), ..
                } => out.push_str(raw),
                Line::Directive { key, value, .. } => {
                    out.push_str(key);
                    out.push_str(" = ");
                    out.push_str(value);
                }
                Line::Text(text) => out.push_str(text),
            }
        }
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(ending);
        }
        out
    }
}

fn parse_line(line: &str) -> Line {
    if let Some((key, value)) = line.split_once('=') {
        let key = key.trim();
        if !key.is_empty() {
            return Line::Directive {
                key: key.to_string(),
                value: value.trim().to_string(),
                raw: Some(line.to_string()),
            };
        }
    }
    Line::Text(line.to_string())
}
