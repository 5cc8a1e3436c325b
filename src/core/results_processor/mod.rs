use crate::core::config::ExtractionConfig;
use crate::core::error::QmError;
use crate::core::publisher::ResultPublisher;
use crate::core::tool_executor::{CommandRequest, ToolExecutor};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Field names reserved for record identity.
pub const IDENTITY_FIELDS: [&str; 4] = ["_id", "revision", "batch_name", "scenario"];

/// Prefix applied to value labels that collide with an identity field.
pub const VALUE_NAMESPACE: &str = "value:";

/// One scenario's summary values plus its composite identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub revision: u64,
    pub batch_name: String,
    pub scenario: String,
    #[serde(flatten)]
    pub values: IndexMap<String, f64>,
}

impl ResultRecord {
    pub fn new(revision: u64, batch_name: &str, scenario: &str, values: IndexMap<String, f64>) -> Self {
        let values = values
            .into_iter()
            .map(|(label, value)| {
                if IDENTITY_FIELDS.contains(&label.as_str()) {
                    tracing::warn!(
                        scenario,
                        label = %label,
                        "value label collides with an identity field, namespacing it"
                    );
                    (format!("{}{}", VALUE_NAMESPACE, label), value)
                } else {
                    (label, value)
                }
            })
            .collect();

        ResultRecord {
            id: record_id(revision, batch_name, scenario),
            revision,
            batch_name: batch_name.to_string(),
            scenario: scenario.to_string(),
            values,
        }
    }
}

/// Document id shared by every publication of the same (revision, batch, scenario).
pub fn record_id(revision: u64, batch_name: &str, scenario: &str) -> String {
    format!("{}::{}::{}", revision, batch_name, scenario)
}

/// Turns a solver artifact into a label → value table.
#[async_trait]
pub trait ArtifactDecoder: Send + Sync + 'static {
    async fn decode(&self, artifact: &Path, symbol: &str) -> Result<IndexMap<String, f64>, QmError>;
}

/// Decodes GDX artifacts through the `gdxdump` tool shipped with the solver.
pub struct GdxDumpDecoder {
    program: PathBuf,
    tools: ToolExecutor,
}

impl GdxDumpDecoder {
    pub fn new(program: impl Into<PathBuf>, tools: ToolExecutor) -> Self {
        GdxDumpDecoder {
            program: program.into(),
            tools,
        }
    }
}

#[async_trait]
impl ArtifactDecoder for GdxDumpDecoder {
    async fn decode(&self, artifact: &Path, symbol: &str) -> Result<IndexMap<String, f64>, QmError> {
        let cwd = artifact.parent().unwrap_or_else(|| Path::new("."));
        let request = CommandRequest::new("gdxdump", self.program.clone(), cwd)
            .arg(artifact.display().to_string())
            .arg(format!("symb={}", symbol))
            .arg("format=csv");

        let output = self
            .tools
            .run_checked(&request)
            .await
            .map_err(|err| QmError::ArtifactDecode {
                path: artifact.to_path_buf(),
                cause: err.to_string(),
            })?;

        parse_dump_csv(&output.stdout).map_err(|cause| QmError::ArtifactDecode {
            path: artifact.to_path_buf(),
            cause,
        })
    }
}

/// Parse a symbol dump: the leading identifier column is dropped, the remaining
/// dimension columns form the row label and the last column is the value.
pub fn parse_dump_csv(text: &str) -> Result<IndexMap<String, f64>, String> {
    let mut table = IndexMap::new();
    let mut first = true;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line)?;
        let is_first = std::mem::replace(&mut first, false);
        let last = fields.last().map(String::as_str).unwrap_or("");
        if is_first && parse_gams_value(last).is_err() {
            // header row
            continue;
        }
        if fields.len() < 3 {
            return Err(format!(
                "line {}: expected at least 3 columns, found {}",
                line_no + 1,
                fields.len()
            ));
        }

        let label = fields[1..fields.len() - 1].join(".");
        match parse_gams_value(last).map_err(|e| format!("line {}: {}", line_no + 1, e))? {
            Some(value) => {
                table.insert(label, value);
            }
            None => tracing::debug!(label = %label, raw = last, "skipping special value"),
        }
    }
    Ok(table)
}

/// `Eps` means zero; infinities and missing markers have no JSON representation.
fn parse_gams_value(raw: &str) -> Result<Option<f64>, String> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("eps") {
        return Ok(Some(0.0));
    }
    if ["+inf", "-inf", "inf", "na", "undf", "nan"]
        .iter()
        .any(|special| value.eq_ignore_ascii_case(special))
    {
        return Ok(None);
    }
    let parsed = value
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", value))?;
    Ok(parsed.is_finite().then_some(parsed))
}

fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    if in_quotes {
        return Err(format!("unterminated quote in '{}'", line));
    }
    fields.push(current);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

/// A scenario that could not be decoded or published.
#[derive(Debug)]
pub struct ScenarioFailure {
    pub scenario: String,
    pub error: QmError,
}

/// Outcome of one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    /// Ids of the records the store accepted.
    pub published: Vec<String>,
    pub failures: Vec<ScenarioFailure>,
}

impl ExtractionSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Scans the shared results location and publishes one record per artifact.
pub struct ResultExtractor {
    results_dir: PathBuf,
    config: ExtractionConfig,
    decoder: Arc<dyn ArtifactDecoder>,
    publisher: Arc<dyn ResultPublisher>,
}

impl ResultExtractor {
    pub fn new(
        results_dir: PathBuf,
        config: ExtractionConfig,
        decoder: Arc<dyn ArtifactDecoder>,
        publisher: Arc<dyn ResultPublisher>,
    ) -> Self {
        ResultExtractor {
            results_dir,
            config,
            decoder,
            publisher,
        }
    }

    /// Artifacts named `<prefix>*.<extension>`, sorted by file name.
    pub fn scan_artifacts(&self) -> Result<Vec<PathBuf>, QmError> {
        if !self.results_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.results_dir).map_err(|e| {
            QmError::io(format!("failed to list {}", self.results_dir.display()), e)
        })?;
        let mut artifacts: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.scenario_name(path).is_some())
            .collect();
        artifacts.sort();
        Ok(artifacts)
    }

    /// Glob-style name of the artifacts the solver is expected to leave, e.g. `res_*.gdx`.
    pub fn artifact_pattern(&self) -> String {
        format!(
            "{}*.{}",
            self.config.artifact_prefix, self.config.artifact_extension
        )
    }

    /// Scenario encoded in an artifact file name, e.g. `res_scenario7.gdx` → `scenario7`.
    pub fn scenario_name(&self, path: &Path) -> Option<String> {
        let extension = path.extension()?.to_str()?;
        if !extension.eq_ignore_ascii_case(&self.config.artifact_extension) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        stem.strip_prefix(&self.config.artifact_prefix)
            .map(str::to_string)
    }

    pub async fn extract_and_publish(
        &self,
        revision: u64,
        batch_name: &str,
    ) -> Result<ExtractionSummary, QmError> {
        let mut summary = ExtractionSummary::default();

        let artifacts = self.scan_artifacts()?;
        if artifacts.is_empty() {
            let error = QmError::ArtifactDecode {
                path: self.results_dir.clone(),
                cause: format!("solver produced no {} artifacts", self.artifact_pattern()),
            };
            tracing::warn!(batch = batch_name, code = error.code(), "{}", error);
            summary.failures.push(ScenarioFailure {
                scenario: self.artifact_pattern(),
                error,
            });
        }

        for artifact in artifacts {
            let Some(scenario) = self.scenario_name(&artifact) else {
                continue;
            };
            tracing::info!(batch = batch_name, scenario = %scenario, "processing artifact");

            let values = match self.decoder.decode(&artifact, &self.config.symbol).await {
                Ok(values) => values,
                Err(error) => {
                    tracing::warn!(scenario = %scenario, code = error.code(), "{}", error);
                    summary.failures.push(ScenarioFailure { scenario, error });
                    continue;
                }
            };

            let record = ResultRecord::new(revision, batch_name, &scenario, values);
            match self.publisher.publish(&record).await {
                Ok(()) => summary.published.push(record.id),
                Err(error) => {
                    tracing::warn!(scenario = %scenario, code = error.code(), "{}", error);
                    summary.failures.push(ScenarioFailure { scenario, error });
                }
            }
        }

        tracing::info!(
            batch = batch_name,
            published = summary.published.len(),
            failed = summary.failures.len(),
            "result extraction finished"
        );
        Ok(summary)
    }
}
