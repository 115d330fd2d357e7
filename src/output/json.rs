use serde::Serialize;

use crate::analyzer::AnalysisResult;
use crate::output::{coverage, Coverage, FileReport};

/// The JSON report envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub version: &'static str,
    pub coverage: Coverage,
    pub results: Vec<FileReport>,
}

pub fn report(results: &[AnalysisResult]) -> JsonReport {
    JsonReport {
        version: "1.0",
        coverage: coverage(results),
        results: results.iter().map(FileReport::from).collect(),
    }
}

pub fn render(results: &[AnalysisResult]) -> crate::Result<String> {
    Ok(serde_json::to_string_pretty(&report(results))?)
}
