use std::collections::BTreeSet;

use serde::Serialize;

use crate::analyzer::AnalysisResult;
use crate::pg_types::risk::RiskLevel;
use crate::policy::Severity;
use crate::rule_data;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sarif {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<Run>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Run {
    tool: Tool,
    results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    driver: Driver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Driver {
    name: &'static str,
    information_uri: &'static str,
    rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifRule {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    short_description: Option<Text>,
}

#[derive(Debug, Serialize)]
struct Text {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    rule_id: String,
    level: &'static str,
    message: Text,
    locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    physical_location: PhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PhysicalLocation {
    artifact_location: ArtifactLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactLocation {
    uri: String,
}

fn risk_level(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Critical | RiskLevel::High => "error",
        RiskLevel::Medium => "warning",
        RiskLevel::Low | RiskLevel::Safe => "note",
    }
}

fn severity_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    }
}

fn location(path: &str) -> Vec<Location> {
    vec![Location {
        physical_location: PhysicalLocation {
            artifact_location: ArtifactLocation {
                uri: path.to_string(),
            },
        },
    }]
}

/// Build the SARIF 2.1.0 report: one run, every distinct rule ID that
/// produced a result registered as a SARIF rule, policy rule IDs prefixed
/// with `policy-`.
pub fn render(results: &[AnalysisResult]) -> crate::Result<String> {
    let mut sarif_results = Vec::new();
    let mut seen_rules: BTreeSet<String> = BTreeSet::new();

    for file in results {
        for check in &file.checks {
            seen_rules.insert(check.rule_id.clone());
            sarif_results.push(SarifResult {
                rule_id: check.rule_id.clone(),
                level: risk_level(check.effective_risk()),
                message: Text {
                    text: check.message.clone(),
                },
                locations: location(&file.path),
            });
        }
        for violation in &file.violations {
            let rule_id = format!("policy-{}", violation.rule_id);
            seen_rules.insert(rule_id.clone());
            sarif_results.push(SarifResult {
                rule_id,
                level: severity_level(violation.severity),
                message: Text {
                    text: violation.message.clone(),
                },
                locations: location(&file.path),
            });
        }
    }

    let rules = seen_rules
        .into_iter()
        .map(|id| SarifRule {
            short_description: rule_data::data_by_id(&id).map(|data| Text {
                text: data.condition.to_string(),
            }),
            id,
        })
        .collect();

    let report = Sarif {
        schema: "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        version: "2.1.0",
        runs: vec![Run {
            tool: Tool {
                driver: Driver {
                    name: "pgfence",
                    information_uri: "https://pgfence.dev",
                    rules,
                },
            },
            results: sarif_results,
        }],
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
