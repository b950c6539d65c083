//! Schema validation for raw review reports
//!
//! The external reviewer is an opaque capability with unpredictable output,
//! so nothing downstream touches a report until it has passed through here.
//! Violations are collected exhaustively rather than fail-fast, so a
//! producer can fix every problem in one pass.

use serde_json::{Map, Value};

use super::ReviewReport;
use crate::error::{ValidationError, Violation};

/// The report schema version this validator enforces
pub const SCHEMA_VERSION: u32 = 1;

const SEVERITY_VALUES: [&str; 4] = ["blocker", "major", "minor", "nit"];
const STATUS_VALUES: [&str; 3] = ["open", "fixed", "wontfix"];

const REQUIRED_FIELDS: [&str; 3] = ["scope_id", "round", "findings"];
const KNOWN_FIELDS: [&str; 6] = [
    "schema_version",
    "scope_id",
    "round",
    "findings",
    "summary",
    "generated_at",
];
const FINDING_REQUIRED_FIELDS: [&str; 5] = ["id", "severity", "category", "description", "status"];
const FINDING_KNOWN_FIELDS: [&str; 6] = [
    "id",
    "severity",
    "category",
    "description",
    "location",
    "status",
];

/// Validates raw report JSON against the published schema contract
///
/// Unknown top-level fields are rejected unless explicitly allow-listed;
/// forward compatibility is handled by versioning the schema, not by
/// silently accepting unknown shapes.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    allowed_extra: Vec<String>,
}

impl SchemaValidator {
    /// Create a validator with no extra allow-listed fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow an additional top-level field to pass validation
    ///
    /// Allow-listed fields are checked for presence only and dropped from
    /// the typed report.
    pub fn allow_field(mut self, name: impl Into<String>) -> Self {
        self.allowed_extra.push(name.into());
        self
    }

    /// Validate a raw report, collecting every violation
    pub fn validate(&self, raw: &Value) -> Result<ReviewReport, ValidationError> {
        let Some(obj) = raw.as_object() else {
            return Err(ValidationError::new(vec![Violation::new(
                "(root)",
                "must be a JSON object",
            )]));
        };

        let mut violations: Vec<Violation> = Vec::new();

        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                violations.push(Violation::new(field, "required field is missing"));
            }
        }

        for key in obj.keys() {
            if !KNOWN_FIELDS.contains(&key.as_str())
                && !self.allowed_extra.iter().any(|a| a == key)
            {
                violations.push(Violation::new(
                    key.clone(),
                    format!("unrecognized field (schema v{})", SCHEMA_VERSION),
                ));
            }
        }

        if let Some(version) = obj.get("schema_version") {
            match version.as_u64() {
                Some(v) if v == u64::from(SCHEMA_VERSION) => {}
                Some(v) => violations.push(Violation::new(
                    "schema_version",
                    format!("unsupported schema version {} (supported: {})", v, SCHEMA_VERSION),
                )),
                None => violations.push(Violation::new(
                    "schema_version",
                    "must be a positive integer",
                )),
            }
        }

        if let Some(scope_id) = obj.get("scope_id") {
            match scope_id.as_str() {
                Some(s) if !s.is_empty() => {}
                _ => violations.push(Violation::new("scope_id", "must be a non-empty string")),
            }
        }

        if let Some(round) = obj.get("round") {
            match round.as_u64() {
                Some(r) if r >= 1 && r <= u64::from(u32::MAX) => {}
                _ => violations.push(Violation::new("round", "must be a positive integer")),
            }
        }

        if let Some(summary) = obj.get("summary") {
            if !summary.is_string() {
                violations.push(Violation::new("summary", "must be a string"));
            }
        }

        if let Some(generated_at) = obj.get("generated_at") {
            match generated_at.as_str() {
                Some(s) if chrono::DateTime::parse_from_rfc3339(s).is_ok() => {}
                _ => violations.push(Violation::new(
                    "generated_at",
                    "must be an RFC 3339 timestamp string",
                )),
            }
        }

        if let Some(findings) = obj.get("findings") {
            match findings.as_array() {
                Some(items) => validate_findings(items, &mut violations),
                None => violations.push(Violation::new("findings", "must be an array")),
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        self.into_typed(obj)
    }

    /// Deserialize the validated object, dropping allow-listed extras
    fn into_typed(&self, obj: &Map<String, Value>) -> Result<ReviewReport, ValidationError> {
        let mut known: Map<String, Value> = Map::new();
        for (key, value) in obj {
            if KNOWN_FIELDS.contains(&key.as_str()) {
                known.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(Value::Object(known)).map_err(|e| {
            ValidationError::new(vec![Violation::new("(root)", format!("malformed report: {}", e))])
        })
    }
}

fn validate_findings(items: &[Value], violations: &mut Vec<Violation>) {
    let mut seen_ids: Vec<String> = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        let at = |field: &str| format!("findings[{}].{}", idx, field);

        let Some(finding) = item.as_object() else {
            violations.push(Violation::new(
                format!("findings[{}]", idx),
                "must be an object",
            ));
            continue;
        };

        for field in FINDING_REQUIRED_FIELDS {
            if !finding.contains_key(field) {
                violations.push(Violation::new(at(field), "required field is missing"));
            }
        }

        for key in finding.keys() {
            if !FINDING_KNOWN_FIELDS.contains(&key.as_str()) {
                violations.push(Violation::new(at(key), "unrecognized field"));
            }
        }

        if let Some(id) = finding.get("id") {
            match id.as_str() {
                Some(s) if !s.is_empty() => {
                    if seen_ids.iter().any(|seen| seen == s) {
                        violations.push(Violation::new(at("id"), "duplicate finding id"));
                    } else {
                        seen_ids.push(s.to_string());
                    }
                }
                _ => violations.push(Violation::new(at("id"), "must be a non-empty string")),
            }
        }

        if let Some(severity) = finding.get("severity") {
            match severity.as_str() {
                Some(s) if SEVERITY_VALUES.contains(&s) => {}
                _ => violations.push(Violation::new(
                    at("severity"),
                    format!("invalid enum value (allowed: {})", SEVERITY_VALUES.join(", ")),
                )),
            }
        }

        if let Some(status) = finding.get("status") {
            match status.as_str() {
                Some(s) if STATUS_VALUES.contains(&s) => {}
                _ => violations.push(Violation::new(
                    at("status"),
                    format!("invalid enum value (allowed: {})", STATUS_VALUES.join(", ")),
                )),
            }
        }

        for field in ["category", "description"] {
            if let Some(value) = finding.get(field) {
                match value.as_str() {
                    Some(s) if !s.is_empty() => {}
                    _ => violations.push(Violation::new(at(field), "must be a non-empty string")),
                }
            }
        }

        if let Some(location) = finding.get("location") {
            if !location.is_string() && !location.is_null() {
                violations.push(Violation::new(at("location"), "must be a string when present"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::report::{FindingStatus, Severity};

    fn valid_raw() -> Value {
        json!({
            "scope_id": "SC-1",
            "round": 1,
            "findings": [{
                "id": "f1",
                "severity": "blocker",
                "status": "open",
                "category": "x",
                "description": "d"
            }]
        })
    }

    fn rules_for<'a>(err: &'a ValidationError, path: &str) -> Vec<&'a str> {
        err.violations
            .iter()
            .filter(|v| v.path == path)
            .map(|v| v.rule.as_str())
            .collect()
    }

    #[test]
    fn test_minimal_valid_report() {
        let report = SchemaValidator::new().validate(&valid_raw()).unwrap();
        assert_eq!(report.scope_id, "SC-1");
        assert_eq!(report.round, 1);
        assert_eq!(report.schema_version, SCHEMA_VERSION);
        assert_eq!(report.findings[0].severity, Severity::Blocker);
        assert_eq!(report.findings[0].status, FindingStatus::Open);
        assert_eq!(report.open_count(), 1);
    }

    #[test]
    fn test_invalid_severity_enum() {
        let mut raw = valid_raw();
        raw["findings"][0]["severity"] = json!("critical");

        let err = SchemaValidator::new().validate(&raw).unwrap_err();
        let rules = rules_for(&err, "findings[0].severity");
        assert_eq!(rules.len(), 1);
        assert!(rules[0].contains("invalid enum value"));
    }

    #[test]
    fn test_violations_are_collected_not_fail_fast() {
        let raw = json!({
            "scope_id": "",
            "round": 0,
            "findings": [{
                "id": "f1",
                "severity": "critical",
                "status": "maybe",
                "category": "x",
                "description": "d"
            }],
            "mystery": true
        });

        let err = SchemaValidator::new().validate(&raw).unwrap_err();
        let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"scope_id"));
        assert!(paths.contains(&"round"));
        assert!(paths.contains(&"findings[0].severity"));
        assert!(paths.contains(&"findings[0].status"));
        assert!(paths.contains(&"mystery"));
    }

    #[test]
    fn test_unknown_field_rejected_unless_allow_listed() {
        let mut raw = valid_raw();
        raw["reviewer_notes"] = json!("extra");

        assert!(SchemaValidator::new().validate(&raw).is_err());

        let report = SchemaValidator::new()
            .allow_field("reviewer_notes")
            .validate(&raw)
            .unwrap();
        // Allow-listed extras are dropped from the typed report
        assert_eq!(report.scope_id, "SC-1");
    }

    #[test]
    fn test_unsupported_schema_version_rejected() {
        let mut raw = valid_raw();
        raw["schema_version"] = json!(2);

        let err = SchemaValidator::new().validate(&raw).unwrap_err();
        assert!(rules_for(&err, "schema_version")[0].contains("unsupported schema version 2"));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = SchemaValidator::new().validate(&json!({})).unwrap_err();
        let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert!(paths.contains(&"scope_id"));
        assert!(paths.contains(&"round"));
        assert!(paths.contains(&"findings"));
    }

    #[test]
    fn test_duplicate_finding_ids_rejected() {
        let raw = json!({
            "scope_id": "SC-1",
            "round": 1,
            "findings": [
                {"id": "f1", "severity": "minor", "status": "open", "category": "a", "description": "d"},
                {"id": "f1", "severity": "nit", "status": "open", "category": "b", "description": "e"}
            ]
        });

        let err = SchemaValidator::new().validate(&raw).unwrap_err();
        assert_eq!(rules_for(&err, "findings[1].id"), vec!["duplicate finding id"]);
    }

    #[test]
    fn test_non_object_root() {
        let err = SchemaValidator::new().validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.violations[0].path, "(root)");
    }

    #[test]
    fn test_bad_generated_at() {
        let mut raw = valid_raw();
        raw["generated_at"] = json!("yesterday");

        let err = SchemaValidator::new().validate(&raw).unwrap_err();
        assert!(rules_for(&err, "generated_at")[0].contains("RFC 3339"));
    }

    #[test]
    fn test_null_location_tolerated() {
        let mut raw = valid_raw();
        raw["findings"][0]["location"] = json!(null);

        let report = SchemaValidator::new().validate(&raw).unwrap();
        assert!(report.findings[0].location.is_none());
    }
}
