//! Validation engine for rank specifications.
//!
//! Each [`ValidationRule`] looks at a [`RankSpec`](super::spec::RankSpec)
//! independently; the engine gathers their findings into one
//! [`ValidationReport`] instead of stopping at the first error.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use wikirank::pipeline::validation::ValidationEngine;
//!
//! let report = ValidationEngine::with_defaults().validate(&rank_spec);
//! for err in report.errors() {
//!     tracing::error!("{err}");
//! }
//! ```

use std::collections::HashMap;

use serde::Serialize;

use super::errors::{ErrorCode, RankSpecError};
use super::spec::RankSpec;
use crate::types::VariantKind;

// ─── Severity ───────────────────────────────────────────────────────────────

/// Errors reject the spec; warnings are logged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding: an error or warning wrapping a
/// [`RankSpecError`] with its code, path, message and hint.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub error: RankSpecError,
}

impl ValidationDiagnostic {
    pub fn error(err: RankSpecError) -> Self {
        Self {
            severity: Severity::Error,
            error: err,
        }
    }

    pub fn warning(err: RankSpecError) -> Self {
        Self {
            severity: Severity::Warning,
            error: err,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Every finding from one validation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Findings that reject the spec
    pub fn errors(&self) -> impl Iterator<Item = &RankSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &RankSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// No errors; warnings allowed
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects a [`RankSpec`] and returns zero or
/// more diagnostics.
///
/// Rules are stateless and must be `Send + Sync` so one engine can be shared
/// across threads.
pub trait ValidationRule: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"anchor"`).
    fn name(&self) -> &str;

    fn validate(&self, spec: &RankSpec) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s against a [`RankSpec`] and collects all
/// diagnostics into a [`ValidationReport`].
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parameter ranges, anchor wiring, runtime limits and unknown fields
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(RankParamsRule));
        engine.add_rule(Box::new(AnchorRule));
        engine.add_rule(Box::new(RuntimeLimitsRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn validate(&self, spec: &RankSpec) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            let found = rule.validate(spec);
            if !found.is_empty() {
                tracing::debug!(rule = rule.name(), count = found.len(), "spec diagnostics");
            }
            report.diagnostics.extend(found);
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. Rank parameters in range ────────────────────────────────────────────

struct RankParamsRule;

impl ValidationRule for RankParamsRule {
    fn name(&self) -> &str {
        "rank_params"
    }

    fn validate(&self, spec: &RankSpec) -> Vec<ValidationDiagnostic> {
        let rank = &spec.rank.config;
        let mut out = Vec::new();

        if !(rank.damping > 0.0 && rank.damping < 1.0) {
            out.push(ValidationDiagnostic::error(
                RankSpecError::new(
                    ErrorCode::InvalidValue,
                    "/rank/damping",
                    format!("damping must be in (0, 1), got {}", rank.damping),
                )
                .with_hint("0.85 is the usual choice"),
            ));
        }

        if !(rank.follow_prior.is_finite() && rank.follow_prior > 0.0) {
            out.push(ValidationDiagnostic::error(
                RankSpecError::new(
                    ErrorCode::InvalidValue,
                    "/rank/follow_prior",
                    format!("follow_prior must be positive, got {}", rank.follow_prior),
                )
                .with_hint("A zero follow prior makes links to off-topic articles unfollowable"),
            ));
        }

        if let Some(threshold) = rank.threshold {
            if !(threshold.is_finite() && threshold >= 0.0) {
                out.push(ValidationDiagnostic::error(RankSpecError::new(
                    ErrorCode::InvalidValue,
                    "/rank/threshold",
                    format!("threshold must be a finite non-negative number, got {threshold}"),
                )));
            }
        }

        if rank.max_iterations == 0 {
            out.push(ValidationDiagnostic::error(RankSpecError::new(
                ErrorCode::InvalidValue,
                "/rank/max_iterations",
                "max_iterations must be greater than 0",
            )));
        }

        out
    }
}

// ─── 2. Anchored variant placement and anchor presence ──────────────────────

struct AnchorRule;

impl ValidationRule for AnchorRule {
    fn name(&self) -> &str {
        "anchor"
    }

    fn validate(&self, spec: &RankSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();

        if spec.global == VariantKind::Anchored {
            out.push(ValidationDiagnostic::error(
                RankSpecError::new(
                    ErrorCode::InvalidCombo,
                    "/global",
                    "the global slot can't use the anchored variant",
                )
                .with_hint("Use topic_sensitive or link_weighted for global"),
            ));
        }

        if spec.uses_anchor() && spec.anchor.is_none() {
            out.push(ValidationDiagnostic::error(
                RankSpecError::new(
                    ErrorCode::MissingField,
                    "/anchor",
                    "the anchored variant requires an anchor",
                )
                .with_hint("Set anchor to an article id or title"),
            ));
        }

        if !spec.uses_anchor() && spec.anchor.is_some() {
            out.push(ValidationDiagnostic::warning(
                RankSpecError::new(
                    ErrorCode::InvalidCombo,
                    "/anchor",
                    "anchor is ignored without an anchored variant",
                )
                .with_hint("Set personalized to \"anchored\" or remove anchor"),
            ));
        }

        out
    }
}

// ─── 3. Runtime limits must be positive when set ────────────────────────────

struct RuntimeLimitsRule;

impl ValidationRule for RuntimeLimitsRule {
    fn name(&self) -> &str {
        "runtime_limits"
    }

    fn validate(&self, spec: &RankSpec) -> Vec<ValidationDiagnostic> {
        let checks: &[(&str, Option<usize>)] = &[
            ("threads", spec.runtime.threads),
            ("insert_batch_size", Some(spec.runtime.insert_batch_size)),
            ("fetch_batch_size", Some(spec.runtime.fetch_batch_size)),
        ];

        checks
            .iter()
            .filter(|(_, value)| *value == Some(0))
            .map(|(field, _)| {
                ValidationDiagnostic::error(
                    RankSpecError::new(
                        ErrorCode::LimitExceeded,
                        format!("/runtime/{field}"),
                        format!("{field} must be greater than 0"),
                    )
                    .with_hint(format!("Remove {field} to use the default, or set it to a positive value")),
                )
            })
            .collect()
    }
}

// ─── 4. Unknown fields (strict → error, non-strict → warning) ──────────────

struct UnknownFieldsRule;

impl UnknownFieldsRule {
    /// Collect unknown-field diagnostics at the given JSON pointer `path`
    /// from the extra fields captured by `#[serde(flatten)]`.
    fn check_unknowns(
        path: &str,
        unknowns: &HashMap<String, serde_json::Value>,
        strict: bool,
    ) -> Vec<ValidationDiagnostic> {
        let diag_fn = if strict {
            ValidationDiagnostic::error
        } else {
            ValidationDiagnostic::warning
        };
        unknowns
            .keys()
            .map(|key| {
                diag_fn(
                    RankSpecError::new(
                        ErrorCode::UnknownField,
                        format!("{path}/{key}"),
                        format!("unrecognized field \"{key}\""),
                    )
                    .with_hint("Check spelling or remove this field"),
                )
            })
            .collect()
    }
}

impl ValidationRule for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, spec: &RankSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Self::check_unknowns("", &spec.unknown_fields, spec.strict);
        out.extend(Self::check_unknowns(
            "/rank",
            &spec.rank.unknown_fields,
            spec.strict,
        ));
        out.extend(Self::check_unknowns(
            "/runtime",
            &spec.runtime.unknown_fields,
            spec.strict,
        ));
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: build a RankSpec from JSON.
    fn spec(json: &str) -> RankSpec {
        serde_json::from_str(json).unwrap()
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::with_defaults()
    }

    // ─── Valid specs ────────────────────────────────────────────────────

    #[test]
    fn test_minimal_spec_is_valid() {
        let report = engine().validate(&spec(r#"{ "v": 1 }"#));
        assert!(report.is_valid());
        assert!(report.is_empty());
    }

    #[test]
    fn test_anchored_with_anchor_is_valid() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "personalized": "anchored", "anchor": "Alan Turing" }"#,
        ));
        assert!(report.is_empty());
    }

    #[test]
    fn test_zero_threshold_is_valid() {
        let report = engine().validate(&spec(r#"{ "v": 1, "rank": { "threshold": 0.0 } }"#));
        assert!(report.is_valid());
    }

    // ─── Rule: rank_params ──────────────────────────────────────────────

    #[test]
    fn test_damping_out_of_range_fails() {
        for damping in ["0.0", "1.0", "1.5", "-0.2"] {
            let report = engine().validate(&spec(&format!(
                r#"{{ "v": 1, "rank": {{ "damping": {damping} }} }}"#
            )));
            let errs: Vec<_> = report.errors().collect();
            assert_eq!(errs.len(), 1, "damping {damping}");
            assert_eq!(errs[0].code, ErrorCode::InvalidValue);
            assert_eq!(errs[0].path, "/rank/damping");
        }
    }

    #[test]
    fn test_bad_follow_prior_and_iterations_report_two_errors() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "rank": { "follow_prior": 0.0, "max_iterations": 0 } }"#,
        ));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().any(|e| e.path == "/rank/follow_prior"));
        assert!(errs.iter().any(|e| e.path == "/rank/max_iterations"));
    }

    #[test]
    fn test_negative_threshold_fails() {
        let report = engine().validate(&spec(r#"{ "v": 1, "rank": { "threshold": -1e-6 } }"#));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/rank/threshold");
    }

    // ─── Rule: anchor ───────────────────────────────────────────────────

    #[test]
    fn test_anchored_without_anchor_fails() {
        let report = engine().validate(&spec(r#"{ "v": 1, "personalized": "anchored" }"#));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, ErrorCode::MissingField);
        assert_eq!(errs[0].path, "/anchor");
    }

    #[test]
    fn test_anchored_global_fails() {
        let report = engine().validate(&spec(r#"{ "v": 1, "global": "anchored", "anchor": 3 }"#));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, ErrorCode::InvalidCombo);
        assert_eq!(errs[0].path, "/global");
    }

    #[test]
    fn test_unused_anchor_is_warning() {
        let report = engine().validate(&spec(r#"{ "v": 1, "anchor": 3 }"#));
        assert!(report.is_valid());
        let warns: Vec<_> = report.warnings().collect();
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].path, "/anchor");
    }

    // ─── Rule: runtime_limits ───────────────────────────────────────────

    #[test]
    fn test_zero_threads_fails() {
        let report = engine().validate(&spec(r#"{ "v": 1, "runtime": { "threads": 0 } }"#));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, ErrorCode::LimitExceeded);
        assert!(errs[0].path.contains("threads"));
    }

    #[test]
    fn test_zero_batch_sizes_report_two_errors() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "runtime": { "insert_batch_size": 0, "fetch_batch_size": 0 } }"#,
        ));
        assert_eq!(report.errors().count(), 2);
    }

    #[test]
    fn test_zero_headroom_is_fine() {
        let report = engine().validate(&spec(r#"{ "v": 1, "runtime": { "headroom": 0 } }"#));
        assert!(report.is_valid());
    }

    // ─── Rule: unknown_fields (strict mode) ─────────────────────────────

    #[test]
    fn test_unknown_fields_non_strict_are_warnings() {
        let report = engine().validate(&spec(r#"{ "v": 1, "strict": false, "bogus": 42 }"#));
        assert!(report.is_valid());
        let warns: Vec<_> = report.warnings().collect();
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].code, ErrorCode::UnknownField);
        assert!(warns[0].path.contains("bogus"));
    }

    #[test]
    fn test_unknown_fields_strict_are_errors() {
        let report = engine().validate(&spec(r#"{ "v": 1, "strict": true, "bogus": 42 }"#));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, ErrorCode::UnknownField);
    }

    #[test]
    fn test_unknown_runtime_field_strict() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "strict": true, "runtime": { "max_threads": 8 } }"#,
        ));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/runtime/max_threads");
    }

    #[test]
    fn test_unknown_rank_field_strict() {
        let report = engine().validate(&spec(
            r#"{ "v": 1, "strict": true, "rank": { "treshold": 1e-9 } }"#,
        ));
        let errs: Vec<_> = report.errors().collect();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, ErrorCode::UnknownField);
        assert_eq!(errs[0].path, "/rank/treshold");
    }

    #[test]
    fn test_unknown_rank_field_non_strict_is_warning() {
        let report = engine().validate(&spec(r#"{ "v": 1, "rank": { "dampng": 0.9 } }"#));
        assert!(report.is_valid());
        let warns: Vec<_> = report.warnings().collect();
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].path, "/rank/dampng");
    }

    // ─── Engine ─────────────────────────────────────────────────────────

    #[test]
    fn test_multiple_rules_fire_independently() {
        let report = engine().validate(&spec(
            r#"{
                "v": 1,
                "strict": true,
                "bogus": true,
                "personalized": "anchored",
                "runtime": { "threads": 0 }
            }"#,
        ));
        assert_eq!(report.errors().count(), 3);
    }

    #[test]
    fn test_custom_rule() {
        struct AlwaysWarnRule;
        impl ValidationRule for AlwaysWarnRule {
            fn name(&self) -> &str {
                "always_warn"
            }
            fn validate(&self, _spec: &RankSpec) -> Vec<ValidationDiagnostic> {
                vec![ValidationDiagnostic::warning(RankSpecError::new(
                    ErrorCode::ValidationFailed,
                    "",
                    "custom warning",
                ))]
            }
        }

        let mut eng = ValidationEngine::new();
        eng.add_rule(Box::new(AlwaysWarnRule));
        let report = eng.validate(&spec(r#"{ "v": 1 }"#));
        assert!(report.is_valid());
        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = engine().validate(&spec(r#"{ "v": 1, "personalized": "anchored" }"#));
        let json = serde_json::to_value(&report).unwrap();
        let diags = json["diagnostics"].as_array().unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0]["severity"], "error");
        assert_eq!(diags[0]["code"], "missing_field");
    }
}
