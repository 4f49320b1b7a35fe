use crate::field_table::{field_kind_of, field_name_set, FieldKind, PrimKind, FIELD_TABLE};
use serde_json::Value;
use std::collections::HashMap;

/// Options accepted by `validate` (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    /// When `false` (the default used by transformers, spec.md §4.2),
    /// any key outside the 32-field table is reported in `extras`.
    pub allow_extras: bool,
    /// When `false`, type compatibility is skipped and only presence is
    /// checked. Always `true` in production use; exposed for drift-only
    /// presence audits.
    pub check_types: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        ValidateOptions {
            allow_extras: false,
            check_types: true,
        }
    }
}

/// `validate(record, opts) → Report` (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub missing: Vec<String>,
    pub extras: Vec<String>,
    pub type_errors: Vec<String>,
    pub score: f64,
}

fn matches_prim(value: &Value, prim: PrimKind) -> bool {
    match prim {
        PrimKind::Str => value.is_string(),
        PrimKind::Num => value.is_number(),
        PrimKind::Bool => value.is_boolean(),
    }
}

fn prim_name(prim: PrimKind) -> &'static str {
    match prim {
        PrimKind::Str => "string",
        PrimKind::Num => "number",
        PrimKind::Bool => "boolean",
    }
}

/// Single linear pass over the static field table (spec.md §4.1's
/// "algorithmic contract"); set membership for presence is O(1).
pub fn validate(record: &Value, opts: ValidateOptions) -> ValidationReport {
    let mut missing = Vec::new();
    let mut type_errors = Vec::new();
    let mut extras = Vec::new();
    let mut present_count = 0u32;

    let empty = serde_json::Map::new();
    let obj = record.as_object().unwrap_or(&empty);

    for (name, kind) in FIELD_TABLE {
        let raw = obj.get(*name);
        match (kind, raw) {
            (FieldKind::Required(_), None) => missing.push(name.to_string()),
            (FieldKind::Required(prim), Some(v)) => {
                present_count += 1;
                if opts.check_types && !matches_prim(v, *prim) {
                    type_errors.push(name.to_string());
                }
            }
            (FieldKind::Nullable(_), None) => missing.push(name.to_string()),
            (FieldKind::Nullable(prim), Some(v)) => {
                present_count += 1;
                if opts.check_types && !v.is_null() && !matches_prim(v, *prim) {
                    type_errors.push(name.to_string());
                }
            }
            (FieldKind::Optional(_), None) => {
                // Absent is valid for optional fields; not counted as missing.
            }
            (FieldKind::Optional(prim), Some(v)) => {
                present_count += 1;
                if opts.check_types && (v.is_null() || !matches_prim(v, *prim)) {
                    type_errors.push(name.to_string());
                }
            }
        }
    }

    if !opts.allow_extras {
        let known = field_name_set();
        for key in obj.keys() {
            if !known.contains(key.as_str()) {
                extras.push(key.clone());
            }
        }
    }

    let score = (present_count as f64 - type_errors.len() as f64) / FIELD_TABLE.len() as f64;
    let ok = missing.is_empty() && type_errors.is_empty() && (opts.allow_extras || extras.is_empty());

    ValidationReport {
        ok,
        missing,
        extras,
        type_errors,
        score,
    }
}

/// One field's presence/type statistics across a batch of records, as
/// surfaced by `drift`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub present_count: usize,
    pub present_rate: f64,
    pub type_error_count: usize,
}

/// `drift(records[]) → DriftReport` (spec.md §4.1): per-field presence
/// counts/rates and the top-N most frequent issues.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DriftReport {
    pub total_records: usize,
    pub fields: Vec<FieldIssue>,
    pub top_issues: Vec<String>,
}

pub fn drift(records: &[Value], top_n: usize) -> DriftReport {
    let total = records.len();
    let mut present: HashMap<&'static str, usize> = HashMap::new();
    let mut type_err: HashMap<&'static str, usize> = HashMap::new();
    let mut issue_freq: HashMap<String, usize> = HashMap::new();

    for record in records {
        let report = validate(record, ValidateOptions::default());
        for field in report.missing.iter().chain(report.type_errors.iter()) {
            *issue_freq.entry(field.clone()).or_insert(0) += 1;
        }
        for err in &report.type_errors {
            *type_err.entry(leak_static(err)).or_insert(0) += 1;
        }
        let obj = record.as_object();
        for (name, _) in FIELD_TABLE {
            if obj.map(|o| o.contains_key(*name)).unwrap_or(false) {
                *present.entry(name).or_insert(0) += 1;
            }
        }
    }

    let mut fields: Vec<FieldIssue> = FIELD_TABLE
        .iter()
        .map(|(name, _)| {
            let present_count = *present.get(name).unwrap_or(&0);
            FieldIssue {
                field: name.to_string(),
                present_count,
                present_rate: if total == 0 {
                    0.0
                } else {
                    present_count as f64 / total as f64
                },
                type_error_count: *type_err.get(name).unwrap_or(&0),
            }
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));

    let mut ranked: Vec<(String, usize)> = issue_freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top_issues = ranked.into_iter().take(top_n).map(|(f, _)| f).collect();

    DriftReport {
        total_records: total,
        fields,
        top_issues,
    }
}

/// `FIELD_TABLE` field names are `&'static str`; this maps an owned copy
/// back onto the matching static for use as a `HashMap` key without an
/// extra allocation per lookup.
fn leak_static(name: &str) -> &'static str {
    field_kind_of(name)
        .map(|_| FIELD_TABLE.iter().find(|(n, _)| *n == name).unwrap().0)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::new_template;
    use serde_json::json;

    #[test]
    fn template_always_validates() {
        let r = new_template(None).to_value();
        let report = validate(&r, ValidateOptions::default());
        assert!(report.ok, "{report:?}");
        assert_eq!(report.score, 1.0);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let mut v = new_template(None).to_value();
        v.as_object_mut().unwrap().remove("title");
        let report = validate(&v, ValidateOptions::default());
        assert!(!report.ok);
        assert!(report.missing.contains(&"title".to_string()));
    }

    #[test]
    fn extras_are_reported_unless_allowed() {
        let mut v = new_template(None).to_value();
        v.as_object_mut().unwrap().insert("foo".into(), json!(1));
        let strict = validate(&v, ValidateOptions::default());
        assert!(!strict.ok);
        assert_eq!(strict.extras, vec!["foo".to_string()]);

        let lenient = validate(
            &v,
            ValidateOptions {
                allow_extras: true,
                check_types: true,
            },
        );
        assert!(lenient.ok);
    }

    #[test]
    fn wrong_type_is_a_type_error_not_missing() {
        let mut v = new_template(None).to_value();
        v["current_price"] = json!("not a number");
        let report = validate(&v, ValidateOptions::default());
        assert!(report.missing.is_empty());
        assert!(report.type_errors.contains(&"current_price".to_string()));
    }
}
