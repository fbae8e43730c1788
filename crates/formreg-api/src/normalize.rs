// SPDX-License-Identifier: Apache-2.0

use crate::ApiError;
use formreg_model::{DeploymentStatus, NewFormTemplate, TemplateId};
use serde_json::{json, Value};

fn opt_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        // Versions in particular arrive as bare numbers from older tooling.
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn opt_json(value: Option<&Value>) -> Option<Value> {
    value.cloned().filter(|v| !v.is_null())
}

/// Normalize an incoming form-template payload into an insertable record.
///
/// Two shapes are accepted: the flat legacy shape with fields at the root,
/// and the designer-export shape with everything nested under `formversion`
/// (where `name` is the title and `elements` is the data payload). Missing
/// ids are generated; `data` and `interface` default to empty arrays.
pub fn normalize_form_payload(body: &Value) -> Result<NewFormTemplate, ApiError> {
    if !body.is_object() {
        return Err(ApiError::invalid_payload("body", "expected a json object"));
    }

    let (id_raw, version, ministry_id, last_modified, title, form_id, deployed_raw, data_sources, data, interface) =
        if let Some(fv) = body.get("formversion") {
            if !fv.is_object() {
                return Err(ApiError::invalid_payload(
                    "formversion",
                    "expected a json object",
                ));
            }
            (
                opt_string(fv.get("id")),
                opt_string(fv.get("version")),
                opt_string(fv.get("ministry_id")),
                opt_string(fv.get("data").and_then(|d| d.get("updated_at")))
                    .or_else(|| opt_string(fv.get("data").and_then(|d| d.get("created_at")))),
                opt_string(fv.get("name")),
                opt_string(fv.get("form_id")),
                opt_string(fv.get("deployed_to")),
                opt_json(fv.get("dataSources")),
                opt_json(fv.get("elements")),
                opt_json(fv.get("interface")),
            )
        } else {
            (
                opt_string(body.get("id")),
                opt_string(body.get("version")),
                opt_string(body.get("ministry_id")),
                opt_string(body.get("lastModified"))
                    .or_else(|| opt_string(body.get("last_modified"))),
                opt_string(body.get("title")),
                opt_string(body.get("form_id")),
                opt_string(body.get("deployed_to")),
                opt_json(body.get("dataSources")),
                opt_json(body.get("data").and_then(|d| d.get("items")))
                    .or_else(|| opt_json(body.get("data"))),
                opt_json(body.get("interface")),
            )
        };

    let deployed_to = match deployed_raw {
        None => DeploymentStatus::None,
        Some(raw) => DeploymentStatus::parse(&raw)
            .map_err(|e| ApiError::invalid_payload("deployed_to", &e.to_string()))?,
    };

    let id = match id_raw {
        Some(raw) => TemplateId::parse(&raw)
            .map_err(|e| ApiError::invalid_payload("id", &e.to_string()))?,
        None => TemplateId::generate(),
    };

    Ok(NewFormTemplate {
        id,
        version,
        ministry_id,
        last_modified,
        title,
        form_id,
        deployed_to,
        data_sources,
        data: data.unwrap_or_else(|| json!([])),
        interface: interface.unwrap_or_else(|| json!([])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_payload_maps_fields_at_root() {
        let body = json!({
            "id": "11111111-1111-4111-8111-111111111111",
            "version": 3,
            "ministry_id": "CITZ",
            "lastModified": "2026-01-05T10:00:00Z",
            "title": "Change of Address",
            "form_id": "coa",
            "deployed_to": "dev",
            "dataSources": {"lookup": "addresses"},
            "data": {"items": [{"type": "text"}]}
        });
        let form = normalize_form_payload(&body).expect("normalize flat payload");
        assert_eq!(form.id.as_str(), "11111111-1111-4111-8111-111111111111");
        assert_eq!(form.version.as_deref(), Some("3"));
        assert_eq!(form.title.as_deref(), Some("Change of Address"));
        assert_eq!(form.deployed_to, DeploymentStatus::Dev);
        assert_eq!(form.data, json!([{"type": "text"}]));
        assert_eq!(form.interface, json!([]));
    }

    #[test]
    fn nested_formversion_payload_maps_name_and_elements() {
        let body = json!({
            "formversion": {
                "version": "7",
                "ministry_id": "FIN",
                "name": "Budget Intake",
                "form_id": "budget-intake",
                "elements": [{"type": "header"}],
                "interface": [{"binding": "x"}],
                "data": {"created_at": "2026-02-01T08:30:00Z"}
            }
        });
        let form = normalize_form_payload(&body).expect("normalize nested payload");
        assert_eq!(form.title.as_deref(), Some("Budget Intake"));
        assert_eq!(form.form_id.as_deref(), Some("budget-intake"));
        assert_eq!(form.last_modified.as_deref(), Some("2026-02-01T08:30:00Z"));
        assert_eq!(form.data, json!([{"type": "header"}]));
        assert_eq!(form.interface, json!([{"binding": "x"}]));
        assert_eq!(form.deployed_to, DeploymentStatus::None);
        // id was absent, so one is generated
        assert!(!form.id.as_str().is_empty());
    }

    #[test]
    fn updated_at_wins_over_created_at() {
        let body = json!({
            "formversion": {
                "name": "n",
                "data": {
                    "created_at": "2026-01-01T00:00:00Z",
                    "updated_at": "2026-03-01T00:00:00Z"
                }
            }
        });
        let form = normalize_form_payload(&body).expect("normalize");
        assert_eq!(form.last_modified.as_deref(), Some("2026-03-01T00:00:00Z"));
    }

    #[test]
    fn unknown_environment_tag_is_rejected() {
        let body = json!({"title": "t", "deployed_to": "staging"});
        let err = normalize_form_payload(&body).expect_err("reject unknown tag");
        assert_eq!(err.code, crate::ApiErrorCode::InvalidPayload);
    }

    #[test]
    fn missing_data_defaults_to_empty_array() {
        let form = normalize_form_payload(&json!({"title": "t"})).expect("normalize");
        assert_eq!(form.data, json!([]));
        assert_eq!(form.interface, json!([]));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(normalize_form_payload(&json!([1, 2])).is_err());
        assert!(normalize_form_payload(&json!("nope")).is_err());
    }
}
