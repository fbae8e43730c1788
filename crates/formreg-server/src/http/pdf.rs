// SPDX-License-Identifier: Apache-2.0

use crate::http::handlers::{
    api_error_response, authorize, document_response, observed, propagated_request_id, ApiJson,
};
use crate::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use formreg_api::{ApiError, ApiErrorCode, CreatedResponseDto};
use formreg_model::NewPdfTemplate;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

const TEMPLATE_FILE_FIELD: &str = "libre_office_template";

fn upstream_error(context: &str, err: &crate::pets::PetsError) -> ApiError {
    ApiError::upstream(
        context,
        json!({"message": err.message, "status": err.status}),
    )
}

pub(crate) async fn pdf_templates_list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/pdf-templates-list";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let resp = match state.registry.all_pdf_templates().await {
        Ok(templates) if templates.is_empty() => api_error_response(ApiError::new(
            ApiErrorCode::NotFound,
            "no pdf templates found",
            json!({}),
        )),
        Ok(templates) => Json(templates).into_response(),
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

struct UploadFields {
    name: Option<String>,
    version: Option<String>,
    notes: Option<String>,
    file: Option<(String, String, Vec<u8>)>,
}

async fn collect_upload_fields(multipart: &mut Multipart) -> Result<UploadFields, ApiError> {
    let mut fields = UploadFields {
        name: None,
        version: None,
        notes: None,
        file: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_payload("multipart", &e.to_string()))?
    {
        let Some(field_name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "pdf_template_name" => {
                fields.name = field
                    .text()
                    .await
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
            }
            "pdf_template_version" => {
                fields.version = field
                    .text()
                    .await
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
            }
            "pdf_template_notes" => {
                fields.notes = field
                    .text()
                    .await
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
            }
            TEMPLATE_FILE_FIELD => {
                let filename = field
                    .file_name()
                    .unwrap_or("template.bin")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid_payload(TEMPLATE_FILE_FIELD, &e.to_string()))?;
                fields.file = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }
    Ok(fields)
}

pub(crate) async fn upload_pdf_template_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/pdf-templates";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let fields = match collect_upload_fields(&mut multipart).await {
        Ok(fields) => fields,
        Err(e) => {
            return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
        }
    };
    let (Some(name), Some(version)) = (fields.name, fields.version) else {
        let resp = api_error_response(ApiError::missing_field("pdf_template_name/version"));
        return observed(&state, ROUTE, &request_id, started, resp).await;
    };
    let Some((filename, content_type, bytes)) = fields.file else {
        let resp = api_error_response(ApiError::missing_field(TEMPLATE_FILE_FIELD));
        return observed(&state, ROUTE, &request_id, started, resp).await;
    };

    let template_uuid = match state
        .pets
        .upload_template(&filename, &content_type, bytes)
        .await
    {
        Ok(uuid) => uuid,
        Err(e) => {
            let resp = api_error_response(upstream_error("pets upload failed", &e));
            return observed(&state, ROUTE, &request_id, started, resp).await;
        }
    };

    let resp = match state
        .registry
        .create_pdf_template(NewPdfTemplate {
            name,
            version,
            template_uuid: template_uuid.clone(),
            notes: fields.notes,
        })
        .await
    {
        Ok(id) => {
            info!(
                request_id = %request_id,
                id = %id,
                template_uuid = %template_uuid,
                "pdf template saved"
            );
            (
                StatusCode::CREATED,
                Json(CreatedResponseDto::new(id.into_inner(), "pdf template saved")),
            )
                .into_response()
        }
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

pub(crate) async fn download_template_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(template_uuid): Path<String>,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/template/{template_uuid}";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let resp = match state.pets.download_template(&template_uuid).await {
        Ok(doc) => document_response(doc, &template_uuid),
        Err(e) => api_error_response(upstream_error("pets download failed", &e)),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

pub(crate) async fn render_pdf_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/pdf-render/{id}";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let template_uuid = match state.registry.pdf_template_uuid(id.clone()).await {
        Ok(Some(uuid)) => uuid,
        Ok(None) => {
            let resp = api_error_response(ApiError::not_found("pdf template", &id));
            return observed(&state, ROUTE, &request_id, started, resp).await;
        }
        Err(e) => {
            let resp = api_error_response(ApiError::internal(&e.to_string()));
            return observed(&state, ROUTE, &request_id, started, resp).await;
        }
    };

    let payload = crate::pets::render_payload(body);
    let resp = match state.pets.render(&template_uuid, payload).await {
        Ok(doc) => document_response(doc, &template_uuid),
        Err(e) => api_error_response(upstream_error("pets render failed", &e)),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}
