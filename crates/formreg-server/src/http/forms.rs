// SPDX-License-Identifier: Apache-2.0

use crate::http::handlers::{
    api_error_response, authorize, observed, propagated_request_id, ApiJson,
};
use crate::store::StoreError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use formreg_api::{
    normalize_form_payload, ApiError, CreatedResponseDto, UpdateDeploymentDto,
};
use formreg_model::DeploymentStatus;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

pub(crate) async fn create_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Value>,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/forms";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let form = match normalize_form_payload(&body) {
        Ok(form) => form,
        Err(e) => {
            return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
        }
    };

    let resp = match state.registry.create_form(form).await {
        Ok(id) => {
            info!(request_id = %request_id, id = %id, "form template created");
            (
                StatusCode::CREATED,
                Json(CreatedResponseDto::new(
                    id.into_inner(),
                    "form template created",
                )),
            )
                .into_response()
        }
        Err(StoreError::Duplicate { id }) => {
            api_error_response(ApiError::conflict("form template", &id))
        }
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

pub(crate) async fn form_by_id_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/forms/{id}";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let resp = match state.registry.form_by_id(id.clone()).await {
        Ok(Some(form)) => Json(form).into_response(),
        Ok(None) => api_error_response(ApiError::not_found("form template", &id)),
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

pub(crate) async fn form_by_form_id_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<String>,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/forms/form_id/{form_id}";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let resp = match state.registry.form_by_form_id(form_id.clone()).await {
        Ok(Some(form)) => Json(form).into_response(),
        Ok(None) => api_error_response(ApiError::not_found("form template", &form_id)),
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

pub(crate) async fn forms_list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/forms-list";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let resp = match state.registry.all_forms().await {
        // Empty registry answers 404, matching the original admin contract.
        Ok(forms) if forms.is_empty() => api_error_response(ApiError::new(
            formreg_api::ApiErrorCode::NotFound,
            "no form templates found",
            json!({}),
        )),
        Ok(forms) => Json(forms).into_response(),
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}

pub(crate) async fn update_deployment_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<UpdateDeploymentDto>,
) -> impl IntoResponse {
    const ROUTE: &str = "/api/forms/update";
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    if let Err(e) = authorize(&state, &headers).await {
        return observed(&state, ROUTE, &request_id, started, api_error_response(e)).await;
    }

    let deployed_to = match DeploymentStatus::parse(&body.deployed_to) {
        Ok(tag) => tag,
        Err(e) => {
            let resp = api_error_response(ApiError::invalid_payload("deployed_to", &e.to_string()));
            return observed(&state, ROUTE, &request_id, started, resp).await;
        }
    };

    let resp = match state
        .registry
        .update_deployment(
            body.form_id.clone(),
            body.id.clone(),
            deployed_to,
            body.pdf_template_id.clone(),
        )
        .await
    {
        Ok(true) => {
            info!(
                request_id = %request_id,
                id = %body.id,
                form_id = %body.form_id,
                environment = deployed_to.as_str(),
                "deployment status updated"
            );
            (
                StatusCode::OK,
                Json(CreatedResponseDto::new(body.id, "form version updated")),
            )
                .into_response()
        }
        Ok(false) => api_error_response(ApiError::not_found("form template", &body.id)),
        Err(e) => api_error_response(ApiError::internal(&e.to_string())),
    };
    observed(&state, ROUTE, &request_id, started, resp).await
}
