//! Validated JSON extractor and response.
//!
//! This module provides [`ValidateJson`], which combines deserialization with
//! validation through the `validator` crate. As an extractor, failures are a
//! client error naming the offending fields. As a response, a body that does
//! not satisfy its own declared constraints is a server fault.

use std::borrow::Cow;
use std::collections::HashMap;

use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use derive_more::{Deref, DerefMut, From};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use super::Json;
use crate::handler::{Error, ErrorKind};
use crate::utility::TRACING_TARGET_SCHEMA;

/// JSON extractor and response with automatic validation.
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct ValidateJson<T>(pub T);

impl<T> ValidateJson<T> {
    /// Creates a new instance of [`ValidateJson`].
    #[inline]
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Returns the inner validated value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for ValidateJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        data.validate()?;
        Ok(Self::new(data))
    }
}

impl<T> IntoResponse for ValidateJson<T>
where
    T: Serialize + Validate,
{
    fn into_response(self) -> Response {
        if let Err(errors) = self.0.validate() {
            tracing::error!(
                target: TRACING_TARGET_SCHEMA,
                fields = ?sorted_fields(&errors),
                "response body violates its declared schema"
            );

            return ErrorKind::InternalServerError
                .with_message("Response validation failed")
                .into_response();
        }

        Json(self.0).into_response()
    }
}

/// Returns the names of the fields with errors, sorted for stable output.
fn sorted_fields(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|field| field.to_string())
        .collect();
    fields.sort();
    fields
}

/// Formats the bounds of a `length` or `range` error.
fn format_bounds(params: &HashMap<Cow<'static, str>, serde_json::Value>) -> Option<String> {
    match (params.get("min"), params.get("max")) {
        (Some(min), Some(max)) => Some(format!("between {min} and {max}")),
        (Some(min), None) => Some(format!("at least {min}")),
        (None, Some(max)) => Some(format!("at most {max}")),
        (None, None) => params.get("equal").map(|equal| format!("exactly {equal}")),
    }
}

/// Formats a single validation error into a user-facing sentence.
fn format_validation_error(field: &str, error: &ValidationError) -> String {
    if let Some(custom_message) = &error.message {
        return format!("Field '{field}': {custom_message}");
    }

    let message = match error.code.as_ref() {
        "required" => "is required".to_owned(),
        "email" => "must be a valid email address".to_owned(),
        "url" => "must be a valid URL".to_owned(),
        "length" => match format_bounds(&error.params) {
            Some(bounds) => format!("must have a length {bounds}"),
            None => "has an invalid length".to_owned(),
        },
        "range" => match format_bounds(&error.params) {
            Some(bounds) => format!("must be {bounds}"),
            None => "is out of range".to_owned(),
        },
        "regex" => "has an invalid format".to_owned(),
        code => format!("failed validation: {code}"),
    };

    format!("Field '{field}' {message}")
}

impl From<ValidationErrors> for Error<'static> {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let fields = sorted_fields(&errors);

        let messages: Vec<String> = fields
            .iter()
            .filter_map(|field| field_errors.get(field.as_str()).map(|e| (field, e)))
            .flat_map(|(field, errors)| {
                errors
                    .iter()
                    .map(move |error| format_validation_error(field, error))
            })
            .collect();

        let user_message = match messages.as_slice() {
            [] => "Validation failed".to_owned(),
            multiple => multiple.join(". "),
        };

        tracing::debug!(
            target: TRACING_TARGET_SCHEMA,
            fields = ?fields,
            "request validation failed"
        );

        fields.into_iter().fold(
            ErrorKind::BadRequest
                .with_message(user_message)
                .with_resource("request"),
            |error, field| error.with_field(field),
        )
    }
}

impl<T> aide::OperationInput for ValidateJson<T>
where
    T: schemars::JsonSchema,
{
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        Json::<T>::operation_input(ctx, operation);
    }

    fn inferred_early_responses(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Vec<(Option<u16>, aide::openapi::Response)> {
        Json::<T>::inferred_early_responses(ctx, operation)
    }
}

impl<T> aide::OperationOutput for ValidateJson<T>
where
    T: schemars::JsonSchema + Serialize,
{
    type Inner = T;

    fn operation_response(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Option<aide::openapi::Response> {
        Json::<T>::operation_response(ctx, operation)
    }

    fn inferred_responses(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Vec<(Option<u16>, aide::openapi::Response)> {
        Json::<T>::inferred_responses(ctx, operation)
    }
}
