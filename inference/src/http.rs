use std::io::Cursor;
use std::sync::Arc;

use serde_json::json;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::context::ServiceContext;
use crate::multipart::{extract_boundary, extract_file_part};

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

const CONTENT_TYPE_DETAIL: &str = "Only image uploads are allowed (JPEG, PNG).";

/// Request failure surfaced as a structured JSON body.
#[derive(Debug, thiserror::Error)]
#[error("{detail}")]
pub struct ApiError {
    pub status: u16,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: 400,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: 500,
            detail: detail.into(),
        }
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> Response<Cursor<Vec<u8>>> {
    let bytes = body.to_string().into_bytes();
    let len = bytes.len();
    Response::new(
        StatusCode(status),
        vec![Header::from_bytes(b"Content-Type", b"application/json").unwrap()],
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

/// Dispatch one request against the shared service context.
pub fn dispatch(mut request: Request, ctx: Arc<ServiceContext>) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or(&url).to_owned();

    let response = match (method, path.as_str()) {
        (Method::Get, "/") => json_response(
            200,
            json!({ "message": "Document tamper detection. POST an image to /predict." }),
        ),
        (Method::Post, "/predict") => {
            let request_content_type = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Content-Type"))
                .map(|h| h.value.as_str().to_owned())
                .unwrap_or_default();

            let mut body = Vec::new();
            let _ = request.as_reader().read_to_end(&mut body);

            match handle_predict(&ctx, &request_content_type, &body) {
                Ok(prediction) => json_response(200, json!({ "Prediction": prediction })),
                Err(e) => json_response(e.status, json!({ "detail": e.detail })),
            }
        }
        _ => json_response(404, json!({ "detail": "Not Found" })),
    };

    let _ = request.respond(response);
}

/// Validate the uploaded file's declared content type, decode, and predict.
pub fn handle_predict(
    ctx: &ServiceContext,
    request_content_type: &str,
    body: &[u8],
) -> Result<f32, ApiError> {
    let boundary = extract_boundary(request_content_type)
        .ok_or_else(|| ApiError::bad_request("Expected a multipart file upload."))?;
    let part = extract_file_part(body, &boundary)
        .ok_or_else(|| ApiError::bad_request("No file was uploaded."))?;

    predict_part(ctx, part.content_type.as_deref(), &part.data)
}

/// Core predict step, independent of multipart framing: rejects non-image
/// declared content types with a 400, then decodes as RGB and runs the model.
pub fn predict_part(
    ctx: &ServiceContext,
    content_type: Option<&str>,
    data: &[u8],
) -> Result<f32, ApiError> {
    let declared = content_type.ok_or_else(|| ApiError::bad_request(CONTENT_TYPE_DETAIL))?;
    if !ALLOWED_CONTENT_TYPES.contains(&declared) {
        return Err(ApiError::bad_request(CONTENT_TYPE_DETAIL));
    }

    let image = image::load_from_memory(data)
        .map_err(|e| ApiError::internal(format!("failed to decode image: {e}")))?
        .to_rgb8();
    ctx.predict(&image)
        .map_err(|e| ApiError::internal(e.to_string()))
}
