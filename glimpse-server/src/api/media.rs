use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use tracing::error;

use glimpse_core::parse_expiry;
use glimpse_pipeline::{DownloadRequest, MediaError, MediaInfo, UploadRequest};

use super::schemas::{ErrorResponse, UploadResponse};
use super::AppState;

/// RFC 5987 attr-char stays literal in `filename*`; everything else is
/// percent-encoded.
const RFC5987: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Conservative set for query parameter values in generated page links.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query parameters accepted by the media endpoints. `enc_key` is the
/// programmatic-client fallback for the URL fragment, which browsers never
/// transmit.
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub password: Option<String>,
    pub enc_key: Option<String>,
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    Media(MediaError),
    BadRequest(String),
    Multipart(MultipartError),
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        Self::Media(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Media(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!(error = %e, "request failed");
                    (status, "internal error".to_owned())
                } else {
                    (status, e.to_string())
                }
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Multipart(e) => (e.status(), e.to_string()),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

fn status_for(err: &MediaError) -> StatusCode {
    match err {
        MediaError::NotFound => StatusCode::NOT_FOUND,
        MediaError::Expired | MediaError::AlreadyViewed => StatusCode::GONE,
        MediaError::PasswordRequired | MediaError::InvalidPassword => StatusCode::UNAUTHORIZED,
        MediaError::MissingEncryptionKey
        | MediaError::InvalidEncryptionKey
        | MediaError::DecryptionFailed
        | MediaError::InvalidExpiry(_) => StatusCode::BAD_REQUEST,
        MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        MediaError::Configuration(_)
        | MediaError::Store(_)
        | MediaError::Blob(_)
        | MediaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Split a percent-decoded path token into the resource key and an
/// optionally embedded fragment key (`<resource_key>#<enc_key>`).
fn split_key_token(token: &str) -> (String, Option<String>) {
    match token.split_once('#') {
        Some((key, fragment)) if !fragment.is_empty() => {
            (key.to_owned(), Some(fragment.to_owned()))
        }
        Some((key, _)) => (key.to_owned(), None),
        None => (token.to_owned(), None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `POST /upload` -- accept a multipart form and create a resource.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file_data = None;
    let mut file_name = None;
    let mut password = None;
    let mut expires_in = None;
    let mut blur_enabled = false;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::Multipart)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(ToOwned::to_owned);
                file_data = Some(field.bytes().await.map_err(ApiError::Multipart)?);
            }
            "password" => {
                password = Some(field.text().await.map_err(ApiError::Multipart)?);
            }
            "expires_in" => {
                expires_in = Some(field.text().await.map_err(ApiError::Multipart)?);
            }
            "blur_enabled" => {
                let value = field.text().await.map_err(ApiError::Multipart)?;
                blur_enabled = matches!(value.as_str(), "true" | "1" | "on");
            }
            _ => {}
        }
    }

    let data = file_data.ok_or_else(|| ApiError::BadRequest("missing file field".to_owned()))?;

    // Absent or empty expiration defaults to 24 hours from now; past
    // instants are rejected by the parser.
    let now = Utc::now();
    let expires_at = match expires_in.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(input) => parse_expiry(input, now).map_err(MediaError::from)?,
        None => now + chrono::Duration::hours(24),
    };

    let uploaded = state
        .pipeline
        .upload(UploadRequest {
            data,
            password: non_empty(password),
            expires_at: Some(expires_at),
            filename: non_empty(file_name),
            blur_enabled,
        })
        .await?;

    Ok(Json(UploadResponse {
        url: uploaded.url(),
        resource_key: uploaded.resource_key,
        expires_in: expires_at,
    }))
}

/// `GET /media/{key}` -- browser-facing view page.
///
/// Renders a minimal HTML shell: the file name, an inline preview for
/// images, the download link, and a password prompt when one is needed.
pub async fn view(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Response {
    let (resource_key, embedded) = split_key_token(&token);
    let enc_key = non_empty(embedded.or(query.enc_key));
    let password = non_empty(query.password);

    match state
        .pipeline
        .verify_access(&resource_key, password.as_deref())
        .await
    {
        Ok(()) => {}
        Err(MediaError::PasswordRequired) => {
            return password_page(&resource_key, enc_key.as_deref(), None);
        }
        Err(MediaError::InvalidPassword) => {
            return password_page(&resource_key, enc_key.as_deref(), Some("Invalid password"));
        }
        Err(MediaError::AlreadyViewed) => {
            let info = state.pipeline.media_info(&resource_key).await.ok();
            return already_viewed_page(info.as_ref());
        }
        Err(MediaError::Expired) => {
            return error_page(StatusCode::GONE, "This resource has expired.");
        }
        Err(MediaError::NotFound) => {
            return error_page(StatusCode::NOT_FOUND, "Resource not found.");
        }
        Err(e) => {
            error!(error = %e, "view access check failed");
            return error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.");
        }
    }

    let info = match state.pipeline.media_info(&resource_key).await {
        Ok(info) => info,
        Err(MediaError::NotFound) => {
            return error_page(StatusCode::NOT_FOUND, "Resource not found.");
        }
        Err(e) => {
            error!(error = %e, "view metadata lookup failed");
            return error_page(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.");
        }
    };

    view_page(&resource_key, enc_key.as_deref(), password.as_deref(), &info)
}

/// `GET /media/{key}/preview` -- non-consuming decrypted stream for inline
/// image previews. The no-cache headers keep browsers from silently
/// replaying the preview after the resource is consumed.
pub async fn preview(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ApiError> {
    let (resource_key, embedded) = split_key_token(&token);
    let request = DownloadRequest {
        resource_key,
        password: non_empty(query.password),
        encryption_key: non_empty(embedded.or(query.enc_key)),
    };

    let media = state.pipeline.preview(&request).await?;
    let content_type = content_type_for(media.file_extension.as_deref());

    let mut response = (StatusCode::OK, media.data).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    Ok(response)
}

/// `GET /media/{key}/download` -- the consuming one-shot download.
pub async fn download(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ApiError> {
    let (resource_key, embedded) = split_key_token(&token);
    let request = DownloadRequest {
        resource_key: resource_key.clone(),
        password: non_empty(query.password),
        encryption_key: non_empty(embedded.or(query.enc_key)),
    };

    let media = state.pipeline.download(&request).await?;

    let filename = match (media.filename.as_deref(), media.file_extension.as_deref()) {
        (Some(name), Some(ext)) => format!("{name}.{ext}"),
        (Some(name), None) => name.to_owned(),
        (None, Some(ext)) => format!("file.{ext}"),
        // No stored name at all: fall back to the opaque key.
        (None, None) => resource_key,
    };

    let mut response = (StatusCode::OK, media.data).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok(response)
}

/// Build an RFC 5987 `Content-Disposition` value with an ASCII-escaped
/// fallback and a UTF-8 `filename*` for everything else.
fn content_disposition(filename: &str) -> String {
    let fallback = filename.replace('\\', "\\\\").replace('"', "\\\"");
    let encoded = utf8_percent_encode(filename, RFC5987);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

/// Content type for inline previews, keyed by the stored extension.
fn content_type_for(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

// -- HTML shell -------------------------------------------------------------
//
// The browser template layer proper lives in front of this service; these
// are the minimal shells the endpoints owe a browser client.

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(status: StatusCode, title: &str, body: &str) -> Response {
    let html = format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>{body}</body></html>\n",
        title = escape_html(title),
    );
    (status, Html(html)).into_response()
}

fn error_page(status: StatusCode, message: &str) -> Response {
    page(status, "Glimpse", &format!("<p>{}</p>", escape_html(message)))
}

fn already_viewed_page(info: Option<&MediaInfo>) -> Response {
    let name = info.map_or_else(
        || "This file".to_owned(),
        |i| escape_html(&i.display_filename),
    );
    page(
        StatusCode::GONE,
        "Already viewed",
        &format!("<p>{name} has already been viewed and is no longer available.</p>"),
    )
}

fn password_page(resource_key: &str, enc_key: Option<&str>, error: Option<&str>) -> Response {
    let action = format!("/media/{}", utf8_percent_encode(resource_key, QUERY_VALUE));
    let error_html = error.map_or(String::new(), |e| {
        format!("<p class=\"error\">{}</p>", escape_html(e))
    });
    let enc_input = enc_key.map_or(String::new(), |k| {
        format!(
            "<input type=\"hidden\" name=\"enc_key\" value=\"{}\">",
            escape_html(k)
        )
    });
    let body = format!(
        "<h1>Password required</h1>{error_html}\
         <form method=\"get\" action=\"{action}\">{enc_input}\
         <input type=\"password\" name=\"password\" autofocus>\
         <button type=\"submit\">Unlock</button></form>",
    );
    page(StatusCode::OK, "Password required", &body)
}

fn view_page(
    resource_key: &str,
    enc_key: Option<&str>,
    password: Option<&str>,
    info: &MediaInfo,
) -> Response {
    let mut params = Vec::new();
    if let Some(password) = password {
        params.push(format!(
            "password={}",
            utf8_percent_encode(password, QUERY_VALUE)
        ));
    }
    if let Some(enc_key) = enc_key {
        params.push(format!(
            "enc_key={}",
            utf8_percent_encode(enc_key, QUERY_VALUE)
        ));
    }
    let query = if params.is_empty() {
        String::new()
    } else {
        format!("?{}", params.join("&"))
    };

    let encoded_key = utf8_percent_encode(resource_key, QUERY_VALUE).to_string();
    let download_url = format!("/media/{encoded_key}/download{query}");
    let name = escape_html(&info.display_filename);

    let preview_html = if info.is_image {
        let preview_url = format!("/media/{encoded_key}/preview{query}");
        let style = if info.blur_enabled {
            " style=\"filter: blur(12px)\""
        } else {
            ""
        };
        format!("<p><img src=\"{preview_url}\" alt=\"{name}\"{style}></p>")
    } else {
        String::new()
    };

    let body = format!(
        "<h1>{name}</h1>{preview_html}\
         <p>This file can be downloaded exactly once.</p>\
         <p><a href=\"{download_url}\" download>Download {name}</a></p>",
    );
    page(StatusCode::OK, &info.display_filename, &body)
}
