// This file is part of skyblock-assistant. Copyright © 2026 skyblock-assistant contributors.
// skyblock-assistant is licensed under the GNU AGPL v3.0 or any later version. See LICENSE file for full text.

use crate::error::SafeDisplay;
use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::fmt::{Display, Formatter};

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Raw failure of an upstream call, before classification.
#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub enum UpstreamError {
    /// Any error for which we got an HTTP response. Built for every non-2xx response where a 2xx was expected.
    HttpResponse(HttpResponse),
    /// Any error for which we did not get an HTTP response. Happens if we fail during the initial request `.send()`,
    /// which covers connect, TLS and timeout failures.
    HttpRequest(ReqwestError),
    /// An error occurred reading response body. We did not expect an error, so headers were not captured.
    HttpRead(ReqwestError),
    /// We received a successful response which we could not deserialize
    JsonDeserialize(serde_json::Error),
    /// HTTP 200, but the body says the call failed. Hypixel does this with `"success": false`.
    Logical { endpoint: &'static str, cause: String },
    /// The call needs a service that hasn't been configured. Holds the service name.
    NotConfigured(&'static str),
}

impl std::error::Error for UpstreamError {}

pub struct RedactedUpstreamError<'a>(&'a UpstreamError);

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::HttpResponse(e) => write!(f, "upstream API error: {e:?}"),
            UpstreamError::HttpRequest(e) => write!(f, "HTTP general failure: {e:?}"),
            UpstreamError::HttpRead(e) => write!(f, "HTTP body read failed: {e:?}"),
            UpstreamError::JsonDeserialize(e) => write!(f, "JSON deserialization failed: {e}"),
            UpstreamError::Logical { endpoint, cause } => write!(f, "{endpoint} reported failure: {cause}"),
            UpstreamError::NotConfigured(service) => write!(f, "{service} is not configured"),
        }
    }
}

impl<'a> Display for RedactedUpstreamError<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            UpstreamError::HttpResponse(e) => write!(f, "upstream API error: HTTP {}", e.status_code.as_u16()),
            UpstreamError::HttpRequest(_) => write!(f, "HTTP general failure"),
            UpstreamError::HttpRead(_) => write!(f, "HTTP body read failed"),
            UpstreamError::JsonDeserialize(_) => write!(f, "JSON deserialization failed"),
            UpstreamError::Logical { endpoint, .. } => write!(f, "{endpoint} reported failure"),
            UpstreamError::NotConfigured(service) => write!(f, "{service} is not configured"),
        }
    }
}

impl<'a> SafeDisplay<'a, RedactedUpstreamError<'a>> for UpstreamError {
    fn safe_display(&'a self) -> RedactedUpstreamError<'a> {
        RedactedUpstreamError(self)
    }
}

impl UpstreamError {
    /// Create an UpstreamError from a non-2xx response, capturing as much of it as we can
    pub async fn from_response(endpoint: &'static str, response: Response) -> Self {
        let status_code = response.status();
        let headers = format!("{:?}", response.headers());
        let body = match response.bytes().await {
            Ok(bytes) => HttpBody::from_bytes(bytes),
            Err(read_error) => HttpBody::ReadError(read_error),
        };
        Self::HttpResponse(HttpResponse {
            endpoint,
            status_code,
            headers,
            body,
        })
    }

    /// Create an UpstreamError from an already-read status and body
    pub fn from_status(endpoint: &'static str, status_code: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::HttpResponse(HttpResponse {
            endpoint,
            status_code,
            headers: String::new(),
            body: HttpBody::from_bytes(body.into()),
        })
    }

    /// Create an UpstreamError from a reqwest error (use this after `.send()`)
    pub fn from_request(endpoint: &'static str, error: reqwest::Error) -> Self {
        Self::HttpRequest(ReqwestError { endpoint, error })
    }

    /// Create an UpstreamError from a reqwest error attempting to read response body (use this after `.bytes()`)
    pub fn from_read(endpoint: &'static str, error: reqwest::Error) -> Self {
        Self::HttpRead(ReqwestError { endpoint, error })
    }

    /// Create an UpstreamError from a serde_json Error
    pub fn from_json(json_error: serde_json::Error) -> Self {
        Self::JsonDeserialize(json_error)
    }

    /// HTTP status, if we got as far as a response
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::HttpResponse(response) => Some(response.status_code),
            _ => None,
        }
    }

    /// The upstream's own explanation of the failure, from either a logical failure or a JSON error body
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Logical { cause, .. } => Some(cause.as_str()),
            Self::HttpResponse(HttpResponse {
                body: HttpBody::JsonErrorResponse(body),
                ..
            }) => body.cause.as_deref(),
            _ => None,
        }
    }

    /// `true` if we never got a usable response: the request or the body read failed
    pub fn is_transport(&self) -> bool {
        match self {
            Self::HttpRequest(_) | Self::HttpRead(_) => true,
            Self::HttpResponse(response) => matches!(response.body, HttpBody::ReadError(_)),
            _ => false,
        }
    }
}

/// Generic wrapper for a reqwest error.
#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub struct ReqwestError {
    endpoint: &'static str,
    error: reqwest::Error,
}

#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub struct HttpResponse {
    pub(crate) endpoint: &'static str,
    pub(crate) status_code: StatusCode,
    pub(crate) headers: String,
    pub(crate) body: HttpBody,
}

#[derive(Debug)]
#[allow(dead_code)] // these are debug printed frequently
pub enum HttpBody {
    /// We received an error response which was successfully deserialized
    JsonErrorResponse(ErrorResponse),
    /// We received an error response which we could not deserialize
    UnknownErrorResponse(Bytes),
    /// An error occurred reading response body. We expected an error, so we captured headers already.
    ReadError(reqwest::Error),
}

impl HttpBody {
    fn from_bytes(bytes: Bytes) -> Self {
        match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(json) => HttpBody::JsonErrorResponse(json),
            Err(_json_error) => HttpBody::UnknownErrorResponse(bytes),
        }
    }
}

/// Error body shape shared closely enough by both upstreams. Hypixel sends:
/// ```json
/// {
///   "success": false,
///   "cause": "Invalid API key"
/// }
/// ```
///
/// Mojang sends `error` and `errorMessage`; the latter lands in `cause`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    #[allow(dead_code)] // debug printed
    success: bool,
    #[serde(default, alias = "errorMessage")]
    cause: Option<String>,
}
