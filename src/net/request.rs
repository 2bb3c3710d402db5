//! Replayable request descriptions and response classification.

use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// Request body kept in owned form so the request can be rebuilt for a
/// replay after a token refresh.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Multipart {
        field: String,
        filename: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
}

/// Description of one API call, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    /// Overrides the client's request or upload deadline.
    pub timeout: Option<Duration>,
    /// Whether the outbound hook attaches the active bearer token and the
    /// authorization-failure path applies.
    pub auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
            timeout: None,
            auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query pair only when `value` is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Serialize `body` as the JSON payload. Serialization failures fall
    /// back to `null`, which the server rejects with a validation error.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.body = Body::Json(serde_json::to_value(body).unwrap_or(Value::Null));
        self
    }

    /// Attach a single file as a multipart form. Unless a timeout is set,
    /// the client sends it with its upload deadline.
    pub fn file(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        bytes: Vec<u8>,
        mime: Option<String>,
    ) -> Self {
        self.body = Body::Multipart {
            field: field.into(),
            filename: filename.into(),
            bytes,
            mime,
        };
        self
    }

    pub fn is_upload(&self) -> bool {
        matches!(self.body, Body::Multipart { .. })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send without credentials, as login and other public endpoints do.
    pub fn anonymous(mut self) -> Self {
        self.auth = false;
        self
    }
}

/// How the pipeline treats a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
    PassThrough,
}

impl StatusClass {
    pub fn of(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            s if s >= 500 => Self::ServerError,
            _ => Self::PassThrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(StatusClass::of(StatusCode::UNAUTHORIZED), StatusClass::Unauthorized);
        assert_eq!(StatusClass::of(StatusCode::FORBIDDEN), StatusClass::Forbidden);
        assert_eq!(StatusClass::of(StatusCode::NOT_FOUND), StatusClass::NotFound);
        assert_eq!(StatusClass::of(StatusCode::BAD_GATEWAY), StatusClass::ServerError);
        assert_eq!(StatusClass::of(StatusCode::BAD_REQUEST), StatusClass::PassThrough);
        assert_eq!(StatusClass::of(StatusCode::CREATED), StatusClass::PassThrough);
    }

    #[test]
    fn test_file_body_marks_upload() {
        let req = ApiRequest::post("admin/students/register/bulk/").file(
            "file",
            "students.xlsx",
            vec![1, 2, 3],
            None,
        );
        assert!(req.is_upload());
        assert!(req.timeout.is_none());
        assert!(req.auth);
        assert!(!ApiRequest::get("admin/majors/").is_upload());

        let req = ApiRequest::post("x/")
            .timeout(Duration::from_secs(5))
            .file("file", "a", vec![], None);
        assert_eq!(req.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_query_opt_skips_none() {
        let req = ApiRequest::get("teams/")
            .query("page", 2)
            .query_opt("search", None::<&str>)
            .query_opt("major", Some("cs"));
        assert_eq!(
            req.query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("major".to_string(), "cs".to_string())
            ]
        );
    }
}
