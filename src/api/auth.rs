//! Login, logout, password reset and profiles.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::ApiClient;
use crate::auth::{IdentityClass, credentials};
use crate::error::ClientError;
use crate::net::ApiRequest;

/// Identifier and password for one identity class.
#[derive(Clone)]
pub struct LoginCredentials {
    pub class: IdentityClass,
    /// Admin username, student number or teacher number.
    pub identifier: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(
        class: IdentityClass,
        identifier: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            class,
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// The JSON body the class's login endpoint expects.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            self.class.login_field().to_string(),
            Value::String(self.identifier.clone()),
        );
        body.insert("password".to_string(), Value::String(self.password.clone()));
        Value::Object(body)
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("class", &self.class)
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token pair issued by a login endpoint.
#[derive(Clone, Deserialize)]
pub struct LoginTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl std::fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginTokens")
            .field("has_refresh", &self.refresh.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Log in and make `login.class` the active identity.
    ///
    /// Credentials of the other classes are cleared so that exactly one
    /// identity is stored afterwards.
    pub async fn login(&self, login: &LoginCredentials) -> Result<LoginTokens, ClientError> {
        let class = login.class;
        let request = ApiRequest::post(class.login_path())
            .json(&login.body())
            .anonymous();
        let tokens: LoginTokens = self.send_json(&request).await?;
        if tokens.access.is_empty() {
            return Err(ClientError::Decode("login response without access token".into()));
        }

        let store = self.store().as_ref();
        for other in IdentityClass::ALL.into_iter().filter(|c| *c != class) {
            credentials::clear_class(store, other)?;
        }
        credentials::save_login(store, class, &tokens.access, tokens.refresh.as_deref())?;
        info!(%class, identifier = %login.identifier, "Logged in");
        Ok(tokens)
    }

    /// Clear every stored credential. Returns the number of token slots
    /// that were occupied.
    pub fn logout(&self) -> Result<usize, ClientError> {
        let removed = credentials::clear_all(self.store().as_ref())?;
        info!(removed, "Logged out");
        Ok(removed)
    }

    pub async fn send_student_reset_code(&self, body: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("student/send-reset-code/").json(body).anonymous())
            .await
    }

    pub async fn reset_student_password(&self, body: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("student/reset-code/").json(body).anonymous())
            .await
    }

    /// Profile of the logged-in `class` user.
    pub async fn profile(&self, class: IdentityClass) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(profile_path(class))).await
    }

    pub async fn update_profile(
        &self,
        class: IdentityClass,
        profile: &Value,
    ) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::put(profile_path(class)).json(profile))
            .await
    }
}

fn profile_path(class: IdentityClass) -> String {
    format!("{}/profile/", class.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_body_uses_class_field() {
        let creds = LoginCredentials::new(IdentityClass::Student, "2021001", "pw");
        assert_eq!(
            creds.body(),
            serde_json::json!({"stu_no": "2021001", "password": "pw"})
        );
        let creds = LoginCredentials::new(IdentityClass::Admin, "root", "pw");
        assert_eq!(creds.body()["admin_username"], "root");
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = LoginCredentials::new(IdentityClass::Teacher, "T01", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn test_profile_path() {
        assert_eq!(profile_path(IdentityClass::Teacher), "teacher/profile/");
    }
}
