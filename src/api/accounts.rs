//! Account management for administrators.

use serde_json::Value;

use super::IdList;
use super::download::Download;
use crate::ApiClient;
use crate::auth::IdentityClass;
use crate::error::ClientError;
use crate::net::ApiRequest;

/// Collection endpoint holding accounts of `class`.
pub fn collection_path(class: IdentityClass) -> &'static str {
    match class {
        IdentityClass::Admin => "admin/users/",
        IdentityClass::Student => "admin/students/",
        IdentityClass::Teacher => "admin/teachers/",
    }
}

/// Prefix of the bulk registration endpoints for `class`.
fn register_prefix(class: IdentityClass) -> &'static str {
    match class {
        IdentityClass::Admin => "admin/register/",
        IdentityClass::Student => "admin/students/register/",
        IdentityClass::Teacher => "admin/teachers/register/",
    }
}

impl ApiClient {
    /// Register a single administrator.
    pub async fn register_admin(&self, account: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("admin/register/").json(account))
            .await
    }

    pub async fn list_accounts(&self, class: IdentityClass) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(collection_path(class))).await
    }

    pub async fn create_account(
        &self,
        class: IdentityClass,
        account: &Value,
    ) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post(collection_path(class)).json(account))
            .await
    }

    pub async fn update_account(
        &self,
        class: IdentityClass,
        id: i64,
        account: &Value,
    ) -> Result<Value, ClientError> {
        let path = format!("{}{id}/", collection_path(class));
        self.send_json(&ApiRequest::put(path).json(account)).await
    }

    pub async fn delete_account(&self, class: IdentityClass, id: i64) -> Result<(), ClientError> {
        let path = format!("{}{id}/", collection_path(class));
        self.send_empty(&ApiRequest::delete(path)).await
    }

    pub async fn bulk_delete_accounts(
        &self,
        class: IdentityClass,
        ids: &[i64],
    ) -> Result<Value, ClientError> {
        let path = format!("{}bulk-delete/", collection_path(class));
        self.send_json(&ApiRequest::post(path).json(&IdList { ids }))
            .await
    }

    /// Upload a spreadsheet of accounts. Sent with the upload deadline.
    pub async fn bulk_register(
        &self,
        class: IdentityClass,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ClientError> {
        let path = format!("{}bulk/", register_prefix(class));
        let request = ApiRequest::post(path).file("file", filename, bytes, None);
        self.send_json(&request).await
    }

    /// Download the bulk registration template for `class`.
    pub async fn registration_template(
        &self,
        class: IdentityClass,
    ) -> Result<Download, ClientError> {
        let path = format!("{}template/", register_prefix(class));
        self.download(&ApiRequest::get(path)).await
    }

    pub async fn majors(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("admin/majors/")).await
    }

    pub async fn groups(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("admin/groups/")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(collection_path(IdentityClass::Admin), "admin/users/");
        assert_eq!(
            format!("{}bulk/", register_prefix(IdentityClass::Teacher)),
            "admin/teachers/register/bulk/"
        );
        assert_eq!(
            format!("{}template/", register_prefix(IdentityClass::Admin)),
            "admin/register/template/"
        );
    }
}
