//! Typed wrappers over the portal endpoints.
//!
//! Each submodule adds methods to [`ApiClient`](crate::ApiClient); all of
//! them go through the authenticated pipeline.
//!
//! Endpoint layout (relative to the API base):
//! ```text
//! {admin,student,teacher}/login/                POST   (anonymous)
//! {admin,student,teacher}/token/refresh/        POST   (refresh coordinator)
//! {admin,student,teacher}/profile/              GET PUT
//! student/send-reset-code/                      POST   (anonymous)
//! student/reset-code/                           POST   (anonymous)
//! admin/register/                               POST
//! admin/{users,students,teachers}/              GET POST
//! admin/{users,students,teachers}/:id/          PUT DELETE
//! admin/{users,students,teachers}/bulk-delete/  POST
//! admin/[students/|teachers/]register/bulk/     POST   (multipart, upload timeout)
//! admin/[students/|teachers/]register/template/ GET    (binary)
//! admin/mutualselectionevents/[:id/]            GET POST PUT DELETE
//! admin/mutualselectionevents/bulk-delete/      POST
//! admin/majors/  admin/groups/                  GET
//! teams/...                                     student and teacher team flows
//! teams/:event/admin/...                        assignment management
//! ```

pub mod accounts;
pub mod auth;
pub mod download;
pub mod selection;
pub mod teams;

pub use auth::{LoginCredentials, LoginTokens};
pub use download::Download;

use serde::Serialize;

/// Body of every `bulk-delete/` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdList<'a> {
    pub ids: &'a [i64],
}
