//! Mutual-selection events and advisor assignment.

use serde::Serialize;
use serde_json::Value;

use super::IdList;
use crate::ApiClient;
use crate::error::ClientError;
use crate::net::ApiRequest;

const EVENTS: &str = "admin/mutualselectionevents/";

/// Body of the manual assignment endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManualAssignment {
    pub group_id: i64,
    pub teacher_id: i64,
}

fn assignment_path(event_id: i64, action: &str) -> String {
    format!("teams/{event_id}/admin/{action}/")
}

impl ApiClient {
    /// List selection events. `params` are passed as query parameters.
    pub async fn selection_events(&self, params: &[(&str, &str)]) -> Result<Value, ClientError> {
        let request = params
            .iter()
            .fold(ApiRequest::get(EVENTS), |req, (k, v)| req.query(*k, v));
        self.send_json(&request).await
    }

    pub async fn create_selection_event(&self, event: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post(EVENTS).json(event)).await
    }

    pub async fn update_selection_event(
        &self,
        id: i64,
        event: &Value,
    ) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::put(format!("{EVENTS}{id}/")).json(event))
            .await
    }

    pub async fn delete_selection_event(&self, id: i64) -> Result<(), ClientError> {
        self.send_empty(&ApiRequest::delete(format!("{EVENTS}{id}/")))
            .await
    }

    pub async fn bulk_delete_selection_events(&self, ids: &[i64]) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post(format!("{EVENTS}bulk-delete/")).json(&IdList { ids }))
            .await
    }

    pub async fn auto_assign(&self, event_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post(assignment_path(event_id, "auto-assign")))
            .await
    }

    pub async fn assignments(&self, event_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(assignment_path(event_id, "get-assignments")))
            .await
    }

    pub async fn manual_assign(
        &self,
        event_id: i64,
        assignment: ManualAssignment,
    ) -> Result<Value, ClientError> {
        let request = ApiRequest::post(assignment_path(event_id, "manual-assign")).json(&assignment);
        self.send_json(&request).await
    }

    pub async fn publish_assignments(&self, event_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post(assignment_path(event_id, "publish")))
            .await
    }

    /// Advisors that can be matched with `group_id` in the event.
    pub async fn match_options(&self, event_id: i64, group_id: i64) -> Result<Value, ClientError> {
        let request = ApiRequest::get(assignment_path(event_id, "match-options")).query("group_id", group_id);
        self.send_json(&request).await
    }

    pub async fn all_match_options(&self, event_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(assignment_path(event_id, "all-match-options")))
            .await
    }
}
