//! Team flows for students and advisor flows for teachers.

use serde_json::{Value, json};

use crate::ApiClient;
use crate::error::ClientError;
use crate::net::ApiRequest;

impl ApiClient {
    // -- Student side --

    pub async fn student_dashboard(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/dashboard/")).await
    }

    pub async fn create_team(&self, team: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("teams/create-team/").json(team))
            .await
    }

    pub async fn update_my_team(&self, team: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::put("teams/my-team/update/").json(team))
            .await
    }

    pub async fn disband_team(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("teams/my-team/disband/"))
            .await
    }

    pub async fn join_team(&self, group_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post(format!("teams/{group_id}/join/")))
            .await
    }

    pub async fn leave_team(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("teams/leave-team/")).await
    }

    /// Captain adds a member; `member` is the body the server expects.
    pub async fn add_member(&self, member: &Value) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::post("teams/my-team/add-member/").json(member))
            .await
    }

    pub async fn remove_member(&self, student_id: i64) -> Result<Value, ClientError> {
        let request =
            ApiRequest::post("teams/my-team/remove-member/").json(&json!({ "student_id": student_id }));
        self.send_json(&request).await
    }

    /// Every team in the currently active selection event.
    pub async fn all_teams(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/all-teams/")).await
    }

    pub async fn available_teammates(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/available-teammates/"))
            .await
    }

    pub async fn available_advisors(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/available-teachers/"))
            .await
    }

    pub async fn group_detail(&self, group_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(format!("teams/{group_id}/group-detail/")))
            .await
    }

    pub async fn student_history(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/student/history/")).await
    }

    pub async fn student_history_detail(&self, event_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(format!(
            "teams/{event_id}/student/history-detail/"
        )))
        .await
    }

    // -- Teacher side --

    pub async fn teacher_dashboard(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/teacher/dashboard/"))
            .await
    }

    /// Submit the teacher's ranked group preferences.
    pub async fn set_teacher_preferences(&self, preferences: &Value) -> Result<Value, ClientError> {
        let request = ApiRequest::post("teams/teacher/set-preferences/")
            .json(&json!({ "preferences": preferences }));
        self.send_json(&request).await
    }

    pub async fn teacher_group_detail(&self, group_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(format!(
            "teams/{group_id}/teacher/group-detail/"
        )))
        .await
    }

    pub async fn advised_groups(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/teacher/my-advised-groups/"))
            .await
    }

    pub async fn current_advised_groups(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/teacher/current-advised-groups/"))
            .await
    }

    pub async fn teacher_history(&self) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get("teams/teacher/history/")).await
    }

    pub async fn teacher_history_detail(&self, event_id: i64) -> Result<Value, ClientError> {
        self.send_json(&ApiRequest::get(format!(
            "teams/{event_id}/teacher/history-detail/"
        )))
        .await
    }
}
