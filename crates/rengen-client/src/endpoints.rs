//! 接口分组
//!
//! 与后端路由一一对应，基础路径为 `/api`（包含在客户端的 base_url 中）。

use chrono::NaiveDate;
use rengen_core::utils::format_query_date;
use rengen_core::{
    AssignmentAck, ChartData, DashboardStats, DistributionOutcome, DistributionPreview, Doctor,
    DoctorDraft, DoctorWithLoad, Priority, Result, Schedule, ScheduleDraft, StatusAck, Study,
    StudyType,
};
use serde_json::json;
use tracing::info;

use crate::api::ApiClient;
use crate::transport::ApiRequest;

/// 班次查询条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub doctor_id: Option<i64>,
}

impl ScheduleQuery {
    /// 一段日期范围内的班次
    pub fn between(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            date_from: Some(date_from),
            date_to: Some(date_to),
            doctor_id: None,
        }
    }

    pub fn for_doctor(mut self, doctor_id: Option<i64>) -> Self {
        self.doctor_id = doctor_id;
        self
    }

    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(date) = self.date_from {
            pairs.push(("date_from".to_string(), format_query_date(date)));
        }
        if let Some(date) = self.date_to {
            pairs.push(("date_to".to_string(), format_query_date(date)));
        }
        if let Some(doctor_id) = self.doctor_id {
            pairs.push(("doctor_id".to_string(), doctor_id.to_string()));
        }
        pairs
    }
}

/// 检查查询条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyQuery {
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub diagnostician_id: Option<i64>,
}

impl StudyQuery {
    /// 某位医生名下已确认的检查
    pub fn confirmed_for(doctor_id: i64) -> Self {
        Self {
            status: Some(rengen_core::study_status::CONFIRMED.to_string()),
            diagnostician_id: Some(doctor_id),
            ..Default::default()
        }
    }

    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = &self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority".to_string(), priority.as_str().to_string()));
        }
        if let Some(date) = self.date_from {
            pairs.push(("date_from".to_string(), format_query_date(date)));
        }
        if let Some(date) = self.date_to {
            pairs.push(("date_to".to_string(), format_query_date(date)));
        }
        if let Some(doctor_id) = self.diagnostician_id {
            pairs.push(("diagnostician_id".to_string(), doctor_id.to_string()));
        }
        pairs
    }
}

/// 医生接口
#[derive(Debug, Clone, Copy)]
pub struct DoctorsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DoctorsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Doctor>> {
        self.client.fetch_list(ApiRequest::get("/doctors/")).await
    }

    pub async fn list_with_load(&self) -> Result<Vec<DoctorWithLoad>> {
        self.client.fetch_list(ApiRequest::get("/doctors/with_load/")).await
    }

    pub async fn get(&self, id: i64) -> Result<Doctor> {
        self.client.fetch(ApiRequest::get(format!("/doctors/{}/", id))).await
    }

    pub async fn create(&self, draft: &DoctorDraft) -> Result<Doctor> {
        info!("Creating doctor {}", draft.fio_alias);
        self.client.fetch(ApiRequest::post("/doctors/").json(draft)?).await
    }

    pub async fn update(&self, id: i64, draft: &DoctorDraft) -> Result<Doctor> {
        info!("Updating doctor {}", id);
        self.client
            .fetch(ApiRequest::put(format!("/doctors/{}/", id)).json(draft)?)
            .await
    }

    /// 归档医生（`is_active=false`），不做物理删除
    pub async fn archive(&self, id: i64) -> Result<Doctor> {
        let doctor = self.get(id).await?;
        let mut draft = DoctorDraft::from(&doctor);
        draft.is_active = false;
        info!("Archiving doctor {}", id);
        self.update(id, &draft).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        info!("Deleting doctor {}", id);
        self.client.send(ApiRequest::delete(format!("/doctors/{}/", id))).await?;
        Ok(())
    }
}

/// 检查类型接口
#[derive(Debug, Clone, Copy)]
pub struct StudyTypesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> StudyTypesApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<StudyType>> {
        self.client.fetch_list(ApiRequest::get("/study-types/")).await
    }
}

/// 班次接口
#[derive(Debug, Clone, Copy)]
pub struct SchedulesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SchedulesApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>> {
        self.client
            .fetch_list(ApiRequest::get("/schedules/").query_pairs(query.to_pairs()))
            .await
    }

    /// 某天在岗（非休息日）的班次
    pub async fn by_date(&self, date: NaiveDate) -> Result<Vec<Schedule>> {
        self.client
            .fetch_list(ApiRequest::get("/schedules/by_date/").query("date", format_query_date(date)))
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Schedule> {
        self.client.fetch(ApiRequest::get(format!("/schedules/{}/", id))).await
    }

    pub async fn create(&self, draft: &ScheduleDraft) -> Result<Schedule> {
        info!("Creating schedule for doctor {} on {}", draft.doctor, draft.work_date);
        self.client.fetch(ApiRequest::post("/schedules/").json(draft)?).await
    }

    pub async fn update(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule> {
        info!("Updating schedule {}", id);
        self.client
            .fetch(ApiRequest::put(format!("/schedules/{}/", id)).json(draft)?)
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        info!("Deleting schedule {}", id);
        self.client.send(ApiRequest::delete(format!("/schedules/{}/", id))).await?;
        Ok(())
    }
}

/// 检查接口
#[derive(Debug, Clone, Copy)]
pub struct StudiesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> StudiesApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: &StudyQuery) -> Result<Vec<Study>> {
        self.client
            .fetch_list(ApiRequest::get("/studies/").query_pairs(query.to_pairs()))
            .await
    }

    /// 尚未分配医生的检查
    pub async fn pending(&self) -> Result<Vec<Study>> {
        self.client.fetch_list(ApiRequest::get("/studies/pending/")).await
    }

    pub async fn cito(&self) -> Result<Vec<Study>> {
        self.client.fetch_list(ApiRequest::get("/studies/cito/")).await
    }

    pub async fn asap(&self) -> Result<Vec<Study>> {
        self.client.fetch_list(ApiRequest::get("/studies/asap/")).await
    }

    /// 将检查分配给医生
    pub async fn assign(&self, study_id: i64, doctor_id: i64) -> Result<AssignmentAck> {
        info!("Assigning study {} to doctor {}", study_id, doctor_id);
        self.client
            .fetch(
                ApiRequest::post(format!("/studies/{}/assign/", study_id))
                    .json(&json!({ "doctor_id": doctor_id }))?,
            )
            .await
    }

    pub async fn update_status(&self, study_id: i64, status: &str) -> Result<StatusAck> {
        info!("Updating study {} status to {}", study_id, status);
        self.client
            .fetch(
                ApiRequest::put(format!("/studies/{}/update_status/", study_id))
                    .json(&json!({ "status": status }))?,
            )
            .await
    }
}

/// 看板接口
#[derive(Debug, Clone, Copy)]
pub struct DashboardApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DashboardApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn stats(&self, date: Option<NaiveDate>) -> Result<DashboardStats> {
        let mut request = ApiRequest::get("/dashboard/stats/");
        if let Some(date) = date {
            request = request.query("date", format_query_date(date));
        }
        self.client.fetch(request).await
    }

    pub async fn chart(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<Vec<ChartData>> {
        self.client
            .fetch_list(
                ApiRequest::get("/dashboard/chart/")
                    .query("date_from", format_query_date(date_from))
                    .query("date_to", format_query_date(date_to)),
            )
            .await
    }
}

/// 自动分配接口
#[derive(Debug, Clone, Copy)]
pub struct DistributionApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DistributionApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn preview(&self) -> Result<DistributionPreview> {
        self.client.fetch(ApiRequest::get("/distribute/preview/")).await
    }

    pub async fn run(&self) -> Result<DistributionOutcome> {
        info!("Triggering backend distribution");
        self.client.fetch(ApiRequest::post("/distribute/")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::transport::{ApiResponse, Method, Transport};
    use async_trait::async_trait;
    use rengen_core::RengenError;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// 按顺序返回预设响应并记录请求
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<ApiResponse>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::new(200, Value::Null)))
        }
    }

    fn client_for(transport: Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::with_transport(transport, RetryPolicy::new(3, std::time::Duration::ZERO, 2)).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_query_parameters() {
        let transport = ScriptedTransport::with(vec![Ok(ApiResponse::new(200, json!([])))]);
        let client = client_for(transport.clone());

        let monday = NaiveDate::from_ymd_opt(2025, 10, 13).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 10, 19).unwrap();
        let schedules = client
            .schedules()
            .list(&ScheduleQuery::between(monday, sunday).for_doctor(Some(26)))
            .await
            .unwrap();
        assert!(schedules.is_empty());

        let requests = transport.requests();
        assert_eq!(requests[0].path, "/schedules/");
        assert_eq!(
            requests[0].query,
            vec![
                ("date_from".to_string(), "2025-10-13".to_string()),
                ("date_to".to_string(), "2025-10-19".to_string()),
                ("doctor_id".to_string(), "26".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_assign_posts_doctor_id() {
        let transport = ScriptedTransport::with(vec![Ok(ApiResponse::new(
            200,
            json!({"status": "assigned", "doctor_id": 27}),
        ))]);
        let client = client_for(transport.clone());

        let ack = client.studies().assign(48548, 27).await.unwrap();
        assert_eq!(ack.doctor_id, 27);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, "/studies/48548/assign/");
        assert_eq!(requests[0].body, Some(json!({"doctor_id": 27})));
    }

    #[tokio::test]
    async fn test_assign_rejection_is_not_retried() {
        let transport = ScriptedTransport::with(vec![Ok(ApiResponse::new(
            400,
            json!({"error": "doctor_id required"}),
        ))]);
        let client = client_for(transport.clone());

        let err = client.studies().assign(1, 0).await.unwrap_err();
        assert_eq!(err.user_message(), "doctor_id required");
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(client.metrics().failures("server"), 1);
    }

    #[tokio::test]
    async fn test_mutation_retried_on_transport_failure() {
        let transport = ScriptedTransport::with(vec![
            Err(RengenError::Transport("connection reset".to_string())),
            Ok(ApiResponse::new(200, json!({"status": "confirmed"}))),
        ]);
        let client = client_for(transport.clone());

        let ack = client.studies().update_status(5, "confirmed").await.unwrap();
        assert_eq!(ack.status.as_deref(), Some("confirmed"));
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(client.metrics().retries(), 1);
        assert_eq!(client.metrics().requests("PUT"), 2);
    }

    #[tokio::test]
    async fn test_read_retried_on_server_error() {
        let transport = ScriptedTransport::with(vec![
            Ok(ApiResponse::new(503, Value::Null)),
            Ok(ApiResponse::new(
                200,
                json!({"results": [{"id": 1, "research_number": "A", "priority": "asap"}]}),
            )),
        ]);
        let client = client_for(transport.clone());

        let studies = client.studies().pending().await.unwrap();
        assert_eq!(studies.len(), 1);
        assert_eq!(studies[0].priority, Priority::Asap);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_archive_sets_inactive() {
        let transport = ScriptedTransport::with(vec![
            Ok(ApiResponse::new(
                200,
                json!({"id": 30, "fio_alias": "Lapin V.S.", "position_type": "radiologist",
                       "max_up_per_day": 120, "is_active": true, "modality": ["XRAY"]}),
            )),
            Ok(ApiResponse::new(
                200,
                json!({"id": 30, "fio_alias": "Lapin V.S.", "is_active": false}),
            )),
        ]);
        let client = client_for(transport.clone());

        let doctor = client.doctors().archive(30).await.unwrap();
        assert!(!doctor.is_active);

        let requests = transport.requests();
        assert_eq!(requests[1].method, Method::Put);
        assert_eq!(requests[1].body.as_ref().unwrap()["is_active"], json!(false));
        assert_eq!(requests[1].body.as_ref().unwrap()["modality"], json!(["XRAY"]));
    }

    #[tokio::test]
    async fn test_dashboard_stats_date_parameter() {
        let transport = ScriptedTransport::with(vec![Ok(ApiResponse::new(
            200,
            json!({"total_studies": 10, "completed_studies": 4}),
        ))]);
        let client = client_for(transport.clone());

        let stats = client
            .dashboard()
            .stats(NaiveDate::from_ymd_opt(2025, 10, 17))
            .await
            .unwrap();
        assert_eq!(stats.total_studies, 10);
        assert_eq!(stats.pending_studies, 0);
        assert_eq!(
            transport.requests()[0].query,
            vec![("date".to_string(), "2025-10-17".to_string())]
        );
    }

    #[test]
    fn test_confirmed_study_query() {
        let pairs = StudyQuery::confirmed_for(27).to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("status".to_string(), "confirmed".to_string()),
                ("diagnostician_id".to_string(), "27".to_string()),
            ]
        );
    }
}
