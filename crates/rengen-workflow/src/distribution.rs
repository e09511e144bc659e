//! 检查分配页面
//!
//! 同时加载待分配队列与医生负载，协调分配面板、抽屉缓存和后端调用。

use async_trait::async_trait;
use rengen_client::{ApiClient, StudyQuery};
use rengen_core::{AssignmentAck, DoctorWithLoad, RengenError, Result, Study};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::assignment::{AssignmentEvent, AssignmentPanel};
use crate::drawer::AssignedStudiesCache;
use crate::load::{DoctorLoad, DEFAULT_OVERLOAD_RATIO};
use crate::queue::{Paginator, QueueViewModel};

/// 分配页面用到的后端接口
#[async_trait]
pub trait DistributionBackend: Send + Sync {
    async fn pending_studies(&self) -> Result<Vec<Study>>;
    async fn doctors_with_load(&self) -> Result<Vec<DoctorWithLoad>>;
    async fn assign(&self, study_id: i64, doctor_id: i64) -> Result<AssignmentAck>;
    async fn confirmed_studies(&self, doctor_id: i64) -> Result<Vec<Study>>;
}

#[async_trait]
impl DistributionBackend for ApiClient {
    async fn pending_studies(&self) -> Result<Vec<Study>> {
        self.studies().pending().await
    }

    async fn doctors_with_load(&self) -> Result<Vec<DoctorWithLoad>> {
        self.doctors().list_with_load().await
    }

    async fn assign(&self, study_id: i64, doctor_id: i64) -> Result<AssignmentAck> {
        self.studies().assign(study_id, doctor_id).await
    }

    async fn confirmed_studies(&self, doctor_id: i64) -> Result<Vec<Study>> {
        self.studies().list(&StudyQuery::confirmed_for(doctor_id)).await
    }
}

#[async_trait]
impl<T: DistributionBackend + ?Sized> DistributionBackend for Arc<T> {
    async fn pending_studies(&self) -> Result<Vec<Study>> {
        (**self).pending_studies().await
    }

    async fn doctors_with_load(&self) -> Result<Vec<DoctorWithLoad>> {
        (**self).doctors_with_load().await
    }

    async fn assign(&self, study_id: i64, doctor_id: i64) -> Result<AssignmentAck> {
        (**self).assign(study_id, doctor_id).await
    }

    async fn confirmed_studies(&self, doctor_id: i64) -> Result<Vec<Study>> {
        (**self).confirmed_studies(doctor_id).await
    }
}

/// 一次加载得到的页面数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionSnapshot {
    pub queue: QueueViewModel,
    pub doctors: Vec<DoctorWithLoad>,
    pub loads: Vec<DoctorLoad>,
}

/// 分配页面
pub struct DistributionScreen<B> {
    backend: B,
    paginator: Paginator,
    overload_ratio: f64,
    panel: AssignmentPanel,
    drawer: AssignedStudiesCache,
    snapshot: Option<DistributionSnapshot>,
}

impl<B: DistributionBackend> DistributionScreen<B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, Paginator::default(), DEFAULT_OVERLOAD_RATIO)
    }

    pub fn with_settings(backend: B, paginator: Paginator, overload_ratio: f64) -> Self {
        Self {
            backend,
            paginator,
            overload_ratio,
            panel: AssignmentPanel::new(),
            drawer: AssignedStudiesCache::new(),
            snapshot: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn panel(&self) -> &AssignmentPanel {
        &self.panel
    }

    pub fn drawer(&self) -> &AssignedStudiesCache {
        &self.drawer
    }

    pub fn snapshot(&self) -> Option<&DistributionSnapshot> {
        self.snapshot.as_ref()
    }

    /// 并发加载队列和医生负载
    ///
    /// 任一请求失败时保留上一次的数据并返回错误。
    pub async fn reload(&mut self) -> Result<()> {
        let loaded = tokio::try_join!(
            self.backend.pending_studies(),
            self.backend.doctors_with_load()
        );

        let (studies, doctors) = match loaded {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to load distribution data: {}", e);
                return Err(e);
            }
        };

        let current_page = self.snapshot.as_ref().map(|s| s.queue.current_page()).unwrap_or(1);
        let mut queue = QueueViewModel::from_snapshot(studies, self.paginator);
        queue.go_to(current_page);

        let loads = doctors
            .iter()
            .map(|entry| DoctorLoad::from_snapshot(entry, self.overload_ratio))
            .collect();

        info!(
            "Loaded {} pending studies and {} doctors",
            queue.len(),
            doctors.len()
        );
        self.snapshot = Some(DistributionSnapshot { queue, doctors, loads });
        Ok(())
    }

    pub fn go_to_page(&mut self, page: usize) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.queue.go_to(page);
        }
    }

    /// 选择队列中的检查
    pub fn select_study(&mut self, study_id: i64) -> Result<()> {
        let study = self
            .snapshot
            .as_ref()
            .and_then(|s| s.queue.find(study_id))
            .cloned()
            .ok_or_else(|| RengenError::NotFound(format!("Study {} is not in the queue", study_id)))?;
        self.panel.apply(AssignmentEvent::SelectStudy(study))?;
        Ok(())
    }

    /// 暂存医生，未选择检查时被拒绝
    pub fn select_doctor(&mut self, doctor_id: i64) -> Result<()> {
        self.panel.apply(AssignmentEvent::SelectDoctor(doctor_id))?;
        Ok(())
    }

    pub fn clear_doctor(&mut self) -> Result<()> {
        self.panel.apply(AssignmentEvent::ClearDoctor)?;
        Ok(())
    }

    pub fn cancel(&mut self) {
        // Cancel 在任何阶段都有效
        let _ = self.panel.apply(AssignmentEvent::Cancel);
    }

    /// 确认分配
    ///
    /// 成功后清空选择、让该医生的抽屉缓存失效并刷新页面；
    /// 失败时保留选择以便重试。
    pub async fn confirm(&mut self) -> Result<AssignmentAck> {
        let (study_id, doctor_id) = self.panel.pending_assignment()?;
        self.submit(study_id, doctor_id).await
    }

    /// 分配给列表中的第一位医生
    ///
    /// 不暂存医生，失败时面板保持原状。
    pub async fn auto_assign(&mut self) -> Result<AssignmentAck> {
        let doctors = self
            .snapshot
            .as_ref()
            .map(|s| s.doctors.as_slice())
            .unwrap_or_default();
        let (study_id, doctor_id) = self.panel.auto_target(doctors)?;
        self.submit(study_id, doctor_id).await
    }

    async fn submit(&mut self, study_id: i64, doctor_id: i64) -> Result<AssignmentAck> {
        info!("Assigning study {} to doctor {}", study_id, doctor_id);
        let ack = match self.backend.assign(study_id, doctor_id).await {
            Ok(ack) => ack,
            Err(e) => {
                error!("Assignment of study {} failed: {}", study_id, e);
                return Err(e);
            }
        };

        self.panel.apply(AssignmentEvent::Assigned)?;
        self.drawer.invalidate(doctor_id);
        self.drawer.collapse(doctor_id);

        if let Err(e) = self.reload().await {
            warn!("Assignment succeeded but refresh failed: {}", e);
        }
        Ok(ack)
    }

    /// 展开或收起医生的已分配检查
    pub async fn toggle_drawer(&mut self, doctor_id: i64) -> Result<Option<&[Study]>> {
        let backend = &self.backend;
        self.drawer
            .toggle(doctor_id, |id| backend.confirmed_studies(id))
            .await
    }
}
