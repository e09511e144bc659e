//! 排班编辑
//!
//! 点击格子打开对话框：已有班次进入编辑模式，否则进入新建模式。
//! 保存或删除成功后重新加载当前周。

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rengen_client::{ApiClient, ScheduleQuery};
use rengen_core::{Doctor, RengenError, Result, Schedule, ScheduleDraft};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::schedule_grid::{find_schedule, DoctorFilter, LoadThresholds, ScheduleGrid, WeekNavigator};

/// 排班页面用到的后端接口
#[async_trait]
pub trait PlanningBackend: Send + Sync {
    async fn doctors(&self) -> Result<Vec<Doctor>>;
    async fn schedules(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>>;
    async fn create_schedule(&self, draft: &ScheduleDraft) -> Result<Schedule>;
    async fn update_schedule(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule>;
    async fn delete_schedule(&self, id: i64) -> Result<()>;
}

#[async_trait]
impl PlanningBackend for ApiClient {
    async fn doctors(&self) -> Result<Vec<Doctor>> {
        self.doctors().list().await
    }

    async fn schedules(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>> {
        self.schedules().list(query).await
    }

    async fn create_schedule(&self, draft: &ScheduleDraft) -> Result<Schedule> {
        self.schedules().create(draft).await
    }

    async fn update_schedule(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule> {
        self.schedules().update(id, draft).await
    }

    async fn delete_schedule(&self, id: i64) -> Result<()> {
        self.schedules().delete(id).await
    }
}

#[async_trait]
impl<T: PlanningBackend + ?Sized> PlanningBackend for Arc<T> {
    async fn doctors(&self) -> Result<Vec<Doctor>> {
        (**self).doctors().await
    }

    async fn schedules(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>> {
        (**self).schedules(query).await
    }

    async fn create_schedule(&self, draft: &ScheduleDraft) -> Result<Schedule> {
        (**self).create_schedule(draft).await
    }

    async fn update_schedule(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule> {
        (**self).update_schedule(id, draft).await
    }

    async fn delete_schedule(&self, id: i64) -> Result<()> {
        (**self).delete_schedule(id).await
    }
}

/// 新建班次的默认时间
pub const DEFAULT_SHIFT_START: (u32, u32) = (9, 0);
pub const DEFAULT_SHIFT_END: (u32, u32) = (17, 0);

/// 班次表单
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleForm {
    pub doctor_id: i64,
    pub work_date: NaiveDate,
    pub time_start: Option<NaiveTime>,
    pub time_end: Option<NaiveTime>,
    pub is_day_off: bool,
    pub planned_up: Option<i32>,
}

impl ScheduleForm {
    pub fn blank(doctor_id: i64, work_date: NaiveDate) -> Self {
        Self {
            doctor_id,
            work_date,
            time_start: NaiveTime::from_hms_opt(DEFAULT_SHIFT_START.0, DEFAULT_SHIFT_START.1, 0),
            time_end: NaiveTime::from_hms_opt(DEFAULT_SHIFT_END.0, DEFAULT_SHIFT_END.1, 0),
            is_day_off: false,
            planned_up: None,
        }
    }

    /// 用已有班次填充，医生和日期取格子的位置
    pub fn from_schedule(schedule: &Schedule, doctor_id: i64, work_date: NaiveDate) -> Self {
        Self {
            doctor_id,
            work_date,
            time_start: schedule.time_start,
            time_end: schedule.time_end,
            is_day_off: schedule.is_day_off,
            planned_up: schedule.planned_up,
        }
    }

    /// 校验并生成提交数据
    ///
    /// 休息日不提交时间；工作日需要开始与结束时间且结束晚于开始。
    pub fn validate(&self) -> Result<ScheduleDraft> {
        if let Some(planned) = self.planned_up {
            if planned < 0 {
                return Err(RengenError::Validation("Planned UP cannot be negative".to_string()));
            }
        }

        if self.is_day_off {
            return Ok(ScheduleDraft {
                doctor: self.doctor_id,
                work_date: self.work_date,
                time_start: None,
                time_end: None,
                is_day_off: true,
                planned_up: self.planned_up,
            });
        }

        let (start, end) = match (self.time_start, self.time_end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(RengenError::Validation(
                    "Shift start and end time are required".to_string(),
                ))
            }
        };
        if end <= start {
            return Err(RengenError::Validation(
                "Shift end must be after shift start".to_string(),
            ));
        }

        Ok(ScheduleDraft {
            doctor: self.doctor_id,
            work_date: self.work_date,
            time_start: Some(start),
            time_end: Some(end),
            is_day_off: false,
            planned_up: self.planned_up,
        })
    }
}

/// 对话框模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DialogMode {
    Create,
    Edit { schedule_id: i64 },
}

/// 排班对话框
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum ScheduleDialog {
    #[default]
    Closed,
    Open { mode: DialogMode, form: ScheduleForm },
}

impl ScheduleDialog {
    /// 根据格子是否已有班次决定模式
    pub fn for_cell(doctor_id: i64, date: NaiveDate, existing: Option<&Schedule>) -> Self {
        match existing {
            Some(schedule) => Self::Open {
                mode: DialogMode::Edit {
                    schedule_id: schedule.id,
                },
                form: ScheduleForm::from_schedule(schedule, doctor_id, date),
            },
            None => Self::Open {
                mode: DialogMode::Create,
                form: ScheduleForm::blank(doctor_id, date),
            },
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn mode(&self) -> Option<DialogMode> {
        match self {
            Self::Open { mode, .. } => Some(*mode),
            Self::Closed => None,
        }
    }

    pub fn form(&self) -> Option<&ScheduleForm> {
        match self {
            Self::Open { form, .. } => Some(form),
            Self::Closed => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut ScheduleForm> {
        match self {
            Self::Open { form, .. } => Some(form),
            Self::Closed => None,
        }
    }

    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

/// 排班页面
pub struct PlanningScreen<B> {
    backend: B,
    navigator: WeekNavigator,
    filter: DoctorFilter,
    thresholds: LoadThresholds,
    doctors: Vec<Doctor>,
    schedules: Vec<Schedule>,
    dialog: ScheduleDialog,
}

impl<B: PlanningBackend> PlanningScreen<B> {
    pub fn new(backend: B, navigator: WeekNavigator, thresholds: LoadThresholds) -> Self {
        Self {
            backend,
            navigator,
            filter: DoctorFilter::All,
            thresholds,
            doctors: Vec::new(),
            schedules: Vec::new(),
            dialog: ScheduleDialog::Closed,
        }
    }

    pub fn with_filter(mut self, filter: DoctorFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn navigator(&self) -> &WeekNavigator {
        &self.navigator
    }

    pub fn filter(&self) -> DoctorFilter {
        self.filter
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn dialog(&self) -> &ScheduleDialog {
        &self.dialog
    }

    pub fn dialog_mut(&mut self) -> &mut ScheduleDialog {
        &mut self.dialog
    }

    /// 加载医生和当前周的班次
    pub async fn load(&mut self) -> Result<()> {
        self.doctors = self.backend.doctors().await?;
        self.reload_week().await
    }

    /// 重新加载当前周的班次
    pub async fn reload_week(&mut self) -> Result<()> {
        let (monday, sunday) = self.navigator.range();
        let query = ScheduleQuery::between(monday, sunday).for_doctor(self.filter.doctor_id());

        match self.backend.schedules(&query).await {
            Ok(schedules) => {
                info!("Loaded {} schedules for week {} - {}", schedules.len(), monday, sunday);
                self.schedules = schedules;
                Ok(())
            }
            Err(e) => {
                error!("Failed to load schedules: {}", e);
                Err(e)
            }
        }
    }

    pub async fn previous_week(&mut self) -> Result<()> {
        self.navigator.previous_week();
        self.reload_week().await
    }

    pub async fn next_week(&mut self) -> Result<()> {
        self.navigator.next_week();
        self.reload_week().await
    }

    pub async fn jump_to(&mut self, today: NaiveDate) -> Result<()> {
        self.navigator.jump_to(today);
        self.reload_week().await
    }

    pub async fn set_filter(&mut self, filter: DoctorFilter) -> Result<()> {
        self.filter = filter;
        self.reload_week().await
    }

    pub fn grid(&self) -> ScheduleGrid {
        ScheduleGrid::build(
            &self.doctors,
            &self.schedules,
            self.navigator.window(),
            self.filter,
            &self.thresholds,
        )
    }

    /// 打开格子对应的对话框
    pub fn open_cell(&mut self, doctor_id: i64, date: NaiveDate) -> &ScheduleDialog {
        let existing = find_schedule(&self.schedules, doctor_id, date);
        self.dialog = ScheduleDialog::for_cell(doctor_id, date, existing);
        &self.dialog
    }

    /// 保存对话框
    ///
    /// 校验或提交失败时对话框保持打开。保存成功后刷新失败只记录警告。
    pub async fn submit(&mut self) -> Result<Schedule> {
        let (mode, draft) = match &self.dialog {
            ScheduleDialog::Open { mode, form } => (*mode, form.validate()?),
            ScheduleDialog::Closed => {
                return Err(RengenError::Validation("No schedule dialog is open".to_string()))
            }
        };

        let saved = match mode {
            DialogMode::Create => self.backend.create_schedule(&draft).await,
            DialogMode::Edit { schedule_id } => self.backend.update_schedule(schedule_id, &draft).await,
        };
        let saved = match saved {
            Ok(saved) => saved,
            Err(e) => {
                error!("Failed to save schedule for doctor {}: {}", draft.doctor, e);
                return Err(e);
            }
        };

        info!("Saved schedule {} for doctor {} on {}", saved.id, draft.doctor, draft.work_date);
        self.dialog.close();
        if let Err(e) = self.reload_week().await {
            warn!("Schedule {} saved but refresh failed: {}", saved.id, e);
        }
        Ok(saved)
    }

    /// 删除班次，需要用户确认
    ///
    /// 未确认时不调用后端，返回 `false`。
    pub async fn delete(&mut self, schedule_id: i64, confirmed: bool) -> Result<bool> {
        if !confirmed {
            return Ok(false);
        }

        if let Err(e) = self.backend.delete_schedule(schedule_id).await {
            error!("Failed to delete schedule {}: {}", schedule_id, e);
            return Err(e);
        }

        info!("Deleted schedule {}", schedule_id);
        self.dialog.close();
        if let Err(e) = self.reload_week().await {
            warn!("Schedule {} deleted but refresh failed: {}", schedule_id, e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule_grid::LoadBucket;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn time(h: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, 0, 0)
    }

    #[derive(Default)]
    struct FakePlanning {
        schedules: Mutex<Vec<Schedule>>,
        queries: Mutex<Vec<ScheduleQuery>>,
        deleted: Mutex<Vec<i64>>,
        next_id: Mutex<i64>,
        reject_writes: bool,
        fail_reads: AtomicBool,
    }

    impl FakePlanning {
        fn store(&self, id: i64, draft: &ScheduleDraft) -> Schedule {
            let saved: Schedule = serde_json::from_value(json!({
                "id": id,
                "doctor": draft.doctor,
                "work_date": draft.work_date.to_string(),
                "time_start": draft.time_start.map(|t| t.format("%H:%M:%S").to_string()),
                "time_end": draft.time_end.map(|t| t.format("%H:%M:%S").to_string()),
                "is_day_off": draft.is_day_off,
                "planned_up": draft.planned_up
            }))
            .unwrap();
            let mut schedules = self.schedules.lock().unwrap();
            schedules.retain(|s| s.id != id);
            schedules.push(saved.clone());
            saved
        }
    }

    #[async_trait]
    impl PlanningBackend for FakePlanning {
        async fn doctors(&self) -> Result<Vec<Doctor>> {
            Ok(serde_json::from_value(json!([
                {"id": 26, "fio_alias": "Zabolotskikh D.M.", "max_up_per_day": 120},
                {"id": 27, "fio_alias": "Ostrovskaya E.B.", "max_up_per_day": 100}
            ]))?)
        }

        async fn schedules(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>> {
            self.queries.lock().unwrap().push(query.clone());
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(RengenError::Server {
                    status: 503,
                    detail: None,
                });
            }
            Ok(self.schedules.lock().unwrap().clone())
        }

        async fn create_schedule(&self, draft: &ScheduleDraft) -> Result<Schedule> {
            if self.reject_writes {
                return Err(RengenError::Server {
                    status: 400,
                    detail: Some("schedule already exists".to_string()),
                });
            }
            let id = {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                *next
            };
            Ok(self.store(id, draft))
        }

        async fn update_schedule(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule> {
            Ok(self.store(id, draft))
        }

        async fn delete_schedule(&self, id: i64) -> Result<()> {
            self.deleted.lock().unwrap().push(id);
            self.schedules.lock().unwrap().retain(|s| s.id != id);
            Ok(())
        }
    }

    #[test]
    fn test_form_validation() {
        let mut form = ScheduleForm::blank(26, date(13));
        assert!(form.validate().is_ok());

        form.time_end = time(8);
        assert!(matches!(form.validate(), Err(RengenError::Validation(_))));

        // 休息日忽略时间
        form.is_day_off = true;
        let draft = form.validate().unwrap();
        assert!(draft.time_start.is_none());
        assert!(draft.is_day_off);

        form.planned_up = Some(-1);
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_missing_times_rejected() {
        let mut form = ScheduleForm::blank(26, date(13));
        form.time_start = None;
        assert!(form.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_then_edit_then_delete() {
        let backend = Arc::new(FakePlanning::default());
        let mut screen = PlanningScreen::new(
            Arc::clone(&backend),
            WeekNavigator::new(date(15)),
            LoadThresholds::default(),
        );
        screen.load().await.unwrap();
        assert_eq!(screen.doctors().len(), 2);

        // 新建
        screen.open_cell(26, date(13));
        assert_eq!(screen.dialog().mode(), Some(DialogMode::Create));
        if let Some(form) = screen.dialog_mut().form_mut() {
            form.time_end = time(14);
            form.planned_up = Some(100);
        }
        let created = screen.submit().await.unwrap();
        assert!(!screen.dialog().is_open());
        assert_eq!(screen.schedules().len(), 1);

        let grid = screen.grid();
        let cell = grid.cell(26, date(13)).unwrap();
        assert_eq!(cell.time_label.as_deref(), Some("09:00–14:00"));
        assert_eq!(cell.load.bucket, LoadBucket::Warning);

        // 编辑
        screen.open_cell(26, date(13));
        assert_eq!(
            screen.dialog().mode(),
            Some(DialogMode::Edit { schedule_id: created.id })
        );
        if let Some(form) = screen.dialog_mut().form_mut() {
            form.planned_up = Some(115);
        }
        screen.submit().await.unwrap();
        let grid = screen.grid();
        assert_eq!(grid.cell(26, date(13)).unwrap().load.bucket, LoadBucket::Overload);

        // 删除需要确认
        assert!(!screen.delete(created.id, false).await.unwrap());
        assert!(backend.deleted.lock().unwrap().is_empty());
        assert!(screen.delete(created.id, true).await.unwrap());
        assert_eq!(*backend.deleted.lock().unwrap(), vec![created.id]);
        assert!(screen.schedules().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_dialog_open() {
        let backend = Arc::new(FakePlanning {
            reject_writes: true,
            ..Default::default()
        });
        let mut screen = PlanningScreen::new(
            Arc::clone(&backend),
            WeekNavigator::new(date(15)),
            LoadThresholds::default(),
        );
        screen.load().await.unwrap();

        screen.open_cell(27, date(14));
        let err = screen.submit().await.unwrap_err();
        assert_eq!(err.user_message(), "schedule already exists");
        assert!(screen.dialog().is_open());
    }

    #[tokio::test]
    async fn test_write_succeeds_when_refresh_fails() {
        let backend = Arc::new(FakePlanning::default());
        let mut screen = PlanningScreen::new(
            Arc::clone(&backend),
            WeekNavigator::new(date(15)),
            LoadThresholds::default(),
        );
        screen.load().await.unwrap();
        backend.fail_reads.store(true, Ordering::SeqCst);

        screen.open_cell(26, date(13));
        let created = screen.submit().await.unwrap();
        assert!(!screen.dialog().is_open());
        assert_eq!(backend.schedules.lock().unwrap().len(), 1);

        assert!(screen.delete(created.id, true).await.unwrap());
        assert_eq!(*backend.deleted.lock().unwrap(), vec![created.id]);
    }

    #[tokio::test]
    async fn test_week_navigation_queries_window() {
        let backend = Arc::new(FakePlanning::default());
        let mut screen = PlanningScreen::new(
            Arc::clone(&backend),
            WeekNavigator::new(date(15)),
            LoadThresholds::default(),
        );
        screen.load().await.unwrap();
        screen.next_week().await.unwrap();
        screen.set_filter(DoctorFilter::Doctor(27)).await.unwrap();

        let queries = backend.queries.lock().unwrap();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].date_from, Some(date(13)));
        assert_eq!(queries[1].date_from, Some(date(20)));
        assert_eq!(queries[2].doctor_id, Some(27));
    }
}
