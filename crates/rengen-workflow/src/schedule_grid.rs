//! 周排班网格
//!
//! 周一到周日七天，每位医生一行，每格显示班次时间与计划负载。

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};
use rengen_core::utils::{format_shift_time, DEFAULT_MAX_UP_PER_DAY};
use rengen_core::{Doctor, Schedule};
use serde::{Deserialize, Serialize};

use crate::presentation::Tone;

/// 包含 `pivot` 的那一周（周一开始）
pub fn week_window(pivot: NaiveDate) -> [NaiveDate; 7] {
    let monday = pivot - Duration::days(pivot.weekday().num_days_from_monday() as i64);
    std::array::from_fn(|offset| monday + Duration::days(offset as i64))
}

/// 以时刻所在的日期计算周窗口
pub fn week_window_at<Tz: TimeZone>(moment: &DateTime<Tz>) -> [NaiveDate; 7] {
    week_window(moment.date_naive())
}

/// 周切换
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekNavigator {
    pivot: NaiveDate,
}

impl WeekNavigator {
    pub fn new(pivot: NaiveDate) -> Self {
        Self { pivot }
    }

    /// 从本地时间的今天开始
    pub fn current() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn pivot(&self) -> NaiveDate {
        self.pivot
    }

    pub fn window(&self) -> [NaiveDate; 7] {
        week_window(self.pivot)
    }

    /// 周一和周日
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        let window = self.window();
        (window[0], window[6])
    }

    pub fn previous_week(&mut self) {
        self.pivot -= Duration::days(7);
    }

    pub fn next_week(&mut self) {
        self.pivot += Duration::days(7);
    }

    pub fn jump_to(&mut self, today: NaiveDate) {
        self.pivot = today;
    }
}

/// 医生筛选
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DoctorFilter {
    #[default]
    All,
    Doctor(i64),
}

impl DoctorFilter {
    /// 作为查询参数的医生ID
    pub fn doctor_id(&self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Doctor(id) => Some(*id),
        }
    }

    pub fn matches(&self, doctor_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Doctor(id) => *id == doctor_id,
        }
    }
}

/// 负载分级阈值（百分比）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LoadThresholds {
    pub warning_percent: f64,
    pub overload_percent: f64,
    /// 医生未设置每日上限时使用
    pub default_max_up: i32,
}

impl Default for LoadThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            overload_percent: 95.0,
            default_max_up: DEFAULT_MAX_UP_PER_DAY,
        }
    }
}

/// 格子的负载等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LoadBucket {
    Normal,
    Warning,
    Overload,
    Empty,
}

impl LoadBucket {
    pub fn tone(&self) -> Tone {
        match self {
            Self::Normal => Tone::Success,
            Self::Warning => Tone::Warning,
            Self::Overload => Tone::Critical,
            Self::Empty => Tone::Neutral,
        }
    }

    pub fn color(&self) -> &'static str {
        self.tone().color()
    }
}

impl LoadThresholds {
    pub fn bucket_for(&self, percent: f64) -> LoadBucket {
        if percent > self.overload_percent {
            LoadBucket::Overload
        } else if percent >= self.warning_percent {
            LoadBucket::Warning
        } else {
            LoadBucket::Normal
        }
    }
}

/// 计划负载
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CellLoad {
    pub percent: f64,
    pub bucket: LoadBucket,
}

impl CellLoad {
    pub fn empty() -> Self {
        Self {
            percent: 0.0,
            bucket: LoadBucket::Empty,
        }
    }

    /// 无班次或休息日为空；计划UP缺失按0计
    pub fn compute(schedule: Option<&Schedule>, doctor: &Doctor, thresholds: &LoadThresholds) -> Self {
        let schedule = match schedule {
            Some(schedule) if !schedule.is_day_off => schedule,
            _ => return Self::empty(),
        };

        let planned = schedule.planned_up.unwrap_or(0).max(0) as f64;
        let max_up = doctor.max_up_per_day.unwrap_or(thresholds.default_max_up) as f64;
        let percent = if max_up > 0.0 {
            planned / max_up * 100.0
        } else if planned > 0.0 {
            100.0
        } else {
            0.0
        };

        Self {
            percent,
            bucket: thresholds.bucket_for(percent),
        }
    }
}

/// 班次时间，例如 `09:00–14:00`
pub fn shift_label(schedule: &Schedule) -> String {
    format!(
        "{}–{}",
        format_shift_time(schedule.time_start),
        format_shift_time(schedule.time_end)
    )
}

/// 某医生某天的班次
pub fn find_schedule(schedules: &[Schedule], doctor_id: i64, date: NaiveDate) -> Option<&Schedule> {
    schedules.iter().find(|s| s.belongs_to(doctor_id, date))
}

/// 表头，例如 `Mon 13.10`
pub fn day_header(date: NaiveDate) -> String {
    date.format("%a %d.%m").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridCell {
    pub date: NaiveDate,
    pub schedule: Option<Schedule>,
    pub day_off: bool,
    pub time_label: Option<String>,
    pub load: CellLoad,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridRow {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub specialty: String,
    pub cells: Vec<GridCell>,
}

/// 周排班网格
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleGrid {
    pub days: [NaiveDate; 7],
    pub headers: Vec<String>,
    pub rows: Vec<GridRow>,
}

impl ScheduleGrid {
    /// 构建网格，只保留筛选条件匹配的医生
    pub fn build(
        doctors: &[Doctor],
        schedules: &[Schedule],
        days: [NaiveDate; 7],
        filter: DoctorFilter,
        thresholds: &LoadThresholds,
    ) -> Self {
        let rows = doctors
            .iter()
            .filter(|doctor| filter.matches(doctor.id))
            .map(|doctor| GridRow {
                doctor_id: doctor.id,
                doctor_name: doctor.display_name(),
                specialty: doctor.specialty_label(),
                cells: days
                    .iter()
                    .map(|&date| {
                        let schedule = find_schedule(schedules, doctor.id, date);
                        let day_off = schedule.map(|s| s.is_day_off).unwrap_or(false);
                        GridCell {
                            date,
                            schedule: schedule.cloned(),
                            day_off,
                            time_label: schedule.filter(|s| !s.is_day_off).map(shift_label),
                            load: CellLoad::compute(schedule, doctor, thresholds),
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            days,
            headers: days.iter().map(|d| day_header(*d)).collect(),
            rows,
        }
    }

    pub fn cell(&self, doctor_id: i64, date: NaiveDate) -> Option<&GridCell> {
        self.rows
            .iter()
            .find(|row| row.doctor_id == doctor_id)
            .and_then(|row| row.cells.iter().find(|cell| cell.date == date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn doctor(id: i64, max_up: Option<i32>) -> Doctor {
        serde_json::from_value(json!({
            "id": id,
            "fio_alias": format!("Doctor {}", id),
            "max_up_per_day": max_up
        }))
        .unwrap()
    }

    fn schedule(id: i64, doctor_id: i64, day: &str, planned: Option<i32>, day_off: bool) -> Schedule {
        serde_json::from_value(json!({
            "id": id,
            "doctor": doctor_id,
            "work_date": day,
            "time_start": if day_off { json!(null) } else { json!("09:00:00") },
            "time_end": if day_off { json!(null) } else { json!("14:00:00") },
            "is_day_off": if day_off { 1 } else { 0 },
            "planned_up": planned
        }))
        .unwrap()
    }

    #[test]
    fn test_week_window_starts_on_monday() {
        let window = week_window(date(2025, 10, 15));
        assert_eq!(window[0], date(2025, 10, 13));
        assert_eq!(window[6], date(2025, 10, 19));

        // 周日属于前一个周一开始的周
        assert_eq!(week_window(date(2025, 10, 19))[0], date(2025, 10, 13));
        assert_eq!(week_window(date(2025, 10, 13))[0], date(2025, 10, 13));
    }

    #[test]
    fn test_week_window_at_moment() {
        let moment = chrono::Utc.with_ymd_and_hms(2025, 10, 15, 23, 30, 0).unwrap();
        assert_eq!(week_window_at(&moment)[0], date(2025, 10, 13));
    }

    #[test]
    fn test_navigator() {
        let mut nav = WeekNavigator::new(date(2025, 10, 15));
        nav.next_week();
        assert_eq!(nav.range(), (date(2025, 10, 20), date(2025, 10, 26)));
        nav.previous_week();
        nav.previous_week();
        assert_eq!(nav.range(), (date(2025, 10, 6), date(2025, 10, 12)));
        nav.jump_to(date(2025, 10, 17));
        assert_eq!(nav.range().0, date(2025, 10, 13));
    }

    #[test]
    fn test_load_buckets() {
        let thresholds = LoadThresholds::default();
        let doc = doctor(26, Some(120));

        let warning = schedule(1, 26, "2025-10-13", Some(100), false);
        assert_eq!(CellLoad::compute(Some(&warning), &doc, &thresholds).bucket, LoadBucket::Warning);

        let overload = schedule(2, 26, "2025-10-14", Some(115), false);
        assert_eq!(CellLoad::compute(Some(&overload), &doc, &thresholds).bucket, LoadBucket::Overload);

        let normal = schedule(3, 26, "2025-10-15", Some(60), false);
        let load = CellLoad::compute(Some(&normal), &doc, &thresholds);
        assert_eq!(load.bucket, LoadBucket::Normal);
        assert_eq!(load.percent, 50.0);

        let off = schedule(4, 26, "2025-10-16", None, true);
        assert_eq!(CellLoad::compute(Some(&off), &doc, &thresholds).bucket, LoadBucket::Empty);
        assert_eq!(CellLoad::compute(None, &doc, &thresholds), CellLoad::empty());
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let thresholds = LoadThresholds::default();
        // 未设置上限按120计
        let doc = doctor(26, None);
        let sched = schedule(1, 26, "2025-10-13", Some(96), false);
        assert_eq!(CellLoad::compute(Some(&sched), &doc, &thresholds).percent, 80.0);

        let unplanned = schedule(2, 26, "2025-10-14", None, false);
        let load = CellLoad::compute(Some(&unplanned), &doc, &thresholds);
        assert_eq!(load.percent, 0.0);
        assert_eq!(load.bucket, LoadBucket::Normal);
    }

    #[test]
    fn test_grid_build_with_filter() {
        let doctors = vec![doctor(26, Some(120)), doctor(27, Some(100))];
        let schedules = vec![
            schedule(1, 26, "2025-10-13", Some(100), false),
            schedule(2, 27, "2025-10-13", Some(50), false),
            schedule(3, 26, "2025-10-18", None, true),
        ];
        let days = week_window(date(2025, 10, 15));

        let grid = ScheduleGrid::build(&doctors, &schedules, days, DoctorFilter::All, &LoadThresholds::default());
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.headers[0], "Mon 13.10");

        let cell = grid.cell(26, date(2025, 10, 13)).unwrap();
        assert_eq!(cell.time_label.as_deref(), Some("09:00–14:00"));
        assert_eq!(cell.load.bucket, LoadBucket::Warning);

        let off = grid.cell(26, date(2025, 10, 18)).unwrap();
        assert!(off.day_off);
        assert!(off.time_label.is_none());

        let empty = grid.cell(26, date(2025, 10, 19)).unwrap();
        assert!(empty.schedule.is_none());
        assert_eq!(empty.load.bucket.color(), Tone::Neutral.color());

        let filtered = ScheduleGrid::build(&doctors, &schedules, days, DoctorFilter::Doctor(27), &LoadThresholds::default());
        assert_eq!(filtered.rows.len(), 1);
        assert_eq!(filtered.rows[0].doctor_id, 27);
    }
}
