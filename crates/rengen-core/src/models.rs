//! 核心数据模型定义
//!
//! 后端返回的数据形状并不统一：医生字段可能是ID也可能是嵌套对象，
//! 日期可能带时间部分，`is_day_off` 可能是整数也可能是布尔值。
//! 这些差异在反序列化时统一处理，调用方只看到规范化后的结构。

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::{parse_shift_time, parse_timestamp, parse_work_date, DEFAULT_MAX_UP_PER_DAY};

/// 医生职位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Radiologist,   // 放射科医生
    Diagnostician, // CT诊断医生
    #[serde(other)]
    Other,
}

impl PositionType {
    /// 展示用的专业名称
    pub fn specialty_label(&self) -> &'static str {
        match self {
            Self::Radiologist => "Radiologist",
            Self::Diagnostician => "CT diagnostician",
            Self::Other => "Other",
        }
    }
}

/// 医生信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: i64,
    #[serde(default)]
    pub fio_alias: Option<String>, // 显示名
    #[serde(default)]
    pub position_type: Option<PositionType>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub modality: Vec<String>, // 可处理的检查设备类型
    #[serde(default)]
    pub max_up_per_day: Option<i32>,
    #[serde(default = "default_active", deserialize_with = "null_as_active")]
    pub is_active: bool,
    #[serde(default)]
    pub specialty: Option<String>,
}

impl Doctor {
    pub fn display_name(&self) -> String {
        self.fio_alias
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("Doctor {}", self.id))
    }

    /// 每日最大UP，未设置时取后端默认值
    pub fn max_up(&self) -> i32 {
        self.max_up_per_day.unwrap_or(DEFAULT_MAX_UP_PER_DAY)
    }

    pub fn specialty_label(&self) -> String {
        match (&self.specialty, self.position_type) {
            (Some(specialty), _) if !specialty.is_empty() => specialty.clone(),
            (_, Some(position)) => position.specialty_label().to_string(),
            _ => String::new(),
        }
    }

    pub fn supports_modality(&self, modality: &str) -> bool {
        self.modality.iter().any(|m| m.eq_ignore_ascii_case(modality))
    }
}

/// 创建或编辑医生时提交的表单
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorDraft {
    pub fio_alias: String,
    pub position_type: PositionType,
    pub modality: Vec<String>,
    pub max_up_per_day: i32,
    pub is_active: bool,
}

impl From<&Doctor> for DoctorDraft {
    fn from(doctor: &Doctor) -> Self {
        Self {
            fio_alias: doctor.display_name(),
            position_type: doctor.position_type.unwrap_or(PositionType::Other),
            modality: doctor.modality.clone(),
            max_up_per_day: doctor.max_up(),
            is_active: doctor.is_active,
        }
    }
}

/// 带当前负载的医生（后端聚合接口返回，只读）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorWithLoad {
    #[serde(flatten)]
    pub doctor: Doctor,
    #[serde(default)]
    pub current_load: f64,
    #[serde(default = "default_max_load")]
    pub max_load: f64,
    #[serde(default)]
    pub active_studies: u32,
}

/// 检查类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyType {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub modality: Vec<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub up_value: Option<f64>, // 单次检查的UP
}

/// 检查优先级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Cito, // 危急
    Asap, // 尽快
    #[default]
    #[serde(other)]
    Normal,
}

impl Priority {
    /// 排序权重，越小越靠前
    pub fn rank(&self) -> u8 {
        match self {
            Self::Cito => 1,
            Self::Asap => 2,
            Self::Normal => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cito => "CITO",
            Self::Asap => "ASAP",
            Self::Normal => "PLAN",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cito => "cito",
            Self::Asap => "asap",
            Self::Normal => "normal",
        }
    }
}

/// 后端使用的检查状态值
pub mod study_status {
    pub const PENDING: &str = "pending";
    pub const CONFIRMED: &str = "confirmed";
    pub const SIGNED: &str = "signed";
}

/// 影像检查
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "StudyWire")]
pub struct Study {
    pub id: i64,
    pub research_number: String,
    pub study_type_id: Option<i64>,
    pub study_type: Option<StudyType>,
    pub status: String,
    pub priority: Priority,
    pub created_at: Option<DateTime<Utc>>,
    pub planned_at: Option<DateTime<Utc>>,
    pub diagnostician_id: Option<i64>,
    pub diagnostician: Option<Doctor>,
}

impl Study {
    pub fn is_assigned(&self) -> bool {
        self.diagnostician_id.is_some()
    }

    pub fn study_type_label(&self) -> String {
        self.study_type
            .as_ref()
            .and_then(|t| t.name.clone())
            .or_else(|| self.study_type_id.map(|id| format!("ID: {}", id)))
            .unwrap_or_default()
    }
}

/// 班次记录，每个 (医生, 日期) 至多一条
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ScheduleWire")]
pub struct Schedule {
    pub id: i64,
    pub doctor_id: Option<i64>,
    pub doctor: Option<Doctor>,
    pub doctor_name: Option<String>,
    pub work_date: Option<NaiveDate>,
    pub time_start: Option<NaiveTime>,
    pub time_end: Option<NaiveTime>,
    pub is_day_off: bool,
    pub planned_up: Option<i32>,
}

impl Schedule {
    pub fn belongs_to(&self, doctor_id: i64, date: NaiveDate) -> bool {
        self.doctor_id == Some(doctor_id) && self.work_date == Some(date)
    }
}

/// 创建或更新班次时提交的数据
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleDraft {
    pub doctor: i64,
    #[serde(serialize_with = "serialize_date")]
    pub work_date: NaiveDate,
    #[serde(serialize_with = "serialize_time")]
    pub time_start: Option<NaiveTime>,
    #[serde(serialize_with = "serialize_time")]
    pub time_end: Option<NaiveTime>,
    #[serde(serialize_with = "serialize_flag")]
    pub is_day_off: bool,
    pub planned_up: Option<i32>,
}

/// 看板统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DashboardStats {
    pub total_studies: i64,
    pub completed_studies: i64,
    pub pending_studies: i64,
    pub active_doctors: i64,
    pub avg_load_per_doctor: f64,
    pub cito_studies: i64,
    pub asap_studies: i64,
}

/// 图表数据点（计划/实际）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartData {
    pub name: String,
    #[serde(default)]
    pub plan: i64,
    #[serde(default)]
    pub actual: i64,
}

/// 分配接口的响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentAck {
    pub status: String,
    pub doctor_id: i64,
}

/// 状态更新接口的响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusAck {
    pub status: Option<String>,
}

/// 自动分配预览
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DistributionPreview {
    pub pending_studies: i64,
    pub available_doctors: i64,
    pub estimated_tardiness: Option<f64>,
    pub message: Option<String>,
}

/// 自动分配结果中的单条分配
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributedAssignment {
    pub study_id: i64,
    #[serde(default)]
    pub study_number: Option<String>,
    pub doctor_id: i64,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tardiness_hours: f64,
}

/// 自动分配结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DistributionOutcome {
    pub assigned: i64,
    pub unassigned: i64,
    pub total_tardiness: f64,
    pub avg_tardiness: f64,
    pub assignments: Vec<DistributedAssignment>,
    pub message: Option<String>,
}

// ---- 线上数据形状 ----

/// 医生引用：ID 或嵌套对象
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DoctorRef {
    Id(i64),
    Embedded(Box<Doctor>),
}

impl DoctorRef {
    fn split(self) -> (i64, Option<Doctor>) {
        match self {
            Self::Id(id) => (id, None),
            Self::Embedded(doctor) => (doctor.id, Some(*doctor)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StudyTypeRef {
    Id(i64),
    Embedded(StudyType),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleWire {
    id: i64,
    #[serde(default)]
    doctor: Option<DoctorRef>,
    #[serde(default)]
    doctor_id: Option<i64>,
    #[serde(default)]
    doctor_name: Option<String>,
    #[serde(default)]
    work_date: Option<String>,
    #[serde(default)]
    time_start: Option<String>,
    #[serde(default)]
    time_end: Option<String>,
    #[serde(default)]
    is_day_off: Option<Flag>,
    #[serde(default)]
    planned_up: Option<i32>,
}

impl TryFrom<ScheduleWire> for Schedule {
    type Error = String;

    fn try_from(wire: ScheduleWire) -> Result<Self, Self::Error> {
        let (doctor_id, doctor) = match wire.doctor {
            Some(reference) => {
                let (id, doctor) = reference.split();
                (Some(id), doctor)
            }
            None => (wire.doctor_id, None),
        };

        let work_date = match wire.work_date.as_deref() {
            Some(raw) => Some(
                parse_work_date(raw).ok_or_else(|| format!("invalid work_date: {}", raw))?,
            ),
            None => None,
        };

        let doctor_name = wire
            .doctor_name
            .or_else(|| doctor.as_ref().and_then(|d| d.fio_alias.clone()));

        Ok(Self {
            id: wire.id,
            doctor_id,
            doctor,
            doctor_name,
            work_date,
            time_start: wire.time_start.as_deref().and_then(parse_shift_time),
            time_end: wire.time_end.as_deref().and_then(parse_shift_time),
            is_day_off: wire.is_day_off.map(|flag| flag.is_set()).unwrap_or(false),
            planned_up: wire.planned_up,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StudyWire {
    id: i64,
    #[serde(default)]
    research_number: Option<String>,
    #[serde(default)]
    study_type: Option<StudyTypeRef>,
    #[serde(default)]
    study_type_id: Option<i64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    is_cito: Option<bool>,
    #[serde(default)]
    is_asap: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    planned_at: Option<String>,
    #[serde(default)]
    diagnostician: Option<DoctorRef>,
    #[serde(default)]
    diagnostician_id: Option<i64>,
}

impl TryFrom<StudyWire> for Study {
    type Error = String;

    fn try_from(wire: StudyWire) -> Result<Self, Self::Error> {
        let (study_type_id, study_type) = match wire.study_type {
            Some(StudyTypeRef::Id(id)) => (Some(id), None),
            Some(StudyTypeRef::Embedded(study_type)) => (Some(study_type.id), Some(study_type)),
            None => (wire.study_type_id, None),
        };

        let (diagnostician_id, diagnostician) = match wire.diagnostician {
            Some(reference) => {
                let (id, doctor) = reference.split();
                (Some(id), doctor)
            }
            None => (wire.diagnostician_id, None),
        };

        // 旧版接口用布尔标记表示紧急程度
        let priority = if wire.is_cito.unwrap_or(false) {
            Priority::Cito
        } else if wire.is_asap.unwrap_or(false) {
            Priority::Asap
        } else {
            wire.priority.unwrap_or_default()
        };

        let created_at = parse_optional_timestamp("created_at", wire.created_at.as_deref())?;
        let planned_at = parse_optional_timestamp("planned_at", wire.planned_at.as_deref())?;

        Ok(Self {
            id: wire.id,
            research_number: wire.research_number.unwrap_or_default(),
            study_type_id,
            study_type,
            status: wire.status.unwrap_or_default(),
            priority,
            created_at,
            planned_at,
            diagnostician_id,
            diagnostician,
        })
    }
}

fn parse_optional_timestamp(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| format!("invalid {}: {}", field, raw)),
        _ => Ok(None),
    }
}

fn default_active() -> bool {
    true
}

fn default_max_load() -> f64 {
    DEFAULT_MAX_UP_PER_DAY as f64
}

fn null_as_active<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(value)) => Ok(Some(value)),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn serialize_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

fn serialize_time<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match time {
        Some(time) => serializer.serialize_str(&time.format("%H:%M:%S").to_string()),
        None => serializer.serialize_none(),
    }
}

fn serialize_flag<S>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u8(u8::from(*flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_doctor_as_id_or_object() {
        let by_id: Schedule = serde_json::from_value(json!({
            "id": 1, "doctor": 26, "work_date": "2025-10-17",
            "time_start": "09:00:00", "time_end": "14:00:00",
            "is_day_off": 0, "planned_up": 100
        }))
        .unwrap();
        assert_eq!(by_id.doctor_id, Some(26));
        assert!(by_id.doctor.is_none());

        let embedded: Schedule = serde_json::from_value(json!({
            "id": 2,
            "doctor": {"id": 27, "fio_alias": "Ostrovskaya E.B.", "position_type": "diagnostician"},
            "work_date": "2025-10-17T00:00:00Z",
            "is_day_off": true
        }))
        .unwrap();
        assert_eq!(embedded.doctor_id, Some(27));
        assert_eq!(embedded.doctor_name.as_deref(), Some("Ostrovskaya E.B."));
        assert!(embedded.is_day_off);
        assert_eq!(embedded.work_date, NaiveDate::from_ymd_opt(2025, 10, 17));

        let legacy: Schedule = serde_json::from_value(json!({
            "id": 3, "doctor_id": 28, "work_date": "2025-10-18"
        }))
        .unwrap();
        assert_eq!(legacy.doctor_id, Some(28));
        assert!(legacy.belongs_to(28, NaiveDate::from_ymd_opt(2025, 10, 18).unwrap()));
    }

    #[test]
    fn test_schedule_rejects_malformed_date() {
        let result: std::result::Result<Schedule, _> =
            serde_json::from_value(json!({"id": 1, "doctor": 1, "work_date": "17/10/2025"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_study_normalization() {
        let study: Study = serde_json::from_value(json!({
            "id": 48548,
            "research_number": "251017-164622080",
            "study_type": {"id": 74, "name": "Chest X-ray", "modality": ["XRAY"], "up_value": "1.50"},
            "status": "confirmed",
            "priority": "cito",
            "created_at": "2025-10-17T19:48:41+03:00",
            "diagnostician": null
        }))
        .unwrap();
        assert_eq!(study.priority, Priority::Cito);
        assert_eq!(study.study_type_id, Some(74));
        assert_eq!(study.study_type.as_ref().and_then(|t| t.up_value), Some(1.5));
        assert!(!study.is_assigned());
        assert_eq!(study.study_type_label(), "Chest X-ray");
    }

    #[test]
    fn test_unknown_priority_is_normal() {
        let study: Study = serde_json::from_value(json!({
            "id": 1, "research_number": "x", "priority": "someday", "study_type": 5
        }))
        .unwrap();
        assert_eq!(study.priority, Priority::Normal);
        assert_eq!(study.priority.rank(), 3);
        assert_eq!(study.study_type_label(), "ID: 5");

        let flagged: Study = serde_json::from_value(json!({
            "id": 2, "research_number": "y", "priority": null, "is_asap": true
        }))
        .unwrap();
        assert_eq!(flagged.priority, Priority::Asap);
    }

    #[test]
    fn test_doctor_with_load_defaults() {
        let doctor: DoctorWithLoad = serde_json::from_value(json!({
            "id": 26, "fio_alias": null, "position_type": "radiologist",
            "is_active": null, "current_load": 96
        }))
        .unwrap();
        assert_eq!(doctor.doctor.display_name(), "Doctor 26");
        assert!(doctor.doctor.is_active);
        assert_eq!(doctor.max_load, 120.0);
        assert_eq!(doctor.doctor.specialty_label(), "Radiologist");
    }

    #[test]
    fn test_schedule_draft_wire_format() {
        let draft = ScheduleDraft {
            doctor: 26,
            work_date: NaiveDate::from_ymd_opt(2025, 10, 13).unwrap(),
            time_start: parse_shift_time("09:00"),
            time_end: None,
            is_day_off: false,
            planned_up: Some(100),
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["work_date"], "2025-10-13");
        assert_eq!(value["time_start"], "09:00:00");
        assert_eq!(value["time_end"], serde_json::Value::Null);
        assert_eq!(value["is_day_off"], 0);
    }
}
