//! 医生负载计算

use rengen_core::{Doctor, DoctorWithLoad};
use serde::{Deserialize, Serialize};

use crate::presentation::Tone;

/// 负载比例超过该值视为超负荷
pub const DEFAULT_OVERLOAD_RATIO: f64 = 0.8;

/// 负载比例
///
/// 上限不大于0时：当前负载为0则比例为0，否则视为满载。
pub fn load_ratio(current: f64, max: f64) -> f64 {
    if max > 0.0 {
        (current / max).max(0.0)
    } else if current > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// 进度条百分比，范围 [0, 100]
pub fn load_percentage(current: f64, max: f64) -> f64 {
    load_ratio(current, max).min(1.0) * 100.0
}

/// 医生负载（分配面板中的一行）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorLoad {
    pub doctor_id: i64,
    pub name: String,
    pub specialty: String,
    pub current_load: f64,
    pub max_load: f64,
    pub active_studies: u32,
    pub ratio: f64,
    pub percentage: f64,
    pub overloaded: bool,
    pub tone: Tone,
}

impl DoctorLoad {
    pub fn from_snapshot(entry: &DoctorWithLoad, overload_ratio: f64) -> Self {
        let ratio = load_ratio(entry.current_load, entry.max_load);
        let overloaded = ratio > overload_ratio;

        Self {
            doctor_id: entry.doctor.id,
            name: entry.doctor.display_name(),
            specialty: entry.doctor.specialty_label(),
            current_load: entry.current_load,
            max_load: entry.max_load,
            active_studies: entry.active_studies,
            ratio,
            percentage: load_percentage(entry.current_load, entry.max_load),
            overloaded,
            tone: if overloaded { Tone::Critical } else { Tone::Success },
        }
    }

    /// 例如 `96 / 120 UP`
    pub fn load_label(&self) -> String {
        format!("{} / {} UP", self.current_load, self.max_load)
    }
}

/// 医生列表中的一行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterRow {
    pub doctor_id: i64,
    pub name: String,
    pub specialty: String,
    pub modalities: String,
    pub max_up_per_day: i32,
    pub is_active: bool,
    pub status_tone: Tone,
}

/// 医生名册
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RosterSummary {
    pub rows: Vec<RosterRow>,
    pub active: usize,
    pub archived: usize,
}

impl RosterSummary {
    pub fn build(doctors: &[Doctor]) -> Self {
        let rows: Vec<RosterRow> = doctors
            .iter()
            .map(|doctor| RosterRow {
                doctor_id: doctor.id,
                name: doctor.display_name(),
                specialty: doctor.specialty_label(),
                modalities: if doctor.modality.is_empty() {
                    "—".to_string()
                } else {
                    doctor.modality.join(", ")
                },
                max_up_per_day: doctor.max_up(),
                is_active: doctor.is_active,
                status_tone: if doctor.is_active { Tone::Success } else { Tone::Neutral },
            })
            .collect();

        let active = rows.iter().filter(|row| row.is_active).count();
        Self {
            archived: rows.len() - active,
            active,
            rows,
        }
    }

    /// 只保留能读指定模态的医生，`None` 时不过滤
    pub fn build_for_modality(doctors: &[Doctor], modality: Option<&str>) -> Self {
        match modality {
            Some(modality) => {
                let matching: Vec<Doctor> = doctors
                    .iter()
                    .filter(|doctor| doctor.supports_modality(modality))
                    .cloned()
                    .collect();
                Self::build(&matching)
            }
            None => Self::build(doctors),
        }
    }
}
