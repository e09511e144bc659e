//! 展示用的色调与KPI卡片

use serde::{Deserialize, Serialize};

/// 界面色调
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tone {
    Critical, // 红
    Warning,  // 琥珀
    Success,  // 绿
    Info,     // 蓝
    Neutral,  // 灰
}

impl Tone {
    /// 固定的颜色映射
    pub fn color(&self) -> &'static str {
        match self {
            Self::Critical => "#dc2626",
            Self::Warning => "#d97706",
            Self::Success => "#16a34a",
            Self::Info => "#2563eb",
            Self::Neutral => "#94a3b8",
        }
    }
}

/// KPI卡片
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KpiCard {
    pub title: String,
    pub value: String,
    pub subtext: String,
    pub trend: Option<f64>,
}

impl KpiCard {
    pub fn new(title: &str, value: impl ToString, subtext: impl ToString) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            subtext: subtext.to_string(),
            trend: None,
        }
    }

    pub fn with_trend(mut self, trend: f64) -> Self {
        self.trend = Some(trend);
        self
    }

    /// 趋势对应的色调，正向为绿色
    pub fn trend_tone(&self) -> Tone {
        match self.trend {
            Some(trend) if trend > 0.0 => Tone::Success,
            Some(trend) if trend < 0.0 => Tone::Critical,
            _ => Tone::Neutral,
        }
    }
}
