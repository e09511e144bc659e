//! 看板与报表
//!
//! 读取失败时静默退回到零值，不向用户报错。

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rengen_client::ApiClient;
use rengen_core::{ChartData, DashboardStats, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::presentation::KpiCard;

/// 图表覆盖的天数（不含今天）
pub const CHART_DAYS: i64 = 7;

#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn stats(&self, date: Option<NaiveDate>) -> Result<DashboardStats>;
    async fn chart(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<Vec<ChartData>>;
}

#[async_trait]
impl DashboardBackend for ApiClient {
    async fn stats(&self, date: Option<NaiveDate>) -> Result<DashboardStats> {
        self.dashboard().stats(date).await
    }

    async fn chart(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<Vec<ChartData>> {
        self.dashboard().chart(date_from, date_to).await
    }
}

#[async_trait]
impl<T: DashboardBackend + ?Sized> DashboardBackend for Arc<T> {
    async fn stats(&self, date: Option<NaiveDate>) -> Result<DashboardStats> {
        (**self).stats(date).await
    }

    async fn chart(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<Vec<ChartData>> {
        (**self).chart(date_from, date_to).await
    }
}

/// 计划完成率（四舍五入的百分比）
pub fn plan_completion_percent(stats: &DashboardStats) -> i64 {
    let total = stats.total_studies.max(1) as f64;
    (stats.completed_studies as f64 / total * 100.0).round() as i64
}

/// 图表日期范围：今天往前七天到今天
pub fn chart_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(CHART_DAYS), today)
}

/// 最近两天实际完成量的变化（百分比，保留一位小数）
///
/// 前一天为零或数据不足两天时没有趋势。
pub fn actual_trend(chart: &[ChartData]) -> Option<f64> {
    match chart {
        [.., previous, last] if previous.actual > 0 => {
            let change = (last.actual - previous.actual) as f64 / previous.actual as f64 * 100.0;
            Some((change * 10.0).round() / 10.0)
        }
        _ => None,
    }
}

/// 看板视图模型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardViewModel {
    pub stats: DashboardStats,
    pub completion_percent: i64,
    pub cards: Vec<KpiCard>,
    pub chart: Vec<ChartData>,
    /// 是否有读取失败而使用了零值
    pub degraded: bool,
}

impl DashboardViewModel {
    pub fn from_data(stats: DashboardStats, chart: Vec<ChartData>) -> Self {
        let completion_percent = plan_completion_percent(&stats);
        let mut completed = KpiCard::new(
            "Completed",
            stats.completed_studies,
            format!("{}% of plan", completion_percent),
        );
        if let Some(trend) = actual_trend(&chart) {
            completed = completed.with_trend(trend);
        }
        let cards = vec![
            KpiCard::new("Total studies", stats.total_studies, "for the day"),
            completed,
            KpiCard::new("Pending", stats.pending_studies, "in queue"),
            KpiCard::new(
                "Active doctors",
                stats.active_doctors,
                format!("avg load {:.1} UP", stats.avg_load_per_doctor),
            ),
            KpiCard::new(
                "CITO / ASAP",
                format!("{} / {}", stats.cito_studies, stats.asap_studies),
                "urgent studies",
            ),
        ];

        Self {
            stats,
            completion_percent,
            cards,
            chart,
            degraded: false,
        }
    }

    pub fn empty() -> Self {
        let mut model = Self::from_data(DashboardStats::default(), Vec::new());
        model.degraded = true;
        model
    }
}

/// 加载看板，两个请求并发，各自失败时使用零值
pub async fn load_dashboard<B: DashboardBackend + ?Sized>(backend: &B, today: NaiveDate) -> DashboardViewModel {
    let (date_from, date_to) = chart_range(today);
    let (stats, chart) = tokio::join!(backend.stats(Some(today)), backend.chart(date_from, date_to));

    let mut degraded = false;
    let stats = stats.unwrap_or_else(|e| {
        warn!("Dashboard stats unavailable: {}", e);
        degraded = true;
        DashboardStats::default()
    });
    let chart = chart.unwrap_or_else(|e| {
        warn!("Dashboard chart unavailable: {}", e);
        degraded = true;
        Vec::new()
    });

    let mut model = DashboardViewModel::from_data(stats, chart);
    model.degraded = degraded;
    model
}

/// 报表汇总
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReportSummary {
    pub days: usize,
    pub total_plan: i64,
    pub total_actual: i64,
    pub completion_percent: i64,
    /// 实际完成最多的一天
    pub best_day: Option<String>,
}

impl ReportSummary {
    pub fn from_chart(chart: &[ChartData]) -> Self {
        let total_plan: i64 = chart.iter().map(|d| d.plan).sum();
        let total_actual: i64 = chart.iter().map(|d| d.actual).sum();
        let best_day = chart
            .iter()
            .filter(|d| d.actual > 0)
            .max_by_key(|d| d.actual)
            .map(|d| d.name.clone());

        Self {
            days: chart.len(),
            total_plan,
            total_actual,
            completion_percent: (total_actual as f64 / total_plan.max(1) as f64 * 100.0).round() as i64,
            best_day,
        }
    }
}

/// 报表页面：图表数据加上汇总
pub async fn load_report<B: DashboardBackend + ?Sized>(
    backend: &B,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> (Vec<ChartData>, ReportSummary) {
    let chart = backend.chart(date_from, date_to).await.unwrap_or_else(|e| {
        warn!("Report data unavailable: {}", e);
        Vec::new()
    });
    let summary = ReportSummary::from_chart(&chart);
    (chart, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::Tone;
    use rengen_core::RengenError;
    use std::sync::Mutex;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    fn chart_point(name: &str, plan: i64, actual: i64) -> ChartData {
        ChartData {
            name: name.to_string(),
            plan,
            actual,
        }
    }

    struct FakeDashboard {
        fail_stats: bool,
        fail_chart: bool,
        chart_ranges: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    }

    impl FakeDashboard {
        fn new(fail_stats: bool, fail_chart: bool) -> Self {
            Self {
                fail_stats,
                fail_chart,
                chart_ranges: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DashboardBackend for FakeDashboard {
        async fn stats(&self, _date: Option<NaiveDate>) -> Result<DashboardStats> {
            if self.fail_stats {
                return Err(RengenError::Transport("connection refused".to_string()));
            }
            Ok(DashboardStats {
                total_studies: 12,
                completed_studies: 5,
                pending_studies: 7,
                active_doctors: 4,
                avg_load_per_doctor: 42.5,
                cito_studies: 2,
                asap_studies: 1,
            })
        }

        async fn chart(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<Vec<ChartData>> {
            self.chart_ranges.lock().unwrap().push((date_from, date_to));
            if self.fail_chart {
                return Err(RengenError::Server {
                    status: 500,
                    detail: None,
                });
            }
            Ok(vec![chart_point("Mon", 10, 8), chart_point("Tue", 10, 12)])
        }
    }

    #[test]
    fn test_completion_percent() {
        let mut stats = DashboardStats {
            total_studies: 12,
            completed_studies: 5,
            ..Default::default()
        };
        assert_eq!(plan_completion_percent(&stats), 42);

        stats.total_studies = 0;
        stats.completed_studies = 0;
        assert_eq!(plan_completion_percent(&stats), 0);
    }

    #[tokio::test]
    async fn test_load_dashboard() {
        let backend = FakeDashboard::new(false, false);
        let model = load_dashboard(&backend, day(17)).await;

        assert!(!model.degraded);
        assert_eq!(model.completion_percent, 42);
        assert_eq!(model.cards.len(), 5);
        assert_eq!(model.cards[1].subtext, "42% of plan");
        assert_eq!(model.cards[1].trend, Some(50.0));
        assert_eq!(model.cards[1].trend_tone(), Tone::Success);
        assert_eq!(model.cards[0].trend, None);
        assert_eq!(model.chart.len(), 2);
        assert_eq!(*backend.chart_ranges.lock().unwrap(), vec![(day(10), day(17))]);
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_zero() {
        let backend = FakeDashboard::new(true, true);
        let model = load_dashboard(&backend, day(17)).await;

        assert!(model.degraded);
        assert_eq!(model.stats, DashboardStats::default());
        assert_eq!(model.completion_percent, 0);
        assert!(model.chart.is_empty());

        // 只有图表失败时统计仍然显示
        let backend = FakeDashboard::new(false, true);
        let model = load_dashboard(&backend, day(17)).await;
        assert!(model.degraded);
        assert_eq!(model.stats.total_studies, 12);
    }

    #[test]
    fn test_actual_trend() {
        assert_eq!(actual_trend(&[]), None);
        assert_eq!(actual_trend(&[chart_point("Mon", 10, 8)]), None);
        assert_eq!(
            actual_trend(&[chart_point("Mon", 10, 0), chart_point("Tue", 10, 5)]),
            None
        );
        assert_eq!(
            actual_trend(&[chart_point("Mon", 10, 9), chart_point("Tue", 10, 6)]),
            Some(-33.3)
        );
    }

    #[test]
    fn test_report_summary() {
        let summary = ReportSummary::from_chart(&[
            chart_point("Mon", 10, 8),
            chart_point("Tue", 10, 12),
            chart_point("Wed", 0, 0),
        ]);
        assert_eq!(summary.days, 3);
        assert_eq!(summary.total_plan, 20);
        assert_eq!(summary.total_actual, 20);
        assert_eq!(summary.completion_percent, 100);
        assert_eq!(summary.best_day.as_deref(), Some("Tue"));

        assert_eq!(ReportSummary::from_chart(&[]).completion_percent, 0);
    }

    #[tokio::test]
    async fn test_report_failure_is_empty() {
        let backend = FakeDashboard::new(false, true);
        let (chart, summary) = load_report(&backend, day(1), day(17)).await;
        assert!(chart.is_empty());
        assert_eq!(summary, ReportSummary::default());
    }
}
