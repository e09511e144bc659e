//! 工作流与视图模型
//!
//! 提供检查分配、排班编辑、看板等页面的状态与计算逻辑。

pub mod assignment;
pub mod dashboard;
pub mod distribution;
pub mod drawer;
pub mod load;
pub mod presentation;
pub mod queue;
pub mod schedule_editor;
pub mod schedule_grid;

pub use assignment::{AssignmentEvent, AssignmentPanel, AssignmentStage, AssignmentStateMachine};
pub use dashboard::{load_dashboard, load_report, DashboardBackend, DashboardViewModel, ReportSummary};
pub use distribution::{DistributionBackend, DistributionScreen, DistributionSnapshot};
pub use drawer::AssignedStudiesCache;
pub use load::{load_percentage, DoctorLoad, RosterSummary};
pub use presentation::{KpiCard, Tone};
pub use queue::{order_pending, Page, Paginator, QueueRow, QueueViewModel};
pub use schedule_editor::{DialogMode, PlanningBackend, PlanningScreen, ScheduleDialog, ScheduleForm};
pub use schedule_grid::{
    week_window, CellLoad, DoctorFilter, LoadBucket, LoadThresholds, ScheduleGrid, WeekNavigator,
};
