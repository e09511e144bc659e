//! 待分配检查队列
//!
//! 按优先级排序（CITO → ASAP → 常规），同优先级按创建时间从早到晚，
//! 然后在客户端分页。

use chrono::{DateTime, NaiveDate, Utc};
use rengen_core::{study_status, Priority, Study};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::presentation::Tone;

/// 对待分配检查排序（稳定排序）
pub fn order_pending(studies: &mut [Study]) {
    studies.sort_by(|a, b| match a.priority.rank().cmp(&b.priority.rank()) {
        Ordering::Equal => compare_created(a.created_at, b.created_at).then_with(|| a.id.cmp(&b.id)),
        other => other,
    });
}

// 没有创建时间的排在最后
fn compare_created(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn priority_tone(priority: Priority) -> Tone {
    match priority {
        Priority::Cito => Tone::Critical,
        Priority::Asap => Tone::Warning,
        Priority::Normal => Tone::Neutral,
    }
}

pub fn status_tone(status: &str) -> Tone {
    match status {
        study_status::CONFIRMED => Tone::Success,
        study_status::SIGNED => Tone::Info,
        _ => Tone::Neutral,
    }
}

/// 客户端分页器
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paginator {
    pub page_size: usize,
    /// 页码按钮最多显示几个
    pub window: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: 20,
            window: 5,
        }
    }
}

/// 一页数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// 本页第一条的序号（从1开始，空列表为0）
    pub first_item: usize,
    pub last_item: usize,
    pub items: Vec<T>,
}

impl Paginator {
    pub fn new(page_size: usize, window: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            window: window.max(1),
        }
    }

    /// 总页数，空列表也算一页
    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.page_size).max(1)
    }

    pub fn clamp_page(&self, page: usize, total_items: usize) -> usize {
        page.clamp(1, self.total_pages(total_items))
    }

    /// 取第 `page` 页（从1开始，越界时取最近的有效页）
    pub fn page<T: Clone>(&self, items: &[T], page: usize) -> Page<T> {
        let total_items = items.len();
        let number = self.clamp_page(page, total_items);
        let start = ((number - 1) * self.page_size).min(total_items);
        let end = (start + self.page_size).min(total_items);

        Page {
            number,
            total_pages: self.total_pages(total_items),
            total_items,
            first_item: if start < end { start + 1 } else { 0 },
            last_item: end,
            items: items[start..end].to_vec(),
        }
    }

    /// 以当前页为中心的页码窗口
    pub fn page_window(&self, current: usize, total_pages: usize) -> Vec<usize> {
        let total_pages = total_pages.max(1);
        let size = self.window.min(total_pages);
        let current = current.clamp(1, total_pages);

        let mut start = current.saturating_sub(size / 2).max(1);
        if start + size - 1 > total_pages {
            start = total_pages + 1 - size;
        }
        (start..start + size).collect()
    }
}

/// 队列中的一行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueRow {
    pub study_id: i64,
    pub research_number: String,
    pub study_type: String,
    pub priority: Priority,
    pub priority_label: String,
    pub priority_tone: Tone,
    pub status: String,
    pub status_tone: Tone,
    pub created_on: Option<NaiveDate>,
}

impl From<&Study> for QueueRow {
    fn from(study: &Study) -> Self {
        Self {
            study_id: study.id,
            research_number: study.research_number.clone(),
            study_type: study.study_type_label(),
            priority: study.priority,
            priority_label: study.priority.label().to_string(),
            priority_tone: priority_tone(study.priority),
            status: study.status.clone(),
            status_tone: status_tone(&study.status),
            created_on: study.created_at.map(|ts| ts.date_naive()),
        }
    }
}

/// 队列视图模型，每次加载数据时重新构建
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueViewModel {
    studies: Vec<Study>,
    current_page: usize,
    paginator: Paginator,
}

impl QueueViewModel {
    pub fn from_snapshot(mut studies: Vec<Study>, paginator: Paginator) -> Self {
        order_pending(&mut studies);
        Self {
            studies,
            current_page: 1,
            paginator,
        }
    }

    /// 所有检查（已排序）
    pub fn studies(&self) -> &[Study] {
        &self.studies
    }

    pub fn find(&self, study_id: i64) -> Option<&Study> {
        self.studies.iter().find(|s| s.id == study_id)
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.paginator.total_pages(self.studies.len())
    }

    pub fn go_to(&mut self, page: usize) {
        self.current_page = self.paginator.clamp_page(page, self.studies.len());
    }

    pub fn next_page(&mut self) {
        self.go_to(self.current_page + 1);
    }

    pub fn previous_page(&mut self) {
        self.go_to(self.current_page.saturating_sub(1));
    }

    pub fn page(&self) -> Page<QueueRow> {
        let page = self.paginator.page(&self.studies, self.current_page);
        Page {
            number: page.number,
            total_pages: page.total_pages,
            total_items: page.total_items,
            first_item: page.first_item,
            last_item: page.last_item,
            items: page.items.iter().map(QueueRow::from).collect(),
        }
    }

    pub fn page_window(&self) -> Vec<usize> {
        self.paginator.page_window(self.current_page, self.total_pages())
    }
}
