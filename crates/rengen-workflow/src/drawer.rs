//! 医生已分配检查抽屉
//!
//! 首次展开时按需加载，分配成功后失效重取。

use rengen_core::{Result, Study};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
pub struct AssignedStudiesCache {
    entries: HashMap<i64, Vec<Study>>,
    expanded: HashSet<i64>,
}

impl AssignedStudiesCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, doctor_id: i64) -> bool {
        self.expanded.contains(&doctor_id)
    }

    pub fn get(&self, doctor_id: i64) -> Option<&[Study]> {
        self.entries.get(&doctor_id).map(Vec::as_slice)
    }

    /// 删除缓存，下次展开时重新加载
    pub fn invalidate(&mut self, doctor_id: i64) {
        if self.entries.remove(&doctor_id).is_some() {
            debug!("Invalidated assigned studies of doctor {}", doctor_id);
        }
    }

    pub fn collapse(&mut self, doctor_id: i64) {
        self.expanded.remove(&doctor_id);
    }

    /// 展开或收起
    ///
    /// 收起返回 `None`；展开时若无缓存则调用 `fetch` 加载。
    /// 加载失败时保持收起状态。
    pub async fn toggle<F, Fut>(&mut self, doctor_id: i64, fetch: F) -> Result<Option<&[Study]>>
    where
        F: FnOnce(i64) -> Fut,
        Fut: Future<Output = Result<Vec<Study>>>,
    {
        if self.expanded.remove(&doctor_id) {
            return Ok(None);
        }

        if !self.entries.contains_key(&doctor_id) {
            match fetch(doctor_id).await {
                Ok(studies) => {
                    debug!("Loaded {} assigned studies for doctor {}", studies.len(), doctor_id);
                    self.entries.insert(doctor_id, studies);
                }
                Err(e) => {
                    warn!("Failed to load assigned studies for doctor {}: {}", doctor_id, e);
                    self.invalidate(doctor_id);
                    return Err(e);
                }
            }
        }

        self.expanded.insert(doctor_id);
        Ok(self.get(doctor_id))
    }
}
