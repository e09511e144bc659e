//! 分配面板状态机
//!
//! 空闲 → 已选检查 → 已暂存医生，确认成功后回到空闲。

use rengen_core::{DoctorWithLoad, RengenError, Result, Study};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// 面板所处阶段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AssignmentStage {
    #[default]
    Idle,
    StudySelected,
    DoctorStaged,
}

/// 面板事件
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentEvent {
    SelectStudy(Study),
    SelectDoctor(i64),
    ClearDoctor,
    Cancel,
    /// 后端确认分配成功
    Assigned,
}

/// 事件类型（转换表的键）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssignmentEventKind {
    SelectStudy,
    SelectDoctor,
    ClearDoctor,
    Cancel,
    Assigned,
}

impl AssignmentEvent {
    pub fn kind(&self) -> AssignmentEventKind {
        match self {
            Self::SelectStudy(_) => AssignmentEventKind::SelectStudy,
            Self::SelectDoctor(_) => AssignmentEventKind::SelectDoctor,
            Self::ClearDoctor => AssignmentEventKind::ClearDoctor,
            Self::Cancel => AssignmentEventKind::Cancel,
            Self::Assigned => AssignmentEventKind::Assigned,
        }
    }
}

/// 阶段转换规则
#[derive(Debug)]
pub struct AssignmentStateMachine {
    transitions: HashMap<(AssignmentStage, AssignmentEventKind), AssignmentStage>,
}

impl AssignmentStateMachine {
    pub fn new() -> Self {
        use AssignmentEventKind as E;
        use AssignmentStage as S;

        let mut transitions = HashMap::new();

        transitions.insert((S::Idle, E::SelectStudy), S::StudySelected);
        transitions.insert((S::StudySelected, E::SelectStudy), S::StudySelected);
        // 切换检查时保留已暂存的医生
        transitions.insert((S::DoctorStaged, E::SelectStudy), S::DoctorStaged);
        transitions.insert((S::StudySelected, E::SelectDoctor), S::DoctorStaged);
        transitions.insert((S::DoctorStaged, E::SelectDoctor), S::DoctorStaged);
        transitions.insert((S::StudySelected, E::ClearDoctor), S::StudySelected);
        transitions.insert((S::DoctorStaged, E::ClearDoctor), S::StudySelected);
        transitions.insert((S::Idle, E::Cancel), S::Idle);
        transitions.insert((S::StudySelected, E::Cancel), S::Idle);
        transitions.insert((S::DoctorStaged, E::Cancel), S::Idle);
        // 自动分配不经过暂存医生
        transitions.insert((S::StudySelected, E::Assigned), S::Idle);
        transitions.insert((S::DoctorStaged, E::Assigned), S::Idle);

        Self { transitions }
    }

    pub fn can_transition(&self, from: AssignmentStage, event: AssignmentEventKind) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    pub fn transition(&self, from: AssignmentStage, event: AssignmentEventKind) -> Result<AssignmentStage> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(RengenError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }

    pub fn get_possible_events(&self, current: AssignmentStage) -> Vec<AssignmentEventKind> {
        self.transitions
            .keys()
            .filter(|(stage, _)| *stage == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for AssignmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// 分配面板
#[derive(Debug, Default)]
pub struct AssignmentPanel {
    machine: AssignmentStateMachine,
    stage: AssignmentStage,
    study: Option<Study>,
    doctor_id: Option<i64>,
}

impl AssignmentPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> AssignmentStage {
        self.stage
    }

    pub fn selected_study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    pub fn staged_doctor(&self) -> Option<i64> {
        self.doctor_id
    }

    /// 应用事件，无效事件返回错误且不改变状态
    pub fn apply(&mut self, event: AssignmentEvent) -> Result<AssignmentStage> {
        let next = self.machine.transition(self.stage, event.kind())?;
        debug!("Assignment panel {:?} -> {:?} on {:?}", self.stage, next, event.kind());

        match event {
            AssignmentEvent::SelectStudy(study) => self.study = Some(study),
            AssignmentEvent::SelectDoctor(doctor_id) => self.doctor_id = Some(doctor_id),
            AssignmentEvent::ClearDoctor => self.doctor_id = None,
            AssignmentEvent::Cancel | AssignmentEvent::Assigned => {
                self.study = None;
                self.doctor_id = None;
            }
        }
        self.stage = next;
        Ok(next)
    }

    /// 待提交的 (检查ID, 医生ID)
    pub fn pending_assignment(&self) -> Result<(i64, i64)> {
        let study = self
            .study
            .as_ref()
            .ok_or_else(|| RengenError::Validation("Select a study first".to_string()))?;
        let doctor_id = self
            .doctor_id
            .ok_or_else(|| RengenError::Validation("Select a doctor to assign".to_string()))?;
        Ok((study.id, doctor_id))
    }

    /// 自动分配目标：当前列表中的第一位医生
    ///
    /// 已暂存医生时拒绝，应改用确认。
    pub fn auto_target(&self, doctors: &[DoctorWithLoad]) -> Result<(i64, i64)> {
        let study = self
            .study
            .as_ref()
            .ok_or_else(|| RengenError::Validation("Select a study first".to_string()))?;
        if self.doctor_id.is_some() {
            return Err(RengenError::Validation(
                "A doctor is already selected, confirm the assignment instead".to_string(),
            ));
        }
        let doctor = doctors
            .first()
            .ok_or_else(|| RengenError::Validation("No doctors available".to_string()))?;
        Ok((study.id, doctor.doctor.id))
    }
}
