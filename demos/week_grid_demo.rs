//! 周排班演示程序
//!
//! 使用内存中的后端展示周窗口、负载分级以及班次的新建、编辑和删除

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rengen_client::ScheduleQuery;
use rengen_core::{Doctor, Result, Schedule, ScheduleDraft};
use rengen_workflow::{LoadBucket, LoadThresholds, PlanningBackend, PlanningScreen, WeekNavigator};
use serde_json::json;
use std::sync::Mutex;

struct InMemoryPlanning {
    doctors: Vec<Doctor>,
    schedules: Mutex<Vec<Schedule>>,
    next_id: Mutex<i64>,
}

impl InMemoryPlanning {
    fn seeded() -> anyhow::Result<Self> {
        let doctors = serde_json::from_value(json!([
            {"id": 26, "fio_alias": "Zabolotskikh D.M.", "position_type": "radiologist", "max_up_per_day": 120},
            {"id": 27, "fio_alias": "Ostrovskaya E.B.", "position_type": "diagnostician", "max_up_per_day": 100}
        ]))?;
        let schedules = serde_json::from_value(json!([
            {"id": 2862, "doctor": {"id": 26, "fio_alias": "Zabolotskikh D.M."}, "work_date": "2025-10-13T00:00:00",
             "time_start": "09:00:00", "time_end": "14:00:00", "is_day_off": 0, "planned_up": 100},
            {"id": 2863, "doctor_id": 27, "work_date": "2025-10-13", "time_start": "08:00:00",
             "time_end": "20:00:00", "is_day_off": 0, "planned_up": 40},
            {"id": 2864, "doctor": 27, "work_date": "2025-10-18", "is_day_off": 1}
        ]))?;

        Ok(Self {
            doctors,
            schedules: Mutex::new(schedules),
            next_id: Mutex::new(3000),
        })
    }

    fn store(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule> {
        let mut saved: Schedule = serde_json::from_value(json!({"id": id, "doctor": draft.doctor}))?;
        saved.work_date = Some(draft.work_date);
        saved.time_start = draft.time_start;
        saved.time_end = draft.time_end;
        saved.is_day_off = draft.is_day_off;
        saved.planned_up = draft.planned_up;

        let mut schedules = self.schedules.lock().unwrap();
        schedules.retain(|s| s.id != id);
        schedules.push(saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl PlanningBackend for InMemoryPlanning {
    async fn doctors(&self) -> Result<Vec<Doctor>> {
        Ok(self.doctors.clone())
    }

    async fn schedules(&self, query: &ScheduleQuery) -> Result<Vec<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| match (s.work_date, query.date_from, query.date_to) {
                (Some(day), Some(from), Some(to)) => day >= from && day <= to,
                _ => true,
            })
            .filter(|s| query.doctor_id.is_none() || s.doctor_id == query.doctor_id)
            .cloned()
            .collect())
    }

    async fn create_schedule(&self, draft: &ScheduleDraft) -> Result<Schedule> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        self.store(id, draft)
    }

    async fn update_schedule(&self, id: i64, draft: &ScheduleDraft) -> Result<Schedule> {
        self.store(id, draft)
    }

    async fn delete_schedule(&self, id: i64) -> Result<()> {
        self.schedules.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }
}

fn print_grid<B: PlanningBackend>(screen: &PlanningScreen<B>) {
    let grid = screen.grid();
    print!("  {:<20}", "");
    for header in &grid.headers {
        print!(" {:<16}", header);
    }
    println!();
    for row in &grid.rows {
        print!("  {:<20}", row.doctor_name);
        for cell in &row.cells {
            let text = match (cell.day_off, &cell.time_label, cell.load.bucket) {
                (true, _, _) => "休息".to_string(),
                (false, Some(label), LoadBucket::Overload) => format!("{} !!", label),
                (false, Some(label), LoadBucket::Warning) => format!("{} !", label),
                (false, Some(label), _) => label.clone(),
                (false, None, _) => "·".to_string(),
            };
            print!(" {:<16}", text);
        }
        println!();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("📅 周排班演示");
    println!("================================");

    let pivot = NaiveDate::from_ymd_opt(2025, 10, 15).ok_or_else(|| anyhow::anyhow!("invalid date"))?;
    let mut screen = PlanningScreen::new(
        InMemoryPlanning::seeded()?,
        WeekNavigator::new(pivot),
        LoadThresholds::default(),
    );
    screen.load().await?;

    let (monday, sunday) = screen.navigator().range();
    println!("\n🗓  {} ~ {}", monday, sunday);
    print_grid(&screen);

    println!("\n➕ 为周二新建班次...");
    let tuesday = monday.succ_opt().ok_or_else(|| anyhow::anyhow!("invalid date"))?;
    screen.open_cell(26, tuesday);
    if let Some(form) = screen.dialog_mut().form_mut() {
        form.time_end = NaiveTime::from_hms_opt(15, 0, 0);
        form.planned_up = Some(115);
    }
    let created = screen.submit().await?;
    print_grid(&screen);

    println!("\n✏️  编辑刚才的班次...");
    screen.open_cell(26, tuesday);
    if let Some(form) = screen.dialog_mut().form_mut() {
        form.planned_up = Some(60);
    }
    screen.submit().await?;
    print_grid(&screen);

    println!("\n🗑  删除班次（需要确认）...");
    let deleted = screen.delete(created.id, false).await?;
    println!("  未确认: 删除={}", deleted);
    let deleted = screen.delete(created.id, true).await?;
    println!("  已确认: 删除={}", deleted);

    println!("\n⏭  下一周...");
    screen.next_week().await?;
    print_grid(&screen);

    println!("\n✅ 演示完成");
    Ok(())
}
