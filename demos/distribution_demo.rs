//! 检查分配演示程序
//!
//! 使用内存中的后端展示队列排序、医生负载和分配流程，无需启动服务器

use async_trait::async_trait;
use rengen_core::{AssignmentAck, DoctorWithLoad, Result, Study};
use rengen_workflow::{DistributionBackend, DistributionScreen};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// 内存后端
struct InMemoryBackend {
    pending: Mutex<Vec<Study>>,
    assigned: Mutex<Vec<Study>>,
    doctors: Mutex<Vec<DoctorWithLoad>>,
}

impl InMemoryBackend {
    fn seeded() -> anyhow::Result<Self> {
        let pending: Vec<Study> = serde_json::from_value(json!([
            {"id": 101, "research_number": "251017-101", "status": "pending", "priority": "normal",
             "created_at": "2025-10-17T07:40:00Z", "study_type": {"id": 74, "name": "Chest X-ray", "up_value": "1.50"}},
            {"id": 102, "research_number": "251017-102", "status": "pending", "priority": "cito",
             "created_at": "2025-10-17T09:05:00Z", "study_type": {"id": 20, "name": "Head CT", "up_value": 4}},
            {"id": 103, "research_number": "251017-103", "status": "pending", "priority": "asap",
             "created_at": "2025-10-17T08:15:00Z", "study_type": 31},
            {"id": 104, "research_number": "251017-104", "status": "pending", "is_cito": true,
             "created_at": "2025-10-17T08:50:00Z"}
        ]))?;
        let doctors: Vec<DoctorWithLoad> = serde_json::from_value(json!([
            {"id": 26, "fio_alias": "Zabolotskikh D.M.", "position_type": "radiologist",
             "current_load": 100, "max_load": 120, "active_studies": 6},
            {"id": 27, "fio_alias": "Ostrovskaya E.B.", "position_type": "diagnostician",
             "current_load": 35, "max_load": 100, "active_studies": 2}
        ]))?;

        Ok(Self {
            pending: Mutex::new(pending),
            assigned: Mutex::new(Vec::new()),
            doctors: Mutex::new(doctors),
        })
    }
}

#[async_trait]
impl DistributionBackend for InMemoryBackend {
    async fn pending_studies(&self) -> Result<Vec<Study>> {
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn doctors_with_load(&self) -> Result<Vec<DoctorWithLoad>> {
        Ok(self.doctors.lock().unwrap().clone())
    }

    async fn assign(&self, study_id: i64, doctor_id: i64) -> Result<AssignmentAck> {
        let mut pending = self.pending.lock().unwrap();
        if let Some(index) = pending.iter().position(|s| s.id == study_id) {
            let mut study = pending.remove(index);
            study.status = "confirmed".to_string();
            study.diagnostician_id = Some(doctor_id);
            self.assigned.lock().unwrap().push(study);
        }
        if let Some(entry) = self.doctors.lock().unwrap().iter_mut().find(|d| d.doctor.id == doctor_id) {
            entry.current_load += 4.0;
            entry.active_studies += 1;
        }
        Ok(AssignmentAck {
            status: "assigned".to_string(),
            doctor_id,
        })
    }

    async fn confirmed_studies(&self, doctor_id: i64) -> Result<Vec<Study>> {
        Ok(self
            .assigned
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.diagnostician_id == Some(doctor_id))
            .cloned()
            .collect())
    }
}

fn print_screen<B: DistributionBackend>(screen: &DistributionScreen<B>) {
    let snapshot = match screen.snapshot() {
        Some(snapshot) => snapshot,
        None => return,
    };

    println!("  队列:");
    for row in snapshot.queue.page().items {
        println!(
            "    [{:<4}] {} {:<14} {}",
            row.priority_label, row.study_id, row.research_number, row.study_type
        );
    }
    println!("  医生负载:");
    for load in &snapshot.loads {
        println!(
            "    {:<20} {:>14} {:>5.0}%{}",
            load.name,
            load.load_label(),
            load.percentage,
            if load.overloaded { "  超负荷" } else { "" }
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("🏥 检查分配演示");
    println!("================================");

    let backend = Arc::new(InMemoryBackend::seeded()?);
    let mut screen = DistributionScreen::new(Arc::clone(&backend));

    println!("\n📋 加载队列与医生负载...");
    screen.reload().await?;
    print_screen(&screen);

    println!("\n👆 选择CITO检查并暂存医生...");
    screen.select_study(102)?;
    if let Err(e) = screen.confirm().await {
        println!("  未选择医生时无法确认: {}", e.user_message());
    }
    screen.select_doctor(27)?;
    let ack = screen.confirm().await?;
    println!("  已分配给医生 {} ({})", ack.doctor_id, ack.status);
    print_screen(&screen);

    println!("\n🤖 自动分配下一条检查...");
    screen.select_study(104)?;
    let ack = screen.auto_assign().await?;
    println!("  自动分配给医生 {}", ack.doctor_id);

    println!("\n📂 展开医生的已分配检查...");
    for doctor_id in [26, 27] {
        if let Some(studies) = screen.toggle_drawer(doctor_id).await? {
            let numbers: Vec<&str> = studies.iter().map(|s| s.research_number.as_str()).collect();
            println!("  医生 {}: {:?}", doctor_id, numbers);
        }
    }

    println!("\n✅ 演示完成");
    Ok(())
}
