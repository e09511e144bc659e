//! Rengen命令行工具

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rengen_admin::{init_logging, DashboardConfig};
use rengen_client::ApiClient;
use rengen_core::RengenError;
use rengen_workflow::{
    load_dashboard, DistributionScreen, DoctorFilter, PlanningScreen, RosterSummary, WeekNavigator,
};
use std::path::PathBuf;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "rengen")]
#[command(about = "放射科工作流看板：检查分配与排班")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 覆盖配置中的后端地址
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// 日志级别
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 待分配检查队列
    Queue {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// 医生列表
    Doctors {
        /// 显示当前负载
        #[arg(long)]
        with_load: bool,
        /// 只显示能读该模态的医生，例如 CT
        #[arg(long)]
        modality: Option<String>,
    },
    /// 将检查分配给医生
    Assign {
        #[arg(long)]
        study: i64,
        #[arg(long)]
        doctor: i64,
    },
    /// 周排班
    Week {
        /// 周内任意一天，默认今天
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        doctor: Option<i64>,
    },
    /// 看板统计
    Stats {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// 服务端自动分配
    Distribute {
        /// 只预览不执行
        #[arg(long)]
        preview: bool,
    },
    /// 探测后端并输出客户端指标
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DashboardConfig::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    rengen_admin::config::ConfigValidator::new().validate(&config)?;
    init_logging(&config.logging)?;

    let client = ApiClient::new(config.client_config()).context("Failed to create API client")?;
    info!("Using backend {}", config.api.base_url);

    match args.command {
        Command::Queue { page } => show_queue(client, &config, page).await,
        Command::Doctors { with_load, modality } => {
            show_doctors(&client, &config, with_load, modality.as_deref()).await
        }
        Command::Assign { study, doctor } => assign(&client, study, doctor).await,
        Command::Week { date, doctor } => show_week(client, &config, date, doctor).await,
        Command::Stats { date } => show_stats(&client, date).await,
        Command::Distribute { preview } => distribute(&client, preview).await,
        Command::Metrics => show_metrics(&client).await,
    }
}

/// 错误输出为用户可读的消息
fn user_error(action: &str, e: RengenError) -> anyhow::Error {
    error!("{} failed: {}", action, e);
    anyhow::anyhow!("{}: {}", action, e.user_message())
}

async fn show_queue(client: ApiClient, config: &DashboardConfig, page: usize) -> Result<()> {
    let mut screen = DistributionScreen::with_settings(client, config.paginator(), config.load.overload_ratio);
    screen.reload().await.map_err(|e| user_error("Loading queue", e))?;
    screen.go_to_page(page);

    let snapshot = match screen.snapshot() {
        Some(snapshot) => snapshot,
        None => return Ok(()),
    };
    let page = snapshot.queue.page();
    println!(
        "Pending studies {}-{} of {} (page {}/{})",
        page.first_item, page.last_item, page.total_items, page.number, page.total_pages
    );
    println!("{:<8} {:<16} {:<6} {:<28} {:<12}", "ID", "NUMBER", "PRIO", "TYPE", "CREATED");
    for row in &page.items {
        println!(
            "{:<8} {:<16} {:<6} {:<28} {:<12}",
            row.study_id,
            row.research_number,
            row.priority_label,
            row.study_type,
            row.created_on.map(|d| d.to_string()).unwrap_or_default()
        );
    }
    let window: Vec<String> = snapshot.queue.page_window().iter().map(|p| p.to_string()).collect();
    println!("Pages: {}", window.join(" "));
    Ok(())
}

async fn show_doctors(
    client: &ApiClient,
    config: &DashboardConfig,
    with_load: bool,
    modality: Option<&str>,
) -> Result<()> {
    if with_load {
        let doctors = client
            .doctors()
            .list_with_load()
            .await
            .map_err(|e| user_error("Loading doctors", e))?;
        println!("{:<6} {:<28} {:>16} {:>8} {:>8}", "ID", "NAME", "LOAD", "PCT", "STUDIES");
        let matching = doctors
            .iter()
            .filter(|entry| modality.map_or(true, |m| entry.doctor.supports_modality(m)));
        for entry in matching {
            let load = rengen_workflow::DoctorLoad::from_snapshot(entry, config.load.overload_ratio);
            println!(
                "{:<6} {:<28} {:>16} {:>7.0}% {:>8}{}",
                load.doctor_id,
                load.name,
                load.load_label(),
                load.percentage,
                load.active_studies,
                if load.overloaded { "  !" } else { "" }
            );
        }
        return Ok(());
    }

    let doctors = client
        .doctors()
        .list()
        .await
        .map_err(|e| user_error("Loading doctors", e))?;
    let roster = RosterSummary::build_for_modality(&doctors, modality);
    println!("{:<6} {:<28} {:<20} {:<16} {:>6}", "ID", "NAME", "SPECIALTY", "MODALITY", "MAX UP");
    for row in &roster.rows {
        println!(
            "{:<6} {:<28} {:<20} {:<16} {:>6}{}",
            row.doctor_id,
            row.name,
            row.specialty,
            row.modalities,
            row.max_up_per_day,
            if row.is_active { "" } else { "  (archived)" }
        );
    }
    println!("{} active, {} archived", roster.active, roster.archived);
    Ok(())
}

async fn assign(client: &ApiClient, study: i64, doctor: i64) -> Result<()> {
    let ack = client
        .studies()
        .assign(study, doctor)
        .await
        .map_err(|e| user_error("Assignment", e))?;
    println!("Study {} assigned to doctor {} ({})", study, ack.doctor_id, ack.status);
    Ok(())
}

async fn show_week(
    client: ApiClient,
    config: &DashboardConfig,
    date: Option<NaiveDate>,
    doctor: Option<i64>,
) -> Result<()> {
    let pivot = date.unwrap_or_else(|| Local::now().date_naive());
    let filter = doctor.map(DoctorFilter::Doctor).unwrap_or_default();
    let mut screen = PlanningScreen::new(client, WeekNavigator::new(pivot), config.thresholds())
        .with_filter(filter);
    screen.load().await.map_err(|e| user_error("Loading schedules", e))?;

    let grid = screen.grid();
    print!("{:<24}", "DOCTOR");
    for header in &grid.headers {
        print!(" {:<18}", header);
    }
    println!();
    for row in &grid.rows {
        print!("{:<24}", row.doctor_name);
        for cell in &row.cells {
            let text = if cell.day_off {
                "day off".to_string()
            } else {
                match &cell.time_label {
                    Some(label) => format!("{} {:.0}%", label, cell.load.percent),
                    None => String::new(),
                }
            };
            print!(" {:<18}", text);
        }
        println!();
    }
    Ok(())
}

async fn show_stats(client: &ApiClient, date: Option<NaiveDate>) -> Result<()> {
    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let model = load_dashboard(client, today).await;

    for card in &model.cards {
        let trend = card
            .trend
            .map(|t| format!("  ({:+.1}% vs previous day)", t))
            .unwrap_or_default();
        println!("{:<16} {:>10}  {}{}", card.title, card.value, card.subtext, trend);
    }
    if !model.chart.is_empty() {
        println!();
        println!("{:<12} {:>6} {:>6}", "DAY", "PLAN", "ACTUAL");
        for point in &model.chart {
            println!("{:<12} {:>6} {:>6}", point.name, point.plan, point.actual);
        }
    }
    Ok(())
}

async fn distribute(client: &ApiClient, preview: bool) -> Result<()> {
    if preview {
        let preview = client
            .distribution()
            .preview()
            .await
            .map_err(|e| user_error("Distribution preview", e))?;
        println!(
            "{} pending studies, {} available doctors",
            preview.pending_studies, preview.available_doctors
        );
        if let Some(message) = preview.message {
            println!("{}", message);
        }
        return Ok(());
    }

    let outcome = client
        .distribution()
        .run()
        .await
        .map_err(|e| user_error("Distribution", e))?;
    println!(
        "Assigned {}, unassigned {}, average tardiness {:.1} h",
        outcome.assigned, outcome.unassigned, outcome.avg_tardiness
    );
    for item in &outcome.assignments {
        println!(
            "  study {} -> doctor {} [{}]",
            item.study_number.clone().unwrap_or_else(|| item.study_id.to_string()),
            item.doctor_name.clone().unwrap_or_else(|| item.doctor_id.to_string()),
            item.priority.label()
        );
    }
    Ok(())
}

async fn show_metrics(client: &ApiClient) -> Result<()> {
    if let Err(e) = client.dashboard().stats(None).await {
        println!("# probe failed: {}", e.user_message());
    }
    print!("{}", client.metrics().render()?);
    Ok(())
}
