// ==========================================
// 医生排班系统 - 命令行入口
// ==========================================
// 子命令: generate / check / show / export / edit / holiday / physician
// 本地操作员以管理员身份运行; 每个命令结束前强制保存
// ==========================================

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use physician_roster::api::{AuthenticatedUser, RosterApi, RosterExport};
use physician_roster::app::{get_default_db_path, AppState, DB_PATH_ENV};
use physician_roster::domain::{CustomHoliday, ShiftPeriod, SlotKey, UserRole, Ward};
use physician_roster::engine::EvaluationReport;
use physician_roster::logging::{self, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "roster", version, about = "医生排班系统 - 排班生成、校验与导出")]
struct Cli {
    /// 数据库文件路径
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<PathBuf>,

    /// 操作人（写入操作日志）
    #[arg(long, global = true, default_value = "local-admin")]
    actor: String,

    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 自动生成整月排班（指定年月时先切换月份）
    Generate(MonthArgs),
    /// 校验当前月份排班并输出报告
    Check(MonthArgs),
    /// 打印当前月份排班表
    Show(MonthArgs),
    /// 导出当前月份排班为 CSV
    Export(ExportArgs),
    /// 编辑单个格子（按约束模型级联）
    Edit(EditArgs),
    /// 自定义节假日维护
    #[command(subcommand)]
    Holiday(HolidayCommand),
    /// 医生名单维护
    #[command(subcommand)]
    Physician(PhysicianCommand),
}

#[derive(Args, Debug)]
struct MonthArgs {
    #[arg(long, requires = "month")]
    year: Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    month: MonthArgs,
    /// 输出文件
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct EditArgs {
    #[arg(long)]
    date: NaiveDate,
    /// MORNING / AFTERNOON / NIGHT
    #[arg(long, value_parser = parse_period)]
    period: ShiftPeriod,
    /// ICU / GENERAL
    #[arg(long, value_parser = parse_ward)]
    ward: Ward,
    /// 医生ID; 省略表示清空
    #[arg(long)]
    physician: Option<String>,
}

#[derive(Subcommand, Debug)]
enum HolidayCommand {
    /// 新增或改名自定义节假日
    Add {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        name: String,
    },
    /// 删除自定义节假日
    Remove {
        #[arg(long)]
        date: NaiveDate,
    },
}

#[derive(Subcommand, Debug)]
enum PhysicianCommand {
    /// 列出医生名单
    List,
    /// 新增医生
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        color: String,
    },
    /// 停岗
    Deactivate {
        #[arg(long)]
        id: String,
    },
    /// 复岗
    Activate {
        #[arg(long)]
        id: String,
    },
    /// 维护不可排班日期
    Unavailable {
        #[arg(long)]
        id: String,
        #[arg(long)]
        date: NaiveDate,
        /// 移除而不是新增
        #[arg(long)]
        remove: bool,
    },
}

fn parse_period(s: &str) -> Result<ShiftPeriod, String> {
    ShiftPeriod::from_str(s).ok_or_else(|| format!("未知班次: {}", s))
}

fn parse_ward(s: &str) -> Result<Ward, String> {
    Ward::from_str(s).ok_or_else(|| format!("未知病区: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_format(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    let db_path = match &cli.db {
        Some(path) => path.to_string_lossy().to_string(),
        None => get_default_db_path(),
    };
    tracing::info!(db_path = %db_path, version = physician_roster::VERSION, "{}", physician_roster::APP_NAME);

    let state = AppState::new(db_path).context("初始化应用状态失败")?;
    let user = AuthenticatedUser::new(&cli.actor, UserRole::Admin);

    match cli.command {
        Commands::Physician(cmd) => run_physician(&state, user, cmd).await,
        command => {
            let session = state.open_roster_session(user).await?;
            let result = run_roster(&session, command).await;
            // 无论命令成败都尝试落盘
            session.logout().await?;
            result
        }
    }
}

async fn select_month(session: &RosterApi, args: &MonthArgs) -> Result<()> {
    if let (Some(year), Some(month)) = (args.year, args.month) {
        session.switch_month(year, month).await?;
    }
    Ok(())
}

async fn run_roster(session: &RosterApi, command: Commands) -> Result<()> {
    match command {
        Commands::Generate(args) => {
            select_month(session, &args).await?;
            let report = session.regenerate().await?;
            print_report(&report);
        }
        Commands::Check(args) => {
            select_month(session, &args).await?;
            print_report(&session.evaluate()?);
        }
        Commands::Show(args) => {
            select_month(session, &args).await?;
            print_table(&session.export_view()?);
        }
        Commands::Export(args) => {
            select_month(session, &args.month).await?;
            let file = std::fs::File::create(&args.out)
                .with_context(|| format!("无法创建 {}", args.out.display()))?;
            session.export_view()?.write_csv(file)?;
            println!("已导出到 {}", args.out.display());
        }
        Commands::Edit(args) => {
            let outcome =
                session.edit_cell(args.date, args.period, args.ward, args.physician.as_deref())?;
            let written: Vec<String> = outcome.written.iter().map(|s| s.to_string()).collect();
            println!("已写入: {}", written.join(", "));
            for warning in &outcome.warnings {
                println!("提示: {}", warning.message);
            }
        }
        Commands::Holiday(cmd) => {
            let mut config = session.config()?;
            match cmd {
                HolidayCommand::Add { date, name } => {
                    config.upsert_holiday(CustomHoliday::new(date, &name));
                }
                HolidayCommand::Remove { date } => {
                    if !config.remove_holiday(date) {
                        return Err(anyhow!("{} 不是自定义节假日", date));
                    }
                }
            }
            let this_month: Vec<CustomHoliday> = config
                .custom_holidays
                .iter()
                .filter(|h| config.contains(h.date))
                .cloned()
                .collect();
            session.update_custom_holidays(this_month).await?;
            println!("节假日配置已更新");
        }
        Commands::Physician(_) => return Err(anyhow!("医生维护命令不需要排班会话")),
    }
    Ok(())
}

async fn run_physician(
    state: &AppState,
    user: AuthenticatedUser,
    cmd: PhysicianCommand,
) -> Result<()> {
    let api = state.physician_api(user);
    match cmd {
        PhysicianCommand::List => {
            for p in api.list().await? {
                let unavailable: Vec<String> =
                    p.unavailable_dates.iter().map(|d| d.to_string()).collect();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    p.id,
                    p.name,
                    if p.active { "在岗" } else { "停岗" },
                    p.phone,
                    unavailable.join(",")
                );
            }
        }
        PhysicianCommand::Add { name, phone, color } => {
            let p = api.add_physician(&name, &phone, &color).await?;
            println!("{}", p.id);
        }
        PhysicianCommand::Deactivate { id } => {
            api.set_active(&id, false).await?;
        }
        PhysicianCommand::Activate { id } => {
            api.set_active(&id, true).await?;
        }
        PhysicianCommand::Unavailable { id, date, remove } => {
            let changed = if remove {
                api.remove_unavailable_date(&id, date).await?
            } else {
                api.add_unavailable_date(&id, date).await?
            };
            if !changed {
                println!("未变化");
            }
        }
    }
    Ok(())
}

fn print_report(report: &EvaluationReport) {
    println!(
        "硬约束违规 {} 项, 未排格子 {} 个, 失效引用 {} 个",
        report.violations.len(),
        report.uncovered_slots.len(),
        report.stale_references.len()
    );
    for v in &report.violations {
        let date = v.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        println!("  [{:?}] {} {}", v.kind, date, v.reason);
    }
    println!(
        "公平性: 总班次极差 {}, 节假日班次极差 {}, 连续上班 {} 人, 标准差 {:.2}",
        report.fairness.total_spread,
        report.fairness.holiday_spread,
        report.fairness.consecutive_physicians,
        report.fairness.score
    );
    for load in &report.fairness.loads {
        println!(
            "  {}\t总 {}\t节假日 {}\tICU {}\t普通 {}",
            load.name, load.total_shifts, load.holiday_shifts, load.icu_shifts, load.general_shifts
        );
    }
}

fn print_table(export: &RosterExport) {
    println!("{}年{}月", export.year, export.month);
    let header: Vec<String> = SlotKey::all()
        .iter()
        .map(|s| format!("{}{}", s.period.title_cn(), s.ward.title_cn()))
        .collect();
    println!("日期\t\t星期\t{}", header.join("\t"));
    for row in &export.rows {
        let cells: Vec<String> = SlotKey::all()
            .iter()
            .map(|slot| match row.cell(*slot) {
                Some(cell) if !cell.display.is_empty() => cell.display.clone(),
                Some(_) => "·".to_string(),
                None => "-".to_string(),
            })
            .collect();
        let mark = match (&row.holiday_name, row.is_holiday) {
            (Some(name), _) => format!("{}*", name),
            (None, true) => "*".to_string(),
            (None, false) => String::new(),
        };
        println!("{}{}\t{}\t{}", row.date, mark, row.weekday, cells.join("\t"));
    }
}
