// ==========================================
// 医生排班系统 - 排班只读导出视图
// ==========================================
// 职责: 把月度排班解析为带医生姓名的只读表格, 供文档渲染 / CSV 导出
// 红线: 已移除医生的引用显示为 "未知医生(<id>)", 不报错
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::physician::{Physician, PhysicianDirectory};
use crate::domain::roster::MonthRoster;
use crate::domain::types::{ShiftPeriod, SlotKey, Ward};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// 单个格子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportCell {
    pub slot: SlotKey,
    pub physician_id: Option<String>,
    /// 显示文本（空格子为空串）
    pub display: String,
    pub stale: bool,
}

/// 单日一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub date: NaiveDate,
    pub weekday: String,
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
    /// 当天存在的格子（工作日无早班）
    pub cells: Vec<ExportCell>,
}

impl ExportRow {
    pub fn cell(&self, key: SlotKey) -> Option<&ExportCell> {
        self.cells.iter().find(|c| c.slot == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterExport {
    pub year: i32,
    pub month: u32,
    pub rows: Vec<ExportRow>,
}

impl RosterExport {
    /// 由内存排班构建导出视图
    pub fn build(roster: &MonthRoster, physicians: &[Physician]) -> Self {
        let directory = PhysicianDirectory::new(physicians);
        let rows = roster
            .days
            .iter()
            .map(|day| ExportRow {
                date: day.date,
                weekday: weekday_cn(day.date.weekday()).to_string(),
                is_holiday: day.is_holiday,
                holiday_name: day.holiday_name.clone(),
                cells: day
                    .slot_keys()
                    .into_iter()
                    .map(|slot| match day.slot(slot) {
                        Some(id) => {
                            let lookup = directory.lookup(id);
                            ExportCell {
                                slot,
                                physician_id: Some(id.to_string()),
                                display: lookup.display_name(),
                                stale: lookup.is_stale(),
                            }
                        }
                        None => ExportCell {
                            slot,
                            physician_id: None,
                            display: String::new(),
                            stale: false,
                        },
                    })
                    .collect(),
            })
            .collect();

        Self {
            year: roster.year,
            month: roster.month,
            rows,
        }
    }

    /// 导出为 CSV（固定 6 列班次, 工作日早班列为 "-"）
    pub fn write_csv<W: Write>(&self, writer: W) -> ApiResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["日期".to_string(), "星期".to_string(), "节假日".to_string()];
        for slot in SlotKey::all() {
            header.push(format!("{}{}", slot.period.title_cn(), slot.ward.title_cn()));
        }
        wtr.write_record(&header).map_err(csv_error)?;

        for row in &self.rows {
            let mut record = vec![
                row.date.format("%Y-%m-%d").to_string(),
                row.weekday.clone(),
                match (&row.holiday_name, row.is_holiday) {
                    (Some(name), _) => name.clone(),
                    (None, true) => "周末".to_string(),
                    (None, false) => String::new(),
                },
            ];
            for slot in SlotKey::all() {
                record.push(match row.cell(slot) {
                    Some(cell) => cell.display.clone(),
                    None => "-".to_string(),
                });
            }
            wtr.write_record(&record).map_err(csv_error)?;
        }

        wtr.flush()
            .map_err(|e| ApiError::InternalError(format!("CSV 写入失败: {}", e)))?;
        Ok(())
    }

    /// 某医生在本月的全部格子（用于个人排班表）
    pub fn slots_of(&self, physician_id: &str) -> Vec<(NaiveDate, SlotKey)> {
        self.rows
            .iter()
            .flat_map(|row| {
                row.cells
                    .iter()
                    .filter(|c| c.physician_id.as_deref() == Some(physician_id))
                    .map(move |c| (row.date, c.slot))
            })
            .collect()
    }
}

fn csv_error(e: csv::Error) -> ApiError {
    ApiError::InternalError(format!("CSV 写入失败: {}", e))
}

fn weekday_cn(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "周一",
        Weekday::Tue => "周二",
        Weekday::Wed => "周三",
        Weekday::Thu => "周四",
        Weekday::Fri => "周五",
        Weekday::Sat => "周六",
        Weekday::Sun => "周日",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::MonthConfig;

    #[test]
    fn test_stale_reference_renders_as_unknown() {
        let config = MonthConfig::new(2025, 3);
        let mut roster = MonthRoster::blank(&config);
        let zhang = Physician::new("张医生", "", "");
        let sat = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        {
            let day = roster.day_mut(sat).unwrap();
            day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::General), Some(zhang.id.clone()));
            day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), Some("gone".into()));
        }

        let export = RosterExport::build(&roster, &[zhang.clone()]);
        let row = &export.rows[0];
        assert_eq!(row.weekday, "周六");
        assert_eq!(row.cells.len(), 6);

        let general = row.cell(SlotKey::new(ShiftPeriod::Morning, Ward::General)).unwrap();
        assert_eq!(general.display, "张医生");
        let icu = row.cell(SlotKey::new(ShiftPeriod::Morning, Ward::Icu)).unwrap();
        assert!(icu.stale);
        assert_eq!(icu.display, "未知医生(gone)");

        // 周一没有早班格子
        assert!(export.rows[2].cell(SlotKey::new(ShiftPeriod::Morning, Ward::Icu)).is_none());
        assert_eq!(export.slots_of(&zhang.id), vec![(sat, SlotKey::new(ShiftPeriod::Morning, Ward::General))]);
    }

    #[test]
    fn test_write_csv_has_header_and_rows() {
        let roster = MonthRoster::blank(&MonthConfig::new(2025, 2));
        let export = RosterExport::build(&roster, &[]);

        let mut buf = Vec::new();
        export.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 1 + 28);
        assert!(lines[0].starts_with("日期,星期,节假日"));
        assert!(lines[1].starts_with("2025-02-01,周六,周末"));
        assert!(lines[3].starts_with("2025-02-03,周一,,-,-"));
    }
}
