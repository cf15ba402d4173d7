// ==========================================
// 医生排班系统 - 日排班数据仓储
// ==========================================
// 存储: day_assignment 表 (一行一天, 按日期 upsert)
// 红线: Repository 不含业务逻辑, 不按当前月份过滤
// ==========================================

use crate::domain::roster::{DayAssignment, WardSlots};
use crate::repository::error::{parse_db_date, RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT shift_date, is_holiday, holiday_name, has_morning,
           morning_icu, morning_general,
           afternoon_icu, afternoon_general,
           night_icu, night_general
    FROM day_assignment
"#;

// ==========================================
// DayAssignmentRepository - 日排班仓储
// ==========================================
pub struct DayAssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DayAssignmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取全部历史日排班（按日期升序）
    pub fn list_all(&self) -> RepositoryResult<Vec<DayAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY shift_date ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_row)?;

        let mut days = Vec::new();
        for row in rows {
            days.push(decode(row?)?);
        }
        Ok(days)
    }

    /// 读取日期区间 [start, end] 内的日排班
    pub fn list_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<DayAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE shift_date BETWEEN ?1 AND ?2 ORDER BY shift_date ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                start.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string()
            ],
            map_row,
        )?;

        let mut days = Vec::new();
        for row in rows {
            days.push(decode(row?)?);
        }
        Ok(days)
    }

    /// 按日期批量 upsert（单事务, 全部成功或全部回滚）
    ///
    /// # 返回
    /// - `Ok(count)`: 写入的天数
    pub fn upsert_all(&self, days: &[DayAssignment]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for day in days {
            upsert_in_tx(&tx, day)?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(days.len())
    }
}

fn upsert_in_tx(tx: &Transaction<'_>, day: &DayAssignment) -> RepositoryResult<()> {
    let morning = day.morning.clone().unwrap_or_default();
    tx.execute(
        r#"
        INSERT INTO day_assignment (
            shift_date, is_holiday, holiday_name, has_morning,
            morning_icu, morning_general,
            afternoon_icu, afternoon_general,
            night_icu, night_general, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(shift_date) DO UPDATE SET
            is_holiday = excluded.is_holiday,
            holiday_name = excluded.holiday_name,
            has_morning = excluded.has_morning,
            morning_icu = excluded.morning_icu,
            morning_general = excluded.morning_general,
            afternoon_icu = excluded.afternoon_icu,
            afternoon_general = excluded.afternoon_general,
            night_icu = excluded.night_icu,
            night_general = excluded.night_general,
            updated_at = excluded.updated_at
        "#,
        params![
            day.date.format("%Y-%m-%d").to_string(),
            day.is_holiday as i32,
            day.holiday_name,
            day.morning.is_some() as i32,
            morning.icu,
            morning.general,
            day.afternoon.icu,
            day.afternoon.general,
            day.night.icu,
            day.night.general,
            Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

struct RawDay {
    date: String,
    is_holiday: bool,
    holiday_name: Option<String>,
    has_morning: bool,
    morning: WardSlots,
    afternoon: WardSlots,
    night: WardSlots,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<RawDay> {
    Ok(RawDay {
        date: row.get(0)?,
        is_holiday: row.get::<_, i32>(1)? != 0,
        holiday_name: row.get(2)?,
        has_morning: row.get::<_, i32>(3)? != 0,
        morning: WardSlots {
            icu: row.get(4)?,
            general: row.get(5)?,
        },
        afternoon: WardSlots {
            icu: row.get(6)?,
            general: row.get(7)?,
        },
        night: WardSlots {
            icu: row.get(8)?,
            general: row.get(9)?,
        },
    })
}

fn decode(raw: RawDay) -> RepositoryResult<DayAssignment> {
    Ok(DayAssignment {
        date: parse_db_date("shift_date", &raw.date)?,
        is_holiday: raw.is_holiday,
        holiday_name: raw.holiday_name,
        morning: raw.has_morning.then_some(raw.morning),
        afternoon: raw.afternoon,
        night: raw.night,
    })
}
