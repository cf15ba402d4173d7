// ==========================================
// 医生排班系统 - 月度配置数据仓储
// ==========================================
// 存储: month_config (单行: 当前编辑的年月)
//       custom_holiday (自定义节假日, 全量覆盖写)
// ==========================================

use crate::domain::calendar::{CustomHoliday, MonthConfig};
use crate::repository::error::{parse_db_date, RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// MonthConfigRepository - 月度配置仓储
// ==========================================
pub struct MonthConfigRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MonthConfigRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取月度配置
    ///
    /// # 返回
    /// - `Ok(None)`: 从未保存过配置
    pub fn load(&self) -> RepositoryResult<Option<MonthConfig>> {
        let conn = self.get_conn()?;

        let head: Option<(i32, u32)> = conn
            .query_row(
                "SELECT year, month FROM month_config WHERE config_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((year, month)) = head else {
            return Ok(None);
        };

        let mut stmt =
            conn.prepare("SELECT holiday_date, name FROM custom_holiday ORDER BY holiday_date")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config = MonthConfig::new(year, month);
        for row in rows {
            let (date, name) = row?;
            config.custom_holidays.push(CustomHoliday {
                date: parse_db_date("holiday_date", &date)?,
                name,
            });
        }
        Ok(Some(config))
    }

    /// 保存月度配置（单事务; 自定义节假日全量覆盖）
    pub fn save(&self, config: &MonthConfig) -> RepositoryResult<()> {
        config.validate().map_err(RepositoryError::ValidationError)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO month_config (config_id, year, month, updated_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(config_id) DO UPDATE SET
                year = excluded.year,
                month = excluded.month,
                updated_at = excluded.updated_at
            "#,
            params![
                config.year,
                config.month,
                Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;

        tx.execute("DELETE FROM custom_holiday", [])?;
        for holiday in &config.custom_holidays {
            tx.execute(
                "INSERT INTO custom_holiday (holiday_date, name) VALUES (?1, ?2)",
                params![holiday.date.format("%Y-%m-%d").to_string(), holiday.name],
            )?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_load_empty_returns_none() {
        let repo = MonthConfigRepository::new(setup_test_db());
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_holidays() {
        let repo = MonthConfigRepository::new(setup_test_db());
        let mut config = MonthConfig::new(2025, 5);
        config.upsert_holiday(CustomHoliday::new(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            "劳动节",
        ));
        config.upsert_holiday(CustomHoliday::new(
            NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            "劳动节",
        ));
        repo.save(&config).unwrap();
        assert_eq!(repo.load().unwrap(), Some(config.clone()));

        config.remove_holiday(NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
        let config = config.with_month(2025, 6);
        repo.save(&config).unwrap();

        let loaded = repo.load().unwrap().unwrap();
        assert_eq!(loaded.month, 6);
        assert_eq!(loaded.custom_holidays.len(), 1);
    }

    #[test]
    fn test_save_rejects_invalid_config() {
        let repo = MonthConfigRepository::new(setup_test_db());
        let result = repo.save(&MonthConfig::new(2025, 13));
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));
    }
}
