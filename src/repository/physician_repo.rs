// ==========================================
// 医生排班系统 - 医生名单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 医生只做 upsert, 不做物理删除 (历史排班可能仍引用)
// ==========================================

use crate::domain::physician::Physician;
use crate::repository::error::{parse_db_date, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

// ==========================================
// PhysicianRepository - 医生名单仓储
// ==========================================
pub struct PhysicianRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PhysicianRepository {
    /// 创建新的医生名单仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按名单顺序读取全部医生（含停岗）
    pub fn list_all(&self) -> RepositoryResult<Vec<Physician>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT physician_id, name, phone, active, color, unavailable_json
            FROM physician
            ORDER BY seq ASC, physician_id ASC
            "#,
        )?;

        let rows = stmt.query_map([], map_row)?;
        let mut physicians = Vec::new();
        for row in rows {
            physicians.push(decode(row?)?);
        }
        Ok(physicians)
    }

    /// 按ID查询
    pub fn find_by_id(&self, physician_id: &str) -> RepositoryResult<Option<Physician>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT physician_id, name, phone, active, color, unavailable_json
                FROM physician
                WHERE physician_id = ?1
                "#,
                params![physician_id],
                map_row,
            )
            .optional()?;

        raw.map(decode).transpose()
    }

    /// 批量保存名单（名单顺序写入 seq, 单事务）
    ///
    /// # 返回
    /// - `Ok(count)`: 写入的医生数量
    pub fn save_all(&self, physicians: &[Physician]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for (seq, p) in physicians.iter().enumerate() {
            let unavailable: Vec<String> = p
                .unavailable_dates
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            tx.execute(
                r#"
                INSERT INTO physician (
                    physician_id, seq, name, phone, active, color, unavailable_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(physician_id) DO UPDATE SET
                    seq = excluded.seq,
                    name = excluded.name,
                    phone = excluded.phone,
                    active = excluded.active,
                    color = excluded.color,
                    unavailable_json = excluded.unavailable_json
                "#,
                params![
                    p.id,
                    seq as i64,
                    p.name,
                    p.phone,
                    p.active as i32,
                    p.color,
                    serde_json::to_string(&unavailable)?,
                ],
            )?;
        }

        tx.commit()?;
        Ok(physicians.len())
    }
}

type RawPhysician = (String, String, String, bool, String, String);

fn map_row(row: &Row<'_>) -> rusqlite::Result<RawPhysician> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get::<_, i32>(3)? != 0,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode(raw: RawPhysician) -> RepositoryResult<Physician> {
    let (id, name, phone, active, color, unavailable_json) = raw;
    let dates: Vec<String> = serde_json::from_str(&unavailable_json)?;
    let unavailable_dates = dates
        .iter()
        .map(|d| parse_db_date("unavailable_json", d))
        .collect::<RepositoryResult<BTreeSet<NaiveDate>>>()?;

    Ok(Physician {
        id,
        name,
        phone,
        active,
        unavailable_dates,
        color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn test_save_and_list_keeps_order() {
        let repo = PhysicianRepository::new(setup_test_db());
        let mut zhang = Physician::new("张医生", "13800000001", "#ff0000");
        zhang.mark_unavailable(NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
        let li = Physician::new("李医生", "13800000002", "#00ff00");

        repo.save_all(&[li.clone(), zhang.clone()]).unwrap();

        let loaded = repo.list_all().unwrap();
        assert_eq!(loaded, vec![li, zhang.clone()]);

        let found = repo.find_by_id(&zhang.id).unwrap().unwrap();
        assert_eq!(found.unavailable_dates.len(), 1);
        assert!(repo.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_is_upsert_without_delete() {
        let repo = PhysicianRepository::new(setup_test_db());
        let mut a = Physician::new("A", "", "");
        let b = Physician::new("B", "", "");
        repo.save_all(&[a.clone(), b.clone()]).unwrap();

        a.active = false;
        repo.save_all(&[a.clone()]).unwrap();

        let loaded = repo.list_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.iter().find(|p| p.id == a.id).unwrap().active);
    }
}
