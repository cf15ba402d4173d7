// ==========================================
// 医生排班系统 - 医生领域模型
// ==========================================
// 红线: 被历史排班引用的医生不做物理删除
// 红线: 引用失效的医生ID按 "未知" 渲染,不得崩溃
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

// ==========================================
// Physician - 医生
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Physician {
    pub id: String,     // 医生ID
    pub name: String,   // 显示名称
    pub phone: String,  // 联系电话
    pub active: bool,   // 是否在岗
    #[serde(default)]
    pub unavailable_dates: BTreeSet<NaiveDate>, // 不可排班日期
    #[serde(default)]
    pub color: String,  // 展示颜色 (仅前端使用)
}

impl Physician {
    /// 创建新医生（管理员操作）
    ///
    /// # 参数
    /// - `name`: 显示名称
    /// - `phone`: 联系电话
    /// - `color`: 展示颜色
    pub fn new(name: &str, phone: &str, color: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            active: true,
            unavailable_dates: BTreeSet::new(),
            color: color.to_string(),
        }
    }

    /// 指定日期是否可排班（在岗且不在不可排班日期内）
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        self.active && !self.unavailable_dates.contains(&date)
    }

    /// 标记不可排班日期
    ///
    /// # 返回
    /// - `true`: 新增
    /// - `false`: 已存在
    pub fn mark_unavailable(&mut self, date: NaiveDate) -> bool {
        self.unavailable_dates.insert(date)
    }

    /// 取消不可排班日期
    pub fn clear_unavailable(&mut self, date: NaiveDate) -> bool {
        self.unavailable_dates.remove(&date)
    }
}

// ==========================================
// PhysicianLookup - 医生引用解析结果
// ==========================================
// 排班格子里的ID可能指向已移出名单的医生
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicianLookup<'a> {
    Found(&'a Physician),
    Stale(String),
}

impl<'a> PhysicianLookup<'a> {
    /// 展示名称; 失效引用渲染为 "未知医生(<id>)"
    pub fn display_name(&self) -> String {
        match self {
            PhysicianLookup::Found(p) => p.name.clone(),
            PhysicianLookup::Stale(id) => format!("未知医生({})", id),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, PhysicianLookup::Stale(_))
    }
}

// ==========================================
// PhysicianDirectory - 医生名录（按ID索引）
// ==========================================
pub struct PhysicianDirectory<'a> {
    by_id: HashMap<&'a str, &'a Physician>,
}

impl<'a> PhysicianDirectory<'a> {
    pub fn new(physicians: &'a [Physician]) -> Self {
        let by_id = physicians.iter().map(|p| (p.id.as_str(), p)).collect();
        Self { by_id }
    }

    /// 解析医生ID
    pub fn lookup(&self, id: &str) -> PhysicianLookup<'a> {
        match self.by_id.get(id) {
            Some(p) => PhysicianLookup::Found(p),
            None => PhysicianLookup::Stale(id.to_string()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Physician> {
        self.by_id.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_availability_respects_active_and_dates() {
        let mut p = Physician::new(" 张医生 ", "13800000000", "#ff0000");
        assert_eq!(p.name, "张医生");
        assert!(p.is_available_on(date(3)));

        assert!(p.mark_unavailable(date(3)));
        assert!(!p.mark_unavailable(date(3)));
        assert!(!p.is_available_on(date(3)));
        assert!(p.is_available_on(date(4)));

        p.active = false;
        assert!(!p.is_available_on(date(4)));
    }

    #[test]
    fn test_directory_reports_stale_reference() {
        let physicians = vec![Physician::new("李医生", "", "")];
        let directory = PhysicianDirectory::new(&physicians);

        let found = directory.lookup(&physicians[0].id);
        assert_eq!(found.display_name(), "李医生");
        assert!(!found.is_stale());

        let stale = directory.lookup("ghost");
        assert!(stale.is_stale());
        assert_eq!(stale.display_name(), "未知医生(ghost)");
    }
}
