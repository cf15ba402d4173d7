// ==========================================
// 医生排班系统 - 排班表领域模型
// ==========================================
// DayAssignment: 单日 6 个格子 + 节假日标记
// MonthRoster: 当月每天一条, 按日期顺序
// ==========================================
// 生命周期:
// - 切换月份/配置时由 "已持久化日记录 + 重新推导的节假日标记" 合成
// - 手工编辑或整月重新生成时原地修改
// - 异步落库, 未成功落库前不得丢弃
// ==========================================

use crate::domain::calendar::{HolidayInfo, MonthConfig};
use crate::domain::types::{ShiftPeriod, SlotKey, Ward};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// WardSlots - 同一班次的两个病区格子
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardSlots {
    pub icu: Option<String>,
    pub general: Option<String>,
}

impl WardSlots {
    pub fn get(&self, ward: Ward) -> Option<&str> {
        match ward {
            Ward::Icu => self.icu.as_deref(),
            Ward::General => self.general.as_deref(),
        }
    }

    pub fn set(&mut self, ward: Ward, physician_id: Option<String>) {
        match ward {
            Ward::Icu => self.icu = physician_id,
            Ward::General => self.general = physician_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.icu.is_none() && self.general.is_none()
    }
}

// ==========================================
// DayAssignment - 单日排班
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAssignment {
    pub date: NaiveDate,
    pub is_holiday: bool,
    #[serde(default)]
    pub holiday_name: Option<String>,
    /// 早班格子对; 工作日为 None
    #[serde(default)]
    pub morning: Option<WardSlots>,
    #[serde(default)]
    pub afternoon: WardSlots,
    #[serde(default)]
    pub night: WardSlots,
}

impl DayAssignment {
    /// 创建空白日记录
    pub fn blank(date: NaiveDate, info: &HolidayInfo) -> Self {
        let mut day = Self {
            date,
            is_holiday: false,
            holiday_name: None,
            morning: None,
            afternoon: WardSlots::default(),
            night: WardSlots::default(),
        };
        day.apply_holiday(info);
        day
    }

    /// 重新套用节假日标记
    ///
    /// 变为节假日时补齐早班格子对; 不再是节假日时保留已有早班数据（由校验器报告）
    pub fn apply_holiday(&mut self, info: &HolidayInfo) {
        self.is_holiday = info.is_holiday;
        self.holiday_name = info.holiday_name.clone();
        if self.is_holiday && self.morning.is_none() {
            self.morning = Some(WardSlots::default());
        }
    }

    /// 读取格子
    pub fn slot(&self, key: SlotKey) -> Option<&str> {
        match key.period {
            ShiftPeriod::Morning => self.morning.as_ref().and_then(|m| m.get(key.ward)),
            ShiftPeriod::Afternoon => self.afternoon.get(key.ward),
            ShiftPeriod::Night => self.night.get(key.ward),
        }
    }

    /// 写入格子
    ///
    /// 早班: 写入医生时按需创建格子对; 工作日清空后格子对为空则移除
    pub fn set_slot(&mut self, key: SlotKey, physician_id: Option<String>) {
        match key.period {
            ShiftPeriod::Morning => match physician_id {
                Some(id) => self
                    .morning
                    .get_or_insert_with(WardSlots::default)
                    .set(key.ward, Some(id)),
                None => {
                    if let Some(m) = self.morning.as_mut() {
                        m.set(key.ward, None);
                        if !self.is_holiday && m.is_empty() {
                            self.morning = None;
                        }
                    }
                }
            },
            ShiftPeriod::Afternoon => self.afternoon.set(key.ward, physician_id),
            ShiftPeriod::Night => self.night.set(key.ward, physician_id),
        }
    }

    /// 当天存在的格子（工作日 4 个, 节假日 6 个）
    pub fn slot_keys(&self) -> Vec<SlotKey> {
        SlotKey::all()
            .into_iter()
            .filter(|k| k.period != ShiftPeriod::Morning || self.morning.is_some())
            .collect()
    }

    /// 已占用的格子
    pub fn occupied(&self) -> Vec<(SlotKey, &str)> {
        SlotKey::all()
            .into_iter()
            .filter_map(|k| self.slot(k).map(|id| (k, id)))
            .collect()
    }

    /// 医生当天是否有任何班次
    pub fn works(&self, physician_id: &str) -> bool {
        self.occupied().iter().any(|(_, id)| *id == physician_id)
    }

    /// 清空全部格子（保留节假日标记与早班格子对的形状）
    pub fn clear_assignments(&mut self) {
        if let Some(m) = self.morning.as_mut() {
            *m = WardSlots::default();
        }
        self.afternoon = WardSlots::default();
        self.night = WardSlots::default();
    }
}

// ==========================================
// MonthRoster - 月度排班表
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRoster {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayAssignment>,
}

impl MonthRoster {
    /// 创建空白月度排班表
    pub fn blank(config: &MonthConfig) -> Self {
        Self::synthesize(config, &[])
    }

    /// 合成月度排班表
    ///
    /// # 参数
    /// - `config`: 月度配置（决定节假日标记）
    /// - `persisted`: 已持久化的日记录（可含其它月份, 这里按日期过滤）
    ///
    /// # 返回
    /// 当月每天一条; 有持久化记录的日期沿用其格子数据, 节假日标记按配置重新推导
    pub fn synthesize(config: &MonthConfig, persisted: &[DayAssignment]) -> Self {
        let by_date: HashMap<NaiveDate, &DayAssignment> = persisted
            .iter()
            .filter(|d| config.contains(d.date))
            .map(|d| (d.date, d))
            .collect();

        let days = config
            .dates()
            .into_iter()
            .map(|date| {
                let info = config.holiday_info(date);
                match by_date.get(&date) {
                    Some(saved) => {
                        let mut day = (*saved).clone();
                        day.apply_holiday(&info);
                        day
                    }
                    None => DayAssignment::blank(date, &info),
                }
            })
            .collect();

        Self {
            year: config.year,
            month: config.month,
            days,
        }
    }

    /// 配置变更后重新推导节假日标记（不销毁格子数据）
    pub fn apply_config(&mut self, config: &MonthConfig) {
        for day in self.days.iter_mut() {
            day.apply_holiday(&config.holiday_info(day.date));
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayAssignment> {
        if !self.contains(date) {
            return None;
        }
        self.days
            .get(date.day0() as usize)
            .filter(|d| d.date == date)
            .or_else(|| self.days.iter().find(|d| d.date == date))
    }

    pub fn day_mut(&mut self, date: NaiveDate) -> Option<&mut DayAssignment> {
        if !self.contains(date) {
            return None;
        }
        self.days.iter_mut().find(|d| d.date == date)
    }

    /// 已占用格子总数
    pub fn assigned_slot_count(&self) -> usize {
        self.days.iter().map(|d| d.occupied().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::CustomHoliday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_blank_roster_shape() {
        // 2025-03: 1日为周六
        let config = MonthConfig::new(2025, 3);
        let roster = MonthRoster::blank(&config);

        assert_eq!(roster.days.len(), 31);
        let saturday = roster.day(ymd(2025, 3, 1)).unwrap();
        assert!(saturday.is_holiday);
        assert!(saturday.morning.is_some());
        assert_eq!(saturday.slot_keys().len(), 6);

        let monday = roster.day(ymd(2025, 3, 3)).unwrap();
        assert!(!monday.is_holiday);
        assert!(monday.morning.is_none());
        assert_eq!(monday.slot_keys().len(), 4);

        assert!(roster.day(ymd(2025, 4, 1)).is_none());
    }

    #[test]
    fn test_synthesize_keeps_persisted_slots_and_rederives_flags() {
        let mut config = MonthConfig::new(2025, 3);
        let wednesday = ymd(2025, 3, 5);

        let mut saved = DayAssignment::blank(wednesday, &config.holiday_info(wednesday));
        saved.set_slot(SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu), Some("p1".into()));
        let other_month = DayAssignment::blank(ymd(2025, 4, 5), &config.holiday_info(wednesday));

        config.upsert_holiday(CustomHoliday::new(wednesday, "院庆"));
        let roster = MonthRoster::synthesize(&config, &[saved, other_month]);

        let day = roster.day(wednesday).unwrap();
        assert!(day.is_holiday);
        assert_eq!(day.holiday_name.as_deref(), Some("院庆"));
        assert!(day.morning.is_some());
        assert_eq!(day.slot(SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu)), Some("p1"));
        assert_eq!(roster.days.len(), 31);
    }

    #[test]
    fn test_apply_config_keeps_morning_data_when_holiday_removed() {
        let wednesday = ymd(2025, 3, 5);
        let mut config = MonthConfig::new(2025, 3);
        config.upsert_holiday(CustomHoliday::new(wednesday, "院庆"));
        let mut roster = MonthRoster::blank(&config);
        roster
            .day_mut(wednesday)
            .unwrap()
            .set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::General), Some("p1".into()));

        config.remove_holiday(wednesday);
        roster.apply_config(&config);

        let day = roster.day(wednesday).unwrap();
        assert!(!day.is_holiday);
        assert_eq!(day.slot(SlotKey::new(ShiftPeriod::Morning, Ward::General)), Some("p1"));
    }

    #[test]
    fn test_clearing_morning_on_workday_keeps_four_slots() {
        let config = MonthConfig::new(2025, 3);
        // 2025-03-03 周一
        let monday = ymd(2025, 3, 3);
        let mut day = DayAssignment::blank(monday, &config.holiday_info(monday));

        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), None);
        assert!(day.morning.is_none());
        assert_eq!(day.slot_keys().len(), 4);

        // 取消节假日后残留的早班数据, 清空最后一格时一并移除
        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), Some("p1".into()));
        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::General), Some("p2".into()));
        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), None);
        assert_eq!(day.slot_keys().len(), 6);
        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::General), None);
        assert!(day.morning.is_none());
        assert_eq!(day.slot_keys().len(), 4);
    }

    #[test]
    fn test_clearing_morning_on_holiday_keeps_pair() {
        let config = MonthConfig::new(2025, 3);
        // 2025-03-01 周六
        let saturday = ymd(2025, 3, 1);
        let mut day = DayAssignment::blank(saturday, &config.holiday_info(saturday));

        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), Some("p1".into()));
        day.set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), None);
        assert_eq!(day.morning, Some(WardSlots::default()));
        assert_eq!(day.slot_keys().len(), 6);
    }
}
