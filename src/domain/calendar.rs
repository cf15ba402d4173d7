// ==========================================
// 医生排班系统 - 月度日历配置
// ==========================================
// 节假日 = 周末 或 管理员声明的自定义节假日
// 只有节假日存在早班
// ==========================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

// ==========================================
// CustomHoliday - 自定义节假日
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHoliday {
    pub date: NaiveDate,
    pub name: String,
}

impl CustomHoliday {
    pub fn new(date: NaiveDate, name: &str) -> Self {
        Self {
            date,
            name: name.trim().to_string(),
        }
    }
}

/// 单日节假日判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolidayInfo {
    pub is_holiday: bool,
    pub holiday_name: Option<String>,
}

// ==========================================
// MonthConfig - 月度配置 (year, month, customHolidays)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthConfig {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub custom_holidays: Vec<CustomHoliday>,
}

impl MonthConfig {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            custom_holidays: Vec::new(),
        }
    }

    /// 以给定日期所在月份创建配置
    pub fn for_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    /// 校验配置
    ///
    /// # 验证规则
    /// 1. 月份在 1..=12
    /// 2. 自定义节假日名称不能为空
    /// 3. 自定义节假日日期不能重复
    pub fn validate(&self) -> Result<(), String> {
        if self.first_day().is_none() {
            return Err(format!("无效的年月: {}-{}", self.year, self.month));
        }
        let mut seen = std::collections::BTreeSet::new();
        for holiday in &self.custom_holidays {
            if holiday.name.trim().is_empty() {
                return Err(format!("节假日 {} 名称不能为空", holiday.date));
            }
            if !seen.insert(holiday.date) {
                return Err(format!("节假日 {} 重复", holiday.date));
            }
        }
        Ok(())
    }

    /// 当月第一天
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// 当月天数（无效年月返回 0）
    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    /// 当月全部日期（按时间顺序）
    pub fn dates(&self) -> Vec<NaiveDate> {
        (1..=self.days_in_month())
            .filter_map(|d| NaiveDate::from_ymd_opt(self.year, self.month, d))
            .collect()
    }

    /// 日期是否属于本月
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// 判定某日是否节假日
    ///
    /// 自定义节假日带名称; 普通周末无名称
    pub fn holiday_info(&self, date: NaiveDate) -> HolidayInfo {
        if let Some(custom) = self.custom_holidays.iter().find(|h| h.date == date) {
            return HolidayInfo {
                is_holiday: true,
                holiday_name: Some(custom.name.clone()),
            };
        }
        HolidayInfo {
            is_holiday: is_weekend(date),
            holiday_name: None,
        }
    }

    /// 新增或改名自定义节假日
    pub fn upsert_holiday(&mut self, holiday: CustomHoliday) {
        match self.custom_holidays.iter_mut().find(|h| h.date == holiday.date) {
            Some(existing) => existing.name = holiday.name,
            None => {
                self.custom_holidays.push(holiday);
                self.custom_holidays.sort_by_key(|h| h.date);
            }
        }
    }

    /// 删除自定义节假日
    pub fn remove_holiday(&mut self, date: NaiveDate) -> bool {
        let before = self.custom_holidays.len();
        self.custom_holidays.retain(|h| h.date != date);
        before != self.custom_holidays.len()
    }

    /// 切换到另一个月（自定义节假日列表保留）
    pub fn with_month(&self, year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            custom_holidays: self.custom_holidays.clone(),
        }
    }
}

/// 周六、周日
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// 某年某月的天数（无效年月返回 0）
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(next) => (next - first).num_days() as u32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 13), 0);
    }

    #[test]
    fn test_holiday_info_weekend_and_custom() {
        let mut config = MonthConfig::new(2025, 10);
        // 2025-10-01 周三
        let national_day = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 10, 4).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();

        assert!(!config.holiday_info(national_day).is_holiday);
        config.upsert_holiday(CustomHoliday::new(national_day, "国庆节"));

        let info = config.holiday_info(national_day);
        assert!(info.is_holiday);
        assert_eq!(info.holiday_name.as_deref(), Some("国庆节"));

        let weekend = config.holiday_info(saturday);
        assert!(weekend.is_holiday);
        assert_eq!(weekend.holiday_name, None);

        assert!(!config.holiday_info(monday).is_holiday);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_month() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let mut config = MonthConfig::new(2025, 5);
        config.custom_holidays.push(CustomHoliday::new(date, "劳动节"));
        config.custom_holidays.push(CustomHoliday::new(date, "劳动节"));
        assert!(config.validate().is_err());

        assert!(MonthConfig::new(2025, 0).validate().is_err());
        assert!(MonthConfig::new(2025, 5).validate().is_ok());
    }

    #[test]
    fn test_upsert_and_remove_holiday() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let mut config = MonthConfig::new(2025, 5);
        config.upsert_holiday(CustomHoliday::new(date, "调休"));
        config.upsert_holiday(CustomHoliday::new(date, "劳动节"));
        assert_eq!(config.custom_holidays.len(), 1);
        assert_eq!(config.custom_holidays[0].name, "劳动节");
        assert!(config.remove_holiday(date));
        assert!(!config.remove_holiday(date));
    }
}
