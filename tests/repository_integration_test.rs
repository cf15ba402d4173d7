// ==========================================
// Repository 层集成测试
// ==========================================
// 测试目标: 验证 SQLite 存储的完整读写流程, 以及重开会话后排班可恢复
// ==========================================


use physician_roster::api::AuthenticatedUser;
use physician_roster::app::AppState;
use physician_roster::config::{config_keys, ConfigManager};
use physician_roster::domain::{
    ActionType, CustomHoliday, MonthConfig, MonthRoster, ShiftPeriod, SlotKey, UserRole, Ward,
};
use physician_roster::logging;
use physician_roster::repository::{RosterStore, SqliteRosterStore};
use test_helpers::{create_test_db, date, physicians};

#[tokio::test]
async fn test_store_round_trip_on_disk() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let store = SqliteRosterStore::open(&db_path).unwrap();

    let mut staff = physicians(3);
    staff[1].mark_unavailable(date(2025, 3, 10));
    staff[2].active = false;
    store.save_physicians(&staff).await.unwrap();

    let mut config = MonthConfig::new(2025, 3);
    config.upsert_holiday(CustomHoliday::new(date(2025, 3, 14), "院庆"));
    store.save_config(&config).await.unwrap();

    let mut roster = MonthRoster::blank(&config);
    roster
        .day_mut(date(2025, 3, 14))
        .unwrap()
        .set_slot(SlotKey::new(ShiftPeriod::Morning, Ward::Icu), Some("P0".into()));
    store.save_month_roster(&roster.days).await.unwrap();
    drop(store);

    // 重新打开同一文件
    let reopened = SqliteRosterStore::open(&db_path).unwrap();
    let loaded_staff = reopened.load_physicians().await.unwrap();
    assert_eq!(loaded_staff, staff);

    let loaded_config = reopened.load_config().await.unwrap().unwrap();
    assert_eq!(loaded_config, config);

    let persisted = reopened.load_month_roster().await.unwrap();
    assert_eq!(persisted.len(), 31);
    let rebuilt = MonthRoster::synthesize(&loaded_config, &persisted);
    assert_eq!(rebuilt, roster);
}

#[tokio::test]
async fn test_config_manager_shares_database_file() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let _store = SqliteRosterStore::open(&db_path).unwrap();
    let config_manager = ConfigManager::new(&db_path).unwrap();

    config_manager
        .set_config_value(config_keys::FORBID_CONSECUTIVE_DAYS, "true")
        .unwrap();
    config_manager
        .set_config_value(config_keys::SYNC_DEBOUNCE_MS, "250")
        .unwrap();

    let reopened = ConfigManager::new(&db_path).unwrap();
    assert!(reopened.load_generation_settings().unwrap().forbid_consecutive_days);
    assert_eq!(
        reopened.load_sync_settings().unwrap().debounce.as_millis(),
        250
    );
}

#[tokio::test]
async fn test_session_survives_restart() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let admin = AuthenticatedUser::new("admin", UserRole::Admin);

    let generated = {
        let state = AppState::new(db_path.clone()).unwrap();
        {
            let physician_api = state.physician_api(admin.clone());
            for name in ["张医生", "李医生", "王医生"] {
                physician_api.add_physician(name, "", "").await.unwrap();
            }
        }

        let session = state.open_roster_session(admin.clone()).await.unwrap();
        session.switch_month(2025, 3).await.unwrap();
        let report = session.regenerate().await.unwrap();
        assert!(report.is_complete());
        session.logout().await.unwrap();
        assert!(!session.is_dirty().unwrap());

        let logs = state.action_log_repo.find_by_month(2025, 3).unwrap();
        assert!(logs
            .iter()
            .any(|l| l.action_type == ActionType::GenerateRoster.to_string()));
        session.roster().unwrap()
    };

    let state = AppState::new(db_path).unwrap();
    let session = state.open_roster_session(admin).await.unwrap();
    assert_eq!(session.config().unwrap().month, 3);
    assert_eq!(session.roster().unwrap(), generated);
    assert!(session.evaluate().unwrap().is_complete());
}
