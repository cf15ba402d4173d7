// ==========================================
// 持久化同步器集成测试
// ==========================================
// 测试目标: 防抖合并、强制保存顺序、保存中编辑、保存失败保留脏状态
// 使用暂停时钟（start_paused）推进防抖计时器
// ==========================================


use physician_roster::domain::{MonthConfig, MonthRoster, ShiftPeriod, SlotKey, Ward};
use physician_roster::sync::{PersistenceSynchronizer, SyncError, SyncSettings, SyncState};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{date, RecordingStore};

const DEBOUNCE: Duration = Duration::from_millis(1_000);

fn setup() -> (Arc<RecordingStore>, PersistenceSynchronizer) {
    let store = RecordingStore::new(Vec::new(), Some(MonthConfig::new(2025, 3)));
    let roster = MonthRoster::blank(&MonthConfig::new(2025, 3));
    let sync = PersistenceSynchronizer::new(
        store.clone(),
        roster,
        SyncSettings { debounce: DEBOUNCE },
    );
    (store, sync)
}

fn assign(sync: &PersistenceSynchronizer, day: u32, physician: &str) {
    sync.mutate(|roster| {
        roster.day_mut(date(2025, 3, day)).unwrap().set_slot(
            SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu),
            Some(physician.to_string()),
        )
    })
    .unwrap();
}

fn saved_slot(store: &RecordingStore, day: u32) -> Option<String> {
    store
        .persisted_day(date(2025, 3, day))
        .and_then(|d| {
            d.slot(SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu))
                .map(str::to_string)
        })
}

#[tokio::test(start_paused = true)]
async fn test_forced_flush_before_debounce_issues_single_save() {
    let (store, sync) = setup();

    assign(&sync, 3, "P0");
    assert_eq!(sync.state().unwrap(), SyncState::Dirty);

    sync.force_flush().await.unwrap();
    assert_eq!(store.save_calls(), 1);
    assert_eq!(saved_slot(&store, 3).as_deref(), Some("P0"));

    // 被取消的防抖计时器不会再触发保存
    tokio::time::sleep(DEBOUNCE * 3).await;
    assert_eq!(store.save_calls(), 1);
    assert_eq!(sync.state().unwrap(), SyncState::Clean);
}

#[tokio::test(start_paused = true)]
async fn test_debounce_coalesces_rapid_edits() {
    let (store, sync) = setup();

    assign(&sync, 3, "P0");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assign(&sync, 3, "P1");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assign(&sync, 4, "P2");
    assert_eq!(store.save_calls(), 0);

    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(store.save_calls(), 1);
    assert_eq!(saved_slot(&store, 3).as_deref(), Some("P1"));
    assert_eq!(saved_slot(&store, 4).as_deref(), Some("P2"));
    assert!(!sync.is_dirty().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_save_is_flushed_again() {
    let (store, sync) = setup();
    store.set_save_delay(Duration::from_millis(500));

    assign(&sync, 3, "P0");
    // 防抖到期, 保存进行中
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    assert_eq!(sync.state().unwrap(), SyncState::Saving);
    assert_eq!(store.save_calls(), 1);

    assign(&sync, 3, "P1");
    assert!(sync.is_dirty().unwrap());

    sync.force_flush().await.unwrap();

    assert_eq!(store.save_calls(), 2);
    assert_eq!(saved_slot(&store, 3).as_deref(), Some("P1"));
    assert_eq!(sync.state().unwrap(), SyncState::Clean);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_keeps_roster_dirty() {
    let (store, sync) = setup();
    store.set_fail_saves(true);

    assign(&sync, 3, "P0");
    let err = sync.force_flush().await.unwrap_err();

    assert!(matches!(err, SyncError::PersistenceFailure(_)));
    assert_eq!(sync.state().unwrap(), SyncState::SaveFailed);
    assert!(sync.is_dirty().unwrap());
    assert!(sync.last_error().unwrap().is_some());
    // 内存排班未被丢弃
    let kept = sync
        .read(|r| {
            r.day(date(2025, 3, 3))
                .unwrap()
                .slot(SlotKey::new(ShiftPeriod::Afternoon, Ward::Icu))
                .map(str::to_string)
        })
        .unwrap();
    assert_eq!(kept.as_deref(), Some("P0"));

    store.set_fail_saves(false);
    sync.force_flush().await.unwrap();
    assert_eq!(sync.state().unwrap(), SyncState::Clean);
    assert_eq!(saved_slot(&store, 3).as_deref(), Some("P0"));
}

#[tokio::test(start_paused = true)]
async fn test_clean_force_flush_skips_store() {
    let (store, sync) = setup();

    sync.force_flush().await.unwrap();
    assert!(!sync.flush().await.unwrap());

    assert_eq!(store.save_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_discard_pending_cancels_autosave() {
    let (store, sync) = setup();

    assign(&sync, 3, "P0");
    assign(&sync, 4, "P0");
    assert_eq!(sync.discard_pending().unwrap(), 2);
    assert_eq!(sync.state().unwrap(), SyncState::Clean);

    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(store.save_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_after_save_starts_clean() {
    let (store, sync) = setup();

    assign(&sync, 3, "P0");
    sync.force_flush().await.unwrap();
    sync.reset(MonthRoster::blank(&MonthConfig::new(2025, 4)))
        .unwrap();

    assert_eq!(sync.revision().unwrap(), 0);
    assert_eq!(sync.snapshot().unwrap().month, 4);
    assert_eq!(store.save_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_replace_with_other_month_is_rejected() {
    let (store, sync) = setup();

    let err = sync
        .replace(MonthRoster::blank(&MonthConfig::new(2025, 4)))
        .unwrap_err();

    assert!(matches!(err, SyncError::MonthMismatch { .. }), "{:?}", err);
    assert_eq!(sync.snapshot().unwrap().month, 3);
    assert!(!sync.is_dirty().unwrap());

    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(store.save_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_refuses_unsaved_edits() {
    let (store, sync) = setup();

    assign(&sync, 3, "P0");
    let err = sync
        .reset(MonthRoster::blank(&MonthConfig::new(2025, 4)))
        .unwrap_err();
    assert_eq!(err, SyncError::UnsavedChanges(1));
    assert_eq!(sync.snapshot().unwrap().month, 3);

    // 防抖计时器未被取消, 修改照常落盘
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(store.save_calls(), 1);
    assert_eq!(saved_slot(&store, 3).as_deref(), Some("P0"));
}
