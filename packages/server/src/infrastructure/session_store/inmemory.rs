//! InMemory SessionStore 実装
//!
//! 本来は別サービス（DB）が担うルーム設定・プランナー・タイマー記録を
//! プロセス内に保持する。未登録のルームは `auto_provision` が有効なら
//! ルーム ID をタイトルにした設定で読み込む（設定自体は保存しない）。
//! 切断時状態とタイマー記録は (ルーム, ユーザー) ごとに最新の 1 件だけを持つ。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    ConnectionStateRecord, DataAccessError, Identity, PlannerChange, PlannerDraft, PlannerEntry,
    RoomId, RoomProfile, RoomSeed, SessionStore, TimerAction, TimerState, Timestamp,
};

/// 保存されたタイマー操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRecord {
    pub room_id: RoomId,
    pub subject: String,
    pub action: TimerAction,
    pub total_time: u64,
    pub at: Timestamp,
}

type RecordKey = (RoomId, String);

#[derive(Default)]
struct Store {
    profiles: HashMap<RoomId, RoomProfile>,
    planners: Vec<PlannerEntry>,
    connection_states: HashMap<RecordKey, ConnectionStateRecord>,
    timer_records: HashMap<RecordKey, TimerRecord>,
}

impl Store {
    /// ルームで最後に保存された合計時間
    fn latest_total(&self, room_id: &RoomId) -> u64 {
        let states = self
            .connection_states
            .values()
            .filter(|record| &record.room_id == room_id)
            .map(|record| (record.disconnected_at, record.total_time));
        let timers = self
            .timer_records
            .values()
            .filter(|record| &record.room_id == room_id)
            .map(|record| (record.at, record.total_time));

        states
            .chain(timers)
            .max()
            .map(|(_, total_time)| total_time)
            .unwrap_or_default()
    }
}

/// インメモリ SessionStore 実装
pub struct InMemorySessionStore {
    store: Mutex<Store>,
    auto_provision: bool,
}

impl InMemorySessionStore {
    pub fn new(auto_provision: bool) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            auto_provision,
        }
    }

    /// ルーム設定を登録
    pub async fn insert_room(&self, room_id: RoomId, profile: RoomProfile) {
        self.store.lock().await.profiles.insert(room_id, profile);
    }

    /// 保存済みの切断時状態
    pub async fn connection_state(
        &self,
        room_id: &RoomId,
        subject: &str,
    ) -> Option<ConnectionStateRecord> {
        let key = (room_id.clone(), subject.to_string());
        self.store.lock().await.connection_states.get(&key).cloned()
    }

    /// 保存済みの最新のタイマー操作
    pub async fn timer_record(&self, room_id: &RoomId, subject: &str) -> Option<TimerRecord> {
        let key = (room_id.clone(), subject.to_string());
        self.store.lock().await.timer_records.get(&key).cloned()
    }

    /// 保持している記録の件数（切断時状態, タイマー記録）
    pub async fn record_counts(&self) -> (usize, usize) {
        let store = self.store.lock().await;
        (store.connection_states.len(), store.timer_records.len())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_room(
        &self,
        room_id: &RoomId,
        today: NaiveDate,
    ) -> Result<RoomSeed, DataAccessError> {
        let store = self.store.lock().await;

        let profile = match store.profiles.get(room_id) {
            Some(profile) => profile.clone(),
            None if self.auto_provision => RoomProfile {
                title: room_id.as_str().to_string(),
                is_chat: true,
                ..RoomProfile::default()
            },
            None => return Err(DataAccessError::NotFound(format!("room '{}'", room_id.as_str()))),
        };

        let planner = store
            .planners
            .iter()
            .filter(|entry| &entry.room_id == room_id && entry.date == today)
            .cloned()
            .collect();

        Ok(RoomSeed {
            profile,
            planner,
            total_time: store.latest_total(room_id),
        })
    }

    async fn save_connection_state(
        &self,
        record: ConnectionStateRecord,
    ) -> Result<(), DataAccessError> {
        let key = (record.room_id.clone(), record.subject.clone());
        self.store.lock().await.connection_states.insert(key, record);
        Ok(())
    }

    async fn record_timer(
        &self,
        room_id: &RoomId,
        subject: &str,
        action: TimerAction,
        state: &TimerState,
        at: Timestamp,
    ) -> Result<(), DataAccessError> {
        let record = TimerRecord {
            room_id: room_id.clone(),
            subject: subject.to_string(),
            action,
            total_time: state.total_time,
            at,
        };
        let key = (room_id.clone(), subject.to_string());
        self.store.lock().await.timer_records.insert(key, record);
        Ok(())
    }

    async fn get_planner(
        &self,
        room_id: &RoomId,
        date: NaiveDate,
    ) -> Result<Vec<PlannerEntry>, DataAccessError> {
        let store = self.store.lock().await;
        Ok(store
            .planners
            .iter()
            .filter(|entry| &entry.room_id == room_id && entry.date == date)
            .cloned()
            .collect())
    }

    async fn create_planner(
        &self,
        room_id: &RoomId,
        owner: &Identity,
        nickname: &str,
        draft: PlannerDraft,
    ) -> Result<PlannerEntry, DataAccessError> {
        if draft.content.trim().is_empty() {
            return Err(DataAccessError::Rejected(
                "planner content must not be empty".to_string(),
            ));
        }

        let entry = PlannerEntry {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.clone(),
            date: draft.date,
            content: draft.content,
            owner: owner.subject.clone(),
            nickname: nickname.to_string(),
            completed: false,
            total_time: 0,
        };
        self.store.lock().await.planners.push(entry.clone());
        Ok(entry)
    }

    async fn modify_planner(
        &self,
        room_id: &RoomId,
        owner: &Identity,
        change: PlannerChange,
    ) -> Result<PlannerEntry, DataAccessError> {
        let mut store = self.store.lock().await;
        let entry = store
            .planners
            .iter_mut()
            .find(|entry| &entry.room_id == room_id && entry.id == change.planner_id)
            .ok_or_else(|| DataAccessError::NotFound(format!("planner '{}'", change.planner_id)))?;

        if entry.owner != owner.subject {
            return Err(DataAccessError::Rejected(
                "only the owner can modify a planner entry".to_string(),
            ));
        }

        entry.apply_change(&change);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionId, Nickname, RunState};
    use serde_json::Map;

    // 2023-01-01 00:00:00 +09:00
    const NEW_YEAR: i64 = 1672498800000;

    fn room_id(value: &str) -> RoomId {
        RoomId::new(value.to_string()).unwrap()
    }

    fn identity(subject: &str) -> Identity {
        Identity {
            subject: subject.to_string(),
            claims: Map::new(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn at(secs: i64) -> Timestamp {
        Timestamp::new(NEW_YEAR + secs * 1000)
    }

    fn stopped(total_time: u64) -> TimerState {
        TimerState {
            run_state: RunState::Stopped,
            total_time,
            ..TimerState::default()
        }
    }

    fn state_record(room: &str, subject: &str, total_time: u64, secs: i64) -> ConnectionStateRecord {
        ConnectionStateRecord {
            connection_id: ConnectionId::new(format!("conn-{subject}-{secs}")).unwrap(),
            room_id: room_id(room),
            subject: subject.to_string(),
            nickname: Nickname::new(subject.to_string()).unwrap(),
            total_time,
            disconnected_at: at(secs),
        }
    }

    #[tokio::test]
    async fn test_load_unknown_room_without_provisioning() {
        // テスト項目: 自動作成が無効なら未登録のルームは NotFound
        // given (前提条件):
        let store = InMemorySessionStore::new(false);

        // when (操作):
        let result = store.load_room(&room_id("r1"), date(1)).await;

        // then (期待する結果):
        assert!(matches!(result, Err(DataAccessError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_room_returns_profile_and_today_planner() {
        // テスト項目: ルーム設定と当日のプランナーだけが読み込まれる
        // given (前提条件):
        let store = InMemorySessionStore::new(false);
        store
            .insert_room(
                room_id("r1"),
                RoomProfile {
                    title: "Morning".to_string(),
                    ..RoomProfile::default()
                },
            )
            .await;
        let owner = identity("user-1");
        for day in [1, 1, 2] {
            store
                .create_planner(
                    &room_id("r1"),
                    &owner,
                    "alice",
                    PlannerDraft {
                        date: date(day),
                        content: "read".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        // when (操作):
        let seed = store.load_room(&room_id("r1"), date(1)).await.unwrap();

        // then (期待する結果):
        assert_eq!(seed.profile.title, "Morning");
        assert_eq!(seed.planner.len(), 2);
    }

    #[tokio::test]
    async fn test_modify_planner_by_other_user_is_rejected() {
        // テスト項目: 作成者以外によるプランナー変更は拒否される
        // given (前提条件):
        let store = InMemorySessionStore::new(true);
        let entry = store
            .create_planner(
                &room_id("r1"),
                &identity("user-1"),
                "alice",
                PlannerDraft {
                    date: date(1),
                    content: "read".to_string(),
                },
            )
            .await
            .unwrap();

        // when (操作):
        let result = store
            .modify_planner(
                &room_id("r1"),
                &identity("user-2"),
                PlannerChange {
                    planner_id: entry.id,
                    completed: Some(true),
                    ..PlannerChange::default()
                },
            )
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(DataAccessError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_modify_planner_applies_change() {
        // テスト項目: 作成者による変更は反映される
        // given (前提条件):
        let store = InMemorySessionStore::new(true);
        let owner = identity("user-1");
        let entry = store
            .create_planner(
                &room_id("r1"),
                &owner,
                "alice",
                PlannerDraft {
                    date: date(1),
                    content: "read".to_string(),
                },
            )
            .await
            .unwrap();

        // when (操作):
        let modified = store
            .modify_planner(
                &room_id("r1"),
                &owner,
                PlannerChange {
                    planner_id: entry.id.clone(),
                    content: Some("write".to_string()),
                    completed: Some(true),
                    ..PlannerChange::default()
                },
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(modified.id, entry.id);
        assert_eq!(modified.content, "write");
        assert!(modified.completed);
        let stored = store.get_planner(&room_id("r1"), date(1)).await.unwrap();
        assert_eq!(stored, vec![modified]);
    }

    #[tokio::test]
    async fn test_auto_provisioned_profile_is_not_kept() {
        // テスト項目: 自動作成したルーム設定は保存されず、毎回同じ既定値で読み込まれる
        // given (前提条件):
        let store = InMemorySessionStore::new(true);

        // when (操作):
        let first = store.load_room(&room_id("r1"), date(1)).await.unwrap();
        let second = store.load_room(&room_id("r1"), date(1)).await.unwrap();

        // then (期待する結果):
        assert_eq!(first, second);
        assert_eq!(first.profile.title, "r1");
        assert!(first.profile.is_chat);
        assert!(store.store.lock().await.profiles.is_empty());
    }

    #[tokio::test]
    async fn test_records_keep_only_latest_per_room_and_user() {
        // テスト項目: 同じルーム・ユーザーの記録は上書きされ、件数が増え続けない
        // given (前提条件):
        let store = InMemorySessionStore::new(true);

        // when (操作):
        for round in 0..10 {
            store
                .record_timer(
                    &room_id("r1"),
                    "alice",
                    TimerAction::Stop,
                    &stopped(round * 60),
                    at(round as i64),
                )
                .await
                .unwrap();
            store
                .save_connection_state(state_record("r1", "alice", round * 60, round as i64))
                .await
                .unwrap();
        }
        store
            .save_connection_state(state_record("r1", "bob", 0, 0))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(store.record_counts().await, (2, 1));
        let latest = store.timer_record(&room_id("r1"), "alice").await.unwrap();
        assert_eq!(latest.total_time, 540);
        let state = store.connection_state(&room_id("r1"), "alice").await.unwrap();
        assert_eq!(state.total_time, 540);
    }

    #[tokio::test]
    async fn test_load_room_returns_latest_saved_total() {
        // テスト項目: ルームの読み込みには最後に保存された合計時間が含まれる
        // given (前提条件):
        let store = InMemorySessionStore::new(true);
        store
            .record_timer(&room_id("r1"), "alice", TimerAction::Stop, &stopped(300), at(10))
            .await
            .unwrap();
        store
            .save_connection_state(state_record("r1", "bob", 420, 20))
            .await
            .unwrap();
        store
            .save_connection_state(state_record("r2", "carol", 999, 30))
            .await
            .unwrap();

        // when (操作):
        let seed = store.load_room(&room_id("r1"), date(1)).await.unwrap();
        let untouched = store.load_room(&room_id("r3"), date(1)).await.unwrap();

        // then (期待する結果):
        assert_eq!(seed.total_time, 420);
        assert_eq!(untouched.total_time, 0);
    }
}
