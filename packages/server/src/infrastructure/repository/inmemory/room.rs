//! InMemory Room Registry 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をインメモリのルーム表として使用します。
//!
//! ## ロックの構成
//!
//! - `rooms`: ルーム表全体。メンバー編集などの短い操作の間だけ保持する
//! - `gates`: ルーム単位のゲート。参加・退出・アクションの一連の処理の間保持する
//!
//! ゲートはルームより先に作られ、誰も待っていない・保持していない状態で
//! ルームも存在しなくなったときにだけ削除される。

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::domain::{
    ConnectionId, Member, PlannerEntry, RepositoryError, Room, RoomGuard, RoomId,
    RoomRepository, RoomSeed, RoomSnapshot, Timestamp, TimerState,
};
use studyroom_shared::time::date_of;

/// 空になったルームの保持ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// 最後のメンバーが退出した時点で削除
    EvictWhenEmpty,
    /// 空になってから指定時間が過ぎたら `sweep_idle` で削除
    RetainFor(Duration),
}

impl RetentionPolicy {
    /// 秒数から生成（0 は即時削除）
    pub fn from_ttl_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::EvictWhenEmpty
        } else {
            Self::RetainFor(Duration::from_secs(secs))
        }
    }
}

struct RoomSlot {
    room: Room,
    /// 空になった時刻（メンバーがいる間は `None`）
    emptied_at: Option<Instant>,
}

/// インメモリ Room Registry 実装
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<RoomId, RoomSlot>>,
    gates: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
    retention: RetentionPolicy,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// 一定間隔で `sweep_idle` を実行するバックグラウンドタスクを起動
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.sweep_idle().await;
                if evicted > 0 {
                    tracing::info!("Evicted {} idle room(s)", evicted);
                }
            }
        })
    }

    /// 誰も使っておらず、対応するルームも無いゲートを削除
    async fn prune_gates(&self, rooms: &HashMap<RoomId, RoomSlot>) {
        let mut gates = self.gates.lock().await;
        gates.retain(|room_id, gate| rooms.contains_key(room_id) || Arc::strong_count(gate) > 1);
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn lock_room(&self, room_id: &RoomId) -> RoomGuard {
        let gate = {
            let mut gates = self.gates.lock().await;
            gates
                .entry(room_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        gate.lock_owned().await
    }

    async fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.lock().await.contains_key(room_id)
    }

    async fn get_or_create(&self, room_id: RoomId, seed: RoomSeed, now: Timestamp) -> Room {
        let mut rooms = self.rooms.lock().await;
        let slot = rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!("Room '{}' created", room_id.as_str());
            RoomSlot {
                room: Room::new(room_id, seed, now),
                emptied_at: None,
            }
        });
        slot.room.clone()
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|slot| slot.room.clone())
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.as_str().to_string()))
    }

    async fn add_member(&self, room_id: &RoomId, member: Member) -> Result<bool, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let slot = rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.as_str().to_string()))?;
        slot.emptied_at = None;
        Ok(slot.room.add_member(member))
    }

    async fn remove_member(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<Member, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let slot = rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.as_str().to_string()))?;
        let member = slot
            .room
            .remove_member(connection_id)
            .ok_or_else(|| RepositoryError::MemberNotFound(connection_id.as_str().to_string()))?;

        if slot.room.is_empty() {
            match self.retention {
                RetentionPolicy::EvictWhenEmpty => {
                    rooms.remove(room_id);
                    tracing::info!("Room '{}' is empty and was evicted", room_id.as_str());
                    self.prune_gates(&rooms).await;
                }
                RetentionPolicy::RetainFor(ttl) => {
                    slot.emptied_at = Some(Instant::now());
                    tracing::debug!(
                        "Room '{}' is empty, retained for {:?}",
                        room_id.as_str(),
                        ttl
                    );
                }
            }
        }

        Ok(member)
    }

    async fn snapshot(
        &self,
        room_id: &RoomId,
        now: Timestamp,
    ) -> Result<RoomSnapshot, RepositoryError> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|slot| slot.room.snapshot(now))
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.as_str().to_string()))
    }

    async fn member_ids(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .map(|slot| slot.room.member_ids())
            .unwrap_or_default()
    }

    async fn is_member(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        let rooms = self.rooms.lock().await;
        rooms
            .get(room_id)
            .is_some_and(|slot| slot.room.contains(connection_id))
    }

    async fn replace_timer(
        &self,
        room_id: &RoomId,
        timer: TimerState,
    ) -> Result<(), RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let slot = rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.as_str().to_string()))?;
        slot.room.timer = timer;
        Ok(())
    }

    async fn upsert_planner(
        &self,
        room_id: &RoomId,
        entry: PlannerEntry,
        now: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let slot = rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.as_str().to_string()))?;
        slot.room.upsert_planner(entry, date_of(now.value()));
        Ok(())
    }

    async fn sweep_idle(&self) -> usize {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        if let RetentionPolicy::RetainFor(ttl) = self.retention {
            rooms.retain(|room_id, slot| {
                let expired = slot.emptied_at.is_some_and(|emptied_at| {
                    slot.room.is_empty() && emptied_at.elapsed() >= ttl
                });
                if expired {
                    tracing::debug!("Room '{}' retention expired", room_id.as_str());
                }
                !expired
            });
        }
        self.prune_gates(&rooms).await;
        before - rooms.len()
    }

    async fn count_rooms(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
