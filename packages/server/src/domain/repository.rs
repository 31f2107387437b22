//! Room Registry trait 定義
//!
//! ルーム ID からルーム状態への対応表。全コンポーネントが読み書きする唯一の
//! 共有可変リソースであり、必ずこの trait を経由してアクセスする。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! ## ルーム単位の直列化
//!
//! `lock_room` が返すガードを保持している間、同じルームに対する他の
//! 参加・退出・タイマー・プランナー操作は待たされる。各操作自体は
//! 外部 I/O を伴わない短いクリティカルセクションで完結する。

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use super::{
    ConnectionId, Member, PlannerEntry, RepositoryError, Room, RoomId, RoomSeed, RoomSnapshot,
    Timestamp, TimerState,
};

/// ルーム単位のゲートを保持していることを表すガード
pub type RoomGuard = OwnedMutexGuard<()>;

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// ルーム単位のゲートを取得（ルームが未作成でも取得できる）
    async fn lock_room(&self, room_id: &RoomId) -> RoomGuard;

    /// ルームが登録済みか
    async fn contains_room(&self, room_id: &RoomId) -> bool;

    /// 既存のルームを返す。無ければ `seed` から作成する（同じ ID で重複作成しない）。
    async fn get_or_create(&self, room_id: RoomId, seed: RoomSeed, now: Timestamp) -> Room;

    /// ルームのコピーを取得
    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError>;

    /// メンバーを追加（接続 ID 単位で冪等）。新規に追加された場合は `true`。
    async fn add_member(&self, room_id: &RoomId, member: Member) -> Result<bool, RepositoryError>;

    /// メンバーを削除し、削除後に空になったルームは保持ポリシーに従って扱う
    async fn remove_member(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<Member, RepositoryError>;

    /// 参加直後の接続に送るスナップショット
    async fn snapshot(&self, room_id: &RoomId, now: Timestamp)
    -> Result<RoomSnapshot, RepositoryError>;

    /// 現在のメンバーの接続 ID（ルームが無ければ空）
    async fn member_ids(&self, room_id: &RoomId) -> Vec<ConnectionId>;

    /// 指定した接続がルームのメンバーか
    async fn is_member(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool;

    /// タイマー状態を置き換える
    async fn replace_timer(&self, room_id: &RoomId, timer: TimerState)
    -> Result<(), RepositoryError>;

    /// プランナーのキャッシュへ反映する
    async fn upsert_planner(
        &self,
        room_id: &RoomId,
        entry: PlannerEntry,
        now: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 保持期間を過ぎた空のルームを削除し、削除した数を返す
    async fn sweep_idle(&self) -> usize;

    /// 登録中のルーム数
    async fn count_rooms(&self) -> usize;
}
