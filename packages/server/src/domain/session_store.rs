//! 外部データアクセス層の trait 定義
//!
//! プランナーやタイマー記録の永続化はこのサーバーの責務ではなく、
//! この trait の向こう側にある。呼び出しは中断（await）し得る。

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    ConnectionStateRecord, DataAccessError, Identity, PlannerChange, PlannerDraft, PlannerEntry,
    RoomId, RoomSeed, TimerAction, TimerState, Timestamp,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// ルームの設定と `today` のプランナーを読み込む
    async fn load_room(&self, room_id: &RoomId, today: NaiveDate)
    -> Result<RoomSeed, DataAccessError>;

    /// 切断時の状態を保存
    async fn save_connection_state(
        &self,
        record: ConnectionStateRecord,
    ) -> Result<(), DataAccessError>;

    /// タイマー操作の結果を保存
    async fn record_timer(
        &self,
        room_id: &RoomId,
        subject: &str,
        action: TimerAction,
        state: &TimerState,
        at: Timestamp,
    ) -> Result<(), DataAccessError>;

    /// 指定日のプランナーを取得
    async fn get_planner(
        &self,
        room_id: &RoomId,
        date: NaiveDate,
    ) -> Result<Vec<PlannerEntry>, DataAccessError>;

    /// プランナー項目を作成
    async fn create_planner(
        &self,
        room_id: &RoomId,
        owner: &Identity,
        nickname: &str,
        draft: PlannerDraft,
    ) -> Result<PlannerEntry, DataAccessError>;

    /// プランナー項目を変更
    async fn modify_planner(
        &self,
        room_id: &RoomId,
        owner: &Identity,
        change: PlannerChange,
    ) -> Result<PlannerEntry, DataAccessError>;
}
