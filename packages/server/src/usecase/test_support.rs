//! UseCase 層テスト用のフィクスチャ

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use serde_json::{Map, Value};
use studyroom_shared::time::Clock;
use tokio::sync::mpsc;

use crate::{
    domain::{
        ConnectionContext, ConnectionId, ConnectionPhase, Identity, IdentityProvider, ImageUrl,
        Member, MessagePusher, Nickname, RoomId, RoomProfile, RoomRepository, RoomSeed,
        SessionStore, Timestamp,
    },
    infrastructure::{
        message_pusher::WebSocketMessagePusher,
        repository::{InMemoryRoomRepository, RetentionPolicy},
        session_store::InMemorySessionStore,
    },
};

use super::{
    BroadcastRouter, ConnectParticipantUseCase, DisconnectParticipantUseCase, PlannerUseCase,
    RespondUserInfoUseCase, SendChatUseCase, SessionTable, TimerUseCase, TokenValidator,
};

// 2023-01-01 00:00:00 +09:00
pub const NEW_YEAR: i64 = 1672498800000;

/// テスト中に進められる時計
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

pub fn identity(subject: &str) -> Identity {
    Identity {
        subject: subject.to_string(),
        claims: Map::new(),
    }
}

/// 受信側のチャンネルを持つテスト用の接続
pub struct TestClient {
    pub id: ConnectionId,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    pub async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("channel closed");
        serde_json::from_str(&text).expect("frame is not JSON")
    }

    pub async fn next_event(&mut self) -> String {
        let frame = self.next_frame().await;
        frame["event"].as_str().unwrap_or_default().to_string()
    }

    pub fn is_idle(&mut self) -> bool {
        self.rx.try_recv().is_err()
    }

    pub fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

pub struct Fixture {
    pub repository: Arc<InMemoryRoomRepository>,
    pub pusher: Arc<WebSocketMessagePusher>,
    pub sessions: Arc<SessionTable>,
    pub router: Arc<BroadcastRouter>,
    pub session_store: Arc<dyn SessionStore>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemorySessionStore::new(true)))
    }

    pub fn with_store(session_store: Arc<dyn SessionStore>) -> Self {
        let repository = Arc::new(InMemoryRoomRepository::new(RetentionPolicy::EvictWhenEmpty));
        let pusher = Arc::new(WebSocketMessagePusher::new());
        let router = Arc::new(BroadcastRouter::new(repository.clone(), pusher.clone()));
        Self {
            repository,
            pusher,
            sessions: Arc::new(SessionTable::new()),
            router,
            session_store,
            clock: Arc::new(ManualClock::new(NEW_YEAR)),
        }
    }

    pub fn room_id(&self, value: &str) -> RoomId {
        RoomId::new(value.to_string()).unwrap()
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// 接続を開いただけの（未認証の）クライアント
    pub async fn guest(&self) -> TestClient {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        self.pusher.register_client(id.clone(), tx).await;
        self.sessions.open(id.clone()).await;
        TestClient { id, rx }
    }

    /// 認証済みでルームに参加していないクライアント
    pub async fn authenticated(&self, subject: &str) -> TestClient {
        let client = self.guest().await;
        self.sessions
            .advance(&client.id, ConnectionPhase::Authenticating)
            .await
            .unwrap();
        self.sessions
            .authenticate(&client.id, identity(subject))
            .await
            .unwrap();
        client
    }

    /// ルームに参加済みのクライアント（ルームが無ければチャット有効で作成する）
    pub async fn member(&self, room_id: &RoomId, nickname: &str) -> TestClient {
        let client = self.authenticated(nickname).await;
        let seed = RoomSeed {
            profile: RoomProfile {
                title: room_id.as_str().to_string(),
                is_chat: true,
                ..RoomProfile::default()
            },
            ..RoomSeed::default()
        };
        self.repository
            .get_or_create(room_id.clone(), seed, self.now())
            .await;

        let nickname = Nickname::new(nickname.to_string()).unwrap();
        let image_url = ImageUrl::new(format!("https://img.example/{}.png", nickname.as_str())).unwrap();
        self.repository
            .add_member(
                room_id,
                Member {
                    connection_id: client.id.clone(),
                    nickname: nickname.clone(),
                    image_url: image_url.clone(),
                    joined_at: self.now(),
                },
            )
            .await
            .unwrap();
        self.sessions
            .begin_join(
                &client.id,
                ConnectionContext {
                    room_id: room_id.clone(),
                    nickname,
                    image_url,
                },
            )
            .await
            .unwrap();
        self.sessions.finish_join(&client.id, true).await.unwrap();
        client
    }

    pub fn connect(&self, identity_provider: Arc<dyn IdentityProvider>) -> ConnectParticipantUseCase {
        ConnectParticipantUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            self.session_store.clone(),
            self.sessions.clone(),
            self.router.clone(),
            TokenValidator::new(identity_provider),
            self.clock.clone(),
        )
    }

    pub fn disconnect(&self) -> DisconnectParticipantUseCase {
        DisconnectParticipantUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            self.session_store.clone(),
            self.sessions.clone(),
            self.router.clone(),
            self.clock.clone(),
        )
    }

    pub fn send_chat(&self) -> SendChatUseCase {
        SendChatUseCase::new(self.sessions.clone(), self.router.clone(), self.clock.clone())
    }

    pub fn respond_user_info(&self) -> RespondUserInfoUseCase {
        RespondUserInfoUseCase::new(self.sessions.clone(), self.router.clone())
    }

    pub fn timer(&self) -> TimerUseCase {
        TimerUseCase::new(
            self.repository.clone(),
            self.session_store.clone(),
            self.sessions.clone(),
            self.router.clone(),
            self.clock.clone(),
        )
    }

    pub fn planner(&self) -> PlannerUseCase {
        PlannerUseCase::new(
            self.repository.clone(),
            self.session_store.clone(),
            self.sessions.clone(),
            self.router.clone(),
            self.clock.clone(),
        )
    }
}
