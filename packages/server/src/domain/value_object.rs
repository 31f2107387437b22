//! 値オブジェクト
//!
//! 生成時にバリデーションを行い、不正な値がドメイン層に入り込まないようにします。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

const MAX_ROOM_ID_LEN: usize = 64;
const MAX_NICKNAME_LEN: usize = 30;
const MAX_IMAGE_URL_LEN: usize = 2048;
const MAX_MESSAGE_LEN: usize = 1000;

fn require_text(
    field: &'static str,
    value: String,
    max: usize,
) -> Result<String, ValueObjectError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValueObjectError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// ルーム ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        require_text("roomId", value, MAX_ROOM_ID_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 接続 ID
///
/// トランスポート上の 1 セッションを識別する。サーバー側で採番する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// 新しい接続 ID を採番
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("socketId"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 表示名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nickname(String);

impl Nickname {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        require_text("nickname", value, MAX_NICKNAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Nickname {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// アバター画像の URL（空文字は「未設定」）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageUrl(String);

impl ImageUrl {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.len() > MAX_IMAGE_URL_LEN {
            return Err(ValueObjectError::TooLong {
                field: "imageUrl",
                max: MAX_IMAGE_URL_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// チャット本文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::Empty("message"));
        }
        if value.chars().count() > MAX_MESSAGE_LEN {
            return Err(ValueObjectError::TooLong {
                field: "message",
                max: MAX_MESSAGE_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `earlier` からの経過秒数（負にはならない）
    pub fn seconds_since(&self, earlier: Timestamp) -> u64 {
        u64::try_from((self.0 - earlier.0) / 1000).unwrap_or(0)
    }
}
