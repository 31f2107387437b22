mod room;

pub use room::{InMemoryRoomRepository, RetentionPolicy};
