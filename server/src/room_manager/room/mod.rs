mod member;
mod study_room;

pub use self::member::{normalize_pomodoro, Member};
pub use self::study_room::StudyRoom;
