pub use self::room_manager::{MemberSession, RoomManager, Subscription};

mod room;
#[allow(clippy::module_inception)]
mod room_manager;
