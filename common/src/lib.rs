pub mod gamestate_common;
pub mod messages_common;
pub mod network_common;
pub mod sessionstate;
