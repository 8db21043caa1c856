pub mod group;
pub mod handler;
pub mod msg_load_handler;
pub mod msg_ping_handler;
pub mod msg_update_handler;
pub mod pagekey;
pub mod registry;
pub mod userctx;
