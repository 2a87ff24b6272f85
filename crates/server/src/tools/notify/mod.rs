//! Push, notification and client MCP tools.

pub mod click;
pub mod clients;
pub mod push;

pub use click::{NotificationClickParams, click_impl};
pub use clients::{ClientConnectParams, ClientPollParams, connect_impl, poll_impl};
pub use push::{PushParams, push_impl};
