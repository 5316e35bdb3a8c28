//! Live dashboard channel
//!
//! ```text
//! StorageBackend ──listener──▶ EventBus ──dispatch──▶ SessionManager ──per-session FIFO──▶ ws writer
//!                                                         ▲
//!                               ws reader ──ClientMessage─┘
//! ```

pub mod bus;
pub mod protocol;
pub mod session;
pub mod ws;

pub use bus::EventBus;
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{SessionId, SessionManager, Watch, WatchTarget};
pub use ws::ws_handler;
