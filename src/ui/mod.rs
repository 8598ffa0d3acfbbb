//! UI Bus: the abstract capability set a phase drives to report progress
//! and solicit operator input (§4.4).

pub mod bus;
pub mod console;
pub mod websocket;

pub use bus::{Choice, UiBus};
pub use console::ConsoleUiBus;
pub use websocket::WebSocketUiBus;
