pub mod engine;
pub mod negotiation;
pub mod presence;
pub mod protocol;
pub mod room;
pub mod summarizer;
pub mod sweeper;
pub mod timer;

pub use engine::DebateEngine;
pub use protocol::{ClientMessage, MessageKind};
