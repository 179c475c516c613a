pub mod engine;

pub use engine::{ChatEvent, ChatStreamEngine};
