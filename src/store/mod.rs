pub mod backend;
pub mod conversation;
pub mod memory;
pub mod rest;
pub mod types;

pub use backend::StoreBackend;
pub use conversation::ConversationStore;
pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use types::*;
