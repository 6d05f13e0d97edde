pub mod chat;
pub mod persona;

pub use chat::{ ChatMessage, Role };
pub use persona::AgentPersona;
