pub mod log;
pub mod session;

pub use self::log::{ MessageLog, Turn, last_model_message };
pub use self::session::{ ChatSession, SessionState, INIT_FAILURE_MESSAGE, SEND_FAILURE_MESSAGE };
