pub mod announce;
pub mod chat_session;
pub mod chat_stream;
pub mod config;
pub mod content;
pub mod message;
pub mod model_client;
pub mod policy;
pub mod quiz;
pub mod strings;
pub mod structured;
