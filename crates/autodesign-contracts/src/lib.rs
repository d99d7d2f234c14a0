pub mod chat;
pub mod errors;
pub mod events;
pub mod images;
pub mod models;
pub mod session;
