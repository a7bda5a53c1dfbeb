pub mod key;
pub mod message;
