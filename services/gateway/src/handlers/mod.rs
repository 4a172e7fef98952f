pub mod notify;
pub mod ws;
