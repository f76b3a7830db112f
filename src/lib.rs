pub mod command;
pub mod dispatch;
pub mod fileformat;
pub mod runtime;
pub mod utils;
