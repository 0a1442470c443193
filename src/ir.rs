pub mod airton;
pub mod format;
pub mod input;
pub mod output;
pub mod switch;
pub mod types;
