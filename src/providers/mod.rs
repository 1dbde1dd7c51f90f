pub mod deepseek;
pub mod football;
