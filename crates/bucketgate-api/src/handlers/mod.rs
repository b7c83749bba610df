pub mod logs;
pub mod storage;
