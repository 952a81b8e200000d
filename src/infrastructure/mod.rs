//! 基础设施层：持有磁盘上的题库资源

pub mod local_store;

pub use local_store::{load_question_bank, LocalStore};
