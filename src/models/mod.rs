pub mod batch;
pub mod data_format;
pub mod policy;
pub mod prompt;
pub mod question;
pub mod question_bank;

pub use batch::{BatchRequest, BatchRequestRecord};
pub use data_format::{DataFormat, ImageCodec, ResizePolicy};
pub use policy::FailurePolicy;
pub use prompt::PromptTemplate;
pub use question::Question;
pub use question_bank::QuestionBank;
