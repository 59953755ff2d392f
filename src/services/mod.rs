pub mod report_writer;
pub mod response_validator;

pub use report_writer::ReportWriter;
pub use response_validator::{ResponseValidator, TOLERANCE};
