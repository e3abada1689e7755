pub mod json;
pub mod summary_txt;
