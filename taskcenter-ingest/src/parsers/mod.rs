pub mod keywords;
pub mod task_line;
