pub mod market;
pub mod company;
pub mod stock;
pub mod daystock;
pub mod file_done;
pub mod job_execution_history;
