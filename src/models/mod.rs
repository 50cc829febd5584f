pub mod markets;
pub mod companies;
pub mod stocks;
pub mod daystocks;
pub mod file_done;
pub mod job_execution_history;

pub use markets::Market;
pub use companies::{Company, NewCompany};
pub use stocks::{NewStock, Stock};
pub use daystocks::{Daystock, NewDaystock};
pub use file_done::{FileDone, NewFileDone};
pub use job_execution_history::{
    JobExecutionHistory, JobStatus, NewJobExecutionHistory, UpdateJobExecutionHistory,
};
