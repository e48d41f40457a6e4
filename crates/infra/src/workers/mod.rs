//! Background workers.

pub mod job_worker;
