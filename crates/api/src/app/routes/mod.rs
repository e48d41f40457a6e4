pub mod requests;
pub mod system;
