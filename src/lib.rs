pub mod collate;
pub mod core;
pub mod errors;
pub mod report;
pub mod run;
pub mod utils;
