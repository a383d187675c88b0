pub mod jobs;
pub mod scripts;
