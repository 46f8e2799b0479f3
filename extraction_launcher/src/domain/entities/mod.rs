pub mod extraction_job;
