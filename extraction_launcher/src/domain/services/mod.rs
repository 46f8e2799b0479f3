pub mod column_validator;
pub mod identifier_batches;
