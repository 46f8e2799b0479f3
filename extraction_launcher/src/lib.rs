pub mod adapters;
pub mod cli;
pub mod configuration;
pub mod domain;
pub mod handlers;
pub mod startup;
