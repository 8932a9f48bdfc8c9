pub mod config;
pub mod deviation;
pub mod error;
pub mod explore;
pub mod inference;
pub mod observation;
pub mod output;
pub mod parser;
pub mod stops;
