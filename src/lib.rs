pub mod aggregator;
pub mod chart;
pub mod config;
pub mod csv_parser;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod generation;
pub mod header_mapper;
pub mod llm;
pub mod models;
pub mod palette;
pub mod pipeline;
pub mod report;
pub mod seed;
pub mod store;
pub mod transformer;
pub mod uploader;
pub mod validator;
