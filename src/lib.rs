pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod kegg;
pub mod mygene;
pub mod output;
pub mod parser;
pub mod record;
pub mod resolver;
