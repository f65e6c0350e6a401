// src/lib.rs — Library root for the catalog harvester

pub mod budget;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod fetch;
pub mod infra;
pub mod store;
pub mod upstream;
