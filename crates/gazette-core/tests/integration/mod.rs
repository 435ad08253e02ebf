pub mod common;
mod crawl_tests;
mod registry_tests;
