pub mod common;
mod feed_tests;
mod fetcher_tests;
