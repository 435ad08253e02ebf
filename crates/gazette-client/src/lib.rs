pub mod feed;
pub mod fetcher;
pub mod retry;
pub mod robots;

pub use feed::XmlFeedReader;
pub use fetcher::ReqwestFetcher;
pub use retry::RetryPolicy;
pub use robots::RobotsCache;
