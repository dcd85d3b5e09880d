pub mod browser;
pub mod errors;
pub mod fetcher;

pub use browser::{BrowserConfig, BrowserFetcher, LoginForm};
pub use errors::FetchError;
pub use fetcher::{RawSample, SampleFetcher};
