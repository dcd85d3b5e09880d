use thiserror::Error;

// * Unified Error type for everything upstream of size parsing.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Page navigation failed: {0}")]
    Navigation(String),

    #[error("Page timeout after {0}ms")]
    Timeout(u64),

    #[error("Login form interaction failed: {0}")]
    Login(String),

    #[error("No element matches selector '{0}'")]
    MissingElement(String),

    #[error("Content extraction failed: {0}")]
    ContentExtraction(String),
}
