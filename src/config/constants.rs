// * Configuration Constants
// * Central location for defaults, thresholds and timeouts

// * Default port for the Prometheus exporter
pub const DEFAULT_EXPORTER_PORT: u16 = 17_500;

// * Default delay between two sampling cycles, in seconds
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 3_600;

// * Page navigation timeout in milliseconds
pub const PAGE_TIMEOUT_MS: u64 = 60_000;

// * Pause after opening the landing page, before the login form is touched
pub const LOGIN_SETTLE_SECS: u64 = 5;

// * Upper bound for a single alert delivery request
pub const ALERT_TIMEOUT_SECS: u64 = 10;

// * Telegram Bot API endpoint
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// * Login form contract used by the tracker when nothing else is configured
pub const DEFAULT_USERNAME_SELECTOR: &str = "input[name=uid]";
pub const DEFAULT_PASSWORD_SELECTOR: &str = "input[name=pwd]";
pub const DEFAULT_SUBMIT_SELECTOR: &str = "input[type=submit]";
