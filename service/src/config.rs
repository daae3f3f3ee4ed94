use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Default notification API root used when `NOTIFICATIONS_BASE_URL` is not set.
pub const DEFAULT_NOTIFICATIONS_BASE_URL: &str = "http://localhost:8080/api/notifications";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Root URL of the notification REST and stream API.
    #[arg(long, env, default_value = DEFAULT_NOTIFICATIONS_BASE_URL)]
    notifications_base_url: String,

    /// Identifier of the signed-in user. Without it delivery never activates.
    #[arg(short, long, env)]
    user_id: Option<String>,

    /// Bearer token for the notification API.
    #[arg(long, env, hide_env_values = true)]
    auth_token: Option<String>,

    /// Seconds between unread-count fetches while polling
    #[arg(long, env, default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: u64,

    /// Timeout in seconds for any single notification request
    #[arg(long, env, default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Fetch the first page of notifications when the panel opens. When off,
    /// opening the panel only clears the badge locally.
    #[arg(long, env, default_value_t = false)]
    pub eager_fetch_on_open: bool,

    /// Page size for the panel fetch
    #[arg(long, env, default_value_t = 5)]
    pub panel_page_size: u32,

    /// How long to keep the notification panel open, in seconds. 0 waits for Ctrl-C.
    #[arg(long, env, default_value_t = 0)]
    pub watch_secs: u64,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Returns the notification API root without a trailing slash.
    pub fn notifications_base_url(&self) -> &str {
        self.notifications_base_url.trim_end_matches('/')
    }

    /// Returns the signed-in user id, treating a blank value as absent.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns how long the shell keeps the panel open, `None` meaning until interrupted.
    pub fn watch_duration(&self) -> Option<Duration> {
        match self.watch_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("idea_notify").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.notifications_base_url(), DEFAULT_NOTIFICATIONS_BASE_URL);
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(!config.eager_fetch_on_open);
        assert_eq!(config.panel_page_size, 5);
        assert_eq!(config.watch_duration(), None);
        assert_eq!(config.log_level_filter, LevelFilter::Info);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--notifications-base-url",
            "https://ideas.example.com/api/notifications/",
            "--user-id",
            "42",
            "--poll-interval-secs",
            "30",
            "--eager-fetch-on-open",
            "--watch-secs",
            "60",
            "--log-level-filter",
            "DEBUG",
        ]);

        assert_eq!(
            config.notifications_base_url(),
            "https://ideas.example.com/api/notifications"
        );
        assert_eq!(config.user_id(), Some("42"));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert!(config.eager_fetch_on_open);
        assert_eq!(config.watch_duration(), Some(Duration::from_secs(60)));
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }

    #[test]
    fn test_blank_user_id_is_absent() {
        let config = parse(&["--user-id", "  "]);
        assert_eq!(config.user_id(), None);

        let config = parse(&["--user-id", " 7 "]);
        assert_eq!(config.user_id(), Some("7"));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let result =
            Config::try_parse_from(["idea_notify", "--poll-interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result = Config::try_parse_from(["idea_notify", "--log-level-filter", "LOUD"]);
        assert!(result.is_err());
    }
}
