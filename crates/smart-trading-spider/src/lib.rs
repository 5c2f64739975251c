pub mod config;
pub mod db;
pub mod error;
pub mod fs;
pub mod stock;
pub(crate) mod tui;

#[cfg(test)]
pub(crate) mod mock;

pub use error::Error;

/// Shortcut for required API elements.
pub mod http {
    pub use dotenv::var;
    pub use reqwest::Client as HttpClient;
}

/// The default HTTP client: a shared user agent, read from `USER_AGENT` when set.
///
/// Wikipedia and Yahoo Finance both reject requests without a user agent.
pub fn std_client_build() -> anyhow::Result<http::HttpClient> {
    let user_agent = http::var("USER_AGENT").unwrap_or_else(|_| config::DEFAULT_USER_AGENT.to_string());
    let client = reqwest::ClientBuilder::new()
        .user_agent(user_agent)
        .build()
        .map_err(|err| {
            tracing::error!("failed to build reqwest client, error({err})");
            err
        })?;
    Ok(client)
}

/// Format the elapsed time since `time` for log lines.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!("time elapsed: {:.2?}", time.elapsed())
}
