use super::types::PluginFilter;
use crate::config::Config;
use crate::error::ConfigError;

/// Slugs end up both in URL paths and as directory names under the install
/// dir, so only `[A-Za-z0-9._-]` is accepted and `..` never is.
pub fn validate_slug(slug: &str) -> Result<(), ConfigError> {
    let valid = !slug.is_empty()
        && slug.len() <= 128
        && slug != "."
        && !slug.contains("..")
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidSlug(slug.to_string()))
    }
}

pub fn manifest_url(config: &Config, slug: &str) -> String {
    format!("{}/plugins/{}/manifest", config.api_base_url, slug)
}

pub fn install_url(config: &Config, slug: &str) -> String {
    format!("{}/plugins/{}/install", config.api_base_url, slug)
}

pub fn plugin_info_url(config: &Config, slug: &str) -> String {
    format!("{}/plugins/{}", config.api_base_url, slug)
}

/// `{base}/plugins`, with a query string only when a filter field is set.
pub fn plugin_list_url(config: &Config, filter: &PluginFilter) -> String {
    let base = format!("{}/plugins", config.api_base_url);
    let pairs = filter.query_pairs();
    if pairs.is_empty() {
        return base;
    }

    let query = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

pub fn telemetry_url(config: &Config) -> String {
    format!("{}/telemetry/effectiveness", config.api_base_url)
}
