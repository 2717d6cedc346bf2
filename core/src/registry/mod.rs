pub mod client;
pub mod types;
pub mod urls;

pub use client::RegistryClient;
pub use types::{
    InstallRecord, PluginFilter, PluginInfo, PluginPage, PluginSummary, PluginType, Pricing,
    TelemetryEvent,
};
pub use urls::{
    install_url, manifest_url, plugin_info_url, plugin_list_url, telemetry_url, validate_slug,
};
