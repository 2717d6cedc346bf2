use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Curated,
    Scenario,
    User,
}

impl PluginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curated => "curated",
            Self::Scenario => "scenario",
            Self::User => "user",
        }
    }
}

impl FromStr for PluginType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "curated" => Ok(Self::Curated),
            "scenario" => Ok(Self::Scenario),
            "user" => Ok(Self::User),
            other => Err(format!(
                "unknown plugin type {other:?} (expected curated, scenario or user)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pricing {
    Free,
    Paid,
}

impl Pricing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for Pricing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "paid" => Ok(Self::Paid),
            other => Err(format!("unknown pricing {other:?} (expected free or paid)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginFilter {
    pub plugin_type: Option<PluginType>,
    pub pricing: Option<Pricing>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

impl PluginFilter {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(t) = self.plugin_type {
            pairs.push(("type", t.as_str().to_string()));
        }
        if let Some(p) = self.pricing {
            pairs.push(("pricing", p.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub plugin_type: Option<PluginType>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub downloads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    #[serde(flatten)]
    pub summary: PluginSummary,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PluginListResponse {
    #[serde(default)]
    pub plugins: Vec<PluginSummary>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// One page of `GET /plugins`.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginPage {
    pub plugins: Vec<PluginSummary>,
    pub page: u32,
    pub total: Option<u64>,
    pub has_more: bool,
}

impl PluginPage {
    /// `None` when there are no more pages, or when the registry reports a
    /// page number that cannot be advanced.
    pub fn next_page(&self) -> Option<u32> {
        if self.has_more {
            self.page.checked_add(1)
        } else {
            None
        }
    }
}

impl PluginListResponse {
    /// Servers that omit `hasMore` are paged by `total`, or by whether the
    /// page came back full.
    pub(crate) fn into_page(self, filter: &PluginFilter) -> PluginPage {
        let page = self.page.or(filter.page).unwrap_or(1);
        let limit = self.limit.or(filter.limit);
        let has_more = match (self.has_more, self.total, limit) {
            (Some(more), _, _) => more,
            (None, Some(total), Some(limit)) => u64::from(page) * u64::from(limit) < total,
            (None, _, Some(limit)) => self.plugins.len() as u64 >= u64::from(limit) && limit > 0,
            (None, _, None) => false,
        };

        PluginPage {
            plugins: self.plugins,
            page,
            total: self.total,
            has_more,
        }
    }
}

/// Body of `POST /plugins/{slug}/install`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRecord {
    pub plugin_slug: String,
    pub installed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub signature_verified: bool,
    pub client_version: String,
    pub installed_at: String,
}

/// Body of `POST /telemetry/effectiveness`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub event: String,
    pub plugin_slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_slug: Option<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub dry_run: bool,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}
