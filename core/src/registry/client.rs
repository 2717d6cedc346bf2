use super::types::{
    InstallRecord, PluginFilter, PluginInfo, PluginListResponse, PluginPage, PluginSummary,
    TelemetryEvent,
};
use super::urls;
use crate::config::Config;
use crate::error::{InstallError, Result};
use crate::manifest::Manifest;
use crate::traits::{ArtifactSource, ReportSink};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);
const MAX_LIST_PAGES: u32 = 50;
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Stateless HTTP client for the plugin registry. Every request carries the
/// configured timeout on its own.
#[derive(Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    config: Config,
    retry_backoff: Duration,
}

impl RegistryClient {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .user_agent(concat!("skillget/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client, falling back to defaults: {}", e);
                reqwest::Client::default()
            });

        Self {
            client,
            config: config.clone(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn fetch_manifest(&self, slug: &str) -> Result<Manifest> {
        urls::validate_slug(slug)?;
        let url = urls::manifest_url(&self.config, slug);
        let body = self
            .get(&url)
            .await?
            .bytes()
            .await
            .map_err(|e| InstallError::from_reqwest(&url, e))?;
        let manifest = Manifest::from_json(&body)?;

        if manifest.plugin_slug != slug {
            return Err(InstallError::MalformedManifest(format!(
                "requested {slug} but registry returned manifest for {}",
                manifest.plugin_slug
            )));
        }

        debug!(plugin = slug, skills = manifest.skills.len(), "Fetched manifest");
        Ok(manifest)
    }

    pub async fn fetch_plugin_info(&self, slug: &str) -> Result<PluginInfo> {
        urls::validate_slug(slug)?;
        let url = urls::plugin_info_url(&self.config, slug);
        self.get_json(&url).await
    }

    pub async fn fetch_plugin_list(&self, filter: &PluginFilter) -> Result<PluginPage> {
        let url = urls::plugin_list_url(&self.config, filter);
        let response: PluginListResponse = self.get_json(&url).await?;
        Ok(response.into_page(filter))
    }

    /// Walks pages from `filter.page` (default 1) until the registry reports
    /// no more.
    pub async fn fetch_all_plugins(&self, filter: &PluginFilter) -> Result<Vec<PluginSummary>> {
        let mut filter = filter.clone();
        let mut page = filter.page.unwrap_or(1);
        let mut plugins = Vec::new();

        for _ in 0..MAX_LIST_PAGES {
            filter.page = Some(page);
            let result = self.fetch_plugin_list(&filter).await?;
            let next = result.next_page();
            if result.has_more && next.is_none() {
                warn!(page = result.page, "Registry page number cannot advance, stopping");
            }
            let empty = result.plugins.is_empty();
            plugins.extend(result.plugins);

            match next {
                Some(next) if !empty => page = next,
                _ => return Ok(plugins),
            }
        }

        warn!(pages = MAX_LIST_PAGES, "Stopped paging plugin list at page limit");
        Ok(plugins)
    }

    /// GET raw artifact bytes. Relative URLs are taken relative to the API
    /// base. Network failures are retried with exponential backoff; API
    /// errors are not.
    pub async fn download_artifact(&self, url: &str) -> Result<Bytes> {
        let url = self.resolve_artifact_url(url)?;
        let mut attempt = 0;

        loop {
            let result = match self.get(&url).await {
                Ok(response) => response
                    .bytes()
                    .await
                    .map_err(|e| InstallError::from_reqwest(&url, e)),
                Err(e) => Err(e),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(url = %url, attempt, "Download failed, retrying in {:?}: {}", delay, e);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    pub async fn record_install(&self, slug: &str, record: &InstallRecord) -> Result<()> {
        urls::validate_slug(slug)?;
        let url = urls::install_url(&self.config, slug);
        self.post_json(&url, record).await
    }

    pub async fn report_telemetry(&self, event: &TelemetryEvent) -> Result<()> {
        let url = urls::telemetry_url(&self.config);
        self.post_json(&url, event).await
    }

    fn resolve_artifact_url(&self, raw: &str) -> Result<String> {
        match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(raw.to_string()),
            Ok(parsed) => Err(InstallError::MalformedManifest(format!(
                "unsupported download scheme {}",
                parsed.scheme()
            ))),
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(format!(
                "{}/{}",
                self.config.api_base_url,
                raw.trim_start_matches('/')
            )),
            Err(e) => Err(InstallError::MalformedManifest(format!(
                "invalid download url {raw:?}: {e}"
            ))),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| InstallError::from_reqwest(url, e))?;
        check_status(response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| InstallError::from_reqwest(url, e))?;
        serde_json::from_slice(&body).map_err(|e| InstallError::Api {
            status_code: 200,
            message: format!("unexpected response shape from {url}: {e}"),
        })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| InstallError::from_reqwest(url, e))?;
        check_status(response).await?;
        Ok(())
    }
}

/// Maps non-2xx responses to [`InstallError::Api`], preferring the server's
/// `message`/`error` field over the raw body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                trimmed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
            }
        });

    Err(InstallError::Api {
        status_code: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ArtifactSource for RegistryClient {
    async fn download_artifact(&self, url: &str) -> Result<Bytes> {
        RegistryClient::download_artifact(self, url).await
    }
}

#[async_trait]
impl ReportSink for RegistryClient {
    async fn record_install(&self, plugin_slug: &str, record: &InstallRecord) -> Result<()> {
        RegistryClient::record_install(self, plugin_slug, record).await
    }

    async fn report_telemetry(&self, event: &TelemetryEvent) -> Result<()> {
        RegistryClient::report_telemetry(self, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ContentHash;
    use crate::registry::types::PluginType;
    use crate::testing::{self, TestSigner};
    use mockito::Matcher;

    fn client(base: &str) -> RegistryClient {
        RegistryClient::new(&testing::config(base)).with_retry_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn fetch_manifest_parses_signed_document() {
        let mut server = mockito::Server::new_async().await;
        let signer = TestSigner::new("k1");
        let manifest = signer.sign(Manifest::new(
            "my-plugin",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", b"pdf")],
        ));
        let mock = server
            .mock("GET", "/plugins/my-plugin/manifest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(manifest.to_json().unwrap())
            .create_async()
            .await;

        let fetched = client(&server.url()).fetch_manifest("my-plugin").await.unwrap();
        mock.assert_async().await;
        assert_eq!(fetched.signature, manifest.signature);
        assert_eq!(fetched.skills, manifest.skills);
    }

    #[tokio::test]
    async fn non_2xx_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/plugins/missing/manifest")
            .with_status(404)
            .with_body(r#"{"message": "plugin not found"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_manifest("missing").await.unwrap_err();
        match err {
            InstallError::Api {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 404);
                assert_eq!(message, "plugin not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn manifest_for_other_plugin_rejected() {
        let mut server = mockito::Server::new_async().await;
        let manifest = Manifest::new(
            "other",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", b"pdf")],
        );
        let _mock = server
            .mock("GET", "/plugins/my-plugin/manifest")
            .with_body(manifest.to_json().unwrap())
            .create_async()
            .await;

        let err = client(&server.url()).fetch_manifest("my-plugin").await.unwrap_err();
        assert!(matches!(err, InstallError::MalformedManifest(_)));
    }

    #[tokio::test]
    async fn invalid_slug_never_hits_network() {
        let err = client("http://127.0.0.1:1")
            .fetch_manifest("../etc")
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
    }

    #[tokio::test]
    async fn plugin_list_sends_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/plugins")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "curated".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_body(r#"{"plugins": [{"slug": "pdf", "name": "PDF"}], "total": 2, "page": 1, "limit": 1}"#)
            .create_async()
            .await;

        let filter = PluginFilter {
            plugin_type: Some(PluginType::Curated),
            limit: Some(1),
            page: Some(1),
            ..Default::default()
        };
        let page = client(&server.url()).fetch_plugin_list(&filter).await.unwrap();
        mock.assert_async().await;
        assert_eq!(page.plugins.len(), 1);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn fetch_all_plugins_walks_pages() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/plugins")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_body(r#"{"plugins": [{"slug": "a"}], "page": 1, "hasMore": true}"#)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/plugins")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_body(r#"{"plugins": [{"slug": "b"}], "page": 2, "hasMore": false}"#)
            .create_async()
            .await;

        let all = client(&server.url())
            .fetch_all_plugins(&PluginFilter::default())
            .await
            .unwrap();
        let slugs: Vec<_> = all.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, ["a", "b"]);
    }

    #[tokio::test]
    async fn fetch_all_plugins_stops_on_last_page_number() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/plugins")
            .match_query(Matcher::Any)
            .with_body(r#"{"plugins": [{"slug": "a"}], "page": 4294967295, "hasMore": true}"#)
            .expect(1)
            .create_async()
            .await;

        let all = client(&server.url())
            .fetch_all_plugins(&PluginFilter::default())
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].slug, "a");
    }

    #[tokio::test]
    async fn plugin_info_rejects_untyped_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/plugins/pdf")
            .with_body(r#"["not", "an", "object"]"#)
            .create_async()
            .await;

        assert!(client(&server.url()).fetch_plugin_info("pdf").await.is_err());
    }

    #[tokio::test]
    async fn download_resolves_relative_urls() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/artifacts/pdf.tar.gz")
            .with_body("payload")
            .create_async()
            .await;

        let bytes = client(&server.url())
            .download_artifact("/artifacts/pdf.tar.gz")
            .await
            .unwrap();
        assert_eq!(ContentHash::of(&bytes), ContentHash::of(b"payload"));
    }

    #[tokio::test]
    async fn download_api_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/artifacts/gone")
            .with_status(410)
            .expect(1)
            .create_async()
            .await;

        let err = client(&server.url())
            .download_artifact("/artifacts/gone")
            .await
            .unwrap_err();
        mock.assert_async().await;
        assert!(matches!(err, InstallError::Api { status_code: 410, .. }));
    }

    #[tokio::test]
    async fn connection_failure_is_network_error() {
        let err = client("http://127.0.0.1:1")
            .download_artifact("/artifacts/pdf")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn stalled_body_times_out_as_network_error() {
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/artifacts/slow")
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(800));
                w.write_all(b"late")
            })
            .create_async()
            .await;

        let mut config = testing::config(&server.url());
        config.timeout = Duration::from_millis(200);
        config.retries = 0;
        let err = RegistryClient::new(&config)
            .download_artifact("/artifacts/slow")
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Network { .. }), "{err}");
    }

    #[tokio::test]
    async fn rejects_non_http_download_scheme() {
        let err = client("https://api.test.com")
            .download_artifact("file:///etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::MalformedManifest(_)));
    }

    #[tokio::test]
    async fn posts_install_record_and_telemetry() {
        let mut server = mockito::Server::new_async().await;
        let install = server
            .mock("POST", "/plugins/my-plugin/install")
            .match_body(Matcher::PartialJsonString(
                r#"{"pluginSlug": "my-plugin", "installed": ["pdf"]}"#.to_string(),
            ))
            .with_status(201)
            .create_async()
            .await;
        let telemetry = server
            .mock("POST", "/telemetry/effectiveness")
            .match_body(Matcher::PartialJsonString(r#"{"event": "install"}"#.to_string()))
            .with_status(202)
            .create_async()
            .await;

        let client = client(&server.url());
        let record = InstallRecord {
            plugin_slug: "my-plugin".to_string(),
            installed: vec!["pdf".to_string()],
            skipped: vec![],
            failed: vec![],
            signature_verified: true,
            client_version: "test".to_string(),
            installed_at: "2025-01-01T00:00:00Z".to_string(),
        };
        client.record_install("my-plugin", &record).await.unwrap();

        let event = TelemetryEvent {
            event: "install".to_string(),
            plugin_slug: "my-plugin".to_string(),
            skill_slug: None,
            success: true,
            duration_ms: 12,
            dry_run: false,
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            metadata: serde_json::Value::Null,
        };
        client.report_telemetry(&event).await.unwrap();

        install.assert_async().await;
        telemetry.assert_async().await;
    }
}
