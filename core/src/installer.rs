use crate::config::Config;
use crate::error::Result;
use crate::install::{DownloadManager, InstallationSummary, ProgressFn};
use crate::manifest::ManifestVerifier;
use crate::registry::RegistryClient;
use crate::report::InstallationReporter;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Fetch, verify, download and install one plugin.
///
/// Only manifest-level problems (bad slug, unreachable registry, rejected
/// signature) come back as `Err`. Per-artifact failures live on the summary.
pub struct Installer {
    config: Config,
    client: Arc<RegistryClient>,
    verifier: Arc<ManifestVerifier>,
    progress: Option<ProgressFn>,
}

impl Installer {
    pub fn new(config: Config) -> Self {
        let client = Arc::new(RegistryClient::new(&config));
        let verifier = Arc::new(ManifestVerifier::from_config(&config));
        Self {
            config,
            client,
            verifier,
            progress: None,
        }
    }

    pub fn with_client(mut self, client: RegistryClient) -> Self {
        self.client = Arc::new(client);
        self
    }

    pub fn with_verifier(mut self, verifier: ManifestVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> Arc<RegistryClient> {
        self.client.clone()
    }

    pub async fn install(
        &self,
        slug: &str,
        reporter: Option<&InstallationReporter>,
    ) -> Result<InstallationSummary> {
        let manifest = self.client.fetch_manifest(slug).await?;

        let verified = match self.verifier.check_manifest(manifest) {
            Ok(verified) => verified,
            Err(e) => {
                error!(plugin = slug, "Refusing to install: {}", e);
                return Err(e);
            }
        };

        let mut manager =
            DownloadManager::new(&self.config, self.client.clone(), self.verifier.clone());
        if let Some(progress) = &self.progress {
            manager = manager.with_progress(progress.clone());
        }
        let summary = manager.install_all(&verified).await;

        if summary.verification_skipped() {
            warn!(plugin = slug, "Installed without signature verification");
        }
        if let Some(reporter) = reporter {
            reporter.report(&summary);
        }

        info!(
            plugin = slug,
            exit_code = summary.exit_code(),
            "Install pipeline complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use crate::install::InstallStatus;
    use crate::manifest::{Manifest, SignatureCheck, TrustedKey};
    use crate::testing::{self, TestSigner};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Registry {
        server: mockito::ServerGuard,
        signer: TestSigner,
        tmp: TempDir,
    }

    impl Registry {
        async fn start() -> Self {
            Self {
                server: mockito::Server::new_async().await,
                signer: TestSigner::new("k1"),
                tmp: TempDir::new().unwrap(),
            }
        }

        fn config(&self) -> Config {
            let mut config = testing::config(&self.server.url());
            config.install_dir = self.tmp.path().join("skills");
            config.trusted_key = Some(self.signer.trusted_key());
            config
        }

        async fn serve_manifest(&mut self, manifest: &Manifest) -> mockito::Mock {
            self.server
                .mock("GET", "/plugins/pdf-tools/manifest")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(manifest.to_json().unwrap())
                .create_async()
                .await
        }

        async fn serve_artifact(&mut self, path: &str, body: &[u8]) -> mockito::Mock {
            self.server
                .mock("GET", path)
                .with_status(200)
                .with_body(body)
                .create_async()
                .await
        }

        fn installer(&self, config: Config) -> Installer {
            let client =
                RegistryClient::new(&config).with_retry_backoff(Duration::from_millis(1));
            Installer::new(config).with_client(client)
        }
    }

    fn skill_md() -> Vec<u8> {
        b"---\nname: pdf\ndescription: Read PDFs\n---\n# PDF\n".to_vec()
    }

    #[tokio::test]
    async fn installs_signed_plugin() {
        let mut registry = Registry::start().await;
        let archive = testing::tarball(&[("SKILL.md", "# Forms\n")]);
        let manifest = registry.signer.sign(Manifest::new(
            "pdf-tools",
            "k1",
            vec![
                testing::entry("pdf", "/artifacts/pdf", &skill_md()),
                testing::entry("forms", "/artifacts/forms.tar.gz", &archive),
            ],
        ));
        let _manifest = registry.serve_manifest(&manifest).await;
        let _artifact = registry.serve_artifact("/artifacts/pdf", &skill_md()).await;
        let _artifact = registry.serve_artifact("/artifacts/forms.tar.gz", &archive).await;

        let config = registry.config();
        let summary = registry
            .installer(config.clone())
            .install("pdf-tools", None)
            .await
            .unwrap();

        assert_eq!(summary.installed, 2);
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(
            summary.signature,
            SignatureCheck::Verified {
                key_id: "k1".to_string()
            }
        );
        assert!(config.install_dir.join("pdf/SKILL.md").is_file());
        assert!(config.install_dir.join("forms/SKILL.md").is_file());
    }

    #[tokio::test]
    async fn bad_signature_writes_nothing() {
        let mut registry = Registry::start().await;
        let manifest = registry.signer.sign(Manifest::new(
            "pdf-tools",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", &skill_md())],
        ));
        let mut tampered = manifest.clone();
        tampered.skills[0].size_bytes += 1;
        let _manifest = registry.serve_manifest(&tampered).await;
        let artifact = registry
            .server
            .mock("GET", "/artifacts/pdf")
            .expect(0)
            .create_async()
            .await;

        let config = registry.config();
        let err = registry
            .installer(config.clone())
            .install("pdf-tools", None)
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::ManifestSignature(_)));
        assert!(err.to_string().contains("refusing to install"));
        assert!(!config.install_dir.exists());
        artifact.assert_async().await;
    }

    #[tokio::test]
    async fn untrusted_key_is_rejected() {
        let mut registry = Registry::start().await;
        let stranger = TestSigner::new("k1");
        let manifest = stranger.sign(Manifest::new(
            "pdf-tools",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", &skill_md())],
        ));
        let _manifest = registry.serve_manifest(&manifest).await;

        let config = registry.config();
        let err = registry
            .installer(config)
            .install("pdf-tools", None)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::ManifestSignature(_)));
    }

    #[tokio::test]
    async fn skip_verify_is_recorded() {
        let mut registry = Registry::start().await;
        let unsigned = Manifest::new(
            "pdf-tools",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", &skill_md())],
        )
        .with_signature(vec![0u8; 64]);
        let _manifest = registry.serve_manifest(&unsigned).await;
        let _artifact = registry.serve_artifact("/artifacts/pdf", &skill_md()).await;

        let mut config = registry.config();
        config.skip_verify = true;
        let summary = registry
            .installer(config)
            .install("pdf-tools", None)
            .await
            .unwrap();

        assert!(summary.verification_skipped());
        assert_eq!(summary.installed, 1);
    }

    #[tokio::test]
    async fn skip_verify_still_checks_hashes() {
        let mut registry = Registry::start().await;
        let manifest = Manifest::new(
            "pdf-tools",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", &skill_md())],
        )
        .with_signature(vec![0u8; 64]);
        let _manifest = registry.serve_manifest(&manifest).await;
        let _artifact = registry.serve_artifact("/artifacts/pdf", b"swapped payload").await;

        let mut config = registry.config();
        config.skip_verify = true;
        let summary = registry
            .installer(config.clone())
            .install("pdf-tools", None)
            .await
            .unwrap();

        assert_eq!(summary.results[0].status, InstallStatus::Failed);
        assert_eq!(summary.exit_code(), 1);
        assert!(!config.install_dir.join("pdf").exists());
    }

    #[tokio::test]
    async fn pinned_key_must_match_key_id() {
        let mut registry = Registry::start().await;
        let manifest = registry.signer.sign(Manifest::new(
            "pdf-tools",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", &skill_md())],
        ));
        let _manifest = registry.serve_manifest(&manifest).await;

        let mut config = registry.config();
        config.trusted_key = Some(TrustedKey::new(
            "other".to_string(),
            registry.signer.trusted_key().public_key,
        ));
        let err = registry
            .installer(config)
            .install("pdf-tools", None)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::ManifestSignature(_)));
    }

    #[tokio::test]
    async fn reports_outcome_to_registry() {
        let mut registry = Registry::start().await;
        let manifest = registry.signer.sign(Manifest::new(
            "pdf-tools",
            "k1",
            vec![testing::entry("pdf", "/artifacts/pdf", &skill_md())],
        ));
        let _manifest = registry.serve_manifest(&manifest).await;
        let _artifact = registry.serve_artifact("/artifacts/pdf", &skill_md()).await;
        let recorded = registry
            .server
            .mock("POST", "/plugins/pdf-tools/install")
            .with_status(201)
            .create_async()
            .await;
        let telemetry = registry
            .server
            .mock("POST", "/telemetry/effectiveness")
            .with_status(204)
            .create_async()
            .await;

        let installer = registry.installer(registry.config());
        let reporter = InstallationReporter::spawn(installer.client());
        installer.install("pdf-tools", Some(&reporter)).await.unwrap();
        reporter.shutdown(Duration::from_secs(5)).await;

        recorded.assert_async().await;
        telemetry.assert_async().await;
    }
}
