use super::stage;
use super::state::{ArtifactState, ArtifactTracker, ProgressFn};
use super::summary::{InstallResult, InstallationSummary};
use crate::config::Config;
use crate::error::InstallError;
use crate::manifest::{ManifestVerifier, SkillEntry, VerifiedManifest};
use crate::traits::ArtifactSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

struct TaskContext {
    source: Arc<dyn ArtifactSource>,
    verifier: Arc<ManifestVerifier>,
    install_dir: PathBuf,
    dry_run: bool,
    overwrite: bool,
    progress: Option<ProgressFn>,
}

/// Downloads, verifies and installs every artifact of a verified manifest,
/// at most `max_concurrent` at a time.
pub struct DownloadManager {
    ctx: Arc<TaskContext>,
    max_concurrent: usize,
}

impl DownloadManager {
    pub fn new(
        config: &Config,
        source: Arc<dyn ArtifactSource>,
        verifier: Arc<ManifestVerifier>,
    ) -> Self {
        Self {
            ctx: Arc::new(TaskContext {
                source,
                verifier,
                install_dir: config.install_dir.clone(),
                dry_run: config.dry_run,
                overwrite: config.overwrite,
                progress: None,
            }),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        if let Some(ctx) = Arc::get_mut(&mut self.ctx) {
            ctx.progress = Some(progress);
        }
        self
    }

    /// Per-artifact failures are captured in the summary and never abort
    /// siblings. Results come back in manifest order whatever the completion
    /// order was.
    pub async fn install_all(&self, verified: &VerifiedManifest) -> InstallationSummary {
        let manifest = verified.manifest();
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        info!(
            plugin = %manifest.plugin_slug,
            skills = manifest.skills.len(),
            max_concurrent = self.max_concurrent,
            dry_run = self.ctx.dry_run,
            "Installing plugin"
        );

        for (index, entry) in manifest.skills.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let ctx = self.ctx.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => install_one(&ctx, &entry).await,
                    Err(e) => InstallResult::failed(&entry.slug, e),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<InstallResult>> = vec![None; manifest.skills.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    debug!(skill = %result.slug, status = ?result.status, "Artifact finished");
                    slots[index] = Some(result);
                }
                Err(e) => error!("Install task aborted: {}", e),
            }
        }

        let results = slots
            .into_iter()
            .zip(&manifest.skills)
            .map(|(slot, entry)| {
                slot.unwrap_or_else(|| InstallResult::failed(&entry.slug, "install task aborted"))
            })
            .collect();

        let summary = InstallationSummary::new(
            manifest.plugin_slug.clone(),
            results,
            verified.signature().clone(),
            self.ctx.dry_run,
            started.elapsed(),
        );

        info!(
            plugin = %summary.plugin_slug,
            installed = summary.installed,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Install finished"
        );

        summary
    }
}

async fn install_one(ctx: &TaskContext, entry: &SkillEntry) -> InstallResult {
    let mut tracker = ArtifactTracker::new(&entry.slug, ctx.progress.clone());
    let dest = ctx.install_dir.join(&entry.slug);

    match tokio::fs::try_exists(&dest).await {
        Ok(true) if !ctx.overwrite => {
            let reason = "already installed";
            debug!(skill = %entry.slug, path = %dest.display(), "Skipping existing install");
            tracker.advance(ArtifactState::Skipped(reason.to_string()));
            return InstallResult::skipped(&entry.slug, reason);
        }
        Ok(_) => {}
        Err(e) => return fail(&mut tracker, &entry.slug, InstallError::fs(&dest, e)),
    }

    tracker.advance(ArtifactState::Downloading);
    let bytes = match ctx.source.download_artifact(&entry.download_url).await {
        Ok(bytes) => bytes,
        Err(e) => return fail(&mut tracker, &entry.slug, e),
    };
    if entry.size_bytes > 0 && bytes.len() as u64 != entry.size_bytes {
        warn!(
            skill = %entry.slug,
            declared = entry.size_bytes,
            actual = bytes.len(),
            "Downloaded size differs from manifest"
        );
    }

    tracker.advance(ArtifactState::Verifying);
    let artifact = match ctx.verifier.verify_artifact(entry, bytes) {
        Ok(artifact) => artifact,
        Err(e) => return fail(&mut tracker, &entry.slug, e),
    };

    if ctx.dry_run {
        tracker.advance(ArtifactState::Installed);
        return InstallResult::dry_run(&entry.slug, artifact.hash_verified);
    }

    tracker.advance(ArtifactState::Extracting);
    let install_dir = ctx.install_dir.clone();
    let overwrite = ctx.overwrite;
    let hash_verified = artifact.hash_verified;
    let written = tokio::task::spawn_blocking(move || {
        stage::commit_artifact(&install_dir, &artifact, overwrite)
    })
    .await;

    match written {
        Ok(Ok(bytes_written)) => {
            tracker.advance(ArtifactState::Installed);
            InstallResult::installed(&entry.slug, bytes_written, hash_verified)
        }
        Ok(Err(e)) => fail(&mut tracker, &entry.slug, e),
        Err(e) => {
            let reason = format!("install task failed: {e}");
            tracker.advance(ArtifactState::Failed(reason.clone()));
            InstallResult::failed(&entry.slug, reason)
        }
    }
}

fn fail(tracker: &mut ArtifactTracker, slug: &str, error: InstallError) -> InstallResult {
    warn!(skill = slug, "Artifact failed: {}", error);
    tracker.advance(ArtifactState::Failed(error.to_string()));
    InstallResult::failed(slug, error)
}
