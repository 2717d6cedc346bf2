use std::sync::Arc;
use tracing::{trace, warn};

/// Lifecycle of one artifact inside [`super::DownloadManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Pending,
    Downloading,
    Verifying,
    Extracting,
    Installed,
    Failed(String),
    Skipped(String),
}

impl ArtifactState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Installed | Self::Failed(_) | Self::Skipped(_))
    }

    pub fn can_transition_to(&self, next: &ArtifactState) -> bool {
        use ArtifactState::*;
        match (self, next) {
            (_, Failed(_)) => !self.is_terminal(),
            (Pending, Downloading | Skipped(_)) => true,
            (Downloading, Verifying) => true,
            // dry runs stop after verification
            (Verifying, Extracting | Installed) => true,
            (Extracting, Installed) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Installed => "installed",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }
}

impl std::fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) | Self::Skipped(reason) => write!(f, "{} ({reason})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Called on every state change with the artifact slug.
pub type ProgressFn = Arc<dyn Fn(&str, &ArtifactState) + Send + Sync>;

pub(crate) struct ArtifactTracker {
    slug: String,
    state: ArtifactState,
    progress: Option<ProgressFn>,
}

impl ArtifactTracker {
    pub(crate) fn new(slug: &str, progress: Option<ProgressFn>) -> Self {
        let tracker = Self {
            slug: slug.to_string(),
            state: ArtifactState::Pending,
            progress,
        };
        tracker.notify();
        tracker
    }

    pub(crate) fn advance(&mut self, next: ArtifactState) {
        if !self.state.can_transition_to(&next) {
            warn!(
                skill = %self.slug,
                from = self.state.name(),
                to = next.name(),
                "Unexpected artifact state transition"
            );
        }
        trace!(skill = %self.slug, from = self.state.name(), to = next.name(), "Artifact state");
        self.state = next;
        self.notify();
    }

    fn notify(&self) {
        if let Some(progress) = &self.progress {
            progress(&self.slug, &self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn happy_path_transitions() {
        let path = [
            ArtifactState::Pending,
            ArtifactState::Downloading,
            ArtifactState::Verifying,
            ArtifactState::Extracting,
            ArtifactState::Installed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let failed = ArtifactState::Failed("boom".to_string());
        assert!(failed.is_terminal());
        assert!(!failed.can_transition_to(&ArtifactState::Downloading));
        assert!(!ArtifactState::Installed.can_transition_to(&ArtifactState::Failed("x".into())));
        assert!(!ArtifactState::Skipped("exists".into()).can_transition_to(&ArtifactState::Installed));
    }

    #[test]
    fn cannot_install_without_verifying() {
        assert!(!ArtifactState::Downloading.can_transition_to(&ArtifactState::Installed));
        assert!(!ArtifactState::Downloading.can_transition_to(&ArtifactState::Extracting));
        assert!(!ArtifactState::Pending.can_transition_to(&ArtifactState::Installed));
    }

    #[test]
    fn tracker_reports_each_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |slug: &str, state: &ArtifactState| {
            sink.lock().unwrap().push(format!("{slug}:{}", state.name()));
        });

        let mut tracker = ArtifactTracker::new("pdf", Some(progress));
        tracker.advance(ArtifactState::Downloading);
        tracker.advance(ArtifactState::Failed("timeout".into()));

        assert_eq!(
            *seen.lock().unwrap(),
            ["pdf:pending", "pdf:downloading", "pdf:failed"]
        );
    }
}
