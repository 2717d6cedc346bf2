use anyhow::Result;
use console::style;
use skillget_core::config::Config;
use skillget_core::install::{
    ArtifactState, EXIT_OK, InstallStatus, InstallationSummary, ProgressFn,
};
use skillget_core::{InstallError, InstalledSkills, Installer, InstallationReporter};
use std::sync::Arc;
use std::time::Duration;

const REPORT_GRACE: Duration = Duration::from_secs(2);

pub async fn install(config: Config, slug: &str, json: bool) -> Result<i32> {
    if !json {
        let mode = if config.dry_run { " (dry run)" } else { "" };
        println!(
            "{} Installing {} into {}{}",
            style("→").cyan(),
            style(slug).bold(),
            config.install_dir.display(),
            mode
        );
    }

    let progress: ProgressFn = Arc::new(move |skill: &str, state: &ArtifactState| {
        if json {
            return;
        }
        match state {
            ArtifactState::Downloading => {
                println!("  {} {}", style("↓").dim(), style(skill).dim())
            }
            ArtifactState::Failed(reason) => {
                println!("  {} {}: {}", style("✗").red(), skill, reason)
            }
            _ => {}
        }
    });

    let installer = Installer::new(config).with_progress(progress);
    let reporter = InstallationReporter::spawn(installer.client());

    let outcome = installer.install(slug, Some(&reporter)).await;
    reporter.shutdown(REPORT_GRACE).await;

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e @ InstallError::ManifestSignature(_)) => {
            eprintln!("{} {}", style("✗").red().bold(), e);
            eprintln!(
                "  Nothing was installed. Use --skip-verify only if you trust this registry."
            );
            return Ok(e.exit_code());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else {
        print_summary(&summary);
    }

    match summary.into_result() {
        Ok(_) => Ok(EXIT_OK),
        Err(e) => {
            tracing::debug!("{}", e);
            Ok(e.exit_code())
        }
    }
}

fn print_summary(summary: &InstallationSummary) {
    println!();
    for result in &summary.results {
        match result.status {
            InstallStatus::Installed if result.dry_run => println!(
                "  {} {} {}",
                style("✓").green(),
                result.slug,
                style("(verified, not written)").dim()
            ),
            InstallStatus::Installed => println!(
                "  {} {} {}",
                style("✓").green(),
                result.slug,
                style(format!("{} bytes", result.bytes_written)).dim()
            ),
            InstallStatus::Skipped => println!(
                "  {} {} {}",
                style("-").yellow(),
                result.slug,
                style(result.reason.as_deref().unwrap_or("skipped")).dim()
            ),
            InstallStatus::Failed => println!(
                "  {} {} {}",
                style("✗").red(),
                result.slug,
                result.error.as_deref().unwrap_or("failed")
            ),
        }
    }
    println!();

    if summary.verification_skipped() {
        println!(
            "{} Signature verification was skipped",
            style("!").yellow().bold()
        );
    }
    if summary.results.iter().any(|r| !r.hash_verified && r.status == InstallStatus::Installed) {
        println!(
            "{} Content hash verification was skipped",
            style("!").yellow().bold()
        );
    }

    let headline = format!(
        "{} installed, {} skipped, {} failed in {:.1}s",
        summary.installed,
        summary.skipped,
        summary.failed,
        summary.elapsed.as_secs_f64()
    );
    if summary.failed == 0 {
        println!("{} {}", style("✓").green().bold(), headline);
    } else {
        println!("{} {}", style("✗").red().bold(), headline);
    }
}

fn summary_json(summary: &InstallationSummary) -> serde_json::Value {
    serde_json::json!({
        "pluginSlug": summary.plugin_slug,
        "installed": summary.installed,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "dryRun": summary.dry_run,
        "signatureVerified": !summary.verification_skipped(),
        "elapsedMs": summary.elapsed.as_millis() as u64,
        "exitCode": summary.exit_code(),
        "results": summary.results,
    })
}

pub fn list(config: &Config) -> Result<()> {
    let catalog = InstalledSkills::scan(&config.install_dir)?;

    if catalog.is_empty() {
        println!(
            "{} No skills installed in {}",
            style("!").yellow(),
            config.install_dir.display()
        );
        println!();
        println!("Install a plugin:");
        println!("  skillget install <plugin-slug>");
        return Ok(());
    }

    println!(
        "{} Installed skills ({})",
        style("✓").green().bold(),
        catalog.len()
    );
    println!();

    for skill in catalog.list() {
        let version = skill
            .version
            .as_deref()
            .map(|v| format!(" v{v}"))
            .unwrap_or_default();
        println!(
            "  {}{}: {}",
            style(&skill.slug).white().bold(),
            style(version).dim(),
            skill.description
        );
        if skill.name != skill.slug {
            println!("    Name:   {}", skill.name);
        }
        if !skill.tags.is_empty() {
            println!("    Tags:   {}", skill.tags.join(", "));
        }
        if let Some(author) = &skill.author {
            println!("    Author: {}", author);
        }
    }

    Ok(())
}
