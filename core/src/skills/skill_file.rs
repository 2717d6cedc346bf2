use crate::install::SKILL_FILE;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct FrontMatter {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// A skill directory found under the install dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSkill {
    /// Directory name, which is the manifest slug it was installed from.
    pub slug: String,
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub path: PathBuf,
}

/// Reads `<dir>/SKILL.md`. YAML front matter wins; otherwise the first
/// heading is the name and the first paragraph line the description.
pub fn load_skill(dir: &Path) -> Result<InstalledSkill> {
    let md_path = dir.join(SKILL_FILE);
    if !md_path.is_file() {
        anyhow::bail!("No {} found in {}", SKILL_FILE, dir.display());
    }

    let content = fs::read_to_string(&md_path)
        .with_context(|| format!("Failed to read {}", md_path.display()))?;
    let slug = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(front) = parse_front_matter(&content) {
        return Ok(InstalledSkill {
            name: front.name,
            description: front
                .description
                .unwrap_or_else(|| first_paragraph_line(&content)),
            version: front.version,
            author: front.author,
            tags: front.tags,
            slug,
            path: dir.to_path_buf(),
        });
    }

    let name = content
        .lines()
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| slug.clone());

    Ok(InstalledSkill {
        name,
        description: first_paragraph_line(&content),
        version: None,
        author: None,
        tags: Vec::new(),
        slug,
        path: dir.to_path_buf(),
    })
}

fn parse_front_matter(content: &str) -> Option<FrontMatter> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.trim_start_matches('\r').strip_prefix('\n')?;
    let end = rest.lines().position(|l| l.trim() == "---")?;
    let yaml = rest.lines().take(end).collect::<Vec<_>>().join("\n");
    match serde_yaml::from_str::<FrontMatter>(&yaml) {
        Ok(front) => Some(front),
        Err(e) => {
            tracing::debug!("Ignoring malformed front matter: {}", e);
            None
        }
    }
}

fn first_paragraph_line(content: &str) -> String {
    let body = match content.strip_prefix("---") {
        Some(rest) => rest
            .lines()
            .skip(1)
            .skip_while(|l| l.trim() != "---")
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n"),
        None => content.to_string(),
    };

    body.lines()
        .map(str::trim)
        .find(|l| !(l.is_empty() || l.starts_with('#')))
        .map(str::to_string)
        .unwrap_or_else(|| "No description".to_string())
}
