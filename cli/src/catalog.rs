use anyhow::Result;
use console::style;
use skillget_core::RegistryClient;
use skillget_core::config::Config;
use skillget_core::registry::{PluginFilter, PluginSummary};

pub async fn search(config: &Config, filter: &PluginFilter, all: bool) -> Result<()> {
    let client = RegistryClient::new(config);

    let (plugins, more) = if all {
        (client.fetch_all_plugins(filter).await?, None)
    } else {
        let page = client.fetch_plugin_list(filter).await?;
        let next = page.next_page();
        (page.plugins, next)
    };

    if plugins.is_empty() {
        println!("{} No plugins found", style("!").yellow());
        return Ok(());
    }

    for plugin in &plugins {
        print_plugin(plugin);
    }

    if let Some(next) = more {
        println!();
        println!(
            "{}",
            style(format!("More results: skillget search --page {next}")).dim()
        );
    }
    Ok(())
}

pub async fn info(config: &Config, slug: &str) -> Result<()> {
    let info = RegistryClient::new(config).fetch_plugin_info(slug).await?;

    print_plugin(&info.summary);
    if let Some(author) = &info.author {
        println!("    Author:   {}", author);
    }
    if let Some(homepage) = &info.homepage {
        println!("    Homepage: {}", homepage);
    }
    if let Some(updated) = &info.updated_at {
        println!("    Updated:  {}", updated);
    }
    if !info.skills.is_empty() {
        println!("    Skills:   {}", info.skills.join(", "));
    }
    Ok(())
}

fn print_plugin(plugin: &PluginSummary) {
    let mut tags = Vec::new();
    if let Some(kind) = plugin.plugin_type {
        tags.push(kind.as_str());
    }
    if let Some(pricing) = plugin.pricing {
        tags.push(pricing.as_str());
    }
    let version = plugin
        .version
        .as_deref()
        .map(|v| format!(" v{v}"))
        .unwrap_or_default();

    println!(
        "  {}{} {}",
        style(&plugin.slug).white().bold(),
        style(version).dim(),
        style(format!("[{}]", tags.join(", "))).cyan()
    );
    if !plugin.name.is_empty() && plugin.name != plugin.slug {
        println!("    {}", plugin.name);
    }
    if !plugin.description.is_empty() {
        println!("    {}", plugin.description);
    }
}
