//! `agentlink files …` — workspace file explorer over the REST API.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;

use agentlink_client::ApiClient;
use agentlink_protocol::rest::FileNode;

use crate::render::human_size;

pub async fn tree(api: &ApiClient, path: Option<&str>) -> anyhow::Result<()> {
    let nodes = api.file_tree(path).await.context("failed to load file tree")?;
    if nodes.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for line in tree_lines(&nodes) {
        println!("{line}");
    }
    Ok(())
}

pub async fn cat(api: &ApiClient, path: &str) -> anyhow::Result<()> {
    let content = api
        .file_content(path)
        .await
        .with_context(|| format!("failed to read {path}"))?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    if !content.ends_with(b"\n") {
        writeln!(stdout)?;
    }
    Ok(())
}

pub async fn rm(api: &ApiClient, path: &str) -> anyhow::Result<()> {
    api.delete_file(path)
        .await
        .with_context(|| format!("failed to delete {path}"))?;
    println!("Deleted {path}");
    Ok(())
}

pub async fn download(
    api: &ApiClient,
    path: &str,
    folder: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let bytes = if folder {
        api.download_folder(path).await
    } else {
        api.download_file(path).await
    }
    .with_context(|| format!("failed to download {path}"))?;

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_target(path, folder));
    std::fs::write(&target, &bytes)
        .with_context(|| format!("failed to write {}", target.display()))?;
    println!(
        "Saved {} ({})",
        target.display(),
        human_size(bytes.len() as u64)
    );
    Ok(())
}

/// Last path component, `.zip` added for folders.
fn default_target(path: &str, folder: bool) -> PathBuf {
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("download");
    if folder {
        PathBuf::from(format!("{name}.zip"))
    } else {
        PathBuf::from(name)
    }
}

fn tree_lines(nodes: &[FileNode]) -> Vec<String> {
    let mut lines = Vec::new();
    for root in nodes {
        for (depth, node) in root.walk() {
            let indent = "  ".repeat(depth);
            let line = if node.is_dir() {
                format!("{indent}{}/", style(&node.name).blue().bold())
            } else {
                let size = node.size.map(human_size).unwrap_or_default();
                format!("{indent}{} {}", node.name, style(size).dim())
            };
            lines.push(line.trim_end().to_string());
        }
    }
    lines
}
