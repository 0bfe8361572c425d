//! `agentlink projects` and `agentlink config`.

use anyhow::{bail, Context};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Table};

use agentlink_client::ApiClient;
use agentlink_protocol::rest::{AgentConfig, ProjectList};

pub async fn projects(api: &ApiClient) -> anyhow::Result<()> {
    let list = api.projects().await.context("failed to load projects")?;
    if !list.success {
        bail!(
            "server could not list projects: {}",
            list.error.as_deref().unwrap_or("unknown error")
        );
    }
    if list.projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    println!("{}", projects_table(&list));
    Ok(())
}

pub async fn config(api: &ApiClient) -> anyhow::Result<()> {
    let config = api.agent_config_or_default().await;
    println!("{}", config_table(&config));
    Ok(())
}

fn projects_table(list: &ProjectList) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["ID", "Name", "Creator", "Created", "Role"]);
    for project in &list.projects {
        table.add_row(vec![
            Cell::new(project.id),
            Cell::new(&project.name),
            Cell::new(project.creator_name.as_deref().unwrap_or("-")),
            Cell::new(project.create_time.as_deref().unwrap_or("-")),
            Cell::new(
                project
                    .project_role
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
        ]);
    }
    table
}

fn config_table(config: &AgentConfig) -> Table {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED).set_header(vec!["Setting", "Value"]);

    let rows: Vec<(&str, String)> = vec![
        ("agent.name", config.agent.name.clone()),
        ("agent.description", config.agent.description.clone()),
        ("agent.welcome_message", config.agent.welcome_message.clone()),
        ("agent.module", config.agent.module.clone()),
        ("agent.root_agent", config.agent.root_agent.clone()),
        ("ui.title", config.ui.title.clone()),
        (
            "ui.theme",
            config.ui.theme.clone().unwrap_or_else(|| "-".into()),
        ),
        (
            "ui.features.show_file_explorer",
            yes_no(config.ui.features.show_file_explorer).into(),
        ),
        (
            "ui.features.show_session_list",
            yes_no(config.ui.features.show_session_list).into(),
        ),
        (
            "files.output_directory",
            config
                .files
                .output_directory
                .clone()
                .unwrap_or_else(|| "-".into()),
        ),
        (
            "files.watch_directories",
            config.files.watch_directories.join(", "),
        ),
        ("server.port", config.server.port.to_string()),
        ("server.host", config.server.host.join(", ")),
    ];
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}
