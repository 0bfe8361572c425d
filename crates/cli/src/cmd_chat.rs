//! `agentlink chat` — interactive session over the WebSocket.

use anyhow::Context;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use agentlink_client::{ChatClient, ClientUpdate, WsConnector};

use crate::render::{self, Renderer};
use crate::settings::Settings;

/// One line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Message(String),
    NewSession,
    ListSessions,
    Switch(String),
    Delete(String),
    Project(String),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("new", _) => Input::NewSession,
        ("sessions", _) => Input::ListSessions,
        ("switch", id) if !id.is_empty() => Input::Switch(id.to_string()),
        ("delete", id) if !id.is_empty() => Input::Delete(id.to_string()),
        ("project", id) if !id.is_empty() => Input::Project(id.to_string()),
        ("help", _) => Input::Help,
        ("quit" | "exit", _) => Input::Quit,
        (name, _) => Input::Invalid(name.to_string()),
    }
}

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let client = ChatClient::spawn(&settings.server_url, settings.client.clone(), WsConnector)
        .with_context(|| format!("cannot use server {}", settings.server_url))?;
    let mut updates = client.subscribe();
    let mut renderer = Renderer::new();

    if let Some(project_id) = settings.project_id() {
        client.set_pending_project_id(&project_id).await;
        client.confirm_project_id().await?;
    }

    info!(
        component = "chat",
        event = "chat.started",
        server_url = %settings.server_url,
        "Interactive chat started"
    );
    println!(
        "{}",
        style(format!("agentlink chat → {} (/help for commands)", settings.server_url)).dim()
    );
    client.connect().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => on_update(&client, &mut renderer, update),
                Err(RecvError::Lagged(_)) => print_lines(renderer.render(&client.snapshot())),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(&client, parse_line(&line)).await {
                    break;
                }
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

fn on_update(client: &ChatClient, renderer: &mut Renderer, update: ClientUpdate) {
    match update {
        ClientUpdate::StateChanged => print_lines(renderer.render(&client.snapshot())),
        ClientUpdate::Connection(status) => println!("{}", render::connection_line(status)),
        ClientUpdate::FilesChanged => {
            println!("{}", style("  workspace files changed").dim())
        }
        ClientUpdate::ConnectionError(err) => {
            println!("{}", style(format!("  connection error: {err}")).red())
        }
        ClientUpdate::GaveUp { attempts } => println!(
            "{}",
            style(format!(
                "Gave up reconnecting after {attempts} attempts. Restart chat to try again."
            ))
            .red()
            .bold()
        ),
    }
}

/// Returns false when the user asked to leave.
async fn handle_input(client: &ChatClient, input: Input) -> bool {
    let result = match input {
        Input::Empty => Ok(()),
        Input::Quit => return false,
        Input::Help => {
            print_help();
            Ok(())
        }
        Input::Invalid(name) => {
            println!("{}", style(format!("unknown command /{name}, try /help")).yellow());
            Ok(())
        }
        Input::Message(content) => client.send_message(&content).await,
        Input::NewSession => client.create_session().await,
        Input::ListSessions => {
            let snapshot = client.snapshot();
            println!(
                "{}",
                render::sessions_table(&snapshot.sessions, snapshot.current_session_id.as_deref())
            );
            client.refresh_sessions().await
        }
        Input::Switch(id) => client.switch_session(&id).await,
        Input::Delete(id) => client.delete_session(&id).await,
        Input::Project(id) => {
            client.set_pending_project_id(&id).await;
            client.confirm_project_id().await
        }
    };

    if let Err(e) = result {
        println!("{}", style(format!("  {e}")).yellow());
    }
    true
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

fn print_help() {
    println!("  /new            start a new session");
    println!("  /sessions       list sessions");
    println!("  /switch <id>    switch to a session");
    println!("  /delete <id>    delete a session");
    println!("  /project <id>   set the project id");
    println!("  /quit           leave");
}
