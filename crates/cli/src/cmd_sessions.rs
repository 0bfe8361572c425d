//! `agentlink sessions` — print the server's session list.

use std::time::Duration;

use anyhow::{anyhow, Context};

use agentlink_client::{ChatClient, ConnectionStatus, WsConnector};

use crate::render;
use crate::settings::Settings;

const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let client = ChatClient::spawn(&settings.server_url, settings.client.clone(), WsConnector)
        .with_context(|| format!("cannot use server {}", settings.server_url))?;
    client.connect().await;

    let synced = tokio::time::timeout(SYNC_TIMEOUT, async {
        client
            .wait_until(|s| s.connection == ConnectionStatus::Connected)
            .await?;
        // The server pushes the list on connect; ask anyway in case it does not.
        client.refresh_sessions().await.ok()?;
        client.wait_until(|s| s.sessions_loaded).await
    })
    .await;
    client.shutdown().await;

    let snapshot = match synced {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return Err(anyhow!("client stopped before the session list arrived")),
        Err(_) => {
            return Err(anyhow!(
                "no session list from {} within {}s",
                settings.server_url,
                SYNC_TIMEOUT.as_secs()
            ))
        }
    };

    if snapshot.sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    println!(
        "{}",
        render::sessions_table(&snapshot.sessions, snapshot.current_session_id.as_deref())
    );
    Ok(())
}
