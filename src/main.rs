use nakama_client::core::traits::{AccountApi, Authenticator};
use nakama_client::{build_client, ClientConfig, Envelope, EnvelopeMessage};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Defaults target a local server started with `nakama --server_key defaultkey`
    let config = ClientConfig::from_env("NAKAMA")?;
    let client = build_client(config)?;

    println!("Authenticating device...");
    let mut session = client
        .authenticate_device("demo-device-0001", Some(true), Some("demo"), None)
        .await?;
    println!(
        "Session for {} (new account: {}), expires at {:?}",
        session.username().unwrap_or("<unknown>"),
        session.created(),
        session.expires_at()
    );

    match client.get_account(&mut session).await {
        Ok(account) => println!("Account: {}", account),
        Err(e) => println!("Error fetching account: {}", e),
    }

    let mut socket = client.create_socket();
    socket
        .on_open(|| println!("Socket open"))
        .on_message(|envelope: Envelope| match &envelope.message {
            EnvelopeMessage::MatchData(data) => println!(
                "Match data op {:?}: {} bytes",
                data.op_code,
                data.data_bytes().map_or(0, <[u8]>::len)
            ),
            other => println!("Received {}", other.kind()),
        })
        .on_error(|e| println!("Socket error: {}", e))
        .on_close(|| println!("Socket closed by server"));

    client.connect_socket(&socket, &mut session, true).await?;

    // Ask the server for a new match; the reply arrives on the message callback
    socket
        .send(&Envelope::other("match_create", serde_json::json!({})).with_cid("1"))
        .await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    socket.close().await;
    client.session_logout(&mut session).await?;

    Ok(())
}
