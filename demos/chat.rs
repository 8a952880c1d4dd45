//! Chat client - line-based terminal front end.
//!
//! This demo demonstrates:
//! - Connecting a session with the builder pattern
//! - Sending stdin lines as messages
//! - Rendering session events, including the poll variant's re-requests
//!
//! # Running
//!
//! ```text
//! cargo run --example chat -- localhost 4242
//! cargo run --example chat -- localhost 4242 --poll next
//! RUST_LOG=chatwire=debug cargo run --example chat -- 127.0.0.1 4242
//! ```
//!
//! With `--poll <request>`, the request text is sent once at start and
//! again whenever the server repeats its last value.

use std::io::ErrorKind;

use chatwire::{Client, SessionEvent, Variant};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port: u16 = args.next().as_deref().unwrap_or("4242").parse()?;
    let poll_request = match args.next().as_deref() {
        Some("--poll") => Some(args.next().unwrap_or_else(|| "next".to_string())),
        _ => None,
    };

    let mut builder = Client::builder();
    if poll_request.is_some() {
        builder = builder.variant(Variant::DedupPoll).local_echo(false);
    }
    let (client, mut events) = builder.connect(&host, port).await?;

    if let Some(request) = &poll_request {
        client.send(request)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    client.send(line.trim_end())?;
                }
                None => break,
            },
            event = events.recv() => match event {
                Some(SessionEvent::Opened { peer }) => match peer {
                    Some(peer) => println!("[<LOGS>] Connected to {}", peer),
                    None => println!("[<LOGS>] Connected"),
                },
                Some(SessionEvent::Message { sender, text, .. }) => {
                    println!("[{}] {}", sender, text);
                }
                Some(SessionEvent::RequestNext) => {
                    if let Some(request) = &poll_request {
                        client.send(request)?;
                    }
                }
                Some(SessionEvent::Closed) => {
                    println!("[<LOGS>] Connection closed");
                    break;
                }
                Some(SessionEvent::ChannelError { kind, reason }) => {
                    match kind {
                        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                            println!("[<LOGS>] The server closed the connection")
                        }
                        _ => println!("[<LOGS>] Error: {}", reason),
                    }
                    break;
                }
                Some(SessionEvent::ProtocolError { reason }) => {
                    println!("[<LOGS>] Bad data from the server: {}", reason);
                    break;
                }
                None => break,
            },
        }
    }

    client.close().await;
    Ok(())
}
