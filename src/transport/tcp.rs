//! TCP channel.
//!
//! # Example
//!
//! ```ignore
//! use chatwire::transport::{next_event, open, ChannelEvent};
//!
//! let mut stream = open("localhost", 4242).await?;
//! let mut buf = vec![0u8; 64 * 1024];
//! match next_event(&mut stream, &mut buf).await {
//!     ChannelEvent::Data(n) => println!("{} bytes", n),
//!     ChannelEvent::Closed => println!("closed"),
//!     ChannelEvent::Error(e) => println!("error: {}", e),
//! }
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;

use crate::error::Result;

/// What one read from the channel produced.
#[derive(Debug)]
pub enum ChannelEvent {
    /// `n` bytes were read into the front of the caller's buffer.
    Data(usize),
    /// The peer shut down its side in an orderly way.
    Closed,
    /// The read failed.
    Error(std::io::Error),
}

/// Open a TCP connection to `host:port`.
///
/// `host` may be a name or an address literal. Errors (refused,
/// unreachable, unknown host) are returned unchanged for the caller to
/// report.
pub async fn open(host: &str, port: u16) -> Result<TcpStream> {
    tracing::debug!("Connecting to {}:{}", host, port);
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    tracing::info!("Connected to {}", stream.peer_addr()?);
    Ok(stream)
}

/// Read once from `reader` and classify the result.
pub async fn next_event<R>(reader: &mut R, buf: &mut [u8]) -> ChannelEvent
where
    R: AsyncRead + Unpin,
{
    match reader.read(buf).await {
        Ok(0) => ChannelEvent::Closed,
        Ok(n) => ChannelEvent::Data(n),
        Err(e) => ChannelEvent::Error(e),
    }
}
