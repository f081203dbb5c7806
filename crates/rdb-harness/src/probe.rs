//! Driver-port readiness checks.
//!
//! A server is ready once a client handshake on its driver port gets a
//! SUCCESS reply (or, in `Tcp` mode, once the port accepts connections).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rdb_protocol::{Handshake, HandshakeCodec, ProtocolError};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::config::ProbeMode;

/// Per-attempt bound on connect and on the handshake reply.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connect to `host:port` and run one handshake.
pub async fn handshake(
    host: &str,
    port: u16,
    auth_key: &str,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let stream = connect(host, port, timeout).await?;
    let mut framed = Framed::new(stream, HandshakeCodec);

    framed.send(Handshake::new(auth_key)).await?;
    let reply = tokio::time::timeout(timeout, framed.next())
        .await
        .map_err(|_| timed_out("handshake reply"))?;

    match reply {
        Some(reply) => reply?.into_result(),
        None => Err(ProtocolError::Closed),
    }
}

async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, ProtocolError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| timed_out("connect"))??;
    Ok(stream)
}

fn timed_out(what: &str) -> ProtocolError {
    ProtocolError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("{what} timed out"),
    ))
}

/// Poll until the driver port is ready, or until `timeout` elapses.
/// On timeout the last probe error is returned.
pub async fn wait_ready(
    host: &str,
    port: u16,
    auth_key: &str,
    mode: ProbeMode,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    if mode == ProbeMode::None {
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let result = match mode {
            ProbeMode::Handshake => handshake(host, port, auth_key, ATTEMPT_TIMEOUT).await,
            ProbeMode::Tcp => connect(host, port, ATTEMPT_TIMEOUT).await.map(|_| ()),
            ProbeMode::None => Ok(()),
        };

        match result {
            Ok(()) => {
                tracing::debug!(host, port, attempts, "driver port ready");
                return Ok(());
            }
            // An explicit rejection will not go away by retrying.
            Err(e @ ProtocolError::Rejected(_)) => return Err(e),
            Err(e) => {
                if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                    tracing::warn!(host, port, attempts, error = %e, "driver port never became ready");
                    return Err(e);
                }
                tracing::debug!(host, port, attempts, error = %e, "driver port not ready yet");
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
