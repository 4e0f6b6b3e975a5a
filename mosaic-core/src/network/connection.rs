use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use crate::error::{MosaicError, TransportError};

/// Host and port of a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    ip: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Open a TCP connection, giving up after `timeout`.
pub async fn connect(info: &ConnectionInfo, timeout: Duration) -> Result<TcpStream, MosaicError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((info.ip(), info.port())))
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn display_is_host_port() {
        let info = ConnectionInfo::new("192.168.196.105", 49697);
        assert_eq!(info.to_string(), "192.168.196.105:49697");
    }

    #[tokio::test]
    async fn connect_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());

        let stream = connect(&info, Duration::from_secs(5)).await.unwrap();
        let (_, peer) = listener.accept().await.unwrap();
        assert_eq!(stream.local_addr().unwrap(), peer);
    }
}
