//! Port availability by binding a throwaway listener.

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::net::TcpListener;

use crate::domain::ProvisionError;
use crate::ports::PortProbe;

/// Probes ports on all IPv4 interfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpPortProbe;

#[async_trait]
impl PortProbe for TcpPortProbe {
    async fn is_free(&self, port: u16) -> Result<bool, ProvisionError> {
        match TcpListener::bind(("0.0.0.0", port)).await {
            // Listener dropped right away; the port is released.
            Ok(_listener) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AddrInUse => Ok(false),
            Err(source) => Err(ProvisionError::PortProbe { port, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bound_port_is_busy() {
        let held = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = held.local_addr().unwrap().port();

        assert!(!TcpPortProbe.is_free(port).await.unwrap());
        drop(held);
        assert!(TcpPortProbe.is_free(port).await.unwrap());
    }
}
