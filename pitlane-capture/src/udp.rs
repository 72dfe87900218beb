//! UDP packet source.
//!
//! Binds the configured address and reads one datagram per call. Binding
//! happens in the constructor so a bad address fails the recorder start.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use pitlane_core::events::TelemetryEvent;
use tracing::{debug, info};

use crate::decoder::PacketDecoder;
use crate::source::{PacketSource, SourceError};

const MAX_DATAGRAM: usize = 64 * 1024;

pub struct UdpSource<D: PacketDecoder> {
    socket: UdpSocket,
    local: SocketAddr,
    decoder: D,
    buffer: Vec<u8>,
    read_timeout: Option<Duration>,
}

impl<D: PacketDecoder> UdpSource<D> {
    pub fn bind(address: &str, port: u16, decoder: D) -> Result<Self, SourceError> {
        let socket = UdpSocket::bind((address, port))
            .map_err(|e| SourceError::Fatal(format!("cannot bind {address}:{port}: {e}")))?;
        let local = socket
            .local_addr()
            .map_err(|e| SourceError::Fatal(e.to_string()))?;
        info!("Listening for telemetry on {local}");

        Ok(Self {
            socket,
            local,
            decoder,
            buffer: vec![0; MAX_DATAGRAM],
            read_timeout: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), SourceError> {
        // A zero read timeout is rejected by the OS.
        let timeout = timeout.max(Duration::from_millis(1));
        if self.read_timeout != Some(timeout) {
            self.socket
                .set_read_timeout(Some(timeout))
                .map_err(|e| SourceError::from_io(&e))?;
            self.read_timeout = Some(timeout);
        }
        Ok(())
    }
}

impl<D: PacketDecoder> PacketSource for UdpSource<D> {
    fn next(&mut self, timeout: Duration) -> Result<Option<TelemetryEvent>, SourceError> {
        self.apply_timeout(timeout)?;

        match self.socket.recv_from(&mut self.buffer) {
            Ok((len, peer)) => {
                let event = self
                    .decoder
                    .decode(&self.buffer[..len])
                    .map_err(|e| SourceError::Transient(format!("{peer}: {e}")))?;
                Ok(Some(event))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => {
                debug!("UDP receive failed: {e}");
                Err(SourceError::from_io(&e))
            }
        }
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.local)
    }
}
