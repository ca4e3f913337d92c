use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{info, instrument, trace};

use super::Transport;
use crate::error::TransportError;
use crate::utils::printable;

const READ_CHUNK: usize = 1024;

/// Serial port exposed over TCP by a port agent.
#[derive(Debug)]
pub struct TcpTransport {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    read_buffer: Box<[u8; READ_CHUNK]>,
}

impl TcpTransport {
    /// Connects to `address` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established.
    #[instrument(level = "info")]
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| TransportError::Connect {
                address: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        info!("connected to port agent");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            writer,
            read_buffer: Box::new([0; READ_CHUNK]),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        trace!(bytes = %printable(bytes), "tcp write");
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let read = self.reader.read(&mut self.read_buffer[..]).await?;
        if read == 0 {
            return Ok(None);
        }
        trace!(bytes = %printable(&self.read_buffer[..read]), "tcp read");
        Ok(Some(self.read_buffer[..read].to_vec()))
    }
}
