mod simulated;
mod tcp;

use async_trait::async_trait;

use crate::error::TransportError;

pub use self::simulated::{CommandLog, SimulatedInstrument, SimulatedTransport};
pub use self::tcp::TcpTransport;

/// Byte stream to one instrument.
#[async_trait]
pub trait Transport: Send {
    /// Writes `bytes` in full.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Waits for the next chunk of inbound bytes.
    ///
    /// Returns `None` once the peer has closed the stream. Dropping the future
    /// before it completes loses no data.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes).await
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        (**self).recv().await
    }
}
