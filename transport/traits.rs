// Transport abstraction - message-level send/receive over any framed connection
use crate::error::TransportError;
use framelink_core::Received;

pub trait MessageTransport: Send {
    /// Send one message as a single frame.
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError>;

    /// Block until one whole frame or end-of-stream is available.
    fn receive(&mut self) -> Result<Received, TransportError>;

    /// Release the connection. Closing twice is a no-op.
    fn close(&mut self) -> Result<(), TransportError>;
}

impl<T: MessageTransport + ?Sized> MessageTransport for Box<T> {
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn receive(&mut self) -> Result<Received, TransportError> {
        (**self).receive()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}
