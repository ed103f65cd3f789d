// Length-prefixed framing over any blocking byte stream
use crate::error::TransportError;
use crate::traits::MessageTransport;
use framelink_core::{FrameHeader, Received, HEADER_LEN};
use std::io::{self, IoSlice, Read, Write};
use tracing::warn;

// Upper bound on the up-front payload allocation; larger frames grow as bytes arrive
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

/// Write one frame: the big-endian length prefix followed by the payload.
///
/// Both parts go through a single vectored write loop (`writev` on sockets),
/// so the prefix always precedes its payload and partial writes are resumed
/// where they stopped.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError> {
    let prefix = FrameHeader::for_payload(payload.len())?.to_bytes();
    let mut slices = [IoSlice::new(&prefix), IoSlice::new(payload)];
    let mut remaining: &mut [IoSlice<'_>] = &mut slices;

    while !remaining.is_empty() {
        match writer.write_vectored(remaining) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => IoSlice::advance_slices(&mut remaining, n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    writer.flush()?;
    Ok(())
}

/// Read one frame, accumulating across short reads.
///
/// Returns `EndOfStream` only when the stream ends before the first byte of
/// a prefix. Any other early end is `Truncated`.
pub fn read_frame<R: Read + ?Sized>(
    reader: &mut R,
    max_frame_len: Option<u32>,
) -> Result<Received, TransportError> {
    let mut prefix = [0u8; HEADER_LEN];
    match fill(reader, &mut prefix)? {
        0 => return Ok(Received::EndOfStream),
        HEADER_LEN => {}
        received => {
            return Err(TransportError::Truncated {
                expected: HEADER_LEN,
                received,
            })
        }
    }

    let header = FrameHeader::from_bytes(prefix);
    header.check_limit(max_frame_len)?;

    let expected = header.payload_len();
    let mut payload = Vec::with_capacity(expected.min(INITIAL_PAYLOAD_CAPACITY));
    Read::take(&mut *reader, u64::from(header.len)).read_to_end(&mut payload)?;

    if payload.len() < expected {
        return Err(TransportError::Truncated {
            expected,
            received: payload.len(),
        });
    }
    Ok(Received::Message(payload))
}

// Read until `buf` is full or the stream ends; returns the bytes collected
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A byte stream plus its framing state.
///
/// Once closed, the stream is dropped and every further send or receive
/// fails with [`TransportError::Closed`].
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: Option<S>,
    label: String,
    debug: bool,
    max_frame_len: Option<u32>,
}

impl<S: Read + Write> FramedStream<S> {
    pub fn new(stream: S) -> Self {
        FramedStream {
            stream: Some(stream),
            label: String::from("stream"),
            debug: false,
            max_frame_len: None,
        }
    }

    /// Name used for this connection in diagnostics.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: Option<u32>) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn set_max_frame_len(&mut self, max_frame_len: Option<u32>) {
        self.max_frame_len = max_frame_len;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref()
    }

    /// Detach the stream, leaving this transport closed.
    pub fn take(&mut self) -> Option<S> {
        self.stream.take()
    }

    fn stream_mut(&mut self) -> Result<&mut S, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl<S: Read + Write + Send> MessageTransport for FramedStream<S> {
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream_mut()?;
        if let Err(e) = write_frame(stream, message) {
            warn!(peer = %self.label, error = %e, "send failed");
            return Err(e);
        }
        diag!(self.debug, peer = %self.label, len = message.len(), "message sent");
        Ok(())
    }

    fn receive(&mut self) -> Result<Received, TransportError> {
        let max_frame_len = self.max_frame_len;
        let stream = self.stream_mut()?;
        match read_frame(stream, max_frame_len) {
            Ok(Received::Message(payload)) => {
                diag!(self.debug, peer = %self.label, len = payload.len(), "message received");
                Ok(Received::Message(payload))
            }
            Ok(Received::EndOfStream) => {
                diag!(self.debug, peer = %self.label, "peer closed the stream");
                Ok(Received::EndOfStream)
            }
            Err(e) => {
                warn!(peer = %self.label, error = %e, "receive failed");
                Err(e)
            }
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush()?;
            diag!(self.debug, peer = %self.label, "disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_core::encode_frame;
    use proptest::prelude::*;

    // Hands out 1 or 2 bytes per read and accepts at most 3 bytes per write
    struct Trickle {
        input: Vec<u8>,
        pos: usize,
        tick: usize,
        output: Vec<u8>,
        interrupt_next: bool,
    }

    impl Trickle {
        fn new(input: Vec<u8>) -> Self {
            Trickle {
                input,
                pos: 0,
                tick: 0,
                output: Vec::new(),
                interrupt_next: false,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let step = 1 + self.tick % 2;
            self.tick += 1;
            let n = step.min(buf.len()).min(self.input.len() - self.pos);
            buf[..n].copy_from_slice(&self.input[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.output.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frames(messages: &[&[u8]]) -> Vec<u8> {
        messages
            .iter()
            .flat_map(|m| encode_frame(m).unwrap())
            .collect()
    }

    #[test]
    fn send_writes_prefix_then_payload_despite_partial_writes() {
        let mut framed = FramedStream::new(Trickle::new(Vec::new()));
        framed.send(b"msg1").unwrap();
        framed.send(b"").unwrap();
        framed.send(b"done").unwrap();
        let wire = framed.take().unwrap().output;
        assert_eq!(wire, b"\0\0\0\x04msg1\0\0\0\0\0\0\0\x04done".to_vec());
    }

    #[test]
    fn receive_reassembles_fragmented_frames() {
        let payload = vec![7u8; 1000];
        let input = frames(&[&b"msg1"[..], &payload[..], &b"done"[..]]);
        let mut framed = FramedStream::new(Trickle::new(input));
        assert_eq!(framed.receive().unwrap(), Received::Message(b"msg1".to_vec()));
        assert_eq!(framed.receive().unwrap(), Received::Message(payload));
        assert_eq!(framed.receive().unwrap(), Received::Message(b"done".to_vec()));
        assert_eq!(framed.receive().unwrap(), Received::EndOfStream);
    }

    #[test]
    fn empty_message_is_distinct_from_end_of_stream() {
        let mut framed = FramedStream::new(Trickle::new(frames(&[&b""[..]])));
        assert_eq!(framed.receive().unwrap(), Received::Message(Vec::new()));
        assert_eq!(framed.receive().unwrap(), Received::EndOfStream);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut trickle = Trickle::new(frames(&[&b"abc"[..]]));
        trickle.interrupt_next = true;
        let mut framed = FramedStream::new(trickle);
        assert_eq!(framed.receive().unwrap(), Received::Message(b"abc".to_vec()));
    }

    #[test]
    fn partial_prefix_is_truncated_not_end_of_stream() {
        let mut framed = FramedStream::new(Trickle::new(vec![0, 0]));
        let err = framed.receive().unwrap_err();
        assert!(matches!(err, TransportError::Truncated { expected: 4, received: 2 }));
    }

    #[test]
    fn short_payload_is_truncated() {
        let mut input = 10u32.to_be_bytes().to_vec();
        input.extend_from_slice(b"abc");
        let mut framed = FramedStream::new(Trickle::new(input));
        let err = framed.receive().unwrap_err();
        assert!(matches!(err, TransportError::Truncated { expected: 10, received: 3 }));
    }

    #[test]
    fn frame_limit_rejects_before_reading_payload() {
        let mut framed = FramedStream::new(Trickle::new(frames(&[&b"too long"[..]])))
            .with_max_frame_len(Some(4));
        let err = framed.receive().unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { len: 8, max: 4 }));
    }

    #[test]
    fn huge_announced_length_does_not_preallocate() {
        // Peer claims ~4 GiB and then hangs up after a few bytes
        let mut input = u32::MAX.to_be_bytes().to_vec();
        input.extend_from_slice(b"xy");
        let mut framed = FramedStream::new(Trickle::new(input));
        let err = framed.receive().unwrap_err();
        assert!(matches!(err, TransportError::Truncated { received: 2, .. }));
    }

    #[test]
    fn operations_after_close_fail_fast() {
        let mut framed = FramedStream::new(Trickle::new(frames(&[&b"msg1"[..]])));
        framed.close().unwrap();
        assert!(framed.is_closed());
        assert!(matches!(framed.send(b"x"), Err(TransportError::Closed)));
        assert!(matches!(framed.receive(), Err(TransportError::Closed)));
        // second close is a no-op
        framed.close().unwrap();
    }

    #[test]
    fn frames_pass_through_trait_objects() {
        let mut wire = Vec::new();
        {
            let writer: &mut dyn Write = &mut wire;
            write_frame(writer, b"msg1").unwrap();
            write_frame(writer, b"").unwrap();
        }
        let mut trickle = Trickle::new(wire);
        let reader: &mut dyn Read = &mut trickle;
        assert_eq!(read_frame(reader, None).unwrap(), Received::Message(b"msg1".to_vec()));
        assert_eq!(read_frame(reader, None).unwrap(), Received::Message(Vec::new()));
        assert_eq!(read_frame(reader, None).unwrap(), Received::EndOfStream);
    }

    proptest! {
        #[test]
        fn messages_round_trip_in_order(
            messages in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 0..12)
        ) {
            let mut wire = Vec::new();
            for message in &messages {
                write_frame(&mut wire, message).unwrap();
            }
            let mut framed = FramedStream::new(Trickle::new(wire));
            for message in &messages {
                prop_assert_eq!(framed.receive().unwrap(), Received::Message(message.clone()));
            }
            prop_assert_eq!(framed.receive().unwrap(), Received::EndOfStream);
        }
    }
}
