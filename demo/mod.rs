// demo: the connecting-role and listening-role drivers
//
// Each side sends msg1, msg2, msg3 and then the sentinel "done"; the other
// side prints messages until it sees the sentinel. The sentinel is an
// ordinary payload compared byte for byte, nothing the transport knows about.
use framelink::{MessageTransport, Received, TransportError};
use tracing::warn;

pub const SENTINEL: &[u8] = b"done";

pub const DEMO_MESSAGES: [&[u8]; 3] = [b"msg1", b"msg2", b"msg3"];

/// What a receive loop saw before it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiveOutcome {
    pub messages: Vec<Vec<u8>>,
    /// false when the peer closed the stream before sending the sentinel
    pub sentinel_seen: bool,
}

pub fn send_batch<T, M>(transport: &mut T, messages: &[M]) -> Result<(), TransportError>
where
    T: MessageTransport + ?Sized,
    M: AsRef<[u8]>,
{
    for message in messages {
        transport.send(message.as_ref())?;
    }
    Ok(())
}

/// Receive until `sentinel` arrives or the peer closes the stream.
///
/// End-of-stream stops the loop instead of polling again: a peer that has
/// closed its side will never send the sentinel.
pub fn receive_until<T>(transport: &mut T, sentinel: &[u8]) -> Result<ReceiveOutcome, TransportError>
where
    T: MessageTransport + ?Sized,
{
    let mut outcome = ReceiveOutcome::default();
    loop {
        match transport.receive()? {
            Received::Message(message) if message == sentinel => {
                outcome.sentinel_seen = true;
                return Ok(outcome);
            }
            Received::Message(message) => outcome.messages.push(message),
            Received::EndOfStream => {
                warn!(received = outcome.messages.len(), "peer closed the stream before the sentinel");
                return Ok(outcome);
            }
        }
    }
}

fn send_demo_batch<T: MessageTransport + ?Sized>(transport: &mut T) -> Result<(), TransportError> {
    send_batch(transport, &DEMO_MESSAGES)?;
    transport.send(SENTINEL)
}

fn print_messages(outcome: &ReceiveOutcome) {
    for message in &outcome.messages {
        println!("{}", String::from_utf8_lossy(message));
    }
}

/// Connecting side: send first, then receive until the sentinel.
pub fn run_connector<T: MessageTransport + ?Sized>(transport: &mut T) -> Result<ReceiveOutcome, TransportError> {
    send_demo_batch(transport)?;
    let outcome = receive_until(transport, SENTINEL)?;
    print_messages(&outcome);
    transport.close()?;
    Ok(outcome)
}

/// Listening side: receive until the sentinel, then send.
pub fn run_listener<T: MessageTransport + ?Sized>(transport: &mut T) -> Result<ReceiveOutcome, TransportError> {
    let outcome = receive_until(transport, SENTINEL)?;
    print_messages(&outcome);
    send_demo_batch(transport)?;
    transport.close()?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink::{encode_frame, FramedStream};
    use std::io::{self, Cursor, Read, Write};

    // Reads from a fixed script, records everything written
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(frames: &[&[u8]]) -> FramedStream<Scripted> {
            let input = frames.iter().flat_map(|f| encode_frame(f).unwrap()).collect();
            FramedStream::new(Scripted {
                input: Cursor::new(input),
                output: Vec::new(),
            })
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn receive_until_stops_on_sentinel_and_keeps_empty_messages() {
        let mut transport = Scripted::new(&[&b"a"[..], b"", b"done", b"after"]);
        let outcome = receive_until(&mut transport, SENTINEL).unwrap();
        assert!(outcome.sentinel_seen);
        assert_eq!(outcome.messages, vec![b"a".to_vec(), Vec::new()]);
        // the frame after the sentinel is still pending
        assert_eq!(transport.receive().unwrap(), Received::Message(b"after".to_vec()));
    }

    #[test]
    fn receive_until_stops_on_end_of_stream() {
        let mut transport = Scripted::new(&[&b"msg1"[..]]);
        let outcome = receive_until(&mut transport, SENTINEL).unwrap();
        assert!(!outcome.sentinel_seen);
        assert_eq!(outcome.messages, vec![b"msg1".to_vec()]);
    }

    #[test]
    fn listener_driver_replies_after_sentinel() {
        let mut transport = Scripted::new(&[&b"msg1"[..], b"msg2", b"msg3", b"done"]);
        let outcome = run_listener(&mut transport).unwrap();
        assert_eq!(outcome.messages.len(), 3);
        assert!(transport.is_closed());
    }

    #[test]
    fn connector_driver_writes_batch_then_sentinel() {
        let mut transport = Scripted::new(&[&b"done"[..]]);
        send_demo_batch(&mut transport).unwrap();
        let wire = transport.take().unwrap().output;
        let expected: Vec<u8> = [&b"msg1"[..], b"msg2", b"msg3", b"done"]
            .iter()
            .flat_map(|m| encode_frame(m).unwrap())
            .collect();
        assert_eq!(wire, expected);
    }
}
