// TCP transport implementation: connect to a peer, or bind and accept exactly one
use crate::config::TransportConfig;
use crate::error::{ConstructionError, TransportError};
use crate::stream::FramedStream;
use crate::traits::MessageTransport;
use framelink_core::{Received, Role};
use nix::sys::socket::{bind, listen, socket, AddressFamily, Backlog, SockFlag, SockType, SockaddrIn};
use std::io;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// One point-to-point connection with length-prefixed framing.
///
/// Built either by [`TcpTransport::connect`] or by accepting on a
/// [`TcpAcceptor`]; [`TcpTransport::open`] picks between the two from a
/// [`TransportConfig`]. The connection is released by `close` or on drop.
#[derive(Debug)]
pub struct TcpTransport {
    role: Role,
    remote_host: String,
    remote_port: u16,
    peer_addr: SocketAddr,
    framed: FramedStream<TcpStream>,
}

impl TcpTransport {
    /// Establish a connection according to `config.role`.
    ///
    /// For the listener role this blocks until one peer connects.
    pub fn open(config: &TransportConfig) -> Result<Self, ConstructionError> {
        let mut transport = match config.role {
            Role::Connector => Self::connect(&config.host, config.port, config.debug)?,
            Role::Listener => TcpAcceptor::bind(config.port, config.debug)?
                .with_remote_host(config.host.clone())
                .accept()?,
        };

        transport
            .set_read_timeout(config.read_timeout)
            .map_err(|source| ConstructionError::Configure {
                peer: transport.peer_addr.to_string(),
                source,
            })?;
        transport.framed.set_max_frame_len(config.max_frame_len);
        Ok(transport)
    }

    pub fn connect(host: &str, port: u16, debug: bool) -> Result<Self, ConstructionError> {
        let resolve_err = |source| ConstructionError::Resolve {
            host: host.to_string(),
            port,
            source,
        };
        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs().map_err(resolve_err)?.collect();
        if addrs.is_empty() {
            return Err(resolve_err(io::Error::new(
                io::ErrorKind::NotFound,
                "host resolved to no addresses",
            )));
        }

        let connect_err = |source| ConstructionError::Connect {
            addr: format!("{}:{}", host, port),
            source,
        };
        let stream = TcpStream::connect(&addrs[..]).map_err(connect_err)?;
        let peer_addr = stream.peer_addr().map_err(connect_err)?;

        diag!(debug, role = %Role::Connector, %peer_addr, "connection established with {}:{}", host, port);

        Ok(TcpTransport {
            role: Role::Connector,
            remote_host: host.to_string(),
            remote_port: port,
            peer_addr,
            framed: FramedStream::new(stream)
                .with_label(peer_addr.to_string())
                .with_debug(debug),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Host this transport was asked to reach (connector), or the host a
    /// listener was configured with. A listener built from a bare
    /// [`TcpAcceptor`] reports its bound address instead.
    pub fn remote_host(&self) -> &str {
        &self.remote_host
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        let stream = self.framed.get_ref().ok_or(TransportError::Closed)?;
        Ok(stream.local_addr()?)
    }

    pub fn debug(&self) -> bool {
        self.framed.debug()
    }

    pub fn is_closed(&self) -> bool {
        self.framed.is_closed()
    }

    /// Bound the time a receive may block. `None` blocks forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self.framed.get_ref() {
            Some(stream) => stream.set_read_timeout(timeout),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    pub fn set_max_frame_len(&mut self, max_frame_len: Option<u32>) {
        self.framed.set_max_frame_len(max_frame_len);
    }
}

impl MessageTransport for TcpTransport {
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        self.framed.send(message)
    }

    fn receive(&mut self) -> Result<Received, TransportError> {
        self.framed.receive()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.framed.take() else {
            return Ok(());
        };

        let result = match stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::from(e)),
        };

        diag!(self.debug(), role = %self.role, peer_addr = %self.peer_addr, "disconnected");
        result
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A listening socket that hands out exactly one connection.
///
/// Binding returns as soon as the socket is listening; waiting for the peer
/// happens in [`TcpAcceptor::accept`], which consumes the acceptor so the
/// listening socket is closed once the peer is in.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    remote_host: String,
    debug: bool,
}

impl TcpAcceptor {
    /// Bind `0.0.0.0:port` with a backlog of one. Port 0 picks a free port.
    pub fn bind(port: u16, debug: bool) -> Result<Self, ConstructionError> {
        let bind_err = |source| ConstructionError::Bind { port, source };
        let listener = listen_once(port).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        diag!(debug, %local_addr, "waiting for connection");

        Ok(TcpAcceptor {
            listener,
            local_addr,
            remote_host: local_addr.ip().to_string(),
            debug,
        })
    }

    /// Host recorded on the accepted transport as its `remote_host`.
    pub fn with_remote_host(mut self, host: impl Into<String>) -> Self {
        self.remote_host = host.into();
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Block until one peer connects.
    pub fn accept(self) -> Result<TcpTransport, ConstructionError> {
        let port = self.port();
        let (stream, peer_addr) = loop {
            match self.listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(ConstructionError::Accept { port, source }),
            }
        };

        diag!(self.debug, role = %Role::Listener, %peer_addr, "connection established with client on port {}", port);

        Ok(TcpTransport {
            role: Role::Listener,
            remote_host: self.remote_host,
            remote_port: port,
            peer_addr,
            framed: FramedStream::new(stream)
                .with_label(peer_addr.to_string())
                .with_debug(self.debug),
        })
    }
}

impl AsRawFd for TcpAcceptor {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

// Close-on-exec is set atomically where the platform allows it
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn stream_socket() -> nix::Result<OwnedFd> {
    socket(AddressFamily::Inet, SockType::Stream, SockFlag::SOCK_CLOEXEC, None)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
)))]
fn stream_socket() -> nix::Result<OwnedFd> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};

    let fd = socket(AddressFamily::Inet, SockType::Stream, SockFlag::empty(), None)?;
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok(fd)
}

// IPv4 stream socket on every interface, listen backlog of one
fn listen_once(port: u16) -> io::Result<TcpListener> {
    let fd = stream_socket()?;
    let addr = SockaddrIn::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    bind(fd.as_raw_fd(), &addr)?;
    listen(&fd, Backlog::new(1)?)?;
    Ok(TcpListener::from(fd))
}
