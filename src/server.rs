//! Iterative TCP server: accept one connection, serve it, repeat.
//!
//! The listener is a single owned value bound once at startup. The
//! accept loop hands each connection synchronously to the handler, so
//! exactly one connection is in flight at any time; further handshakes
//! queue in the OS backlog. There is no per-connection recovery: every
//! error propagates to the caller and ends the process.

use crate::protocol::{self, LineError};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use tracing::{debug, info};

/// The well-known port the binary always binds.
pub const PORT: u16 = 9292;

/// Server errors, by the phase they occur in. All of them are fatal.
#[derive(Debug)]
pub enum ServerError {
    /// Socket creation, bind, or listen failed.
    Setup(io::Error),
    /// Accepting an inbound connection failed.
    Accept(io::Error),
    /// Reading the request line failed.
    Read(LineError),
    /// Writing the response failed.
    Write(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Setup(e) => write!(f, "Failed to set up listening socket: {}", e),
            ServerError::Accept(e) => write!(f, "Failed to accept connection: {}", e),
            ServerError::Read(e) => write!(f, "Failed to read request line: {}", e),
            ServerError::Write(e) => write!(f, "Failed to write response: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

/// The bound, listening socket.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind the wildcard IPv4 address on `port` and start listening
    /// with the platform's maximum backlog.
    ///
    /// The bind is exclusive (no `SO_REUSEADDR`): a second process
    /// cannot take the port until this one exits.
    pub fn bind(port: u16) -> Result<Self, ServerError> {
        let socket =
            Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(ServerError::Setup)?;

        // A write to a peer that has gone away should fail with EPIPE
        // rather than raise SIGPIPE. The Rust runtime already ignores
        // SIGPIPE on Linux; Apple platforms want the option per socket.
        #[cfg(target_vendor = "apple")]
        socket.set_nosigpipe(true).map_err(ServerError::Setup)?;

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&addr.into()).map_err(ServerError::Setup)?;
        socket.listen(libc::SOMAXCONN).map_err(ServerError::Setup)?;

        Ok(Listener {
            inner: socket.into(),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accept and serve connections one at a time, forever.
    ///
    /// Only exits by error: an accept failure or any handler failure
    /// propagates out, taking the whole server down with it.
    pub fn accept_loop(&self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = self.inner.accept().map_err(ServerError::Accept)?;
            debug!(peer = %peer, "Accepted connection");
            handle_connection(stream)?;
        }
    }
}

/// Serve one connection: read one line, write the fixed response,
/// close.
///
/// The stream is dropped (closed) when this returns, on the success
/// path and on every error path alike. The received line is logged and
/// otherwise ignored; the response never varies.
fn handle_connection(mut stream: TcpStream) -> Result<(), ServerError> {
    let received = protocol::read_line(&mut stream).map_err(ServerError::Read)?;
    info!("Received -> {received}");

    info!("Response -> {}", protocol::RESPONSE);
    stream
        .write_all(protocol::RESPONSE.as_bytes())
        .map_err(ServerError::Write)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_one_cycle_fixed_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream)
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n").unwrap();

        // read_to_end returning proves the server closed the socket
        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        assert_eq!(response, protocol::RESPONSE.as_bytes());
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn test_response_independent_of_request() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream)
        });

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"DELETE /everything HTTP/9.9\n").unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        assert_eq!(response, protocol::RESPONSE.as_bytes());
        assert!(server.join().unwrap().is_ok());
    }

    #[test]
    fn test_read_error_when_peer_closes_early() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (stream, _) = listener.accept().unwrap();
        client.write_all(b"half a line").unwrap();
        drop(client);

        // the handler reports the failure; in the binary this
        // propagates out of the accept loop and ends the process
        match handle_connection(stream) {
            Err(ServerError::Read(LineError::Closed)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bind_is_exclusive() {
        let first = Listener::bind(0).unwrap();
        let port = first.local_addr().unwrap().port();
        match Listener::bind(port) {
            Err(ServerError::Setup(_)) => {}
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_connections_served_one_at_a_time() {
        let listener = Listener::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut first = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        thread::spawn(move || {
            let _ = listener.accept_loop();
        });

        // hold the first connection open mid-line
        first.write_all(b"first, no terminator yet").unwrap();
        thread::sleep(Duration::from_millis(100));

        // second handshake succeeds via the backlog but gets no bytes
        // while the first connection is still in flight
        let mut second = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).unwrap();
        second.write_all(b"second\n").unwrap();
        second
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = [0u8; 64];
        let err = second.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));

        // completing the first line lets both cycles run to completion
        first.write_all(b"\n").unwrap();
        let mut response = Vec::new();
        first.read_to_end(&mut response).unwrap();
        assert_eq!(response, protocol::RESPONSE.as_bytes());

        second.set_read_timeout(None).unwrap();
        let mut response = Vec::new();
        second.read_to_end(&mut response).unwrap();
        assert_eq!(response, protocol::RESPONSE.as_bytes());
    }
}
