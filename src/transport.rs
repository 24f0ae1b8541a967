//! Blocking byte transport, plain TCP or TLS.
//!
//! TLS always verifies the server certificate against the webpki root store and
//! the requested host name. There is no way to turn verification off.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::Error;

/// A connected stream. Closed on drop.
pub struct Transport {
    stream: Option<Stream>,
    peer: SocketAddr,
}

enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Transport {
    /// Connect to `host:port`, wrapping in TLS if `use_tls` is set.
    ///
    /// `timeout` bounds the connect and every later read or write. It must be
    /// non-zero.
    pub fn open(host: &str, port: u16, use_tls: bool, timeout: Duration) -> Result<Self, Error> {
        let tcp = connect(host, port, timeout)?;
        let peer = tcp.peer_addr().map_err(Error::from_io)?;

        tcp.set_read_timeout(Some(timeout)).map_err(Error::from_io)?;
        tcp.set_write_timeout(Some(timeout)).map_err(Error::from_io)?;
        tcp.set_nodelay(true).map_err(Error::from_io)?;

        let stream = if use_tls {
            Stream::Tls(Box::new(handshake(host, tcp)?))
        } else {
            Stream::Plain(tcp)
        };

        Ok(Transport {
            stream: Some(stream),
            peer,
        })
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Write all of `data`, retrying partial writes.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let stream = self.stream_mut()?;

        let result = match stream {
            Stream::Plain(s) => s.write_all(data).and_then(|_| s.flush()),
            Stream::Tls(s) => s.write_all(data).and_then(|_| s.flush()),
        };

        result.map_err(Error::from_io)
    }

    /// Blocking read into `buf`. `Ok(0)` means the peer closed the connection.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let stream = self.stream_mut()?;

        let result = match stream {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => match s.read(buf) {
                // Peers commonly close without close_notify once the
                // response is sent. Framing decides whether that is ok.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                r => r,
            },
        };

        result.map_err(Error::from_io)
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };

        debug!("Close connection to {}", self.peer);

        // The socket is released when dropped. Shutdown failures, such as the
        // peer having gone already, leave nothing to clean up.
        match stream {
            Stream::Plain(s) => {
                s.shutdown(Shutdown::Both).ok();
            }
            Stream::Tls(mut s) => {
                s.conn.send_close_notify();
                s.conn.write_tls(&mut s.sock).ok();
                s.sock.shutdown(Shutdown::Both).ok();
            }
        }
    }

    /// Tell if [`Transport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream_mut(&mut self) -> Result<&mut Stream, Error> {
        self.stream.as_mut().ok_or_else(|| {
            Error::Connection(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport is closed",
            ))
        })
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, Error> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(Error::Connection)?
        .collect();

    let mut last_err = None;

    for addr in addrs {
        debug!("Connect to {} ({}:{})", addr, host, port);
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(v) => return Ok(v),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e) => Error::from_io(e),
        None => Error::Connection(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address for {}", host),
        )),
    })
}

fn handshake(
    host: &str,
    mut tcp: TcpStream,
) -> Result<StreamOwned<ClientConnection, TcpStream>, Error> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Tls(format!("invalid server name {}: {}", host, e)))?;

    let mut conn = ClientConnection::new(tls_config(), server_name)
        .map_err(|e| Error::Tls(e.to_string()))?;

    while conn.is_handshaking() {
        match conn.complete_io(&mut tcp) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Error::Tls("peer closed during handshake".into()));
            }
            Err(e) => return Err(Error::from_io(e)),
        }
    }

    debug!(
        "TLS handshake with {} done: {:?} {:?}",
        host,
        conn.protocol_version(),
        conn.negotiated_cipher_suite().map(|s| s.suite())
    );

    Ok(StreamOwned::new(conn, tcp))
}

fn tls_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

    CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let config = ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();

            Arc::new(config)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::PrivatePkcs8KeyDer;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn send_receive_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            let mut buf = [0; 4];
            s.read_exact(&mut buf).unwrap();
            s.write_all(&buf).unwrap();
            // Wait for client close.
            let n = s.read(&mut buf).unwrap();
            assert_eq!(n, 0);
        });

        let mut t = Transport::open("127.0.0.1", port, false, Duration::from_secs(5)).unwrap();
        t.send(b"ping").unwrap();

        let mut buf = [0; 4];
        let mut got = 0;
        while got < 4 {
            got += t.receive(&mut buf[got..]).unwrap();
        }
        assert_eq!(&buf, b"ping");

        t.close();
        assert!(t.is_closed());
        t.close();

        let err = t.send(b"more").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        server.join().unwrap();
    }

    #[test]
    fn connection_refused() {
        // Bind and drop to get a port nothing listens on.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let err = Transport::open("127.0.0.1", port, false, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn tls_against_plaintext_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            let mut buf = [0; 4096];
            s.read(&mut buf).unwrap();
            s.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").unwrap();
            // Hold the socket open until the client gives up.
            while let Ok(n) = s.read(&mut buf) {
                if n == 0 {
                    break;
                }
            }
        });

        let err = Transport::open("127.0.0.1", port, true, Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Tls(_)), "{:?}", err);

        server.join().unwrap();
    }

    #[test]
    fn self_signed_certificate_is_rejected() {
        let cert = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert.cert.der().clone()], key.into())
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut tcp, _) = listener.accept().unwrap();
            let mut conn = rustls::ServerConnection::new(Arc::new(config)).unwrap();
            // The client aborts once it sees the certificate.
            while conn.is_handshaking() {
                if conn.complete_io(&mut tcp).is_err() {
                    break;
                }
            }
            conn.is_handshaking()
        });

        // The certificate matches the address, only the issuer is untrusted.
        let err = Transport::open("127.0.0.1", port, true, Duration::from_secs(5))
            .err()
            .unwrap();
        let Error::Tls(msg) = err else {
            panic!("Expected Error::Tls, got {:?}", err);
        };
        assert!(msg.contains("certificate"), "{}", msg);

        // The server never saw a completed handshake.
        assert!(server.join().unwrap());
    }
}
