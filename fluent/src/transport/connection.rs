/**
 * Socket connection to the fluentd server.
 *
 * Blocking I/O is fine here: only the worker's writer thread ever touches
 * the connection, and posting threads never wait on it.
 */
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use super::config::Network;
use crate::protocol::constants::{CONNECT_TIMEOUT, WRITE_TIMEOUT};

pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /**
     * Connects to the server and applies the write timeout.
     *
     * # Arguments
     * * `network` - TCP or Unix domain socket
     * * `address` - `host:port` for TCP (every resolved address is tried),
     *   a socket path for Unix
     *
     * # Returns
     * The open connection, or the last connect error.
     */
    pub fn open(network: Network, address: &str) -> io::Result<Self> {
        match network {
            Network::Tcp => connect_tcp(address).map(Connection::Tcp),
            Network::Unix => {
                #[cfg(unix)]
                {
                    let stream = UnixStream::connect(address)?;
                    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                    Ok(Connection::Unix(stream))
                }
                #[cfg(not(unix))]
                {
                    Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "unix domain sockets are not supported on this platform",
                    ))
                }
            }
        }
    }
}

/// Tries every resolved address in turn; returns the last failure.
fn connect_tcp(address: &str) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{address} did not resolve to any socket address"),
        )
    }))
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Connection::Unix(stream) => stream.flush(),
        }
    }
}
