//! TCP utilities for low-latency request/reply.
//!
//! # Safety
//!
//! Setting `TCP_NODELAY` borrows the raw file descriptor/socket of a compio
//! stream through `socket2`. The borrowed handle is forgotten afterwards so
//! ownership stays with the stream.

#![allow(unsafe_code)]

use compio::net::{TcpListener, TcpStream};
use std::io;
use std::net::SocketAddr;
use tracing::trace;

/// Enable TCP_NODELAY on a compio TcpStream.
///
/// Request/reply traffic is a chain of small frames, so Nagle's algorithm
/// only adds latency.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        // SAFETY: fd is owned by `stream`, which outlives this call; the
        // temporary socket is forgotten so the fd is not closed twice.
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        let result = sock.set_nodelay(true);
        std::mem::forget(sock);
        result
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        // SAFETY: as above, the socket handle stays owned by `stream`.
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        let result = sock.set_nodelay(true);
        std::mem::forget(sock);
        result
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = stream;
        Ok(())
    }
}

/// Bind a TCP listener.
pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    trace!(%addr, "[tcp] Listener bound");
    Ok(listener)
}

/// Connect to a TCP endpoint with `TCP_NODELAY` enabled.
pub async fn connect(addr: SocketAddr) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    enable_tcp_nodelay(&stream)?;
    Ok(stream)
}

/// Accept a connection with `TCP_NODELAY` enabled.
pub async fn accept(listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
    let (stream, peer) = listener.accept().await?;
    enable_tcp_nodelay(&stream)?;
    Ok((stream, peer))
}
