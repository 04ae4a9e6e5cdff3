use may::coroutine::JoinHandle;
use may_minihttp::HttpService;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::context::CancellationToken;

/// Wrapper around may_minihttp's HTTP server
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
    shutdown: Option<CancellationToken>,
}

impl ServerHandle {
    /// The bound address
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the address until it accepts connections
    ///
    /// # Errors
    ///
    /// `TimedOut` if the server is not accepting after ~1s (200 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..200 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Cancel in-flight requests cooperatively, then stop the accept loop
    pub fn stop(self) {
        if let Some(token) = &self.shutdown {
            token.cancel();
        }
        info!(addr = %self.addr, "Stopping server");
        // SAFETY: cancelling the accept coroutine is how may tears a server
        // down; the handle is still owned here and joined right after.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the server coroutine exits
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the server coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind and start serving
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        self.start_with_shutdown(addr, None)
    }

    /// Like [`HttpServer::start`]; `shutdown` is cancelled by [`ServerHandle::stop`]
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub fn start_with_shutdown<A: ToSocketAddrs>(
        self,
        addr: A,
        shutdown: Option<CancellationToken>,
    ) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = may_minihttp::HttpServer(self.0).start(addr)?;
        info!(addr = %addr, "HTTP server listening");
        Ok(ServerHandle {
            addr,
            handle,
            shutdown,
        })
    }
}
