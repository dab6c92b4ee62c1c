//! HTTP server for the diagnostic endpoints.
//!
//! Accepts connections, serves each one with hyper's HTTP/1.1 connection
//! driver on its own task, and dispatches requests to the handlers.
//! Shutdown is driven through a [`ShutdownHandle`].

use crate::config::Config;
use crate::handlers::{self, AppState};
use crate::lifecycle::{ExitAfterResponse, ExitLatch, ProcessExit, ShutdownHandle, Terminator};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Server instance
pub struct Server {
    config: Config,
    state: Arc<AppState>,
    shutdown: ShutdownHandle,
    terminator: Arc<dyn Terminator>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self::with_terminator(config, Arc::new(ProcessExit))
    }

    /// Create a server that ends the process through `terminator`.
    pub fn with_terminator(config: Config, terminator: Arc<dyn Terminator>) -> Self {
        let state = Arc::new(AppState::new(&config));

        Server {
            config,
            state,
            shutdown: ShutdownHandle::new(),
            terminator,
        }
    }

    /// Handle for requesting a graceful shutdown of this server.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let addr = tokio::net::lookup_host(&self.config.listen)
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no address for '{}'", self.config.listen),
                )
            })?;

        let listener = TcpListener::from_std(create_listener(addr)?)?;
        info!(address = %listener.local_addr()?, "Server listening");
        Ok(listener)
    }

    /// Bind and serve until shutdown is requested.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                error!(address = %self.config.listen, error = %e, "Failed to bind listener");
                return Err(e.into());
            }
        };

        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown is requested, then
    /// drain in-flight requests for up to the configured grace period.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "New connection");
                        self.spawn_connection(stream, peer, &graceful);
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                _ = self.shutdown.wait() => break,
            }
        }

        drop(listener);
        info!("Stopped accepting connections, draining in-flight requests");

        let grace = Duration::from_secs(self.config.shutdown_grace);
        tokio::select! {
            _ = graceful.shutdown() => info!("All connections closed"),
            _ = tokio::time::sleep(grace) => {
                warn!(grace_secs = grace.as_secs(), "Grace period elapsed with connections still open");
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, graceful: &GracefulShutdown) {
        let latch = ExitLatch::default();
        let terminator = Arc::clone(&self.terminator);

        let service = {
            let state = Arc::clone(&self.state);
            let latch = latch.clone();
            service_fn(move |req: Request<Incoming>| {
                let state = Arc::clone(&state);
                let latch = latch.clone();
                async move {
                    let method = req.method().clone();
                    let path = req.uri().path().to_string();
                    let started = Instant::now();

                    let response = handlers::dispatch(&state, req).await;

                    if let Some(exit) = response.extensions().get::<ExitAfterResponse>() {
                        latch.arm(exit.status);
                    }

                    info!(
                        method = %method,
                        path = %path,
                        status = response.status().as_u16(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Request handled"
                    );
                    Ok::<_, Infallible>(response)
                }
            })
        };

        let conn = http1::Builder::new()
            .keep_alive(true)
            .serve_connection(TokioIo::new(stream), service);
        let conn = graceful.watch(conn);

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(peer = %peer, error = %e, "Connection error");
            }

            // The connection future only resolves after the response was
            // written and the socket closed.
            if let Some(status) = latch.armed() {
                warn!(peer = %peer, status, "Terminating process");
                terminator.terminate(status);
            }
        });
    }
}

/// Create a TCP listener with SO_REUSEADDR so restarts can rebind at once.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    type ServeResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

    struct RecordingTerminator(mpsc::UnboundedSender<i32>);

    impl Terminator for RecordingTerminator {
        fn terminate(&self, status: i32) {
            let _ = self.0.send(status);
        }
    }

    struct TestServer {
        addr: SocketAddr,
        shutdown: ShutdownHandle,
        task: JoinHandle<ServeResult>,
        exits: mpsc::UnboundedReceiver<i32>,
    }

    async fn start() -> TestServer {
        let config = Config {
            listen: "127.0.0.1:0".to_string(),
            shutdown_grace: 5,
            ..Config::default()
        };
        let (tx, exits) = mpsc::unbounded_channel();
        let server = Server::with_terminator(config, Arc::new(RecordingTerminator(tx)));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.serve(listener));

        TestServer {
            addr,
            shutdown,
            task,
            exits,
        }
    }

    /// Send a raw request and read until the server closes the connection.
    async fn exchange(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut buf = Vec::new();
        // A reset counts as "no response"
        let _ = stream.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_echo_over_tcp() {
        let server = start().await;

        let response = exchange(server.addr, &post("/post", "hello")).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("\r\n\r\ngot it\n"), "{response}");

        let response = exchange(
            server.addr,
            "GET /get?query=abc HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");

        let response = exchange(server.addr, &post("/missing", "")).await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_its_connection() {
        let server = start().await;

        let response = exchange(server.addr, &post("/post-panic", "")).await;
        assert!(!response.starts_with("HTTP/1.1"), "{response}");

        let response = exchange(server.addr, &post("/post", "still alive")).await;
        assert!(response.ends_with("got it\n"), "{response}");
    }

    #[tokio::test]
    async fn test_exit_terminates_after_response_is_flushed() {
        let mut server = start().await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(post("/post-exit", "").as_bytes())
            .await
            .unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), server.exits.recv())
            .await
            .unwrap();
        assert_eq!(status, Some(1));

        // By the time the terminator ran, the whole response was on the wire
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        let response = String::from_utf8_lossy(&buf);
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("server shutting down...\n"), "{response}");
    }

    #[tokio::test]
    async fn test_graceful_shutdown_drains_in_flight_requests() {
        let server = start().await;

        let in_flight = {
            let addr = server.addr;
            tokio::spawn(async move { exchange(addr, &post("/post/delay/1", "")).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        server.shutdown.shutdown();

        let response = in_flight.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("Response after 1s\n"), "{response}");

        tokio::time::timeout(Duration::from_secs(5), server.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(TcpStream::connect(server.addr).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_rejects_unresolvable_address() {
        let config = Config {
            listen: "not an address".to_string(),
            ..Config::default()
        };
        let server = Server::new(config);
        assert!(server.bind().await.is_err());
    }
}
