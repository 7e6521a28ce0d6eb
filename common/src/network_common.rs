use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::messages_common::Envelope;

/// Path of the game socket on the server.
pub const SOCKET_PATH: &str = "/ws";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("origin `{0}` has no host")]
    InvalidOrigin(String),
    #[error("invalid socket url: {0}")]
    Url(#[from] url::ParseError),
    #[error("could not start the connection worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Whether the origin the client was started for is served securely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScheme {
    Secure,
    Insecure,
}

impl PageScheme {
    pub fn of(origin: &Url) -> Self {
        if origin.scheme() == "https" {
            PageScheme::Secure
        } else {
            PageScheme::Insecure
        }
    }

    pub fn socket_scheme(&self) -> &'static str {
        match self {
            PageScheme::Secure => "wss",
            PageScheme::Insecure => "ws",
        }
    }
}

/// Builds the socket endpoint for an origin.
///
/// # Arguments
/// * `origin` - The `http(s)://host[:port]` the client belongs to.
///
/// # Returns
/// * `Ok(url)` - `wss://host[:port]/ws` for https origins, `ws://host[:port]/ws` otherwise.
/// * `Err(TransportError::InvalidOrigin)` - The origin has no host.
///
pub fn socket_url(origin: &Url) -> Result<Url, TransportError> {
    let host = origin
        .host_str()
        .ok_or_else(|| TransportError::InvalidOrigin(origin.to_string()))?;
    let authority = match origin.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let scheme = PageScheme::of(origin).socket_scheme();
    Ok(Url::parse(&format!("{}://{}{}", scheme, authority, SOCKET_PATH))?)
}

/// What the connection reports back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    /// any termination, including a failed connect
    Closed,
    Message(Envelope),
}

enum Command {
    Send(Envelope),
    Close,
}

/// The single connection to the game server.
///
/// The socket lives on a worker thread; events are picked up with
/// [`Transport::poll`] from whatever loop drives the session. Dropping the
/// transport closes the connection.
pub struct Transport {
    url: Url,
    events: Mutex<UnboundedReceiver<TransportEvent>>,
    commands: UnboundedSender<Command>,
}

impl Transport {
    /// Starts connecting to the server behind `origin`.
    ///
    /// # Arguments
    /// * `origin` - The origin the client belongs to, decides between `ws` and `wss`.
    ///
    /// # Returns
    /// * `Ok(transport)` - The connection is being established, watch for `Opened` or `Closed`.
    /// * `Err(e)` - The origin is unusable or the worker could not be started.
    ///
    pub fn connect(origin: &Url) -> Result<Transport, TransportError> {
        let url = socket_url(origin)?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let worker_url = url.clone();
        thread::Builder::new()
            .name("transport".to_string())
            .spawn(move || run_worker(worker_url, event_tx, command_rx))?;

        Ok(Transport {
            url,
            events: Mutex::new(event_rx),
            commands: command_tx,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Takes the next pending event without blocking.
    pub fn poll(&self) -> Option<TransportEvent> {
        self.events.lock().try_recv().ok()
    }

    /// Takes every pending event, oldest first.
    pub fn drain(&self) -> Vec<TransportEvent> {
        std::iter::from_fn(|| self.poll()).collect()
    }

    /// Queues an envelope for the server. Fire and forget, nothing is
    /// reported if the connection is already gone.
    pub fn send(&self, envelope: Envelope) {
        let event = envelope.event.clone();
        if self.commands.send(Command::Send(envelope)).is_err() {
            debug!("Connection is gone, dropping outgoing `{}`", event);
        }
    }

    /// Asks the worker to send a close frame and stop. `Closed` still
    /// arrives through `poll`/`drain` once the worker is done. Dropping the
    /// transport has the same effect without the event.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

fn run_worker(url: Url, events: UnboundedSender<TransportEvent>, commands: UnboundedReceiver<Command>) {
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(run_connection(&url, &events, commands)),
        Err(e) => error!("Could not start runtime for {}: {}", url, e),
    }
    let _ = events.send(TransportEvent::Closed);
}

async fn run_connection(
    url: &Url,
    events: &UnboundedSender<TransportEvent>,
    mut commands: UnboundedReceiver<Command>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!("Could not connect to {}: {}", url, e);
            return;
        }
    };
    info!("Connected to {}", url);
    if events.send(TransportEvent::Opened).is_err() {
        return;
    }

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match Envelope::from_frame(&text) {
                    Ok(envelope) => {
                        debug!("RCV: {}", text);
                        if events.send(TransportEvent::Message(envelope)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping frame {:?}: {}", text, e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Connection to {} failed: {}", url, e);
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send(envelope)) => match envelope.to_frame() {
                    Ok(frame) => {
                        debug!("SND: {}", frame);
                        if let Err(e) = write.send(Message::Text(frame)).await {
                            warn!("Could not send to {}: {}", url, e);
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping outgoing `{}`: {}", envelope.event, e),
                },
                Some(Command::Close) | None => {
                    let _ = write.close().await;
                    break;
                }
            },
        }
    }
    info!("Disconnected from {}", url);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_for(origin: &str) -> String {
        socket_url(&Url::parse(origin).unwrap()).unwrap().to_string()
    }

    #[test]
    fn secure_origin_gets_secure_socket() {
        assert_eq!(socket_for("https://battleship.example"), "wss://battleship.example/ws");
        assert_eq!(socket_for("https://battleship.example:8443/lobby?x=1"), "wss://battleship.example:8443/ws");
    }

    #[test]
    fn insecure_origin_gets_plain_socket() {
        assert_eq!(socket_for("http://127.0.0.1:8000"), "ws://127.0.0.1:8000/ws");
        assert_eq!(socket_for("http://localhost"), "ws://localhost/ws");
        assert_eq!(socket_for("http://[::1]:8000/"), "ws://[::1]:8000/ws");
    }

    #[test]
    fn explicit_ports_are_kept_verbatim() {
        // default port of the other scheme is not special
        assert_eq!(socket_for("https://host:80"), "wss://host:80/ws");
        assert_eq!(socket_for("http://host:443"), "ws://host:443/ws");
    }

    #[test]
    fn scheme_follows_origin_exactly() {
        let cases = [
            ("https", PageScheme::Secure, "wss"),
            ("http", PageScheme::Insecure, "ws"),
            ("ftp", PageScheme::Insecure, "ws"),
        ];
        for (scheme, page, socket) in cases {
            let origin = Url::parse(&format!("{}://game.test", scheme)).unwrap();
            assert_eq!(PageScheme::of(&origin), page);
            assert_eq!(page.socket_scheme(), socket);
            assert_eq!(socket_url(&origin).unwrap().scheme(), socket);
        }
    }

    #[test]
    fn origin_without_host_is_rejected() {
        let origin = Url::parse("data:text/plain,battleship").unwrap();
        assert!(matches!(socket_url(&origin), Err(TransportError::InvalidOrigin(_))));
    }
}
