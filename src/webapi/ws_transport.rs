//! WebSocket Transport
//!
//! tokio-tungstenite implementation of `Transport`. `open` spawns a
//! connection task on the runtime captured at construction; frames queue
//! on an unbounded channel so `send` never blocks the caller.

use std::sync::{Arc, Mutex, RwLock, Weak};

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::traits::{Transport, TransportListener};

enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

pub struct WsTransport {
    runtime: Handle,
    listener: RwLock<Option<Weak<dyn TransportListener>>>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Outgoing>>>,
}

impl WsTransport {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| anyhow!("WsTransport needs a tokio runtime: {}", e))?;
        Ok(Arc::new(Self::with_handle(runtime)))
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            listener: RwLock::new(None),
            outgoing: Mutex::new(None),
        }
    }

    fn outgoing(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Outgoing>>> {
        self.outgoing.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for WsTransport {
    fn bind(&self, listener: Weak<dyn TransportListener>) {
        *self.listener.write().unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    fn open(&self, host: &str) -> Result<()> {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| anyhow!("no listener bound"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut outgoing = self.outgoing();
            if outgoing.as_ref().is_some_and(|tx| !tx.is_closed()) {
                bail!("connection already open");
            }
            *outgoing = Some(tx);
        }

        self.runtime.spawn(run_connection(host.to_string(), listener, rx));
        Ok(())
    }

    fn send(&self, payload: Vec<u8>) -> Result<()> {
        let outgoing = self.outgoing();
        let tx = outgoing.as_ref().ok_or_else(|| anyhow!("not connected"))?;
        tx.send(Outgoing::Frame(payload))
            .map_err(|_| anyhow!("connection task has stopped"))
    }

    fn close(&self) {
        if let Some(tx) = self.outgoing().take() {
            let _ = tx.send(Outgoing::Close);
        }
    }
}

async fn run_connection(
    url: String,
    listener: Weak<dyn TransportListener>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    info!("[WS] Connecting to {}", url);
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            error!("[WS] Connect failed: {}", e);
            if let Some(l) = listener.upgrade() {
                l.on_error(&format!("connect failed: {}", e));
            }
            return;
        }
    };

    info!("[WS] Connected");
    match listener.upgrade() {
        Some(l) => l.on_opened(),
        None => return,
    }

    let (mut write, mut read) = ws_stream.split();

    // None = orderly close, Some = failure reason
    let failure = loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(Outgoing::Frame(bytes)) => {
                    debug!("[WS] Sending {} bytes", bytes.len());
                    if let Err(e) = write.send(Message::Binary(bytes)).await {
                        break Some(format!("send failed: {}", e));
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.close().await;
                    break None;
                }
            },

            msg = read.next() => {
                let payload = match msg {
                    Some(Ok(Message::Binary(bytes))) => bytes,
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!("[WS] Server closed connection: {:?}", frame);
                        break None;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                };
                match listener.upgrade() {
                    Some(l) => l.on_data(&payload),
                    None => break None,
                }
            }
        }
    };

    if let Some(l) = listener.upgrade() {
        match failure {
            Some(reason) => {
                error!("[WS] Connection error: {}", reason);
                l.on_error(&reason);
            }
            None => {
                info!("[WS] Connection closed");
                l.on_closed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nobody;

    impl TransportListener for Nobody {
        fn on_opened(&self) {}
        fn on_closed(&self) {}
        fn on_error(&self, _reason: &str) {}
        fn on_data(&self, _payload: &[u8]) {}
    }

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let transport = WsTransport::new().unwrap();
        assert!(transport.send(vec![1, 2, 3]).is_err());
        transport.close();
    }

    #[tokio::test]
    async fn test_open_requires_listener() {
        let transport = WsTransport::new().unwrap();
        assert!(transport.open("ws://127.0.0.1:1").is_err());

        let listener: Arc<dyn TransportListener> = Arc::new(Nobody);
        transport.bind(Arc::downgrade(&listener));
        assert!(transport.open("ws://127.0.0.1:1").is_ok());
        transport.close();
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(WsTransport::new().is_err());
    }
}
