// SPDX-License-Identifier: MIT
//! Length-prefixed JSON-RPC 2.0 channel over a child process's stdio.
//!
//! Grounded on the reader-loop/pending-map pattern common to async LSP
//! clients: one background task owns the read half and demultiplexes
//! responses to outstanding requests via a `oneshot` channel keyed by the
//! numeric request id, while server-initiated requests are answered inline
//! according to `Settings`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, trace, warn};

use crate::config::Settings;
use crate::lsp::model::RpcMessage;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, Value>>>>>;

/// A live JSON-RPC channel to one LSP server subprocess (or, in tests, any
/// other duplex-style transport).
pub struct RpcChannel {
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader_task: tokio::task::JoinHandle<()>,
}

impl RpcChannel {
    /// Spawn the background reader loop over `stdout`, answering
    /// server-initiated requests per `settings`/`configuration` as they
    /// arrive. The returned `oneshot::Receiver` fires once, the moment the
    /// reader loop observes EOF or a transport error on `stdout` — it never
    /// fires on a graceful [`RpcChannel::close`].
    pub fn new<R, W>(
        stdin: W,
        stdout: R,
        settings: Settings,
        configuration: Option<Value>,
    ) -> (Self, oneshot::Receiver<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>> =
            Arc::new(Mutex::new(Box::new(stdin)));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (exit_tx, exit_rx) = oneshot::channel();

        let reader_task = tokio::spawn(reader_loop(
            stdout,
            pending.clone(),
            writer.clone(),
            settings,
            configuration,
            exit_tx,
        ));

        (
            Self {
                writer,
                pending,
                next_id: AtomicU64::new(1),
                reader_task,
            },
            exit_rx,
        )
    }

    /// Send a JSON-RPC request and await its response. The server's
    /// `error` object, if any, is returned as `Err`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let msg = RpcMessage::request(id, method, params);
        if let Err(e) = write_message(&self.writer, &msg).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(anyhow!("LSP error response for {method}: {error}")),
            Err(_) => Err(anyhow!("channel closed while awaiting response to {method}")),
        }
    }

    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let msg = RpcMessage::notification(method, params);
        write_message(&self.writer, &msg).await
    }

    /// Tear down the channel: stop the reader loop and drop the write half,
    /// which closes the child's stdin.
    pub async fn close(self) {
        self.reader_task.abort();
        let mut pending = self.pending.lock().await;
        pending.clear();
    }
}

async fn write_message(
    writer: &Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    msg: &RpcMessage,
) -> Result<()> {
    let body = serde_json::to_vec(msg).context("serializing JSON-RPC message")?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut w = writer.lock().await;
    w.write_all(header.as_bytes())
        .await
        .context("writing LSP frame header")?;
    w.write_all(&body).await.context("writing LSP frame body")?;
    w.flush().await.context("flushing LSP stdin")?;
    Ok(())
}

async fn reader_loop<R>(
    stdout: R,
    pending: PendingMap,
    writer: Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    settings: Settings,
    configuration: Option<Value>,
    exit_tx: oneshot::Sender<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(bytes)) => {
                let msg: RpcMessage = match serde_json::from_slice(&bytes) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "malformed JSON-RPC frame from LSP server, dropping");
                        continue;
                    }
                };
                if msg.is_response() {
                    if let Some(id) = msg.id_as_u64() {
                        if let Some(tx) = pending.lock().await.remove(&id) {
                            let result = match msg.error {
                                Some(e) => Err(e),
                                None => Ok(msg.result.unwrap_or(Value::Null)),
                            };
                            let _ = tx.send(result);
                        }
                    }
                } else if msg.is_request() {
                    handle_server_request(&writer, &msg, &settings, &configuration).await;
                } else {
                    trace!(method = ?msg.method, "ignoring server notification");
                }
            }
            Ok(None) => {
                debug!("LSP server closed stdout, ending reader loop");
                break;
            }
            Err(e) => {
                warn!(error = %e, "transport error reading from LSP server, ending reader loop");
                break;
            }
        }
    }

    // Fail any request still awaiting a response rather than leaving its
    // caller parked on a oneshot that will now never resolve.
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(json!({"code": -32000, "message": "LSP transport closed"})));
    }
    let _ = exit_tx.send(());
}

/// Answer the handful of server-initiated requests the bridge models,
/// per spec.md §4.B. Requests outside this set are left unanswered — the
/// server will time out on its own, which is the LSP default behavior.
async fn handle_server_request(
    writer: &Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    msg: &RpcMessage,
    settings: &Settings,
    configuration: &Option<Value>,
) {
    let id = match &msg.id {
        Some(id) => id.clone(),
        None => return,
    };
    let method = msg.method.as_deref().unwrap_or("");

    let result = match method {
        "workspace/configuration" if settings.configuration_request => {
            let value = configuration.clone().unwrap_or_else(|| Value::Object(Default::default()));
            Some(Value::Array(vec![value]))
        }
        "window/showMessageRequest" if !settings.message_request => Some(Value::Null),
        "client/registerCapability" | "client/unregisterCapability"
            if !settings.registration_request =>
        {
            Some(Value::Object(Default::default()))
        }
        _ => None,
    };

    if let Some(result) = result {
        let response = RpcMessage::response(id, result);
        if let Err(e) = write_message(writer, &response).await {
            warn!(error = %e, method, "failed to answer server-initiated request");
        }
    }
}

/// Read one `Content-Length`-framed message. Returns `Ok(None)` on clean EOF.
async fn read_frame<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<Option<Vec<u8>>> {
    use tokio::io::AsyncBufReadExt;

    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .context("reading LSP frame header line")?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = Some(
                value
                    .trim()
                    .parse()
                    .context("parsing Content-Length header")?,
            );
        }
    }

    let len = content_length.ok_or_else(|| anyhow!("LSP frame missing Content-Length header"))?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("reading LSP frame body")?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_frame_parses_header_and_body() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let mut input = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        input.extend_from_slice(body);
        let mut reader = BufReader::new(&input[..]);
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame, body);
    }

    #[tokio::test]
    async fn read_frame_returns_none_on_eof() {
        let input: &[u8] = b"";
        let mut reader = BufReader::new(input);
        let frame = read_frame(&mut reader).await.unwrap();
        assert!(frame.is_none());
    }

    /// A fake LSP server standing in for the real subprocess: one end of an
    /// in-memory duplex stream, driven directly with `read_frame`/
    /// `write_message` instead of spawning a real language server.
    fn fake_server(stream: tokio::io::DuplexStream) -> (BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>, Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>) {
        let (read, write) = tokio::io::split(stream);
        (BufReader::new(read), Arc::new(Mutex::new(Box::new(write))))
    }

    #[tokio::test]
    async fn initialize_round_trip_returns_server_capabilities() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (channel, _exit_rx) =
            RpcChannel::new(client_write, client_read, Settings::default(), None);
        let (mut server_reader, server_writer) = fake_server(server);

        let server_task = tokio::spawn(async move {
            let frame = read_frame(&mut server_reader).await.unwrap().unwrap();
            let request: RpcMessage = serde_json::from_slice(&frame).unwrap();
            assert_eq!(request.method.as_deref(), Some("initialize"));
            let response = RpcMessage::response(
                request.id.unwrap(),
                json!({"capabilities": {"hoverProvider": true}}),
            );
            write_message(&server_writer, &response).await.unwrap();
        });

        let result = channel.request("initialize", json!({})).await.unwrap();
        assert_eq!(result["capabilities"]["hoverProvider"], json!(true));
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn workspace_configuration_request_replies_with_configured_mapping() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let settings = Settings {
            configuration_request: true,
            ..Settings::default()
        };
        let configuration = json!({"pythonPath": "/usr/bin/python3"});
        let (_channel, _exit_rx) =
            RpcChannel::new(client_write, client_read, settings, Some(configuration.clone()));
        let (mut server_reader, server_writer) = fake_server(server);

        let request = RpcMessage::request(1, "workspace/configuration", json!({"items": []}));
        write_message(&server_writer, &request).await.unwrap();

        let frame = read_frame(&mut server_reader).await.unwrap().unwrap();
        let response: RpcMessage = serde_json::from_slice(&frame).unwrap();
        assert_eq!(response.result, Some(json!([configuration])));
    }

    #[tokio::test]
    async fn exit_signal_fires_when_transport_closes() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (_channel, exit_rx) =
            RpcChannel::new(client_write, client_read, Settings::default(), None);
        drop(server);
        exit_rx.await.expect("exit signal should fire once the transport closes");
    }

    #[tokio::test]
    async fn pending_request_fails_instead_of_hanging_when_transport_closes() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (channel, _exit_rx) =
            RpcChannel::new(client_write, client_read, Settings::default(), None);
        drop(server);
        let result = channel.request("initialize", json!({})).await;
        assert!(result.is_err());
    }
}
