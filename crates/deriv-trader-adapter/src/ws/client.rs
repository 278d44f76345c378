/*
[INPUT]:  Endpoint configuration, API token, request payloads
[OUTPUT]: Authorized session with correlated request/response calls
[POS]:    WebSocket layer - connection lifecycle and request correlation
[UPDATE]: When adding new calls or changing connection logic
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DerivError, Result};
use crate::types::{
    AccountInfo, AuthorizeRequest, BalanceInfo, BalanceRequest, BuyConfirmation, BuyRequest,
    ContractType, PingRequest,
};

use super::message::{self, REQ_ID_FIELD, StreamMessage};

const DEFAULT_ENDPOINT: &str = "wss://ws.binaryws.com/websockets/v3";
const DEFAULT_APP_ID: u32 = 1089;
const DEFAULT_CURRENCY: &str = "USD";
const OUTBOUND_BUFFER: usize = 100;
const STREAM_BUFFER: usize = 100;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<std::sync::Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Socket endpoint without the `app_id` query parameter
    pub endpoint: String,
    pub app_id: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id: DEFAULT_APP_ID,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Full socket URL; an `app_id` already present in `endpoint` wins
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        if !url.query_pairs().any(|(key, _)| key == "app_id") {
            url.query_pairs_mut()
                .append_pair("app_id", &self.app_id.to_string());
        }
        Ok(url)
    }
}

/// State owned by one open socket
#[derive(Debug, Clone)]
struct ConnectionHandle {
    id: u64,
    outbound: mpsc::Sender<WsMessage>,
    pending: PendingMap,
    shutdown: CancellationToken,
    balance_subscribed: Arc<AtomicBool>,
    account: Arc<OnceLock<AccountInfo>>,
}

impl ConnectionHandle {
    fn currency(&self) -> &str {
        self.account
            .get()
            .map(|account| account.currency.as_str())
            .filter(|currency| !currency.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
    }
}

/// Removes a pending entry when the waiting request finishes or is dropped
struct PendingGuard {
    pending: PendingMap,
    req_id: u64,
}

impl PendingGuard {
    fn register(pending: &PendingMap, req_id: u64, reply_tx: oneshot::Sender<Value>) -> Self {
        pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(req_id, reply_tx);
        Self {
            pending: pending.clone(),
            req_id,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.req_id);
    }
}

/// Session with the Deriv WebSocket API
///
/// Each request is stamped with a fresh `req_id` and matched to the reply
/// echoing it, so calls may run concurrently and replies may arrive in any
/// order. Envelopes matching no request go to the stream receiver.
#[derive(Debug)]
pub struct DerivClient {
    config: ClientConfig,
    connection: Arc<Mutex<Option<ConnectionHandle>>>,
    next_req_id: AtomicU64,
    next_connection_id: AtomicU64,
    stream_tx: mpsc::Sender<StreamMessage>,
    stream_rx: Option<mpsc::Receiver<StreamMessage>>,
}

impl DerivClient {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        let (stream_tx, stream_rx) = mpsc::channel(STREAM_BUFFER);
        Self {
            config,
            connection: Arc::new(Mutex::new(None)),
            next_req_id: AtomicU64::new(1),
            next_connection_id: AtomicU64::new(1),
            stream_tx,
            stream_rx: Some(stream_rx),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receiver for envelopes that matched no request (subscription pushes)
    pub fn take_receiver(&mut self) -> Option<mpsc::Receiver<StreamMessage>> {
        self.stream_rx.take()
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Account details from the last successful authorization
    pub async fn account(&self) -> Option<AccountInfo> {
        let guard = self.connection.lock().await;
        guard.as_ref().and_then(|handle| handle.account.get().cloned())
    }

    /// Open the socket and authorize it with `token`
    ///
    /// An existing connection is closed first. On failure no connection is
    /// left open.
    pub async fn connect(&self, token: &str) -> Result<AccountInfo> {
        if self.disconnect().await {
            info!("closed previous connection before reconnecting");
        }

        let url = self.config.url()?;
        info!(host = url.host_str().unwrap_or_default(), "ws connecting");

        let (ws_stream, _response) =
            tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| {
                    DerivError::connection(format!(
                        "connect timed out after {}ms",
                        self.config.connect_timeout.as_millis()
                    ))
                })?
                .map_err(|err| DerivError::connection(err.to_string()))?;

        let handle = self.attach(ws_stream);

        let authorized = match serde_json::to_value(AuthorizeRequest::new(token)) {
            Ok(payload) => self
                .exchange(&handle, payload, None)
                .await
                .and_then(|envelope| message::extract::<AccountInfo>(envelope, "authorize")),
            Err(err) => Err(err.into()),
        };

        match authorized {
            Ok(account) => {
                info!(
                    connection_id = handle.id,
                    loginid = %account.loginid,
                    currency = %account.currency,
                    "ws authorized"
                );
                let _ = handle.account.set(account.clone());
                self.publish(handle).await?;
                Ok(account)
            }
            Err(err) => {
                warn!(connection_id = handle.id, error = %err, "ws authorization failed");
                handle.shutdown.cancel();
                Err(err.into_connection_error())
            }
        }
    }

    /// Close the socket; returns whether one was open
    pub async fn disconnect(&self) -> bool {
        let handle = self.connection.lock().await.take();
        match handle {
            Some(handle) => {
                handle.shutdown.cancel();
                debug!(connection_id = handle.id, "ws disconnect requested");
                true
            }
            None => false,
        }
    }

    /// Send `payload` and wait for the reply carrying the same `req_id`
    pub async fn request(&self, payload: Value) -> Result<Value> {
        let handle = self.current_connection().await?;
        self.exchange(&handle, payload, None).await
    }

    /// Like [`request`](Self::request), ending early when `cancel` fires
    pub async fn request_with_cancel(
        &self,
        payload: Value,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let handle = self.current_connection().await?;
        self.exchange(&handle, payload, Some(cancel)).await
    }

    /// Current account balance
    pub async fn get_balance(&self) -> Result<Decimal> {
        Ok(self.balance_info().await?.balance)
    }

    /// Balance with currency and subscription id
    ///
    /// The first call on a connection subscribes to balance updates; those
    /// pushes are delivered to the stream receiver.
    pub async fn balance_info(&self) -> Result<BalanceInfo> {
        let handle = self.current_connection().await?;
        let subscribe = !handle.balance_subscribed.swap(true, Ordering::SeqCst);
        let payload = serde_json::to_value(BalanceRequest::new(subscribe))?;

        let envelope = match self.exchange(&handle, payload, None).await {
            Ok(envelope) => envelope,
            Err(err) => {
                if subscribe {
                    handle.balance_subscribed.store(false, Ordering::SeqCst);
                }
                return Err(err);
            }
        };
        message::extract(envelope, "balance")
    }

    /// Buy a stake-basis contract running for 60 seconds
    pub async fn open_order(
        &self,
        symbol: &str,
        amount: Decimal,
        contract_type: ContractType,
    ) -> Result<BuyConfirmation> {
        let handle = self.current_connection().await?;
        let request = BuyRequest::stake(symbol, amount, contract_type, handle.currency());
        let payload = serde_json::to_value(&request)?;

        let envelope = self.exchange(&handle, payload, None).await?;
        let confirmation: BuyConfirmation = message::extract(envelope, "buy")?;
        info!(
            symbol,
            contract_type = %contract_type,
            amount = %amount,
            contract_id = %confirmation.contract_id,
            "order opened"
        );
        Ok(confirmation)
    }

    pub async fn ping(&self) -> Result<()> {
        let handle = self.current_connection().await?;
        let payload = serde_json::to_value(PingRequest::default())?;
        let reply: String = message::extract(self.exchange(&handle, payload, None).await?, "ping")?;
        if reply != "pong" {
            return Err(DerivError::InvalidResponse(format!("unexpected ping reply: {reply}")));
        }
        Ok(())
    }

    async fn current_connection(&self) -> Result<ConnectionHandle> {
        let guard = self.connection.lock().await;
        guard.clone().ok_or(DerivError::NotConnected)
    }

    async fn exchange(
        &self,
        handle: &ConnectionHandle,
        payload: Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value> {
        let Value::Object(mut body) = payload else {
            return Err(DerivError::InvalidRequest(
                "payload must be a JSON object".to_string(),
            ));
        };
        let kind = body.keys().next().cloned().unwrap_or_default();
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        body.insert(REQ_ID_FIELD.to_string(), Value::from(req_id));
        let text = Value::Object(body).to_string();

        let (reply_tx, reply_rx) = oneshot::channel();
        let _pending = PendingGuard::register(&handle.pending, req_id, reply_tx);

        let round_trip = async {
            handle
                .outbound
                .send(WsMessage::Text(text.into()))
                .await
                .map_err(|_| DerivError::connection("connection closed"))?;
            debug!(connection_id = handle.id, req_id, kind = %kind, "ws request sent");
            reply_rx
                .await
                .map_err(|_| DerivError::connection("connection closed before reply"))
        };

        let waited =
            tokio::time::timeout(self.config.request_timeout, cancellable(round_trip, cancel))
                .await;
        let envelope = match waited {
            Ok(result) => result?,
            Err(_) => {
                warn!(connection_id = handle.id, req_id, kind = %kind, "ws request timed out");
                return Err(DerivError::timeout(self.config.request_timeout));
            }
        };
        debug!(connection_id = handle.id, req_id, kind = %kind, "ws reply received");
        message::into_reply(envelope)
    }

    /// Spawn the I/O task; the handle stays private until [`publish`](Self::publish)
    fn attach(&self, ws_stream: WsStream) -> ConnectionHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let handle = ConnectionHandle {
            id: self.next_connection_id.fetch_add(1, Ordering::Relaxed),
            outbound: outbound_tx,
            pending: Arc::new(std::sync::Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            balance_subscribed: Arc::new(AtomicBool::new(false)),
            account: Arc::new(OnceLock::new()),
        };

        tokio::spawn(run_connection(
            ws_stream,
            outbound_rx,
            handle.id,
            handle.pending.clone(),
            handle.shutdown.clone(),
            self.stream_tx.clone(),
            self.connection.clone(),
        ));

        info!(connection_id = handle.id, "ws connected");
        handle
    }

    /// Make an authorized handle the current connection
    ///
    /// A handle whose I/O task already exited is not published. A connection
    /// published by a concurrent `connect` in the meantime is closed.
    async fn publish(&self, handle: ConnectionHandle) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if handle.outbound.is_closed() {
            return Err(DerivError::connection("connection closed during authorization"));
        }
        if let Some(previous) = slot.replace(handle) {
            previous.shutdown.cancel();
            debug!(connection_id = previous.id, "ws connection superseded");
        }
        Ok(())
    }
}

impl Default for DerivClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancellable<F>(work: F, cancel: Option<&CancellationToken>) -> Result<Value>
where
    F: Future<Output = Result<Value>>,
{
    match cancel {
        Some(cancel) => tokio::select! {
            _ = cancel.cancelled() => Err(DerivError::Cancelled),
            result = work => result,
        },
        None => work.await,
    }
}

/// Socket I/O loop for one connection
async fn run_connection(
    ws_stream: WsStream,
    mut outbound_rx: mpsc::Receiver<WsMessage>,
    connection_id: u64,
    pending: PendingMap,
    shutdown: CancellationToken,
    stream_tx: mpsc::Sender<StreamMessage>,
    slot: Arc<Mutex<Option<ConnectionHandle>>>,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(WsMessage::Close(None)).await;
                break;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        if let Err(err) = write.send(message).await {
                            warn!(connection_id, error = %err, "ws send failed");
                            break;
                        }
                    }
                    None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(connection_id, frame = ?frame, "ws closed by remote");
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(message)) => route_inbound(message, &pending, &stream_tx),
                    Some(Err(err)) => {
                        warn!(connection_id, error = %err, "ws read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Close the outbound queue first so late requests fail on send instead
    // of registering after the drain below.
    drop(outbound_rx);
    {
        let mut guard = slot.lock().await;
        if guard.as_ref().is_some_and(|handle| handle.id == connection_id) {
            *guard = None;
        }
    }
    let abandoned = {
        let mut map = pending.lock().unwrap_or_else(PoisonError::into_inner);
        let count = map.len();
        // Dropping the senders wakes each waiter with a connection error.
        map.clear();
        count
    };
    info!(connection_id, abandoned, "ws connection closed");
}

fn route_inbound(
    message: WsMessage,
    pending: &PendingMap,
    stream_tx: &mpsc::Sender<StreamMessage>,
) {
    let text = match message {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(err) => {
                debug!(bytes = bytes.len(), error = %err, "ws binary frame is not utf-8, dropped");
                return;
            }
        },
        _ => return,
    };

    let envelope: Value = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(err) => {
            log_parse_fail_once(&err, &text);
            return;
        }
    };

    if let Some(req_id) = message::correlation_id(&envelope) {
        let waiter = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&req_id);
        if let Some(waiter) = waiter {
            if waiter.send(envelope).is_err() {
                debug!(req_id, "ws reply arrived after caller gave up");
            }
            return;
        }
    }

    let message = StreamMessage::from_envelope(envelope);
    if let Err(err) = stream_tx.try_send(message) {
        debug!(error = %err, "ws stream message dropped");
    }
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            message = %preview,
            "ws message parse failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
