//! ATT dispatch and notification layer
use super::constants::*;
use super::error::{AttError, AttResult};
use super::message::{AttMessage, OpcodeKind, Role};
use super::packet::OpcodeFlags;
use super::transaction::{Check, TransactionTracker, Violation};
use super::types::{ErrorResponse, ExchangeMtuRequest};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// ATT layer configuration
#[derive(Debug, Clone)]
pub struct AttConfig {
    /// Time allowed for a Response or Confirmation to arrive
    pub response_timeout: Duration,
    /// Receive MTU proposed in Exchange MTU exchanges
    pub rx_mtu: u16,
}

impl Default for AttConfig {
    fn default() -> Self {
        Self {
            response_timeout: ATT_MSG_TIMEOUT,
            rx_mtu: ATT_DEFAULT_MTU,
        }
    }
}

/// Locally generated events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttEvent {
    /// A transaction broke the one-outstanding rule or timed out
    FlowControlViolated {
        connection: u16,
        opcode: u8,
        pending_opcode: u8,
    },
    /// MTU exchange completed
    MtuUpdated { connection: u16, mtu: u16 },
}

impl AttEvent {
    fn violated(connection: u16, violation: Violation) -> Self {
        AttEvent::FlowControlViolated {
            connection,
            opcode: violation.opcode,
            pending_opcode: violation.pending_opcode,
        }
    }
}

/// Upper-layer handler for one role
pub trait AttCallback: Send + Sync {
    /// An ATT PDU with `opcode` was sent on `connection`
    fn notify_tx(&self, connection: u16, opcode: u8);

    /// A PDU routed to this role was received on `connection`
    fn on_message(&self, _connection: u16, _message: &AttMessage) {}
}

/// Event callback. It may call back into the dispatcher.
pub type AttEventCallback = Arc<dyn Fn(&AttEvent) + Send + Sync>;

/// What happened to a received PDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Handed to the callback registered for the role
    Delivered(Role),
    /// Accepted, but no callback is registered for the role
    Unhandled(Role),
    /// Dropped silently
    Dropped,
    /// The request cannot be processed; send this Error Response
    Respond(ErrorResponse),
}

/// A PDU applied to the transaction state but not yet sent.
///
/// Returned by [`AttDispatcher::prepare`].
#[derive(Debug)]
#[must_use]
pub struct PendingTx {
    connection: u16,
    opcode: u8,
    sender: Role,
    bytes: Vec<u8>,
    events: Vec<AttEvent>,
    context: Arc<Mutex<ConnectionAttContext>>,
    previous: ConnectionAttContext,
}

impl PendingTx {
    pub fn connection(&self) -> u16 {
        self.connection
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Encoded PDU
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// ATT state of one connection
#[derive(Debug, Clone)]
pub struct ConnectionAttContext {
    /// Negotiated MTU
    pub mtu: u16,
    /// Transaction state
    pub tracker: TransactionTracker,
    /// MTU we proposed in an outstanding Exchange MTU Request
    proposed_mtu: Option<u16>,
    /// MTU the peer proposed in an Exchange MTU Request we owe a response to
    peer_mtu: Option<u16>,
}

impl ConnectionAttContext {
    fn new() -> Self {
        Self {
            mtu: ATT_DEFAULT_MTU,
            tracker: TransactionTracker::new(),
            proposed_mtu: None,
            peer_mtu: None,
        }
    }
}

/// Negotiated MTU for a client and server proposal
pub fn negotiate_mtu(client_mtu: u16, server_mtu: u16) -> u16 {
    client_mtu.min(server_mtu).clamp(ATT_DEFAULT_MTU, ATT_MAX_MTU)
}

fn read<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes ATT PDUs between connections and the registered server/client handlers.
///
/// Each connection's state lives behind its own mutex, so different
/// connections can be driven from different threads. Callbacks and events are
/// always invoked after that state has been unlocked.
pub struct AttDispatcher {
    config: RwLock<AttConfig>,
    connections: RwLock<HashMap<u16, Arc<Mutex<ConnectionAttContext>>>>,
    server: RwLock<Option<Arc<dyn AttCallback>>>,
    client: RwLock<Option<Arc<dyn AttCallback>>>,
    event_callback: RwLock<Option<AttEventCallback>>,
}

impl Default for AttDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AttDispatcher {
    pub fn new() -> Self {
        Self::with_config(AttConfig::default())
    }

    pub fn with_config(config: AttConfig) -> Self {
        Self {
            config: RwLock::new(config),
            connections: RwLock::new(HashMap::new()),
            server: RwLock::new(None),
            client: RwLock::new(None),
            event_callback: RwLock::new(None),
        }
    }

    /// Set the configuration
    pub fn set_config(&self, config: AttConfig) {
        *write(&self.config) = config;
    }

    /// Get the configuration
    pub fn config(&self) -> AttConfig {
        read(&self.config).clone()
    }

    /// Register the server-role handler, replacing any previous one
    pub fn register_server(&self, callback: Arc<dyn AttCallback>) {
        *write(&self.server) = Some(callback);
    }

    /// Register the client-role handler, replacing any previous one
    pub fn register_client(&self, callback: Arc<dyn AttCallback>) {
        *write(&self.client) = Some(callback);
    }

    /// Set the callback receiving [`AttEvent`]s
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&AttEvent) + Send + Sync + 'static,
    {
        *write(&self.event_callback) = Some(Arc::new(callback));
    }

    fn callback(&self, role: Role) -> Option<Arc<dyn AttCallback>> {
        match role {
            Role::Server => read(&self.server).clone(),
            Role::Client => read(&self.client).clone(),
        }
    }

    fn emit(&self, events: &[AttEvent]) {
        if events.is_empty() {
            return;
        }
        let callback = read(&self.event_callback).clone();
        if let Some(callback) = callback {
            for event in events {
                callback(event);
            }
        }
    }

    fn context(&self, connection: u16) -> AttResult<Arc<Mutex<ConnectionAttContext>>> {
        read(&self.connections)
            .get(&connection)
            .cloned()
            .ok_or(AttError::UnknownConnection(connection))
    }

    /// Create the ATT context for a new connection.
    ///
    /// A context left over for the same handle is replaced.
    pub fn connect(&self, connection: u16) {
        debug!("ATT connection {:#06x} created", connection);
        let context = Arc::new(Mutex::new(ConnectionAttContext::new()));
        write(&self.connections).insert(connection, context);
    }

    /// Destroy the connection's context, releasing every pending transaction.
    pub fn disconnect(&self, connection: u16) -> bool {
        match write(&self.connections).remove(&connection) {
            Some(context) => {
                lock(&context).tracker.clear();
                debug!("ATT connection {:#06x} removed", connection);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, connection: u16) -> bool {
        read(&self.connections).contains_key(&connection)
    }

    /// Current MTU of a connection
    pub fn mtu(&self, connection: u16) -> AttResult<u16> {
        let context = self.context(connection)?;
        let mtu = lock(&context).mtu;
        Ok(mtu)
    }

    /// Set the MTU of a connection directly
    pub fn update_mtu(&self, connection: u16, mtu: u16) -> AttResult<()> {
        if !(ATT_DEFAULT_MTU..=ATT_MAX_MTU).contains(&mtu) {
            return Err(AttError::InvalidParameter(format!("MTU {} out of range", mtu)));
        }
        let context = self.context(connection)?;
        lock(&context).mtu = mtu;
        debug!("ATT connection {:#06x} MTU set to {}", connection, mtu);
        Ok(())
    }

    /// Whether the connection is in the flow-control violated state
    pub fn is_flow_control_violated(&self, connection: u16) -> AttResult<bool> {
        let context = self.context(connection)?;
        let violated = lock(&context).tracker.is_violated();
        Ok(violated)
    }

    /// Accept inbound Requests and Indications again after a violation
    pub fn clear_flow_control(&self, connection: u16) -> AttResult<()> {
        let context = self.context(connection)?;
        lock(&context).tracker.clear_violation();
        debug!("ATT connection {:#06x} flow control cleared", connection);
        Ok(())
    }

    /// Send an Exchange MTU Request proposing the configured receive MTU
    pub fn exchange_mtu(&self, connection: u16, now: Instant) -> AttResult<Vec<u8>> {
        let request = ExchangeMtuRequest {
            client_rx_mtu: self.config().rx_mtu,
        };
        self.send(connection, &request.into(), now)
    }

    /// Process one complete ATT PDU received on `connection`.
    ///
    /// Deadlines of the connection that passed by `now` fire first, so a
    /// response arriving after its timeout is unsolicited.
    pub fn receive(&self, connection: u16, data: &[u8], now: Instant) -> AttResult<Disposition> {
        let context = self.context(connection)?;
        trace!("ATT rx {:#06x}: {}", connection, hex::encode(data));

        let expired = lock(&context).tracker.poll_timeout(now);
        if let Some(violation) = expired {
            warn!(
                "ATT {:#06x}: transaction {:#04x} timed out",
                connection, violation.pending_opcode
            );
            self.emit(&[AttEvent::violated(connection, violation)]);
        }

        let mut events = Vec::new();
        let message = {
            let mut ctx = lock(&context);
            let message = match AttMessage::parse(data, ctx.mtu) {
                Ok(message) => message,
                Err(err) => {
                    let (result, violation) = Self::reject(&mut ctx, connection, data, err);
                    drop(ctx);
                    if let Some(violation) = violation {
                        self.emit(&[AttEvent::violated(connection, violation)]);
                    }
                    return result;
                }
            };

            let check = match message.kind() {
                OpcodeKind::Request => ctx.tracker.receive_request(message.opcode()),
                OpcodeKind::Indication => ctx.tracker.receive_indication(message.opcode()),
                OpcodeKind::Response => match message.answered_request() {
                    Some(request) => ctx.tracker.receive_response(request),
                    None => Check::Unsolicited,
                },
                OpcodeKind::Confirmation => ctx.tracker.receive_confirmation(),
                OpcodeKind::Command | OpcodeKind::Notification => Check::Proceed,
            };

            match check {
                Check::Proceed => {}
                Check::Drop => {
                    warn!(
                        "ATT {:#06x}: dropping opcode {:#04x}, flow control violated",
                        connection,
                        message.opcode()
                    );
                    return Ok(Disposition::Dropped);
                }
                Check::Violation { violation, first } => {
                    warn!(
                        "ATT {:#06x}: opcode {:#04x} received while {:#04x} pending",
                        connection, violation.opcode, violation.pending_opcode
                    );
                    drop(ctx);
                    if first {
                        self.emit(&[AttEvent::violated(connection, violation)]);
                    }
                    return Ok(Disposition::Dropped);
                }
                Check::Unsolicited => {
                    warn!(
                        "ATT {:#06x}: unsolicited opcode {:#04x}",
                        connection,
                        message.opcode()
                    );
                    return Err(AttError::UnexpectedResponse(message.opcode()));
                }
            }

            match &message {
                AttMessage::ExchangeMtuRequest(req) => {
                    ctx.peer_mtu = Some(req.client_rx_mtu);
                }
                AttMessage::ExchangeMtuResponse(rsp) => {
                    if let Some(proposed) = ctx.proposed_mtu.take() {
                        ctx.mtu = negotiate_mtu(proposed, rsp.server_rx_mtu);
                        events.push(AttEvent::MtuUpdated {
                            connection,
                            mtu: ctx.mtu,
                        });
                    }
                }
                AttMessage::ErrorResponse(rsp) if rsp.request_opcode == ATT_EXCHANGE_MTU_REQ => {
                    ctx.proposed_mtu = None;
                }
                _ => {}
            }
            message
        };

        for event in &events {
            if let AttEvent::MtuUpdated { mtu, .. } = event {
                debug!("ATT connection {:#06x} MTU updated to {}", connection, mtu);
            }
        }
        self.emit(&events);

        let role = message.kind().receiver();
        match self.callback(role) {
            Some(callback) => {
                callback.on_message(connection, &message);
                Ok(Disposition::Delivered(role))
            }
            None => Ok(Disposition::Unhandled(role)),
        }
    }

    /// Handle a PDU that failed to decode.
    ///
    /// Requests are answered with an Error Response, unknown commands are
    /// dropped and anything else is reported back to the caller. A returned
    /// violation is new and still has to be raised.
    fn reject(
        ctx: &mut ConnectionAttContext,
        connection: u16,
        data: &[u8],
        err: AttError,
    ) -> (AttResult<Disposition>, Option<Violation>) {
        let Some(&opcode) = data.first() else {
            return (Err(err), None);
        };
        let is_command = OpcodeFlags::from_bits_truncate(opcode).contains(OpcodeFlags::COMMAND);
        let is_request = match OpcodeKind::of(opcode) {
            Some(kind) => kind == OpcodeKind::Request,
            None => !is_command,
        };

        if is_request {
            // Occupies the request slot until the Error Response goes out
            return match ctx.tracker.receive_request(opcode) {
                Check::Proceed => {
                    debug!(
                        "ATT {:#06x}: rejecting request {:#04x}: {}",
                        connection, opcode, err
                    );
                    let rsp = ErrorResponse::from_error(opcode, &err);
                    (Ok(Disposition::Respond(rsp)), None)
                }
                Check::Violation { violation, first } => {
                    warn!(
                        "ATT {:#06x}: opcode {:#04x} received while {:#04x} pending",
                        connection, violation.opcode, violation.pending_opcode
                    );
                    (Ok(Disposition::Dropped), first.then_some(violation))
                }
                Check::Drop | Check::Unsolicited => {
                    warn!("ATT {:#06x}: dropping bad request {:#04x}", connection, opcode);
                    (Ok(Disposition::Dropped), None)
                }
            };
        }
        if is_command && OpcodeKind::of(opcode).is_none() {
            warn!("ATT {:#06x}: dropping unknown command {:#04x}", connection, opcode);
            return (Ok(Disposition::Dropped), None);
        }

        warn!(
            "ATT {:#06x}: malformed PDU {:#04x}: {}",
            connection, opcode, err
        );
        (Err(err), None)
    }

    /// Encode `message` for `connection` and account for it in the
    /// transaction state.
    ///
    /// The notify callback of the sending role runs once the PDU is accepted.
    /// Use [`prepare`](Self::prepare) instead when the write to the peer can
    /// still fail.
    pub fn send(&self, connection: u16, message: &AttMessage, now: Instant) -> AttResult<Vec<u8>> {
        let tx = self.prepare(connection, message, now)?;
        Ok(self.commit(tx))
    }

    /// Encode `message` and apply it to the transaction state without
    /// announcing it.
    ///
    /// The returned [`PendingTx`] must be passed to [`commit`](Self::commit)
    /// once the bytes are written, or to [`abort`](Self::abort) if they never
    /// left, which restores the connection state from before this call.
    /// Sequencing violations are final and raised here.
    pub fn prepare(
        &self,
        connection: u16,
        message: &AttMessage,
        now: Instant,
    ) -> AttResult<PendingTx> {
        let context = self.context(connection)?;
        let timeout = self.config().response_timeout;
        let kind = message.kind();
        let opcode = message.opcode();

        let mut events = Vec::new();
        let mut ctx = lock(&context);
        let bytes = message.to_bytes(ctx.mtu)?;

        let opens_transaction = matches!(kind, OpcodeKind::Request | OpcodeKind::Indication);
        if ctx.tracker.is_violated() && opens_transaction {
            return Err(AttError::TrafficDisabled);
        }
        let previous = ctx.clone();

        let check = match kind {
            OpcodeKind::Request => ctx.tracker.send_request(opcode, now + timeout),
            OpcodeKind::Indication => ctx.tracker.send_indication(opcode, now + timeout),
            OpcodeKind::Response => match message.answered_request() {
                Some(request) => ctx.tracker.send_response(request),
                None => Check::Unsolicited,
            },
            OpcodeKind::Confirmation => ctx.tracker.send_confirmation(),
            OpcodeKind::Command | OpcodeKind::Notification => Check::Proceed,
        };

        match check {
            Check::Proceed => {}
            Check::Violation { violation, first } => {
                warn!(
                    "ATT {:#06x}: opcode {:#04x} sent while {:#04x} pending",
                    connection, violation.opcode, violation.pending_opcode
                );
                drop(ctx);
                if first {
                    self.emit(&[AttEvent::violated(connection, violation)]);
                }
                return Err(AttError::FlowControlViolated {
                    opcode: violation.opcode,
                    pending_opcode: violation.pending_opcode,
                });
            }
            Check::Drop | Check::Unsolicited => return Err(AttError::InvalidState),
        }

        match message {
            AttMessage::ExchangeMtuRequest(req) => {
                ctx.proposed_mtu = Some(req.client_rx_mtu);
            }
            AttMessage::ExchangeMtuResponse(rsp) => {
                if let Some(peer) = ctx.peer_mtu.take() {
                    ctx.mtu = negotiate_mtu(peer, rsp.server_rx_mtu);
                    events.push(AttEvent::MtuUpdated {
                        connection,
                        mtu: ctx.mtu,
                    });
                }
            }
            _ => {}
        }
        drop(ctx);

        Ok(PendingTx {
            connection,
            opcode,
            sender: kind.sender(),
            bytes,
            events,
            context,
            previous,
        })
    }

    /// Announce a prepared PDU as sent and return its bytes
    pub fn commit(&self, tx: PendingTx) -> Vec<u8> {
        trace!("ATT tx {:#06x}: {}", tx.connection, hex::encode(&tx.bytes));
        if let Some(callback) = self.callback(tx.sender) {
            callback.notify_tx(tx.connection, tx.opcode);
        }
        self.emit(&tx.events);
        tx.bytes
    }

    /// Undo the effect of a prepared PDU that was never sent
    pub fn abort(&self, tx: PendingTx) {
        debug!(
            "ATT {:#06x}: opcode {:#04x} not sent, state restored",
            tx.connection, tx.opcode
        );
        *lock(&tx.context) = tx.previous;
    }

    /// Fire every deadline that has passed, returning the raised events.
    pub fn poll_timeouts(&self, now: Instant) -> Vec<AttEvent> {
        let contexts: Vec<(u16, Arc<Mutex<ConnectionAttContext>>)> = read(&self.connections)
            .iter()
            .map(|(handle, ctx)| (*handle, ctx.clone()))
            .collect();

        let mut events = Vec::new();
        for (connection, context) in contexts {
            let fired = lock(&context).tracker.poll_timeout(now);
            if let Some(violation) = fired {
                warn!(
                    "ATT {:#06x}: transaction {:#04x} timed out",
                    connection, violation.pending_opcode
                );
                events.push(AttEvent::violated(connection, violation));
            }
        }

        self.emit(&events);
        events
    }

    /// Earliest deadline across all connections
    pub fn next_deadline(&self) -> Option<Instant> {
        read(&self.connections)
            .values()
            .filter_map(|ctx| lock(ctx).tracker.next_deadline())
            .min()
    }
}
