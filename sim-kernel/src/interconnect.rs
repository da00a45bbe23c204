//! Message-passing fabrics (buses, crossbars) built by composing small
//! generic layers, the way the original layers C++ template mixins over
//! a base network. A mixin chain there is a wrapper struct here:
//! [`SharedMedium`] and [`EndPointArbiter`] add arbitration,
//! [`SourceBuffering`]/[`DestinationBuffering`] add per-endpoint
//! queuing, [`EndPointRegistry`] adds name bookkeeping, and
//! [`WireNet`] is the innermost layer that actually dispatches a
//! message to its destination(s). Wrapping a concrete struct in another
//! concrete struct resolves to ordinary static dispatch; nothing here
//! pays for a vtable unless a user stores the top-level composition
//! behind `dyn Interconnect`.
//!
//! [`UnbufferedBus`], [`BufferedBus`], [`UnbufferedCrossbar`] and
//! [`BufferedCrossbar`] are the four standard compositions, matching
//! the originals' `Bus.h`/`Crossbar.h`.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use sim_lib::{sim_debug_deadlock, DiagContext};

use crate::buffer::Buffer;
use crate::clock::Frequency;
use crate::ids::{ArbitratorId, ClockId, ObjectId, ProcessId, StorageId};
use crate::kernel::{CyclePhase, Kernel};
use crate::ports::{ArbitratedService, CyclicArbitratedPort, RegisterPort};
use crate::process::ProcessResult;
use crate::trace::StorageTraceSet;

pub type SenderKey = usize;
pub type ReceiverKey = usize;

/// What a receiver hands the fabric when it connects: how to deliver a
/// message, what storage a sender would have to wait on to reach it
/// (used for deadlock trace reporting), and whether it participates in
/// broadcasts.
pub struct ReceiverEndpoint<Payload> {
    pub deliver: Box<dyn FnMut(&mut Kernel, Payload) -> bool>,
    pub traces: StorageTraceSet,
    pub broadcast_enabled: bool,
}

/// Common surface every fabric layer implements, matching the
/// original's `IInterconnect<Payload>`. `register_*` allocate a key;
/// `connect_*` supply the behavior behind it. Splitting registration
/// from connection lets a wrapping layer insert its own plumbing (a
/// buffer, an arbitrated port) between the two without the caller
/// needing to know the layer exists.
pub trait Interconnect<Payload> {
    fn register_receiver(&mut self, kernel: &mut Kernel, name: &str) -> ReceiverKey;
    fn connect_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>);
    fn register_sender(&mut self, kernel: &mut Kernel, name: &str) -> SenderKey;
    fn connect_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, process: ProcessId);

    fn send_message(&mut self, kernel: &mut Kernel, src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool;
    fn send_broadcast(&mut self, kernel: &mut Kernel, src: SenderKey, msg: Payload) -> bool;

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool;
    fn request_traces(&self, sk: SenderKey) -> StorageTraceSet;
    fn broadcast_traces(&self, sk: SenderKey) -> StorageTraceSet;
    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet;
}

// --------------------------------------------------------------------
// WireNet: the innermost layer, direct dispatch with no arbitration or
// buffering of its own.
// --------------------------------------------------------------------

/// Direct point-to-point and broadcast dispatch. `send_broadcast` folds
/// with a bitwise AND, not `&&`: every broadcast-enabled receiver is
/// always invoked, even after an earlier one has already failed,
/// matching the original's `res = res & r.deliver_cb(...)` (a `&&`
/// would let a failing receiver suppress delivery to the ones after
/// it).
pub struct WireNet<Payload> {
    receivers: Vec<Option<ReceiverEndpoint<Payload>>>,
    senders: Vec<Option<ProcessId>>,
}

impl<Payload> Default for WireNet<Payload> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Payload> WireNet<Payload> {
    pub fn new() -> Self {
        WireNet { receivers: Vec::new(), senders: Vec::new() }
    }
}

impl<Payload: Clone> Interconnect<Payload> for WireNet<Payload> {
    fn register_receiver(&mut self, _kernel: &mut Kernel, _name: &str) -> ReceiverKey {
        self.receivers.push(None);
        self.receivers.len() - 1
    }

    fn connect_receiver(&mut self, _kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>) {
        self.receivers[rk] = Some(endpoint);
    }

    fn register_sender(&mut self, _kernel: &mut Kernel, _name: &str) -> SenderKey {
        self.senders.push(None);
        self.senders.len() - 1
    }

    fn connect_sender(&mut self, _kernel: &mut Kernel, sk: SenderKey, process: ProcessId) {
        self.senders[sk] = Some(process);
    }

    fn send_message(&mut self, kernel: &mut Kernel, _src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool {
        match self.receivers.get_mut(dst).and_then(|r| r.as_mut()) {
            Some(r) => (r.deliver)(kernel, msg),
            None => false,
        }
    }

    fn send_broadcast(&mut self, kernel: &mut Kernel, _src: SenderKey, msg: Payload) -> bool {
        let mut result = true;
        for receiver in self.receivers.iter_mut().flatten() {
            if receiver.broadcast_enabled {
                result = result & (receiver.deliver)(kernel, msg.clone());
            }
        }
        result
    }

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool {
        self.receivers.get(rk).and_then(|r| r.as_ref()).map(|r| r.broadcast_enabled).unwrap_or(false)
    }

    fn request_traces(&self, _sk: SenderKey) -> StorageTraceSet {
        self.receivers.iter().flatten().fold(StorageTraceSet::empty(), |acc, r| acc ^ r.traces.clone())
    }

    fn broadcast_traces(&self, _sk: SenderKey) -> StorageTraceSet {
        self.receivers
            .iter()
            .flatten()
            .filter(|r| r.broadcast_enabled)
            .fold(StorageTraceSet::empty(), |acc, r| acc.concat(&r.traces))
    }

    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet {
        self.receivers.get(rk).and_then(|r| r.as_ref()).map(|r| r.traces.clone()).unwrap_or_else(StorageTraceSet::empty)
    }
}

// --------------------------------------------------------------------
// SharedMedium: every send contends for a single arbitrated bus port
// before reaching the inner layer.
// --------------------------------------------------------------------

/// Wraps `Inner` behind one [`ArbitratedService`]: a sender must win the
/// bus before `Inner` ever sees the message, modelling a shared
/// point-to-point medium where only one transfer can be in flight per
/// cycle.
pub struct SharedMedium<Payload, Inner, P: RegisterPort = CyclicArbitratedPort> {
    inner: Inner,
    object: ObjectId,
    bus: ArbitratedService<P>,
    _marker: PhantomData<Payload>,
}

impl<Payload, Inner, P: RegisterPort> SharedMedium<Payload, Inner, P> {
    /// `port` must already be bound to an arbitrator created on the
    /// clock the bus runs at; the caller typically builds it with
    /// [`RegisterPort::new_port`] right before this call.
    pub fn new(object: ObjectId, port: P, inner: Inner) -> Self {
        SharedMedium { inner, object, bus: ArbitratedService::new(port), _marker: PhantomData }
    }

    pub fn arbitrator(&self) -> ArbitratorId {
        self.bus.port().arbitrator()
    }

    /// Runs the bus's arbitration for this cycle. The embedder's
    /// `Components::arbitrate` should call this when it sees
    /// `self.arbitrator()`.
    pub fn arbitrate(&mut self) {
        self.bus.port_mut().arbitrate();
    }
}

impl<Payload, Inner, P> Interconnect<Payload> for SharedMedium<Payload, Inner, P>
where
    Inner: Interconnect<Payload>,
    P: RegisterPort,
{
    fn register_receiver(&mut self, kernel: &mut Kernel, name: &str) -> ReceiverKey {
        self.inner.register_receiver(kernel, name)
    }

    fn connect_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>) {
        self.inner.connect_receiver(kernel, rk, endpoint)
    }

    fn register_sender(&mut self, kernel: &mut Kernel, name: &str) -> SenderKey {
        self.inner.register_sender(kernel, name)
    }

    fn connect_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, process: ProcessId) {
        self.bus.port_mut().add_process(process);
        self.inner.connect_sender(kernel, sk, process);
    }

    /// Gated by `self.bus.invoke()` in every phase so the port sees a
    /// request as soon as `Acquire` runs, but the actual delivery to
    /// `inner` (immediate and unstaged for a bare [`WireNet`]) only
    /// happens once arbitration has picked a winner and `Commit` is
    /// under way — otherwise every contender would deliver during
    /// `Acquire`, where `invoke()` always returns `true`.
    fn send_message(&mut self, kernel: &mut Kernel, src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool {
        if !self.bus.invoke(kernel) {
            sim_debug_deadlock!(kernel.diag(self.object), "unable to acquire bus for sender {src} -> receiver {dst}");
            return false;
        }
        if kernel.cycle_phase() != CyclePhase::Commit {
            return true;
        }
        self.inner.send_message(kernel, src, dst, msg)
    }

    fn send_broadcast(&mut self, kernel: &mut Kernel, src: SenderKey, msg: Payload) -> bool {
        if !self.bus.invoke(kernel) {
            sim_debug_deadlock!(kernel.diag(self.object), "unable to acquire bus for broadcast from sender {src}");
            return false;
        }
        if kernel.cycle_phase() != CyclePhase::Commit {
            return true;
        }
        self.inner.send_broadcast(kernel, src, msg)
    }

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool {
        self.inner.is_broadcast_receiver(rk)
    }

    fn request_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.request_traces(sk)
    }

    fn broadcast_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.broadcast_traces(sk)
    }

    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet {
        self.inner.receiver_traces(rk)
    }
}

// --------------------------------------------------------------------
// SourceBuffering: queues outgoing messages per sender instead of
// letting a stalled send block the sending process outright.
// --------------------------------------------------------------------

/// A message queued by [`SourceBuffering`], tagged so its drain loop
/// knows whether to replay it as a point-to-point send or a broadcast.
#[derive(Clone)]
enum OutgoingMessage<Payload> {
    Normal { dst: ReceiverKey, msg: Payload },
    Broadcast { msg: Payload },
}

struct SourceEndpoint<Payload> {
    buffer: Buffer<OutgoingMessage<Payload>>,
    drain: ProcessId,
}

/// Gives every sender its own outgoing queue, drained one message per
/// cycle by a dedicated process ([`SourceBuffering::drain_process`]).
/// Always buffers: the original makes this layer's presence in a
/// composition conditional on a runtime config flag, but here the
/// unbuffered variants of a fabric simply omit the layer instead, so
/// including it always means always buffering.
pub struct SourceBuffering<Payload, Inner> {
    inner: Inner,
    object: ObjectId,
    clock: ClockId,
    buffer_size: usize,
    senders: Vec<SourceEndpoint<Payload>>,
    _marker: PhantomData<Payload>,
}

impl<Payload, Inner: Interconnect<Payload>> SourceBuffering<Payload, Inner> {
    pub fn new(object: ObjectId, clock: ClockId, buffer_size: usize, inner: Inner) -> Self {
        SourceBuffering { inner, object, clock, buffer_size, senders: Vec::new(), _marker: PhantomData }
    }

    /// Process that must be stepped by the embedder's `run_process` to
    /// drain `sk`'s queue; call [`Self::drain`] from there.
    pub fn drain_process(&self, sk: SenderKey) -> ProcessId {
        self.senders[sk].drain
    }

    pub fn sender_buffer(&self, sk: SenderKey) -> StorageId {
        self.senders[sk].buffer.id()
    }

    pub fn commit_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, name: &str) {
        self.senders[sk].buffer.commit(kernel, name);
    }

    /// Drains one message from `sk`'s queue to `Inner`, run in every
    /// phase like any other process body (pushing/popping the buffer is
    /// itself phase-aware, so this needs no phase check of its own).
    pub fn drain(&mut self, kernel: &mut Kernel, sk: SenderKey) -> ProcessResult
    where
        Payload: Clone,
    {
        let next = match self.senders[sk].buffer.front() {
            Some(m) => m.clone(),
            None => return ProcessResult::Success,
        };

        let sent = match next {
            OutgoingMessage::Normal { dst, msg } => self.inner.send_message(kernel, sk, dst, msg),
            OutgoingMessage::Broadcast { msg } => self.inner.send_broadcast(kernel, sk, msg),
        };

        if !sent {
            return ProcessResult::Failed;
        }
        self.senders[sk].buffer.pop(kernel);
        ProcessResult::Success
    }
}

impl<Payload, Inner> Interconnect<Payload> for SourceBuffering<Payload, Inner>
where
    Inner: Interconnect<Payload>,
{
    fn register_receiver(&mut self, kernel: &mut Kernel, name: &str) -> ReceiverKey {
        self.inner.register_receiver(kernel, name)
    }

    fn connect_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>) {
        self.inner.connect_receiver(kernel, rk, endpoint)
    }

    fn register_sender(&mut self, kernel: &mut Kernel, name: &str) -> SenderKey {
        let sk = self.inner.register_sender(kernel, name);
        if sk >= self.senders.len() {
            let buffer = Buffer::new(kernel, self.object, self.clock, self.buffer_size, 1);
            let drain = kernel.register_process(format!("{name}.p_send"), self.object, self.clock);
            self.senders.push(SourceEndpoint { buffer, drain });
        }
        sk
    }

    fn connect_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, _process: ProcessId) {
        let drain = self.senders[sk].drain;
        self.senders[sk].buffer.set_sensitive(drain);
        // The inner layer only ever sees the drain process, never the
        // caller's own producer — matches the original skipping its
        // `BaseIC::ConnectSender` forward when buffering is enabled.
        self.inner.connect_sender(kernel, sk, drain);
    }

    fn send_message(&mut self, kernel: &mut Kernel, src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool {
        let e = &mut self.senders[src];
        if !e.buffer.push(kernel, OutgoingMessage::Normal { dst, msg }, 1) {
            sim_debug_deadlock!(kernel.diag(self.object), "unable to queue outgoing message, sender {src} -> receiver {dst}");
            return false;
        }
        true
    }

    fn send_broadcast(&mut self, kernel: &mut Kernel, src: SenderKey, msg: Payload) -> bool {
        let e = &mut self.senders[src];
        if !e.buffer.push(kernel, OutgoingMessage::Broadcast { msg }, 1) {
            sim_debug_deadlock!(kernel.diag(self.object), "unable to queue outgoing broadcast from sender {src}");
            return false;
        }
        true
    }

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool {
        self.inner.is_broadcast_receiver(rk)
    }

    fn request_traces(&self, sk: SenderKey) -> StorageTraceSet {
        StorageTraceSet::from_storage(self.senders[sk].buffer.id())
    }

    fn broadcast_traces(&self, sk: SenderKey) -> StorageTraceSet {
        StorageTraceSet::from_storage(self.senders[sk].buffer.id())
    }

    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet {
        self.inner.receiver_traces(rk)
    }
}

// --------------------------------------------------------------------
// DestinationBuffering: queues incoming messages per receiver so a
// stalled consumer doesn't block the fabric.
// --------------------------------------------------------------------

struct DestinationEndpoint<Payload> {
    // Shared with the closure handed down to `Inner`: that closure
    // pushes into the same buffer this layer's own drain process later
    // pops from, a mutual dependency the original expresses through a
    // raw `this` pointer captured by a member-function thunk. `Rc<RefCell<_>>`
    // is the safe-Rust equivalent of that capture.
    buffer: Rc<RefCell<Buffer<Payload>>>,
    receive: ProcessId,
    deliver: Option<Box<dyn FnMut(&mut Kernel, Payload) -> bool>>,
}

/// Gives every receiver its own incoming queue, drained one message per
/// cycle by a dedicated process ([`DestinationBuffering::receive_process`])
/// into the caller's actual deliver callback. Always buffers, for the
/// same reason [`SourceBuffering`] does.
pub struct DestinationBuffering<Payload, Inner> {
    inner: Inner,
    object: ObjectId,
    clock: ClockId,
    buffer_size: usize,
    receivers: Vec<Option<DestinationEndpoint<Payload>>>,
    _marker: PhantomData<Payload>,
}

impl<Payload, Inner: Interconnect<Payload>> DestinationBuffering<Payload, Inner> {
    pub fn new(object: ObjectId, clock: ClockId, buffer_size: usize, inner: Inner) -> Self {
        DestinationBuffering { inner, object, clock, buffer_size, receivers: Vec::new(), _marker: PhantomData }
    }

    pub fn receive_process(&self, rk: ReceiverKey) -> ProcessId {
        self.receivers[rk].as_ref().expect("receiver not registered").receive
    }

    pub fn receiver_buffer(&self, rk: ReceiverKey) -> StorageId {
        self.receivers[rk].as_ref().expect("receiver not registered").buffer.borrow().id()
    }

    pub fn commit_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, name: &str) {
        self.receivers[rk].as_mut().expect("receiver not registered").buffer.borrow_mut().commit(kernel, name);
    }

    /// Drains one message from `rk`'s queue to the connected deliver
    /// callback, mirroring `DoReceive`.
    pub fn drain(&mut self, kernel: &mut Kernel, rk: ReceiverKey) -> ProcessResult
    where
        Payload: Clone,
    {
        let e = self.receivers[rk].as_mut().expect("receiver not registered");
        let msg = match e.buffer.borrow().front() {
            Some(m) => m.clone(),
            None => return ProcessResult::Success,
        };

        let deliver = e.deliver.as_mut().expect("receiver not connected");
        if !deliver(kernel, msg) {
            sim_debug_deadlock!(kernel.diag(self.object), "unable to deliver queued message to receiver {rk}");
            return ProcessResult::Failed;
        }
        e.buffer.borrow_mut().pop(kernel);
        ProcessResult::Success
    }
}

impl<Payload: 'static, Inner> Interconnect<Payload> for DestinationBuffering<Payload, Inner>
where
    Inner: Interconnect<Payload>,
{
    fn register_receiver(&mut self, kernel: &mut Kernel, name: &str) -> ReceiverKey {
        let rk = self.inner.register_receiver(kernel, name);
        if rk >= self.receivers.len() {
            self.receivers.resize_with(rk + 1, || None);
        }
        let buffer = Rc::new(RefCell::new(Buffer::new(kernel, self.object, self.clock, self.buffer_size, 1)));
        let receive = kernel.register_process(format!("{name}.p_receive"), self.object, self.clock);
        self.receivers[rk] = Some(DestinationEndpoint { buffer, receive, deliver: None });
        rk
    }

    fn connect_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>) {
        let e = self.receivers[rk].as_mut().expect("receiver not registered");
        let receive = e.receive;
        e.buffer.borrow_mut().set_sensitive(receive);
        e.deliver = Some(endpoint.deliver);
        let buffer = Rc::clone(&e.buffer);
        let trace = StorageTraceSet::from_storage(buffer.borrow().id());

        self.inner.connect_receiver(
            kernel,
            rk,
            ReceiverEndpoint {
                deliver: Box::new(move |kernel, msg| buffer.borrow_mut().push(kernel, msg, 1)),
                traces: trace,
                broadcast_enabled: endpoint.broadcast_enabled,
            },
        );
    }

    fn register_sender(&mut self, kernel: &mut Kernel, name: &str) -> SenderKey {
        self.inner.register_sender(kernel, name)
    }

    fn connect_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, process: ProcessId) {
        self.inner.connect_sender(kernel, sk, process);
    }

    fn send_message(&mut self, kernel: &mut Kernel, src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool {
        self.inner.send_message(kernel, src, dst, msg)
    }

    fn send_broadcast(&mut self, kernel: &mut Kernel, src: SenderKey, msg: Payload) -> bool {
        self.inner.send_broadcast(kernel, src, msg)
    }

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool {
        self.inner.is_broadcast_receiver(rk)
    }

    fn request_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.request_traces(sk)
    }

    fn broadcast_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.broadcast_traces(sk)
    }

    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet {
        self.receivers[rk].as_ref().map(|e| StorageTraceSet::from_storage(e.buffer.borrow().id())).unwrap_or_else(StorageTraceSet::empty)
    }
}

// --------------------------------------------------------------------
// EndPointRegistry: pure introspection, tracks names for diagnostics.
// --------------------------------------------------------------------

/// Tracks receiver/sender names purely for introspection (the
/// original's `Cmd_Info` command); adds no behavior of its own.
pub struct EndPointRegistry<Payload, Inner> {
    inner: Inner,
    receiver_names: Vec<String>,
    sender_names: Vec<String>,
    _marker: PhantomData<Payload>,
}

impl<Payload, Inner: Interconnect<Payload>> EndPointRegistry<Payload, Inner> {
    pub fn new(inner: Inner) -> Self {
        EndPointRegistry { inner, receiver_names: Vec::new(), sender_names: Vec::new(), _marker: PhantomData }
    }

    pub fn inner(&self) -> &Inner {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Inner {
        &mut self.inner
    }

    pub fn describe(&self) -> String {
        let mut out = String::from("List of receivers:\n");
        for (k, name) in self.receiver_names.iter().enumerate() {
            let bcast = if self.inner.is_broadcast_receiver(k) { " (broadcast receiver)" } else { "" };
            out += &format!("{k} : {name}{bcast}\n");
        }
        out += "List of senders:\n";
        for (k, name) in self.sender_names.iter().enumerate() {
            out += &format!("{k} : {name}\n");
        }
        out
    }
}

impl<Payload, Inner: Interconnect<Payload>> Interconnect<Payload> for EndPointRegistry<Payload, Inner> {
    fn register_receiver(&mut self, kernel: &mut Kernel, name: &str) -> ReceiverKey {
        let rk = self.inner.register_receiver(kernel, name);
        if rk >= self.receiver_names.len() {
            self.receiver_names.resize(rk + 1, String::new());
        }
        self.receiver_names[rk] = name.to_string();
        rk
    }

    fn connect_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>) {
        self.inner.connect_receiver(kernel, rk, endpoint)
    }

    fn register_sender(&mut self, kernel: &mut Kernel, name: &str) -> SenderKey {
        let sk = self.inner.register_sender(kernel, name);
        if sk >= self.sender_names.len() {
            self.sender_names.resize(sk + 1, String::new());
        }
        self.sender_names[sk] = name.to_string();
        sk
    }

    fn connect_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, process: ProcessId) {
        self.inner.connect_sender(kernel, sk, process)
    }

    fn send_message(&mut self, kernel: &mut Kernel, src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool {
        self.inner.send_message(kernel, src, dst, msg)
    }

    fn send_broadcast(&mut self, kernel: &mut Kernel, src: SenderKey, msg: Payload) -> bool {
        self.inner.send_broadcast(kernel, src, msg)
    }

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool {
        self.inner.is_broadcast_receiver(rk)
    }

    fn request_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.request_traces(sk)
    }

    fn broadcast_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.broadcast_traces(sk)
    }

    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet {
        self.inner.receiver_traces(rk)
    }
}

// --------------------------------------------------------------------
// Standard compositions, matching Bus.h / Crossbar.h.
// --------------------------------------------------------------------

pub type UnbufferedBus<Payload, P = CyclicArbitratedPort> = EndPointRegistry<Payload, SharedMedium<Payload, WireNet<Payload>, P>>;

pub type BufferedBus<Payload, P = CyclicArbitratedPort> =
    EndPointRegistry<Payload, DestinationBuffering<Payload, SourceBuffering<Payload, SharedMedium<Payload, WireNet<Payload>, P>>>>;

pub type UnbufferedCrossbar<Payload, P = CyclicArbitratedPort> = EndPointRegistry<Payload, EndPointArbiter<Payload, WireNet<Payload>, P>>;

pub type BufferedCrossbar<Payload, P = CyclicArbitratedPort> =
    EndPointRegistry<Payload, DestinationBuffering<Payload, SourceBuffering<Payload, EndPointArbiter<Payload, WireNet<Payload>, P>>>>;

/// Builds an [`UnbufferedBus`] with the default (cyclic) arbitration
/// policy, creating its bus clock at `frequency`.
pub fn unbuffered_bus<Payload: Clone>(kernel: &mut Kernel, object: ObjectId, frequency: Frequency) -> UnbufferedBus<Payload> {
    let clock = kernel.create_clock(frequency);
    let arbitrator = kernel.register_arbitrator(clock);
    let port = CyclicArbitratedPort::new(object, "p_bus".into(), arbitrator);
    EndPointRegistry::new(SharedMedium::new(object, port, WireNet::new()))
}

/// Builds a [`BufferedBus`], with per-sender and per-receiver queues of
/// `buffer_size` on top of the same bus arrangement as
/// [`unbuffered_bus`].
pub fn buffered_bus<Payload: Clone + 'static>(kernel: &mut Kernel, object: ObjectId, frequency: Frequency, buffer_size: usize) -> BufferedBus<Payload> {
    let bus_clock = kernel.create_clock(frequency);
    let arbitrator = kernel.register_arbitrator(bus_clock);
    let port = CyclicArbitratedPort::new(object, "p_bus".into(), arbitrator);
    let medium = SharedMedium::new(object, port, WireNet::new());
    let source = SourceBuffering::new(object, bus_clock, buffer_size, medium);
    let dest = DestinationBuffering::new(object, bus_clock, buffer_size, source);
    EndPointRegistry::new(dest)
}

/// Builds an [`UnbufferedCrossbar`]: one arbitrated port per receiver,
/// each on a clock created at `frequency`.
pub fn unbuffered_crossbar<Payload: Clone>(kernel: &mut Kernel, object: ObjectId, frequency: Frequency) -> UnbufferedCrossbar<Payload> {
    let clock = kernel.create_clock(frequency);
    EndPointRegistry::new(EndPointArbiter::new(object, clock, WireNet::new()))
}

/// Builds a [`BufferedCrossbar`], with per-sender and per-receiver
/// queues of `buffer_size` on top of the same crossbar arrangement as
/// [`unbuffered_crossbar`].
pub fn buffered_crossbar<Payload: Clone + 'static>(kernel: &mut Kernel, object: ObjectId, frequency: Frequency, buffer_size: usize) -> BufferedCrossbar<Payload> {
    let clock = kernel.create_clock(frequency);
    let arbiter = EndPointArbiter::new(object, clock, WireNet::new());
    let source = SourceBuffering::new(object, clock, buffer_size, arbiter);
    let dest = DestinationBuffering::new(object, clock, buffer_size, source);
    EndPointRegistry::new(dest)
}

// --------------------------------------------------------------------
// EndPointArbiter: crossbar-style, one arbitrated port per receiver so
// unrelated destinations don't contend with each other.
// --------------------------------------------------------------------

/// One [`ArbitratedService`] per receiver endpoint: sends to different
/// destinations can proceed the same cycle, but two senders targeting
/// the same destination contend for its port.
pub struct EndPointArbiter<Payload, Inner, P: RegisterPort = CyclicArbitratedPort> {
    inner: Inner,
    object: ObjectId,
    clock: ClockId,
    ports: Vec<ArbitratedService<P>>,
    _marker: PhantomData<Payload>,
}

impl<Payload, Inner: Interconnect<Payload>, P: RegisterPort> EndPointArbiter<Payload, Inner, P> {
    pub fn new(object: ObjectId, clock: ClockId, inner: Inner) -> Self {
        EndPointArbiter { inner, object, clock, ports: Vec::new(), _marker: PhantomData }
    }

    pub fn arbitrators(&self) -> impl Iterator<Item = ArbitratorId> + '_ {
        self.ports.iter().map(|p| p.port().arbitrator())
    }

    /// Runs arbitration for whichever of this crossbar's ports matches
    /// `arbitrator`. No-op if it belongs to a different layer.
    pub fn arbitrate(&mut self, arbitrator: ArbitratorId) {
        if let Some(port) = self.ports.iter_mut().find(|p| p.port().arbitrator() == arbitrator) {
            port.port_mut().arbitrate();
        }
    }
}

impl<Payload, Inner, P> Interconnect<Payload> for EndPointArbiter<Payload, Inner, P>
where
    Inner: Interconnect<Payload>,
    P: RegisterPort,
{
    fn register_receiver(&mut self, kernel: &mut Kernel, name: &str) -> ReceiverKey {
        let rk = self.inner.register_receiver(kernel, name);
        if rk >= self.ports.len() {
            let arbitrator = kernel.register_arbitrator(self.clock);
            let port = P::new_port(self.object, format!("{name}.p_service"), arbitrator);
            self.ports.push(ArbitratedService::new(port));
        }
        rk
    }

    fn connect_receiver(&mut self, kernel: &mut Kernel, rk: ReceiverKey, endpoint: ReceiverEndpoint<Payload>) {
        self.inner.connect_receiver(kernel, rk, endpoint)
    }

    fn register_sender(&mut self, kernel: &mut Kernel, name: &str) -> SenderKey {
        self.inner.register_sender(kernel, name)
    }

    fn connect_sender(&mut self, kernel: &mut Kernel, sk: SenderKey, process: ProcessId) {
        for port in &mut self.ports {
            port.port_mut().add_process(process);
        }
        self.inner.connect_sender(kernel, sk, process);
    }

    /// See [`SharedMedium::send_message`]: each port's `invoke()` is
    /// polled every phase to keep its request alive, but delivery to
    /// `inner` is deferred to `Commit`.
    fn send_message(&mut self, kernel: &mut Kernel, src: SenderKey, dst: ReceiverKey, msg: Payload) -> bool {
        let port = self.ports.get_mut(dst).expect("receiver not registered");
        if !port.invoke(kernel) {
            sim_debug_deadlock!(kernel.diag(self.object), "unable to acquire crossbar port {dst} for sender {src}");
            return false;
        }
        if kernel.cycle_phase() != CyclePhase::Commit {
            return true;
        }
        self.inner.send_message(kernel, src, dst, msg)
    }

    fn send_broadcast(&mut self, kernel: &mut Kernel, src: SenderKey, msg: Payload) -> bool {
        for rk in 0..self.ports.len() {
            if self.inner.is_broadcast_receiver(rk) && !self.ports[rk].invoke(kernel) {
                sim_debug_deadlock!(kernel.diag(self.object), "unable to acquire crossbar port {rk} for broadcast by {src}");
                return false;
            }
        }
        if kernel.cycle_phase() != CyclePhase::Commit {
            return true;
        }
        self.inner.send_broadcast(kernel, src, msg)
    }

    fn is_broadcast_receiver(&self, rk: ReceiverKey) -> bool {
        self.inner.is_broadcast_receiver(rk)
    }

    fn request_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.request_traces(sk)
    }

    fn broadcast_traces(&self, sk: SenderKey) -> StorageTraceSet {
        self.inner.broadcast_traces(sk)
    }

    fn receiver_traces(&self, rk: ReceiverKey) -> StorageTraceSet {
        self.inner.receiver_traces(rk)
    }
}
