//! External collaborator seams.
//!
//! `spec.md` §1 calls out the AT interpreter, the DSP modem primitives, and
//! the T.38 packetization layer as out-of-scope collaborators reached only
//! through a handful of calls. `spec.md` §9 asks for the mutually-recursive
//! `(handler, user_data)` C pattern to be replaced with explicit Rust seams;
//! these traits are that replacement.

use crate::consts::SAMPLE_RATE_HZ;

/// AT response codes the session ever emits to the DTE.
///
/// `spec.md` §3 and §6 name these four in prose; this is the closed type
/// backing the received-frame queue's 1-byte prefix and every `at_put_response_code` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtResultCode {
    /// Carrier/training succeeded; a data or HDLC phase follows.
    Connect,
    /// Command completed successfully with nothing further pending.
    Ok,
    /// Command failed.
    Error,
    /// Carrier was lost or never found.
    NoCarrier,
    /// Fast-modem receive mistook a V.21 preamble for its own carrier
    /// (adaptive-receive disabled).
    FcError,
    /// Fast-modem receive handed off to V.21 due to an unexpected preamble
    /// (adaptive-receive enabled); always paired with `Connect`.
    Frh3,
}

/// Sink the session writes DTE-bound bytes and response codes to.
///
/// Implemented by the AT command interpreter in a full T.31 stack; a test
/// double is just a `Vec<u8>`-backed struct (see the `tests` module in
/// `session.rs`).
pub trait AtResponseSink {
    /// Emit raw bytes to the DTE (already DLE-stuffed where required).
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Emit a single AT response code line.
    fn put_response_code(&mut self, code: AtResultCode);

    /// Raise or lower CTS to the DTE.
    fn set_cts(&mut self, asserted: bool);
}

/// Sink for modem-control side effects the session cannot perform itself
/// (answering, ringing indicators, hook state) — the analogue of `ask433`'s
/// pin-toggling methods, but routed through a trait instead of a concrete
/// GPIO type since there is no physical pin here.
pub trait ModemControlHandler {
    /// The session wants to go off-hook (answer or originate).
    fn off_hook(&mut self);

    /// The session wants to go on-hook (hang up).
    fn on_hook(&mut self);
}

/// Sink for outbound T.38 IFP packets.
///
/// Mirrors `t38_core_send_indicator` / `t38_core_send_data` from the
/// `spandsp` T.38 core (see the `T38Core` wrapper referenced in the example
/// pack) without pulling in the packetization layer itself — this crate
/// only needs "send these payload bytes," and leaves sequence numbering and
/// UDPTL/RTP encapsulation to the real `t38_core` collaborator.
pub trait T38PacketHandler {
    /// Send one IFP packet's payload (already encoded by `t38_core`).
    fn send_ifp(&mut self, payload: &[u8]);
}

/// Call-progress events the line side reports to the session (`call_event`
/// in `spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallEvent {
    /// Incoming ring detected.
    Ring,
    /// The session has gone off-hook (answered or originated).
    Answered,
    /// The call has been torn down.
    Hangup,
}

/// Converts a duration in milliseconds to a sample count at the session's
/// fixed 8 kHz clock.
pub(crate) const fn ms_to_samples(ms: u32) -> u32 {
    (ms * SAMPLE_RATE_HZ) / 1000
}
