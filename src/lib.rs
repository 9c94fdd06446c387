//! # t31modem
//!
//! A software T.31 Class 1 fax modem emulator: it sits between an AT-command
//! DTE stream and either an 8 kHz PCM audio line or a T.38 IFP relay
//! session, and implements the modem-mode state machine, the DTE session
//! and DLE-stuffing codec, the non-ECM bit pumps, the class-1 command
//! dispatch table, and the T.38 timed-step transmit/receive handling.
//!
//! This crate does not itself provide an AT command parser, a V.17/V.27ter/
//! V.29/V.21 DSP engine, or T.38 packetization (sequence numbers, UDPTL/RTP
//! framing) — those are out-of-scope collaborators reached through the
//! [`callbacks`] traits. [`dsp`] supplies a minimal bit-paced stand-in for
//! the real DSP engine so the state machines in [`modem`] have real samples
//! and bits to move.
//!
//! ## Crate features
//! | Feature  | Description |
//! |----------|-------------|
//! | `std` (default) | Enables `std`-dependent error formatting via `thiserror` |
//! | `log` (default)  | Emits diagnostic events through the `log` facade |
//! | `defmt`  | Emits diagnostic events through `defmt` instead (embedded targets) |
//!
//! ## Usage
//!
//! ```no_run
//! use t31modem::callbacks::{AtResponseSink, AtResultCode, CallEvent, ModemControlHandler};
//! use t31modem::config::SessionConfig;
//! use t31modem::session::T31Session;
//!
//! struct Dte;
//! impl AtResponseSink for Dte {
//!     fn write_bytes(&mut self, _bytes: &[u8]) {}
//!     fn put_response_code(&mut self, _code: AtResultCode) {}
//!     fn set_cts(&mut self, _asserted: bool) {}
//! }
//! struct Line;
//! impl ModemControlHandler for Line {
//!     fn off_hook(&mut self) {}
//!     fn on_hook(&mut self) {}
//! }
//!
//! let mut session = T31Session::new(
//!     SessionConfig::new(),
//!     Box::new(Dte),
//!     Box::new(Line),
//!     None,
//! );
//! session.call_event(CallEvent::Answered);
//! let mut out = [0i16; 160];
//! let _written = session.tx(&mut out);
//! ```
//!
//! ## Status
//!
//! Audio-path modulation in [`dsp`] is a simplified bit-paced stand-in, not
//! standards-accurate V.17/V.27ter/V.29/V.21 modulation — see that module's
//! docs for why. The state machines around it (mode selection, DLE framing,
//! HDLC, T.38 timed steps) implement the full Class 1 behavior this crate
//! emulates.

#![deny(
    bad_style,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

pub mod bitpump;
pub mod callbacks;
pub mod class1;
pub mod config;
pub mod consts;
pub(crate) mod crc;
pub mod dle;
pub mod dsp;
pub mod dte;
pub mod error;
pub mod hdlc;
pub mod modem;
pub mod queue;
pub mod session;
pub mod t38;
