//! Internal error kinds.
//!
//! These are "discrete reportable outcomes, not exceptions" (`spec.md` §7):
//! the session never lets one of these escape across `rx`/`tx`/`at_rx` — it
//! translates each into an AT response code or a log line. The type exists
//! so the translation happens in one place instead of being re-derived at
//! every call site.

use thiserror::Error;

/// Error kinds arising inside the session's state machines.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum T31Error {
    /// No DTE data arrived within the HDLC-transmit inactivity window.
    #[error("DTE supplied no data within the transmit timeout")]
    DteTimeout,

    /// S7 seconds elapsed after off-hook without a carrier being found.
    #[error("no carrier detected before answer timeout")]
    NoCarrierOnAnswer,

    /// 15 s elapsed mid-burst without the expected frame completing.
    #[error("receive stalled mid-burst")]
    MidReceiveTimeout,

    /// A fast modem's carrier was detected as a V.21 preamble instead.
    #[error("carrier detected as V.21 preamble during fast-modem receive")]
    CarrierError,

    /// The DTE overran a buffer (stuffed-data or HDLC) faster than it drains.
    #[error("DTE overran buffer; bytes dropped")]
    BufferExhausted,

    /// `process_class1_cmd` received a numeric parameter with no mapping.
    #[error("unrecognized class-1 parameter: {0}")]
    UnknownClass1Value(i32),
}

/// Convenience alias for fallible internal operations.
pub type Result<T> = core::result::Result<T, T31Error>;
