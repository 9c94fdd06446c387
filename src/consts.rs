//! Constants shared across the session, modem, and T.38 modules.
//!
//! These values are pulled directly from the T.31/T.38 behavior this crate
//! emulates: buffer sizing, watermarks, timing deadlines, and tone levels.
//! Centralizing them here keeps the state machines in the other modules
//! readable and keeps magic numbers out of the transition logic.

/// Sample clock driving the whole session.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Size of the DTE-facing transmit byte buffer (`tx_data` in `spec.md` §3).
pub const T31_TX_BUF_LEN: usize = 4096;

/// Flow control asserts (CTS off) once fewer than this many bytes of
/// headroom remain in the transmit buffer.
pub const TX_BUF_HIGH_WATER: usize = T31_TX_BUF_LEN - 1024;

/// Flow control releases (CTS on) once the buffer has drained below this
/// many buffered bytes.
pub const TX_BUF_LOW_WATER: usize = 1024;

/// Maximum HDLC payload length receivable into `hdlc_rx_buf`, leaving room
/// to read two FCS bytes past the end without growing the buffer.
pub const HDLC_RX_MAX_LEN: usize = 256 - 2;

/// Capacity, in bytes, of the received-frame queue used when no DTE command
/// is currently waiting for a delivered frame.
pub const RX_QUEUE_CAPACITY: usize = 4096;

/// Maximum queued records held by the not-`std` fixed-capacity frame queue.
/// The `std` queue budgets by total bytes (`RX_QUEUE_CAPACITY`); a
/// no-alloc queue has to budget by record count instead.
#[cfg(not(feature = "std"))]
pub const RX_QUEUE_MAX_RECORDS: usize = 16;

/// V.21 HDLC transmit preamble length in flag octets (~1 s at 300 bps).
pub const V21_PREAMBLE_FLAGS: usize = 32;

/// Number of consecutive flags required before V.21 reception is considered
/// framing-synchronized.
pub const V21_FRAMING_OK_FLAGS: u32 = 5;

/// V.21 receive signal cutoff level, in dBm0.
pub const V21_RX_CUTOFF_DBM0: f32 = -39.09;

/// CNG tone level.
pub const CNG_LEVEL_DBM0: f32 = -11.0;
/// CNG tone frequency.
pub const CNG_FREQUENCY_HZ: f32 = 1100.0;
/// CNG tone-on duration.
pub const CNG_TONE_MS: u32 = 500;
/// CNG silence duration between tone bursts.
pub const CNG_SILENCE_MS: u32 = 3000;

/// CED tone level.
pub const CED_LEVEL_DBM0: f32 = -11.0;
/// CED tone frequency.
pub const CED_FREQUENCY_HZ: f32 = 2100.0;
/// Silence prefix before CED is emitted.
pub const CED_LEAD_SILENCE_MS: u32 = 200;
/// CED tone-on duration.
pub const CED_TONE_MS: u32 = 2600;

/// Forced-silence duration used by the FLUSH modem mode.
pub const FLUSH_SILENCE_MS: u32 = 200;

/// Power-meter threshold equivalent to the silence-detection floor.
pub const SILENCE_THRESHOLD_DBM0: f32 = -36.0;

/// Mid-receive stall timeout (§5: 15 s).
pub const MID_RX_TIMEOUT_SAMPLES: u32 = 15 * SAMPLE_RATE_HZ;

/// DTE data inactivity timeout during HDLC transmit (§5: 5 s).
pub const DTE_DATA_TIMEOUT_SAMPLES: u32 = 5 * SAMPLE_RATE_HZ;

/// DCN frame marker: second octet of a final HDLC control frame.
pub const HDLC_DCN_OCTET: u8 = 0x13;

/// Poll/final bit in the second octet of an HDLC control frame.
pub const HDLC_POLL_FINAL_BIT: u8 = 0x10;
