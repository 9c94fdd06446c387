//! DLE-stuffing / unstuffing of the DTE byte stream.
//!
//! `spec.md` §9 asks for the "1-bit flag + inline switch" DLE state machine
//! to be expressed as an explicit two-state machine; `DleUnstuffer` is that
//! machine. It is shared by both inbound modes that see stuffed bytes
//! (HDLC and STUFFED/non-ECM) — they differ only in what they do with the
//! `Etx` event it yields, which is why unstuffing lives here and the
//! mode-specific handling lives in `dte.rs`.

pub const DLE: u8 = 0x10;
pub const ETX: u8 = 0x03;
pub const SUB: u8 = 0x1a;

/// DLE-unstuffer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DleState {
    #[default]
    Normal,
    EscapePending,
}

/// One decoded outcome of feeding a single raw DTE byte through the
/// unstuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DleEvent {
    /// A literal data byte to append to the destination buffer.
    Literal(u8),
    /// DLE-ETX seen: end of the current stuffed run.
    Etx,
    /// DLE seen; waiting for the following byte before anything is decided.
    Pending,
}

/// Byte-at-a-time DLE unstuffer shared by HDLC and STUFFED inbound modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DleUnstuffer {
    state: DleState,
}

impl DleUnstuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to the `Normal` state, discarding a pending escape.
    pub fn reset(&mut self) {
        self.state = DleState::Normal;
    }

    /// Feeds one raw byte from the DTE and returns what it means.
    ///
    /// DLE-DLE decodes to a single literal `DLE` byte. DLE-SUB is the
    /// transmit-only escape for "two literal DLEs" (`spec.md` §6); on the
    /// receive side accepted here for symmetry, it yields two literal DLE
    /// bytes via two calls is not possible from one `feed`, so callers that
    /// need both bytes use [`DleUnstuffer::feed_sub_pair`] instead of
    /// matching `SUB` themselves.
    pub fn feed(&mut self, byte: u8) -> DleEvent {
        match self.state {
            DleState::Normal => {
                if byte == DLE {
                    self.state = DleState::EscapePending;
                    DleEvent::Pending
                } else {
                    DleEvent::Literal(byte)
                }
            }
            DleState::EscapePending => {
                self.state = DleState::Normal;
                match byte {
                    ETX => DleEvent::Etx,
                    DLE => DleEvent::Literal(DLE),
                    SUB => DleEvent::Literal(DLE),
                    other => DleEvent::Literal(other),
                }
            }
        }
    }

    /// True when a DLE escape is pending mid-sequence (byte just consumed
    /// was a DLE whose meaning isn't known yet).
    pub fn is_pending(&self) -> bool {
        self.state == DleState::EscapePending
    }

    /// DLE-SUB decodes to *two* literal DLE bytes (`spec.md` §4.2): this
    /// helper exposes that directly rather than forcing callers to special-
    /// case `feed`'s single `Literal(DLE)` output.
    pub fn feed_sub_pair(&mut self, byte: u8) -> Option<[u8; 2]> {
        if self.state == DleState::EscapePending && byte == SUB {
            self.state = DleState::Normal;
            Some([DLE, DLE])
        } else {
            None
        }
    }
}

/// DLE-stuffs a buffer for transmission to the DTE: literal `DLE` bytes are
/// doubled and the run is terminated with `DLE ETX`.
///
/// `DLE-stuff ∘ DLE-unstuff = identity` on any buffer not containing the
/// terminator sequence itself (`spec.md` §8).
pub fn dle_stuff(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    for &b in payload {
        if b == DLE {
            out.push(DLE);
        }
        out.push(b);
    }
    out.push(DLE);
    out.push(ETX);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unstuff_all(input: &[u8]) -> (Vec<u8>, bool) {
        let mut codec = DleUnstuffer::new();
        let mut out = Vec::new();
        let mut saw_etx = false;
        for &b in input {
            match codec.feed(b) {
                DleEvent::Literal(l) => out.push(l),
                DleEvent::Etx => {
                    saw_etx = true;
                    break;
                }
                DleEvent::Pending => {}
            }
        }
        (out, saw_etx)
    }

    #[test]
    fn stuff_then_unstuff_round_trips() {
        let payload = [0x01, DLE, 0x02, 0x03, DLE, DLE];
        let stuffed = dle_stuff(&payload);
        let (decoded, saw_etx) = unstuff_all(&stuffed);
        assert!(saw_etx);
        assert_eq!(decoded, payload);
    }

    #[test]
    fn no_dle_bytes_pass_through_unchanged() {
        let payload = [1u8, 2, 3, 4, 5];
        let stuffed = dle_stuff(&payload);
        assert_eq!(&stuffed[..payload.len()], &payload[..]);
        assert_eq!(&stuffed[payload.len()..], &[DLE, ETX]);
    }

    #[test]
    fn sub_escape_yields_two_literal_dles() {
        let mut codec = DleUnstuffer::new();
        assert_eq!(codec.feed(DLE), DleEvent::Pending);
        assert_eq!(codec.feed_sub_pair(SUB), Some([DLE, DLE]));
    }
}
