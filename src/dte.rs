//! DTE-facing session state machine (`spec.md` §4.2): routes bytes arriving
//! from the DTE according to the current mode, runs the DLE codec over the
//! two stuffed modes, and owns the transmit byte buffer and its flow-control
//! watermarks.
//!
//! Command-mode routing (`ONHOOK_COMMAND` / `OFFHOOK_COMMAND`) is the
//! session's job, not this module's: those bytes go straight to the AT
//! interpreter, an out-of-scope collaborator (`spec.md` §1). [`DteSession`]
//! only gets involved once the mode has left command mode.

#[cfg(feature = "std")]
use std::collections::VecDeque;

#[cfg(not(feature = "std"))]
use heapless::Deque;

use crate::callbacks::{AtResponseSink, AtResultCode};
use crate::consts::{HDLC_DCN_OCTET, TX_BUF_HIGH_WATER, TX_BUF_LOW_WATER};
#[cfg(not(feature = "std"))]
use crate::consts::T31_TX_BUF_LEN;
use crate::dle::{DleEvent, DleUnstuffer, dle_stuff};
use crate::error::{Result, T31Error};
use crate::queue::FrameQueue;

/// Inbound DTE byte-routing mode (`at_rx_mode` in `spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtRxMode {
    OnhookCommand,
    OffhookCommand,
    Hdlc,
    Stuffed,
    Delivery,
}

/// What happened while feeding a run of DTE bytes through [`DteSession::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DteFeedEvent {
    /// A complete HDLC frame (unstuffed, DTE byte order) is ready for line
    /// transmission.
    HdlcFrameSubmitted(Vec<u8>),
    /// Delivery mode was aborted by a DTE byte; the caller should flush the
    /// active receive, install `SILENCE_TX`, and respond `OK`.
    DeliveryAborted,
}

/// DTE-facing session state: mode, DLE codec, HDLC accumulation buffer, and
/// the transmit byte buffer with its watermark bookkeeping.
pub struct DteSession {
    mode: AtRxMode,
    unstuffer: DleUnstuffer,
    hdlc_accum: Vec<u8>,
    #[cfg(feature = "std")]
    tx_data: VecDeque<u8>,
    #[cfg(not(feature = "std"))]
    tx_data: Deque<u8, T31_TX_BUF_LEN>,
    cts_on: bool,
    pub data_final: bool,
    pub dte_is_waiting: bool,
    pub ok_is_pending: bool,
}

impl DteSession {
    pub fn new() -> Self {
        Self {
            mode: AtRxMode::OnhookCommand,
            unstuffer: DleUnstuffer::new(),
            hdlc_accum: Vec::new(),
            #[cfg(feature = "std")]
            tx_data: VecDeque::new(),
            #[cfg(not(feature = "std"))]
            tx_data: Deque::new(),
            cts_on: true,
            data_final: false,
            dte_is_waiting: false,
            ok_is_pending: false,
        }
    }

    pub fn mode(&self) -> AtRxMode {
        self.mode
    }

    /// Transitions into a new mode, resetting the DLE codec and any
    /// accumulated-but-undelivered bytes. Used by `class1.rs` and
    /// `session.rs` whenever a command or line event re-arms the DTE path.
    pub fn set_mode(&mut self, mode: AtRxMode) {
        self.mode = mode;
        self.unstuffer.reset();
        self.hdlc_accum.clear();
        if mode == AtRxMode::Stuffed {
            self.data_final = false;
        }
    }

    fn append_data_byte(&mut self, byte: u8, sink: &mut dyn AtResponseSink) {
        let _ = self.tx_data.push_back(byte);
        if self.cts_on && self.tx_data.len() > TX_BUF_HIGH_WATER {
            self.cts_on = false;
            sink.set_cts(false);
        }
    }

    /// Feeds one run of raw DTE bytes. Only meaningful in `Hdlc`, `Stuffed`,
    /// and `Delivery` modes; bytes fed while in a command mode are ignored
    /// here (the caller should not route them to this method).
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn AtResponseSink) -> Vec<DteFeedEvent> {
        let mut events = Vec::new();
        for &b in bytes {
            match self.mode {
                AtRxMode::Hdlc => self.feed_hdlc_byte(b, &mut events, sink),
                AtRxMode::Stuffed => self.feed_stuffed_byte(b, sink),
                AtRxMode::Delivery => {
                    events.push(DteFeedEvent::DeliveryAborted);
                    self.mode = AtRxMode::OffhookCommand;
                }
                AtRxMode::OnhookCommand | AtRxMode::OffhookCommand => {}
            }
        }
        events
    }

    fn feed_hdlc_byte(&mut self, b: u8, events: &mut Vec<DteFeedEvent>, sink: &mut dyn AtResponseSink) {
        if self.unstuffer.is_pending() {
            if let Some(pair) = self.unstuffer.feed_sub_pair(b) {
                self.hdlc_accum.push(pair[0]);
                self.hdlc_accum.push(pair[1]);
                return;
            }
        }
        match self.unstuffer.feed(b) {
            DleEvent::Literal(l) => self.hdlc_accum.push(l),
            DleEvent::Etx => {
                let frame = std::mem::take(&mut self.hdlc_accum);
                self.unstuffer.reset();
                let _ = sink; // HDLC submission carries no CTS side effect.
                events.push(DteFeedEvent::HdlcFrameSubmitted(frame));
            }
            DleEvent::Pending => {}
        }
    }

    fn feed_stuffed_byte(&mut self, b: u8, sink: &mut dyn AtResponseSink) {
        if self.unstuffer.is_pending() {
            if let Some(pair) = self.unstuffer.feed_sub_pair(b) {
                self.append_data_byte(pair[0], sink);
                self.append_data_byte(pair[1], sink);
                return;
            }
        }
        match self.unstuffer.feed(b) {
            DleEvent::Literal(l) => self.append_data_byte(l, sink),
            DleEvent::Etx => {
                self.data_final = true;
                self.mode = AtRxMode::OffhookCommand;
                self.unstuffer.reset();
            }
            DleEvent::Pending => {}
        }
    }

    /// Pulls the next buffered transmit byte for the bit pump, releasing CTS
    /// once occupancy has drained below the low-water mark.
    pub fn pull_tx_byte(&mut self, sink: &mut dyn AtResponseSink) -> Option<u8> {
        let b = self.tx_data.pop_front()?;
        if !self.cts_on && self.tx_data.len() <= TX_BUF_LOW_WATER {
            self.cts_on = true;
            sink.set_cts(true);
        }
        Some(b)
    }

    pub fn tx_buffered_len(&self) -> usize {
        self.tx_data.len()
    }

    /// Delivers a received line frame to the DTE, or queues it if no command
    /// is waiting (`hdlc_accept` in `spec.md` §4.2). `frame` is in DTE byte
    /// order and includes its trailing FCS. `ok` selects `OK` vs `ERROR` for
    /// the non-deferred case; the DCN frame (second octet `0x13`) always
    /// defers to `ok_is_pending` regardless of `ok`, matching the prose
    /// ("OK is deferred... until carrier-down").
    pub fn hdlc_accept(
        &mut self,
        frame: Vec<u8>,
        ok: bool,
        sink: &mut dyn AtResponseSink,
        queue: &mut FrameQueue,
    ) -> Result<()> {
        let is_dcn = frame.get(1).copied() == Some(HDLC_DCN_OCTET);
        if self.dte_is_waiting {
            let stuffed = dle_stuff(&frame);
            sink.write_bytes(&stuffed);
            if is_dcn {
                self.ok_is_pending = true;
            } else {
                sink.put_response_code(if ok { AtResultCode::Ok } else { AtResultCode::Error });
            }
            Ok(())
        } else {
            let code = if ok { AtResultCode::Ok } else { AtResultCode::Error };
            queue.push(code, frame).map_err(|_| T31Error::BufferExhausted)
        }
    }

    /// Resolves a deferred OK once carrier-down arrives for the batch whose
    /// last frame was a DCN.
    pub fn carrier_down(&mut self, sink: &mut dyn AtResponseSink) {
        if self.ok_is_pending {
            sink.put_response_code(AtResultCode::Ok);
            self.ok_is_pending = false;
        }
    }
}

impl Default for DteSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dle::{DLE, ETX};

    #[derive(Default)]
    struct FakeSink {
        bytes: Vec<u8>,
        codes: Vec<AtResultCode>,
        cts: Vec<bool>,
    }

    impl AtResponseSink for FakeSink {
        fn write_bytes(&mut self, bytes: &[u8]) {
            self.bytes.extend_from_slice(bytes);
        }
        fn put_response_code(&mut self, code: AtResultCode) {
            self.codes.push(code);
        }
        fn set_cts(&mut self, asserted: bool) {
            self.cts.push(asserted);
        }
    }

    #[test]
    fn hdlc_mode_submits_frame_on_dle_etx() {
        let mut dte = DteSession::new();
        dte.set_mode(AtRxMode::Hdlc);
        let mut sink = FakeSink::default();
        let events = dte.feed(&[0xff, 0x03, 0x2f, DLE, ETX], &mut sink);
        assert_eq!(
            events,
            vec![DteFeedEvent::HdlcFrameSubmitted(vec![0xff, 0x03, 0x2f])]
        );
    }

    #[test]
    fn stuffed_mode_sets_data_final_and_switches_to_offhook() {
        let mut dte = DteSession::new();
        dte.set_mode(AtRxMode::Stuffed);
        let mut sink = FakeSink::default();
        dte.feed(&[0xaa, 0xbb, DLE, ETX], &mut sink);
        assert!(dte.data_final);
        assert_eq!(dte.mode(), AtRxMode::OffhookCommand);
        assert_eq!(dte.tx_buffered_len(), 2);
    }

    #[test]
    fn delivery_mode_aborts_on_any_byte() {
        let mut dte = DteSession::new();
        dte.set_mode(AtRxMode::Delivery);
        let mut sink = FakeSink::default();
        let events = dte.feed(&[0x41], &mut sink);
        assert_eq!(events, vec![DteFeedEvent::DeliveryAborted]);
        assert_eq!(dte.mode(), AtRxMode::OffhookCommand);
    }

    #[test]
    fn dcn_frame_defers_ok_until_carrier_down() {
        let mut dte = DteSession::new();
        dte.dte_is_waiting = true;
        let mut sink = FakeSink::default();
        let mut queue = FrameQueue::new();
        dte.hdlc_accept(vec![0xff, 0x13, 0x01], true, &mut sink, &mut queue)
            .unwrap();
        assert!(dte.ok_is_pending);
        assert!(sink.codes.is_empty());
        dte.carrier_down(&mut sink);
        assert_eq!(sink.codes, vec![AtResultCode::Ok]);
        assert!(!dte.ok_is_pending);
    }

    #[test]
    fn non_waiting_frame_is_queued_with_result_code() {
        let mut dte = DteSession::new();
        dte.dte_is_waiting = false;
        let mut sink = FakeSink::default();
        let mut queue = FrameQueue::new();
        dte.hdlc_accept(vec![0xff, 0x03, 0x01], true, &mut sink, &mut queue)
            .unwrap();
        assert!(sink.bytes.is_empty());
        let rec = queue.pop().unwrap();
        assert_eq!(rec.code, AtResultCode::Ok);
    }

    #[test]
    fn high_water_mark_asserts_cts_off() {
        let mut dte = DteSession::new();
        dte.set_mode(AtRxMode::Stuffed);
        let mut sink = FakeSink::default();
        let filler = vec![0x41u8; TX_BUF_HIGH_WATER + 1];
        dte.feed(&filler, &mut sink);
        assert_eq!(sink.cts, vec![false]);
    }
}
