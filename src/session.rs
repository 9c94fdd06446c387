//! `T31Session`: the top-level object wiring the modem-mode FSM, the DTE
//! session FSM, the bit pumps, and (optionally) the T.38 timed-step FSMs
//! together (`spec.md` §3, §5, §6).
//!
//! The three entry points named reentrancy-disjoint in `spec.md` §5 — `rx`,
//! `tx`, `at_rx` — plus the T.38 ingress/tick methods are the only public
//! surface that mutates session state; everything else here is private
//! wiring.

use crate::bitpump::{NonEcmBitSink, PutBitAction};
use crate::callbacks::{AtResponseSink, AtResultCode, CallEvent, ModemControlHandler, T38PacketHandler};
use crate::class1::{self, Class1Action, Direction, ModemSelection, Operation};
use crate::config::SessionConfig;
use crate::consts::{
    DTE_DATA_TIMEOUT_SAMPLES, MID_RX_TIMEOUT_SAMPLES, SAMPLE_RATE_HZ, SILENCE_THRESHOLD_DBM0,
    V21_PREAMBLE_FLAGS,
};
use crate::dle::{DLE, ETX, dle_stuff};
use crate::dsp::dbm0_to_amplitude;
use crate::dte::{AtRxMode, DteFeedEvent, DteSession};
use crate::modem::{FastModem, ModemMode, ModemRxEvent, RxHandler, TxFillOutcome, TxHandler};
use crate::queue::FrameQueue;
use crate::t38::egress::{T38Egress, T38TxDataSource};
use crate::t38::ingress::{T38Ingress, T38IngressEvent};
use crate::t38::{T38FieldType, T38Ifp, T38Indicator, TrainingModem};

fn as_training_modem(fast: FastModem) -> TrainingModem {
    match fast {
        FastModem::V17 => TrainingModem::V17,
        FastModem::V27ter => TrainingModem::V27ter,
        FastModem::V29 => TrainingModem::V29,
    }
}

/// Samples per 10 ms, used for the silence-await predicate (`spec.md` §8).
const SAMPLES_PER_10MS: u32 = SAMPLE_RATE_HZ / 100;

struct T38Source<'a> {
    dte: &'a mut DteSession,
    sink: &'a mut dyn AtResponseSink,
    frame: &'a [u8],
    frame_ptr: &'a mut usize,
    frame_is_final: bool,
    has_next: bool,
}

impl<'a> T38TxDataSource for T38Source<'a> {
    fn pull_non_ecm_chunk(&mut self, out: &mut [u8]) -> (usize, bool) {
        let mut n = 0;
        while n < out.len() {
            match self.dte.pull_tx_byte(&mut *self.sink) {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => return (n, self.dte.data_final),
            }
        }
        (n, false)
    }

    fn pull_hdlc_chunk(&mut self, out: &mut [u8]) -> (usize, bool, bool) {
        let remaining = &self.frame[(*self.frame_ptr).min(self.frame.len())..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        *self.frame_ptr += n;
        let done = *self.frame_ptr >= self.frame.len();
        (n, done, done && self.frame_is_final)
    }

    fn has_next_hdlc_frame(&self) -> bool {
        self.has_next
    }
}

/// The T.31/T.38 session. Owns every piece of state named in `spec.md` §3;
/// external collaborators are reached only through the three trait objects
/// supplied at construction.
pub struct T31Session {
    config: SessionConfig,
    at_sink: Box<dyn AtResponseSink>,
    modem_control: Box<dyn ModemControlHandler>,
    t38_packet_handler: Option<Box<dyn T38PacketHandler>>,

    modem_mode: ModemMode,
    bit_rate: u32,
    short_train: bool,
    tx_handler: TxHandler,
    rx_handler: RxHandler,
    dte: DteSession,
    queue: FrameQueue,
    non_ecm_sink: NonEcmBitSink,

    samples: u32,
    call_samples: u32,
    off_hook: bool,
    rx_signal_present: bool,
    rx_trained: bool,
    timeout_rx_samples: u32,
    dte_data_deadline: Option<u32>,
    silence_awaited: u32,
    quiet_samples: u32,

    t38_mode: bool,
    t38_egress: T38Egress,
    t38_ingress: T38Ingress,
    hdlc_tx_frame: Vec<u8>,
    hdlc_tx_ptr: usize,
    hdlc_tx_is_final: bool,
    hdlc_tx_next: Option<Vec<u8>>,
}

impl T31Session {
    pub fn new(
        config: SessionConfig,
        at_sink: Box<dyn AtResponseSink>,
        modem_control: Box<dyn ModemControlHandler>,
        t38_packet_handler: Option<Box<dyn T38PacketHandler>>,
    ) -> Self {
        let mut egress = T38Egress::new();
        egress.configure_pacing(config.without_pacing);
        egress.use_tep = config.tep_mode;
        Self {
            config,
            at_sink,
            modem_control,
            t38_packet_handler,
            modem_mode: ModemMode::None,
            bit_rate: 300,
            short_train: false,
            tx_handler: TxHandler::Dummy,
            rx_handler: RxHandler::Dummy,
            dte: DteSession::new(),
            queue: FrameQueue::new(),
            non_ecm_sink: NonEcmBitSink::new(),
            samples: 0,
            call_samples: 0,
            off_hook: false,
            rx_signal_present: false,
            rx_trained: false,
            timeout_rx_samples: 0,
            dte_data_deadline: None,
            silence_awaited: 0,
            quiet_samples: 0,
            t38_mode: false,
            t38_egress: egress,
            t38_ingress: T38Ingress::new(),
            hdlc_tx_frame: Vec::new(),
            hdlc_tx_ptr: 0,
            hdlc_tx_is_final: false,
            hdlc_tx_next: None,
        }
    }

    // -- configuration knobs (`spec.md` §6) --------------------------------

    pub fn set_transmit_on_idle(&mut self, on: bool) {
        self.config.transmit_on_idle = on;
    }

    pub fn set_tep_mode(&mut self, on: bool) {
        self.config.tep_mode = on;
        self.t38_egress.use_tep = on;
    }

    pub fn set_t38_config(&mut self, without_pacing: bool) {
        self.config.without_pacing = without_pacing;
        self.t38_egress.configure_pacing(without_pacing);
    }

    pub fn set_t38_mode(&mut self, on: bool) {
        self.t38_mode = on;
    }

    // -- modem-mode FSM (`spec.md` §4.1) -----------------------------------

    /// Idempotent mode transition: a no-op when already in `new_mode`,
    /// otherwise flushes the queue, clears the training/signal flags, and
    /// installs the TX/RX handler pair for `new_mode`.
    fn restart_modem(&mut self, new_mode: ModemMode) {
        if self.modem_mode == new_mode {
            return;
        }
        self.queue.flush();
        self.rx_signal_present = false;
        self.rx_trained = false;
        self.timeout_rx_samples = 0;
        self.dte.data_final = false;
        self.modem_mode = new_mode;
        let samples = self.samples;
        match new_mode {
            ModemMode::None => {
                self.tx_handler = TxHandler::Dummy;
                self.rx_handler = RxHandler::Dummy;
            }
            ModemMode::Flush => {
                self.tx_handler = TxHandler::flush();
                self.rx_handler = RxHandler::Dummy;
            }
            ModemMode::SilenceTx => {
                self.tx_handler = TxHandler::silence();
            }
            ModemMode::SilenceRx => {
                self.rx_handler = RxHandler::Dummy;
            }
            ModemMode::Ced => {
                self.tx_handler = TxHandler::ced();
                if self.t38_mode {
                    self.t38_egress.start_ced(samples);
                }
            }
            ModemMode::Cng => {
                self.tx_handler = TxHandler::cng();
                self.rx_handler = RxHandler::v21();
                self.rx_signal_present = true;
                if self.t38_mode {
                    self.t38_egress.start_cng(samples);
                }
            }
            ModemMode::NoCng => {
                self.tx_handler = TxHandler::silence();
            }
            ModemMode::V21Tx => {
                self.tx_handler = TxHandler::Dummy;
                if self.t38_mode {
                    self.t38_egress
                        .start_hdlc(TrainingModem::V17, self.bit_rate, self.short_train, samples);
                }
            }
            ModemMode::V21Rx => {
                self.rx_handler = RxHandler::v21();
                self.rx_signal_present = true;
                self.timeout_rx_samples = samples + MID_RX_TIMEOUT_SAMPLES;
            }
            ModemMode::FastTx(fast) => {
                self.tx_handler = TxHandler::fast(fast, self.bit_rate);
                if self.t38_mode {
                    self.t38_egress
                        .start_non_ecm(as_training_modem(fast), self.bit_rate, self.short_train, samples);
                }
            }
            ModemMode::FastRx(fast) => {
                self.rx_handler = RxHandler::early_fast(fast, self.bit_rate);
                self.rx_signal_present = true;
                self.timeout_rx_samples = samples + MID_RX_TIMEOUT_SAMPLES;
            }
        }
    }

    // -- class-1 command dispatch (`spec.md` §4.4) -------------------------

    /// Dispatches a class-1 command triple, as resolved by the (external) AT
    /// interpreter into `(direction, operation, val)`.
    pub fn class1_cmd(&mut self, direction: Direction, operation: Operation, val: i32) {
        match class1::process_class1_cmd(direction, operation, val) {
            Ok(Class1Action::SilenceTx { duration_samples }) => {
                self.restart_modem(ModemMode::SilenceTx);
                self.tx_handler = TxHandler::TimedSilence {
                    silence: Default::default(),
                    remaining: duration_samples,
                };
            }
            Ok(Class1Action::SilenceRxAwait { duration_samples }) => {
                self.silence_awaited = duration_samples / SAMPLES_PER_10MS;
                self.quiet_samples = 0;
                self.dte.dte_is_waiting = true;
                self.dte.set_mode(AtRxMode::Delivery);
            }
            Ok(Class1Action::ModemTx {
                modem,
                bit_rate,
                short_train,
            }) => {
                self.short_train = short_train;
                match modem {
                    ModemSelection::V21 => {
                        self.bit_rate = 300;
                        self.restart_modem(ModemMode::V21Tx);
                        self.dte.set_mode(AtRxMode::Hdlc);
                    }
                    other => {
                        self.bit_rate = bit_rate;
                        let fast = class1::as_fast_modem(other).expect("non-V21 selection");
                        self.restart_modem(ModemMode::FastTx(fast));
                        self.dte.set_mode(AtRxMode::Stuffed);
                        self.dte_data_deadline = Some(self.samples + DTE_DATA_TIMEOUT_SAMPLES);
                    }
                }
                self.at_sink.put_response_code(AtResultCode::Connect);
            }
            Ok(Class1Action::ModemRx {
                modem,
                bit_rate,
                short_train,
            }) => {
                self.short_train = short_train;
                self.drain_queue();
                self.dte.dte_is_waiting = true;
                self.dte.set_mode(AtRxMode::Delivery);
                match modem {
                    ModemSelection::V21 => {
                        self.bit_rate = 300;
                        self.restart_modem(ModemMode::V21Rx);
                    }
                    other => {
                        self.bit_rate = bit_rate;
                        let fast = class1::as_fast_modem(other).expect("non-V21 selection");
                        self.restart_modem(ModemMode::FastRx(fast));
                    }
                }
            }
            Err(_) => {
                self.at_sink.put_response_code(AtResultCode::Error);
            }
        }
    }

    fn drain_queue(&mut self) {
        while let Some(rec) = self.queue.pop() {
            if !rec.frame.is_empty() {
                self.at_sink.write_bytes(&dle_stuff(&rec.frame));
            }
            self.at_sink.put_response_code(rec.code);
        }
    }

    // -- line-audio entry points (`spec.md` §6) ----------------------------

    pub fn rx(&mut self, samples: &[i16]) {
        if self.off_hook {
            self.call_samples += samples.len() as u32;
        }
        for &s in samples {
            if self.dte.mode() == AtRxMode::Delivery && self.silence_awaited > 0 {
                self.step_silence_predicate(s);
            }
            if let Some(event) = self.rx_handler.step(s) {
                self.handle_rx_event(event);
            }
        }
        self.samples += samples.len() as u32;
        self.check_timeouts();
    }

    fn step_silence_predicate(&mut self, sample: i16) {
        let threshold = (dbm0_to_amplitude(SILENCE_THRESHOLD_DBM0) * i16::MAX as f32) as i32;
        if (sample as i32).abs() < threshold {
            self.quiet_samples += 1;
        } else {
            self.quiet_samples = 0;
        }
        if self.quiet_samples / SAMPLES_PER_10MS >= self.silence_awaited {
            self.silence_awaited = 0;
            self.dte.dte_is_waiting = false;
            self.dte.set_mode(AtRxMode::OffhookCommand);
            self.at_sink.put_response_code(AtResultCode::Ok);
        }
    }

    fn handle_rx_event(&mut self, event: ModemRxEvent) {
        match event {
            ModemRxEvent::Bit(bit_event) => {
                let action = self
                    .non_ecm_sink
                    .put_bit(bit_event, |bytes| self.at_sink.write_bytes(bytes));
                match action {
                    PutBitAction::Connected => {
                        self.rx_trained = true;
                        self.timeout_rx_samples = self.samples + MID_RX_TIMEOUT_SAMPLES;
                        self.at_sink.put_response_code(AtResultCode::Connect);
                    }
                    PutBitAction::ByteEmitted => {
                        self.timeout_rx_samples = self.samples + MID_RX_TIMEOUT_SAMPLES;
                    }
                    PutBitAction::CarrierLost => {
                        self.timeout_rx_samples = 0;
                        self.at_sink.write_bytes(&[DLE, ETX]);
                        self.at_sink.put_response_code(AtResultCode::NoCarrier);
                        self.dte.set_mode(AtRxMode::OffhookCommand);
                    }
                    PutBitAction::None => {}
                }
            }
            ModemRxEvent::HdlcFrame { ok, frame } => {
                self.timeout_rx_samples = 0;
                let _ = self.dte.hdlc_accept(frame, ok, self.at_sink.as_mut(), &mut self.queue);
            }
            ModemRxEvent::HdlcFramingSynced => {
                self.timeout_rx_samples = self.samples + MID_RX_TIMEOUT_SAMPLES;
                if self.modem_mode == ModemMode::Cng {
                    self.restart_modem(ModemMode::V21Rx);
                }
            }
            ModemRxEvent::CarrierDown => {
                self.timeout_rx_samples = 0;
                self.dte.carrier_down(self.at_sink.as_mut());
                self.at_sink.put_response_code(AtResultCode::NoCarrier);
                self.dte.set_mode(AtRxMode::OffhookCommand);
            }
            ModemRxEvent::UnexpectedPreamble(inner) => {
                if self.config.adaptive_receive {
                    // The rx_handler already collapsed to V21RxState
                    // (modem.rs); reflect that in the session's own mode
                    // bookkeeping without going through restart_modem, which
                    // would reinstall a fresh RxHandler and flush the queue.
                    self.modem_mode = ModemMode::V21Rx;
                    self.at_sink.put_response_code(AtResultCode::Frh3);
                    self.at_sink.put_response_code(AtResultCode::Connect);
                    self.handle_rx_event(*inner);
                } else {
                    self.timeout_rx_samples = 0;
                    self.at_sink.put_response_code(AtResultCode::FcError);
                    self.dte.set_mode(AtRxMode::OffhookCommand);
                }
            }
        }
    }

    pub fn tx(&mut self, out: &mut [i16]) -> usize {
        let data_final = self.dte.data_final;
        let dte = &mut self.dte;
        let at_sink = self.at_sink.as_mut();
        let outcome = self
            .tx_handler
            .fill(out, || dte.pull_tx_byte(&mut *at_sink), data_final);
        let written = match outcome {
            TxFillOutcome::Active(n) => n,
            TxFillOutcome::Done(n) => n,
            TxFillOutcome::EndOfData => {
                self.at_sink.put_response_code(AtResultCode::Ok);
                self.dte.set_mode(AtRxMode::OffhookCommand);
                self.restart_modem(ModemMode::SilenceTx);
                0
            }
        };
        if self.config.transmit_on_idle && written < out.len() {
            out[written..].fill(0);
            return out.len();
        }
        written
    }

    // -- DTE entry point (`spec.md` §6) ------------------------------------

    pub fn at_rx(&mut self, bytes: &[u8]) {
        if matches!(self.dte.mode(), AtRxMode::OnhookCommand | AtRxMode::OffhookCommand) {
            // Command-mode routing to the AT interpreter is the caller's
            // job (`spec.md` §1); nothing to do here.
            return;
        }
        if self.dte.mode() == AtRxMode::Stuffed {
            self.dte_data_deadline = Some(self.samples + DTE_DATA_TIMEOUT_SAMPLES);
        }
        let events = self.dte.feed(bytes, self.at_sink.as_mut());
        for event in events {
            match event {
                DteFeedEvent::HdlcFrameSubmitted(frame) => {
                    if self.t38_mode {
                        if self.hdlc_tx_frame.is_empty() || self.hdlc_tx_ptr >= self.hdlc_tx_frame.len() {
                            self.load_hdlc_tx(frame);
                        } else {
                            self.hdlc_tx_next = Some(frame);
                        }
                    } else {
                        self.tx_handler = TxHandler::v21(V21_PREAMBLE_FLAGS, frame);
                    }
                }
                DteFeedEvent::DeliveryAborted => {
                    if self.rx_signal_present {
                        self.at_sink.write_bytes(&[DLE, ETX]);
                    }
                    self.restart_modem(ModemMode::SilenceTx);
                    self.at_sink.put_response_code(AtResultCode::Ok);
                }
            }
        }
    }

    fn load_hdlc_tx(&mut self, frame: Vec<u8>) {
        self.hdlc_tx_is_final = frame
            .get(1)
            .map_or(false, |&b| b & crate::consts::HDLC_POLL_FINAL_BIT != 0);
        self.hdlc_tx_frame = frame;
        self.hdlc_tx_ptr = 0;
    }

    // -- call progress (`spec.md` §6) ---------------------------------------

    pub fn call_event(&mut self, event: CallEvent) {
        match event {
            CallEvent::Ring => {}
            CallEvent::Answered => {
                self.off_hook = true;
                self.call_samples = 0;
                self.modem_control.off_hook();
                self.restart_modem(ModemMode::Cng);
            }
            CallEvent::Hangup => {
                self.off_hook = false;
                self.restart_modem(ModemMode::None);
                self.dte.set_mode(AtRxMode::OnhookCommand);
            }
        }
    }

    fn check_timeouts(&mut self) {
        if self.timeout_rx_samples != 0 && self.samples >= self.timeout_rx_samples {
            self.timeout_rx_samples = 0;
            #[cfg(feature = "log")]
            log::warn!("mid-receive timeout");
        }
        if let Some(deadline) = self.dte_data_deadline {
            if self.samples >= deadline {
                self.dte_data_deadline = None;
                self.at_sink.put_response_code(AtResultCode::Error);
                self.restart_modem(ModemMode::SilenceTx);
            }
        }
        if self.off_hook
            && !self.rx_trained
            && self.modem_mode == ModemMode::Cng
            && self.call_samples >= self.config.s7_seconds * SAMPLE_RATE_HZ
        {
            self.at_sink.put_response_code(AtResultCode::NoCarrier);
            self.modem_control.on_hook();
            self.off_hook = false;
        }
    }

    // -- T.38 egress tick (`spec.md` §4.5, §6) ------------------------------

    pub fn t38_send_timeout(&mut self, samples_elapsed: u32) {
        self.samples += samples_elapsed;
        let samples = self.samples;
        let mut source = T38Source {
            dte: &mut self.dte,
            sink: self.at_sink.as_mut(),
            frame: &self.hdlc_tx_frame,
            frame_ptr: &mut self.hdlc_tx_ptr,
            frame_is_final: self.hdlc_tx_is_final,
            has_next: self.hdlc_tx_next.is_some(),
        };
        let handler = &mut self.t38_packet_handler;
        self.t38_egress.send_timeout(samples, &mut source, &mut |ifp| {
            if let Some(h) = handler.as_deref_mut() {
                h.send_ifp(&encode_ifp(&ifp));
            }
        });
        if let Some(next) = self.hdlc_tx_next.take() {
            if self.hdlc_tx_ptr >= self.hdlc_tx_frame.len() {
                self.load_hdlc_tx(next);
            } else {
                self.hdlc_tx_next = Some(next);
            }
        }
    }

    // -- T.38 ingress (`spec.md` §4.6, §6) ----------------------------------

    pub fn process_rx_indicator(&mut self, indicator: T38Indicator) {
        let samples = self.samples;
        let events = self.t38_ingress.process_rx_indicator(indicator, samples);
        self.handle_t38_ingress_events(events);
    }

    pub fn process_rx_data(&mut self, field_type: T38FieldType, buf: &[u8]) {
        let samples = self.samples;
        let events = self.t38_ingress.process_rx_data(field_type, buf, samples);
        self.handle_t38_ingress_events(events);
    }

    pub fn process_rx_missing(&mut self) {
        self.t38_ingress.process_rx_missing();
    }

    fn handle_t38_ingress_events(&mut self, events: Vec<T38IngressEvent>) {
        for event in events {
            match event {
                T38IngressEvent::CarrierDown => {
                    self.dte.carrier_down(self.at_sink.as_mut());
                    self.at_sink.put_response_code(AtResultCode::NoCarrier);
                    self.dte.set_mode(AtRxMode::OffhookCommand);
                }
                T38IngressEvent::TrainingSucceeded => {
                    self.rx_trained = true;
                    self.at_sink.put_response_code(AtResultCode::Connect);
                }
                T38IngressEvent::HdlcFrameReady { frame, ok } => {
                    let _ = self.dte.hdlc_accept(frame, ok, self.at_sink.as_mut(), &mut self.queue);
                }
                T38IngressEvent::NonEcmData(bytes) => {
                    let mut out = Vec::with_capacity(bytes.len());
                    for b in bytes {
                        if b == DLE {
                            out.push(DLE);
                        }
                        out.push(b);
                    }
                    self.at_sink.write_bytes(&out);
                }
                T38IngressEvent::NonEcmComplete => {
                    self.at_sink.write_bytes(&[DLE, ETX]);
                    self.at_sink.put_response_code(AtResultCode::Ok);
                    self.dte.set_mode(AtRxMode::OffhookCommand);
                }
            }
        }
    }

    pub fn release(self) {
        drop(self);
    }
}

/// Minimal IFP payload encoding: a 1-byte tag followed by the field's raw
/// bytes. The real `t38_core` collaborator (`spec.md` §1) owns the actual
/// wire encoding (UDPTL/RTP framing, sequence numbers); this crate only
/// needs a stable byte representation to hand to [`T38PacketHandler`].
fn encode_ifp(ifp: &T38Ifp) -> Vec<u8> {
    match ifp {
        T38Ifp::Indicator(ind) => {
            let mut out = vec![0u8];
            out.push(indicator_tag(*ind));
            out
        }
        T38Ifp::Data { field_type, payload } => {
            let mut out = vec![1u8, field_type_tag(*field_type)];
            out.extend_from_slice(payload);
            out
        }
    }
}

fn indicator_tag(ind: T38Indicator) -> u8 {
    match ind {
        T38Indicator::NoSignal => 0,
        T38Indicator::Cng => 1,
        T38Indicator::Ced => 2,
        T38Indicator::V21Preamble => 3,
        T38Indicator::Training { .. } => 4,
    }
}

fn field_type_tag(field_type: T38FieldType) -> u8 {
    match field_type {
        T38FieldType::HdlcData => 0,
        T38FieldType::HdlcFcsOk => 1,
        T38FieldType::HdlcFcsOkSigEnd => 2,
        T38FieldType::HdlcFcsBad => 3,
        T38FieldType::HdlcFcsBadSigEnd => 4,
        T38FieldType::HdlcSigEnd => 5,
        T38FieldType::T4NonEcmData => 6,
        T38FieldType::T4NonEcmSigEnd => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::fcs16;

    #[derive(Default)]
    struct FakeSink {
        bytes: Vec<u8>,
        codes: Vec<AtResultCode>,
    }

    impl AtResponseSink for FakeSink {
        fn write_bytes(&mut self, bytes: &[u8]) {
            self.bytes.extend_from_slice(bytes);
        }
        fn put_response_code(&mut self, code: AtResultCode) {
            self.codes.push(code);
        }
        fn set_cts(&mut self, _asserted: bool) {}
    }

    #[derive(Clone, Default)]
    struct SharedSink(std::rc::Rc<std::cell::RefCell<FakeSink>>);

    impl AtResponseSink for SharedSink {
        fn write_bytes(&mut self, bytes: &[u8]) {
            self.0.borrow_mut().write_bytes(bytes);
        }
        fn put_response_code(&mut self, code: AtResultCode) {
            self.0.borrow_mut().put_response_code(code);
        }
        fn set_cts(&mut self, asserted: bool) {
            self.0.borrow_mut().set_cts(asserted);
        }
    }

    struct FakeModemControl {
        off_hook_calls: u32,
        on_hook_calls: u32,
    }

    impl ModemControlHandler for FakeModemControl {
        fn off_hook(&mut self) {
            self.off_hook_calls += 1;
        }
        fn on_hook(&mut self) {
            self.on_hook_calls += 1;
        }
    }

    // Scenario 1 (`spec.md` §8): AT+FTS=8 — session enters SILENCE_TX with
    // a 6400-sample silence burst, then signals OK on exhaustion.
    #[test]
    fn silence_tx_scenario() {
        let sink = Box::new(FakeSink::default());
        let control = Box::new(FakeModemControl {
            off_hook_calls: 0,
            on_hook_calls: 0,
        });
        let mut session = T31Session::new(SessionConfig::new(), sink, control, None);
        session.class1_cmd(Direction::Send, Operation::Silence, 80);
        let mut out = vec![1i16; 10_000];
        let n = session.tx(&mut out);
        assert_eq!(n, out.len());
        assert!(out[..6400].iter().all(|&s| s == 0));
    }

    // Scenario 3 (`spec.md` §8): AT+FTM=96, DTE sends image data terminated
    // with DLE-ETX; the bit pump eventually reports END_OF_DATA and the
    // session emits OK, returning to OFFHOOK_COMMAND.
    #[test]
    fn stuffed_mode_ends_with_ok_on_data_final() {
        let sink = Box::new(FakeSink::default());
        let control = Box::new(FakeModemControl {
            off_hook_calls: 0,
            on_hook_calls: 0,
        });
        let mut session = T31Session::new(SessionConfig::new(), sink, control, None);
        session.class1_cmd(Direction::Send, Operation::Default, 96);
        session.at_rx(&[0xaa, 0xbb, DLE, ETX]);
        let mut out = vec![0i16; 64];
        for _ in 0..200 {
            session.tx(&mut out);
            if session.dte.mode() == AtRxMode::OffhookCommand {
                break;
            }
        }
        assert_eq!(session.dte.mode(), AtRxMode::OffhookCommand);
    }

    // Scenario 6 (`spec.md` §8): a final DCN frame with good FCS defers OK
    // until carrier-down.
    #[test]
    fn dcn_frame_ok_deferred_until_carrier_down() {
        let sink = Box::new(FakeSink::default());
        let control = Box::new(FakeModemControl {
            off_hook_calls: 0,
            on_hook_calls: 0,
        });
        let mut session = T31Session::new(SessionConfig::new(), sink, control, None);
        session.dte.dte_is_waiting = true;
        let payload = [0xff, 0x13, 0x01];
        let fcs = fcs16(&payload);
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&fcs);
        let ok = crate::crc::fcs_ok(&frame);
        session
            .dte
            .hdlc_accept(frame, ok, session.at_sink.as_mut(), &mut session.queue)
            .unwrap();
        assert!(session.dte.ok_is_pending);
    }

    // `spec.md` §6, §7: a fast-modem receive that instead sees a V.21
    // preamble reports `FCERROR` with adaptive receive off.
    #[test]
    fn unexpected_preamble_reports_fcerror_with_adaptive_receive_off() {
        let shared = SharedSink::default();
        let observe = shared.clone();
        let control = Box::new(FakeModemControl {
            off_hook_calls: 0,
            on_hook_calls: 0,
        });
        let mut session = T31Session::new(SessionConfig::new(), Box::new(shared), control, None);
        session.class1_cmd(Direction::Receive, Operation::Default, 96);

        let frame = vec![0xff, 0x03, 0x01];
        let mut peer_tx = TxHandler::v21(8, frame);
        let mut line = vec![0i16; 160];
        loop {
            let outcome = peer_tx.fill(&mut line, || None, false);
            session.rx(&line);
            if matches!(outcome, TxFillOutcome::Done(_)) {
                break;
            }
        }
        assert!(observe.0.borrow().codes.contains(&AtResultCode::FcError));
        assert_eq!(session.dte.mode(), AtRxMode::OffhookCommand);
    }

    // Same race, adaptive receive on: `FRH:3` followed by `CONNECT`, and
    // receive continues on V.21 rather than aborting.
    #[test]
    fn unexpected_preamble_reports_frh3_then_connect_with_adaptive_receive_on() {
        let shared = SharedSink::default();
        let observe = shared.clone();
        let control = Box::new(FakeModemControl {
            off_hook_calls: 0,
            on_hook_calls: 0,
        });
        let config = SessionConfig::new().with_adaptive_receive(true);
        let mut session = T31Session::new(config, Box::new(shared), control, None);
        session.class1_cmd(Direction::Receive, Operation::Default, 96);

        let frame = vec![0xff, 0x03, 0x01];
        let mut peer_tx = TxHandler::v21(8, frame);
        let mut line = vec![0i16; 160];
        loop {
            let outcome = peer_tx.fill(&mut line, || None, false);
            session.rx(&line);
            if matches!(outcome, TxFillOutcome::Done(_)) {
                break;
            }
        }
        let codes = observe.0.borrow().codes.clone();
        assert!(codes.contains(&AtResultCode::Frh3));
        assert!(codes.contains(&AtResultCode::Connect));
        assert_eq!(session.modem_mode, ModemMode::V21Rx);
    }
}
