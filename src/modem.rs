//! Modem-mode FSM (`spec.md` §4.1): selects which of the ~14 logical modem
//! behaviors is active, wires up the right bit-producer/bit-consumer pair,
//! and manages dual-rail listening during fast-modem reception.
//!
//! `spec.md` §9 asks for the "mutually recursive callbacks through
//! void-pointer user-data" pattern and the "dual-rail receive" pattern to be
//! replaced with tagged variants owned by the session; [`TxHandler`] and
//! [`RxHandler`] are that replacement.

use crate::bitpump::{BitEvent, NonEcmBitSource};
use crate::consts::{
    CED_FREQUENCY_HZ, CED_LEAD_SILENCE_MS, CED_LEVEL_DBM0, CED_TONE_MS, CNG_FREQUENCY_HZ,
    CNG_LEVEL_DBM0, CNG_SILENCE_MS, CNG_TONE_MS, FLUSH_SILENCE_MS, V21_FRAMING_OK_FLAGS,
};
use crate::dsp::{BitPacedCarrier, SilenceGenerator, ToneGenerator};
use crate::hdlc::{HdlcByteDeframer, HdlcTxBuffer, bit_reverse_byte, build_line_stream};

/// Bit rate a fast modem TX/RX pair is running at.
pub type BitRate = u32;

/// Which fast (non-V.21) modulation family is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FastModem {
    V17,
    V27ter,
    V29,
}

/// The session's current modem behavior (`spec.md` §3's `modem` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModemMode {
    /// Sentinel: no modem selected yet (pre-init / between calls).
    None,
    Flush,
    SilenceTx,
    SilenceRx,
    Ced,
    Cng,
    /// CNG has been withdrawn in favor of listening only (post-handoff).
    NoCng,
    V21Tx,
    V21Rx,
    FastTx(FastModem),
    FastRx(FastModem),
}

/// Approximate number of demodulated bits needed before a fast modem
/// reports `rx_trained` — see `dsp.rs` for why this is a simplification of
/// the real training-sequence detector.
const FAST_TRAINING_BITS: u32 = 48;

/// Samples needed before V.21 framing is declared "synced enough" to win a
/// dual-rail race, expressed in flag octets per `spec.md` §4.1.
const V21_SYNC_FLAGS: u32 = V21_FRAMING_OK_FLAGS;

/// Events an [`RxHandler`] yields per sample it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemRxEvent {
    /// A demodulated non-ECM data bit / training pseudo-event.
    Bit(BitEvent),
    /// A V.21 HDLC frame candidate, FCS-validated, still in line bit order
    /// (session bit-reverses to DTE order before further processing).
    HdlcFrame { ok: bool, frame: Vec<u8> },
    /// V.21 framing has synchronized (enough flags seen) — the dual-rail
    /// tie-breaker signal named `rx_message_received` in `spec.md` §4.1.
    HdlcFramingSynced,
    /// Carrier was present but has now dropped.
    CarrierDown,
    /// The V.21 rail won a dual-rail race that started as a fast-modem
    /// listen (`spec.md` §6, §7): the peer sent an unexpected preamble
    /// instead of training the expected fast modem. Carries the event V.21
    /// itself produced (`HdlcFramingSynced` or `HdlcFrame`) so the session
    /// can still act on it once it has decided `FCERROR` vs `FRH:3`.
    UnexpectedPreamble(Box<ModemRxEvent>),
}

/// Outbound sample producer. One instance is installed per `ModemMode` by
/// [`restart_modem`]; `spec.md` §4.1 enumerates the wiring per mode.
pub enum TxHandler {
    Dummy,
    Silence(SilenceGenerator),
    /// FLUSH: a bounded period of forced silence.
    TimedSilence {
        silence: SilenceGenerator,
        remaining: u32,
    },
    /// CED: lead-in silence, then a single tone burst, no phase reversal.
    Ced {
        silence: SilenceGenerator,
        lead_remaining: u32,
        tone: ToneGenerator,
    },
    /// CNG: repeating {tone, silence} until a V.21 preamble is seen.
    Cng {
        in_tone: bool,
        tone: ToneGenerator,
        silence: SilenceGenerator,
        silence_remaining: u32,
    },
    /// V.21 HDLC transmit: preamble flags + frame bytes + closing flag,
    /// bit-paced onto the line.
    V21 {
        carrier: BitPacedCarrier,
        stream: std::collections::VecDeque<u8>,
        cur_byte: u8,
        bit_idx: u8,
        have_byte: bool,
    },
    /// Fast-modem (V.17/V.27ter/V.29) non-ECM image data transmit.
    Fast {
        carrier: BitPacedCarrier,
        source: NonEcmBitSource,
        tx_data_started: bool,
    },
}

/// Outcome of one `fill` call on a [`TxHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFillOutcome {
    /// Still producing output; `usize` samples were written this call.
    Active(usize),
    /// The one-shot phase (FLUSH silence, CED tone) has completed.
    Done(usize),
    /// The fast/V.21 bit source is exhausted and `data_final` was set:
    /// begin modem shutdown (mirrors [`crate::bitpump::GetBitOutcome::EndOfData`]).
    EndOfData,
}

impl TxHandler {
    pub fn silence() -> Self {
        TxHandler::Silence(SilenceGenerator)
    }

    pub fn flush() -> Self {
        TxHandler::TimedSilence {
            silence: SilenceGenerator,
            remaining: crate::callbacks::ms_to_samples(FLUSH_SILENCE_MS),
        }
    }

    pub fn ced() -> Self {
        TxHandler::Ced {
            silence: SilenceGenerator,
            lead_remaining: crate::callbacks::ms_to_samples(CED_LEAD_SILENCE_MS),
            tone: ToneGenerator::new(
                CED_FREQUENCY_HZ,
                CED_LEVEL_DBM0,
                crate::callbacks::ms_to_samples(CED_TONE_MS),
            ),
        }
    }

    pub fn cng() -> Self {
        TxHandler::Cng {
            in_tone: true,
            tone: ToneGenerator::new(
                CNG_FREQUENCY_HZ,
                CNG_LEVEL_DBM0,
                crate::callbacks::ms_to_samples(CNG_TONE_MS),
            ),
            silence: SilenceGenerator,
            silence_remaining: crate::callbacks::ms_to_samples(CNG_SILENCE_MS),
        }
    }

    pub fn v21(preamble_flags: usize, frame: Vec<u8>) -> Self {
        let mut tx = HdlcTxBuffer::new();
        tx.load(frame);
        let stream = build_line_stream(preamble_flags, &mut tx);
        TxHandler::V21 {
            carrier: BitPacedCarrier::new(300),
            stream: stream.into(),
            cur_byte: 0,
            bit_idx: 0,
            have_byte: false,
        }
    }

    pub fn fast(kind: FastModem, bit_rate: BitRate) -> Self {
        let _ = kind;
        TxHandler::Fast {
            carrier: BitPacedCarrier::new(bit_rate),
            source: NonEcmBitSource::new(),
            tx_data_started: false,
        }
    }

    /// Fills `out` with samples for this tick, returning how far it got.
    pub fn fill(
        &mut self,
        out: &mut [i16],
        mut pull_tx_byte: impl FnMut() -> Option<u8>,
        data_final: bool,
    ) -> TxFillOutcome {
        match self {
            TxHandler::Dummy => {
                out.fill(0);
                TxFillOutcome::Active(out.len())
            }
            TxHandler::Silence(s) => {
                s.fill(out);
                TxFillOutcome::Active(out.len())
            }
            TxHandler::TimedSilence { silence, remaining } => {
                let n = out.len().min(*remaining as usize);
                silence.fill(&mut out[..n]);
                *remaining -= n as u32;
                if *remaining == 0 {
                    TxFillOutcome::Done(n)
                } else {
                    TxFillOutcome::Active(n)
                }
            }
            TxHandler::Ced {
                silence,
                lead_remaining,
                tone,
            } => {
                if *lead_remaining > 0 {
                    let n = out.len().min(*lead_remaining as usize);
                    silence.fill(&mut out[..n]);
                    *lead_remaining -= n as u32;
                    TxFillOutcome::Active(n)
                } else {
                    let n = tone.fill(out);
                    if tone.is_done() {
                        TxFillOutcome::Done(n)
                    } else {
                        TxFillOutcome::Active(n)
                    }
                }
            }
            TxHandler::Cng {
                in_tone,
                tone,
                silence,
                silence_remaining,
            } => {
                if *in_tone {
                    let n = tone.fill(out);
                    if tone.is_done() {
                        *in_tone = false;
                        *tone = ToneGenerator::new(
                            CNG_FREQUENCY_HZ,
                            CNG_LEVEL_DBM0,
                            crate::callbacks::ms_to_samples(CNG_TONE_MS),
                        );
                        *silence_remaining = crate::callbacks::ms_to_samples(CNG_SILENCE_MS);
                    }
                    TxFillOutcome::Active(n)
                } else {
                    let n = out.len().min(*silence_remaining as usize);
                    silence.fill(&mut out[..n]);
                    *silence_remaining -= n as u32;
                    if *silence_remaining == 0 {
                        *in_tone = true;
                    }
                    TxFillOutcome::Active(n)
                }
            }
            TxHandler::V21 {
                carrier,
                stream,
                cur_byte,
                bit_idx,
                have_byte,
            } => {
                let spb = carrier.samples_per_bit() as usize;
                let mut written = 0;
                while written + spb <= out.len() {
                    if !*have_byte {
                        match stream.pop_front() {
                            Some(b) => {
                                *cur_byte = b;
                                *bit_idx = 8;
                                *have_byte = true;
                            }
                            None => return TxFillOutcome::Done(written),
                        }
                    }
                    *bit_idx -= 1;
                    let bit = (*cur_byte >> *bit_idx) & 1 != 0;
                    carrier.modulate_bit(bit, &mut out[written..written + spb]);
                    written += spb;
                    if *bit_idx == 0 {
                        *have_byte = false;
                    }
                }
                out[written..].fill(0);
                TxFillOutcome::Active(written)
            }
            TxHandler::Fast {
                carrier,
                source,
                tx_data_started,
            } => {
                let spb = carrier.samples_per_bit() as usize;
                let mut written = 0;
                while written + spb <= out.len() {
                    match source.get_bit(&mut pull_tx_byte, data_final, tx_data_started) {
                        crate::bitpump::GetBitOutcome::Bit(bit) => {
                            carrier.modulate_bit(bit, &mut out[written..written + spb]);
                            written += spb;
                        }
                        crate::bitpump::GetBitOutcome::EndOfData => {
                            out[written..].fill(0);
                            return TxFillOutcome::EndOfData;
                        }
                    }
                }
                out[written..].fill(0);
                TxFillOutcome::Active(written)
            }
        }
    }
}

/// V.21 receive state: demodulates bits, reassembles line-order bytes, and
/// splits them into frame candidates on HDLC flags.
struct V21RxState {
    carrier: BitPacedCarrier,
    deframer: HdlcByteDeframer,
    bit_acc: u8,
    bit_cnt: u8,
}

impl V21RxState {
    fn new() -> Self {
        Self {
            carrier: BitPacedCarrier::new(300),
            deframer: HdlcByteDeframer::new(),
            bit_acc: 0,
            bit_cnt: 0,
        }
    }

    fn step(&mut self, sample: i16) -> Option<ModemRxEvent> {
        let bit = self.carrier.demodulate_sample(sample)?;
        self.bit_acc = (self.bit_acc << 1) | (bit as u8);
        self.bit_cnt += 1;
        if self.bit_cnt < 8 {
            return None;
        }
        self.bit_cnt = 0;
        let was_synced = self.deframer.framing_ok(V21_SYNC_FLAGS);
        if let Some(line_frame) = self.deframer.feed(self.bit_acc) {
            let dte_frame: Vec<u8> = line_frame.iter().map(|&b| bit_reverse_byte(b)).collect();
            let ok = crate::crc::fcs_ok(&dte_frame);
            return Some(ModemRxEvent::HdlcFrame {
                ok,
                frame: dte_frame,
            });
        }
        if !was_synced && self.deframer.framing_ok(V21_SYNC_FLAGS) {
            return Some(ModemRxEvent::HdlcFramingSynced);
        }
        None
    }
}

/// Fast-modem non-ECM receive state.
struct FastRxState {
    carrier: BitPacedCarrier,
    bits_seen: u32,
    trained: bool,
}

impl FastRxState {
    fn new(bit_rate: BitRate) -> Self {
        Self {
            carrier: BitPacedCarrier::new(bit_rate),
            bits_seen: 0,
            trained: false,
        }
    }

    fn step(&mut self, sample: i16) -> Option<ModemRxEvent> {
        let bit = self.carrier.demodulate_sample(sample)?;
        if !self.trained {
            self.bits_seen += 1;
            if self.bits_seen >= FAST_TRAINING_BITS {
                self.trained = true;
                return Some(ModemRxEvent::Bit(BitEvent::TrainingSucceeded));
            }
            return None;
        }
        Some(ModemRxEvent::Bit(BitEvent::Data(bit)))
    }
}

/// Inbound handler installed per `ModemMode` (`spec.md` §4.1).
pub enum RxHandler {
    Dummy,
    V21(V21RxState),
    Fast(FastModem, FastRxState),
    /// Dual-rail listen: both demodulators run every sample until the first
    /// of (fast-trained, V.21-framing-synced) occurs, at which point the
    /// loser is dropped (`spec.md` §4.1, §8).
    EarlyFast {
        kind: FastModem,
        fast: FastRxState,
        v21: V21RxState,
    },
}

impl RxHandler {
    pub fn dummy() -> Self {
        RxHandler::Dummy
    }

    pub fn v21() -> Self {
        RxHandler::V21(V21RxState::new())
    }

    pub fn early_fast(kind: FastModem, bit_rate: BitRate) -> Self {
        RxHandler::EarlyFast {
            kind,
            fast: FastRxState::new(bit_rate),
            v21: V21RxState::new(),
        }
    }

    /// Feeds one received sample, yielding zero or more events (dual-rail
    /// can yield from both rails in the same sample only at resolution,
    /// which is at most one event here since we collapse on first hit).
    pub fn step(&mut self, sample: i16) -> Option<ModemRxEvent> {
        match self {
            RxHandler::Dummy => None,
            RxHandler::V21(v21) => v21.step(sample),
            RxHandler::Fast(_, fast) => fast.step(sample),
            RxHandler::EarlyFast { kind, fast, v21 } => {
                let fast_event = fast.step(sample);
                if let Some(ModemRxEvent::Bit(BitEvent::TrainingSucceeded)) = fast_event {
                    let won_kind = *kind;
                    let trained_fast = std::mem::replace(fast, FastRxState::new(300));
                    *self = RxHandler::Fast(won_kind, trained_fast);
                    return Some(ModemRxEvent::Bit(BitEvent::TrainingSucceeded));
                }
                let v21_event = v21.step(sample);
                match v21_event {
                    Some(ModemRxEvent::HdlcFramingSynced) | Some(ModemRxEvent::HdlcFrame { .. }) => {
                        let synced_v21 = std::mem::replace(v21, V21RxState::new());
                        let ev = v21_event;
                        *self = RxHandler::V21(synced_v21);
                        ev.map(|inner| ModemRxEvent::UnexpectedPreamble(Box::new(inner)))
                    }
                    other => other,
                }
            }
        }
    }
}
