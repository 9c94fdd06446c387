//! T.38 timed-step transmit FSM (`spec.md` §4.5), driven by repeated calls
//! to [`T38Egress::send_timeout`].

use crate::consts::FLUSH_SILENCE_MS;
use crate::hdlc::bit_reverse_buf;
use crate::t38::{T38FieldType, T38Ifp, T38Indicator, TrainingModem, samples_for_ms, training_time_ms};

/// Named timed-step states, replacing the ordinal-suffixed step names in
/// the original design (`spec.md` §9 REDESIGN FLAGS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimedStep {
    None,
    NonEcm1,
    NonEcm2,
    NonEcm3,
    NonEcm4,
    NonEcm5,
    Hdlc1,
    Hdlc2,
    Hdlc3,
    Hdlc4,
    Ced,
    Ced2,
    Cng,
    Cng2,
    Pause,
}

/// Source of outbound bytes the egress pump chunks into IFP payloads.
/// Implemented by the session over its `tx_data` / HDLC-tx buffers, shared
/// with the audio-path bit pumps (`spec.md` §4.3).
pub trait T38TxDataSource {
    /// Pulls up to `out.len()` non-ECM bytes, returning how many were
    /// written and whether the source is now exhausted (`data_final`).
    fn pull_non_ecm_chunk(&mut self, out: &mut [u8]) -> (usize, bool);

    /// Pulls up to `out.len()` bytes of the current HDLC frame, returning
    /// `(written, frame_done, frame_is_final)`. `frame_is_final` mirrors
    /// `HdlcTxBuffer::is_final` (the poll/final bit of the frame just
    /// finished). Returns `(0, true, false)` when no frame is queued — the
    /// session should treat this like HDLC underflow.
    fn pull_hdlc_chunk(&mut self, out: &mut [u8]) -> (usize, bool, bool);

    /// Whether another HDLC frame has been queued since the last one
    /// finished (loops `HDLC_4` back to `HDLC_1` instead of ending).
    fn has_next_hdlc_frame(&self) -> bool;
}

/// Outbound T.38 timed-step pump.
pub struct T38Egress {
    step: TimedStep,
    next_tx_samples: u32,
    /// Number of times to repeat each indicator send (0 in TCP/no-pacing
    /// mode, 3 under UDP pacing).
    pub indicator_tx_count: u32,
    /// Redundant sends of the terminal data-end field.
    pub data_end_tx_count: u32,
    /// Pacing interval between data chunks (0 = send as fast as ticked, the
    /// TCP-streaming convention).
    pub ms_per_tx_chunk: u32,
    pub octets_per_data_packet: usize,
    pub use_tep: bool,
    pub merge_tx_fields: bool,
    modem: TrainingModem,
    bit_rate: u32,
    short_train: bool,
    trailer_remaining: usize,
    pending_hdlc_is_final: bool,
}

impl T38Egress {
    pub fn new() -> Self {
        Self {
            step: TimedStep::None,
            next_tx_samples: 0,
            indicator_tx_count: 3,
            data_end_tx_count: 3,
            ms_per_tx_chunk: 30,
            octets_per_data_packet: 72,
            use_tep: false,
            merge_tx_fields: false,
            modem: TrainingModem::V29,
            bit_rate: 9600,
            short_train: false,
            trailer_remaining: 0,
            pending_hdlc_is_final: false,
        }
    }

    /// `set_t38_config(without_pacing)` from `spec.md` §6.
    pub fn configure_pacing(&mut self, without_pacing: bool) {
        if without_pacing {
            self.indicator_tx_count = 0;
            self.data_end_tx_count = 1;
            self.ms_per_tx_chunk = 0;
        } else {
            self.indicator_tx_count = 3;
            self.data_end_tx_count = 3;
            self.ms_per_tx_chunk = 30;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.step == TimedStep::None
    }

    fn training_indicator(&self) -> T38Indicator {
        T38Indicator::Training {
            modem: self.modem,
            bit_rate: self.bit_rate,
            short_train: self.short_train,
        }
    }

    /// Sends an indicator `indicator_tx_count` times (at least once even
    /// under no-pacing mode, mirroring `data_end_tx_count.max(1)` below) so
    /// a lost UDP datagram doesn't cost the peer the indicator entirely.
    fn send_indicator(&self, indicator: T38Indicator, send: &mut dyn FnMut(T38Ifp)) {
        for _ in 0..self.indicator_tx_count.max(1) {
            send(T38Ifp::Indicator(indicator));
        }
    }

    pub fn start_non_ecm(&mut self, modem: TrainingModem, bit_rate: u32, short_train: bool, samples: u32) {
        self.modem = modem;
        self.bit_rate = bit_rate;
        self.short_train = short_train;
        self.step = TimedStep::NonEcm1;
        self.next_tx_samples = samples;
    }

    pub fn start_hdlc(&mut self, modem: TrainingModem, bit_rate: u32, short_train: bool, samples: u32) {
        self.modem = modem;
        self.bit_rate = bit_rate;
        self.short_train = short_train;
        self.step = TimedStep::Hdlc1;
        self.next_tx_samples = samples;
    }

    pub fn start_ced(&mut self, samples: u32) {
        self.step = TimedStep::Ced;
        self.next_tx_samples = samples;
    }

    pub fn start_cng(&mut self, samples: u32) {
        self.step = TimedStep::Cng;
        self.next_tx_samples = samples;
    }

    /// Advances the egress pump if `samples` has reached the next scheduled
    /// step, emitting zero or more IFP payloads via `send`. Returns `true`
    /// if a step ran.
    pub fn send_timeout(
        &mut self,
        samples: u32,
        source: &mut dyn T38TxDataSource,
        send: &mut dyn FnMut(T38Ifp),
    ) -> bool {
        if self.step == TimedStep::None || samples < self.next_tx_samples {
            return false;
        }
        match self.step {
            TimedStep::None => unreachable!(),
            TimedStep::NonEcm1 => {
                self.send_indicator(T38Indicator::NoSignal, send);
                self.next_tx_samples = samples + samples_for_ms(75);
                self.step = TimedStep::NonEcm2;
            }
            TimedStep::NonEcm2 => {
                self.send_indicator(self.training_indicator(), send);
                let ms = training_time_ms(self.training_indicator(), self.use_tep, false);
                self.next_tx_samples = samples + samples_for_ms(ms);
                self.step = TimedStep::NonEcm3;
            }
            TimedStep::NonEcm3 => {
                let mut buf = vec![0u8; self.octets_per_data_packet];
                let (n, done) = source.pull_non_ecm_chunk(&mut buf);
                buf.truncate(n);
                bit_reverse_buf(&mut buf);
                if done {
                    let short_len = n;
                    buf.resize(self.octets_per_data_packet, 0);
                    self.trailer_remaining = 3 * self.octets_per_data_packet + short_len;
                    send(T38Ifp::Data {
                        field_type: T38FieldType::T4NonEcmData,
                        payload: buf,
                    });
                    self.step = TimedStep::NonEcm4;
                } else {
                    send(T38Ifp::Data {
                        field_type: T38FieldType::T4NonEcmData,
                        payload: buf,
                    });
                }
                self.next_tx_samples = samples + samples_for_ms(self.ms_per_tx_chunk);
            }
            TimedStep::NonEcm4 => {
                let chunk = self.octets_per_data_packet.min(self.trailer_remaining);
                self.trailer_remaining -= chunk;
                let payload = vec![0u8; chunk];
                let field_type = if self.trailer_remaining == 0 {
                    T38FieldType::T4NonEcmSigEnd
                } else {
                    T38FieldType::T4NonEcmData
                };
                let repeats = if field_type == T38FieldType::T4NonEcmSigEnd {
                    self.data_end_tx_count.max(1)
                } else {
                    1
                };
                for _ in 0..repeats {
                    send(T38Ifp::Data {
                        field_type,
                        payload: payload.clone(),
                    });
                }
                if self.trailer_remaining == 0 {
                    self.next_tx_samples = samples + samples_for_ms(60);
                    self.step = TimedStep::NonEcm5;
                } else {
                    self.next_tx_samples = samples + samples_for_ms(self.ms_per_tx_chunk);
                }
            }
            TimedStep::NonEcm5 => {
                self.send_indicator(T38Indicator::NoSignal, send);
                self.step = TimedStep::None;
            }
            TimedStep::Hdlc1 => {
                let ind = self.training_indicator();
                self.send_indicator(ind, send);
                let ms = training_time_ms(ind, self.use_tep, true);
                self.next_tx_samples = samples + samples_for_ms(ms);
                self.step = TimedStep::Hdlc2;
            }
            TimedStep::Hdlc2 => {
                let mut buf = vec![0u8; self.octets_per_data_packet];
                let (n, frame_done, is_final) = source.pull_hdlc_chunk(&mut buf);
                buf.truncate(n);
                bit_reverse_buf(&mut buf);
                if frame_done {
                    self.pending_hdlc_is_final = is_final;
                    if self.merge_tx_fields {
                        let field_type = if is_final {
                            T38FieldType::HdlcFcsOkSigEnd
                        } else {
                            T38FieldType::HdlcFcsOk
                        };
                        send(T38Ifp::Data { field_type, payload: buf });
                        self.advance_after_frame(samples, source);
                    } else {
                        send(T38Ifp::Data {
                            field_type: T38FieldType::HdlcData,
                            payload: buf,
                        });
                        self.step = TimedStep::Hdlc3;
                        self.next_tx_samples = samples;
                    }
                } else {
                    send(T38Ifp::Data {
                        field_type: T38FieldType::HdlcData,
                        payload: buf,
                    });
                    self.next_tx_samples = samples + samples_for_ms(self.ms_per_tx_chunk);
                }
            }
            TimedStep::Hdlc3 => {
                let field_type = if self.pending_hdlc_is_final {
                    T38FieldType::HdlcFcsOkSigEnd
                } else {
                    T38FieldType::HdlcFcsOk
                };
                send(T38Ifp::Data {
                    field_type,
                    payload: Vec::new(),
                });
                self.advance_after_frame(samples, source);
            }
            TimedStep::Hdlc4 => {
                self.send_indicator(T38Indicator::NoSignal, send);
                self.step = TimedStep::None;
            }
            TimedStep::Ced => {
                self.send_indicator(T38Indicator::NoSignal, send);
                self.next_tx_samples = samples + samples_for_ms(200);
                self.step = TimedStep::Ced2;
            }
            TimedStep::Ced2 => {
                self.send_indicator(T38Indicator::Ced, send);
                self.next_tx_samples = samples + samples_for_ms(3000);
                self.step = TimedStep::Pause;
            }
            TimedStep::Cng => {
                self.send_indicator(T38Indicator::NoSignal, send);
                self.next_tx_samples = samples + samples_for_ms(200);
                self.step = TimedStep::Cng2;
            }
            TimedStep::Cng2 => {
                self.send_indicator(T38Indicator::Cng, send);
                self.next_tx_samples = samples + samples_for_ms(3000);
                self.step = TimedStep::None;
            }
            TimedStep::Pause => {
                self.next_tx_samples = samples + samples_for_ms(FLUSH_SILENCE_MS);
                self.step = TimedStep::None;
            }
        }
        true
    }

    fn advance_after_frame(&mut self, samples: u32, source: &dyn T38TxDataSource) {
        if self.pending_hdlc_is_final {
            self.step = TimedStep::Hdlc4;
            self.next_tx_samples = samples;
        } else if source.has_next_hdlc_frame() {
            self.step = TimedStep::Hdlc1;
            self.next_tx_samples = samples;
        } else {
            self.step = TimedStep::Hdlc4;
            self.next_tx_samples = samples;
        }
    }
}

impl Default for T38Egress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        non_ecm: std::collections::VecDeque<u8>,
        frame: Vec<u8>,
        frame_ptr: usize,
        is_final: bool,
        has_next: bool,
    }

    impl T38TxDataSource for FakeSource {
        fn pull_non_ecm_chunk(&mut self, out: &mut [u8]) -> (usize, bool) {
            let mut n = 0;
            while n < out.len() {
                match self.non_ecm.pop_front() {
                    Some(b) => {
                        out[n] = b;
                        n += 1;
                    }
                    None => return (n, true),
                }
            }
            (n, self.non_ecm.is_empty())
        }

        fn pull_hdlc_chunk(&mut self, out: &mut [u8]) -> (usize, bool, bool) {
            let remaining = &self.frame[self.frame_ptr..];
            let n = remaining.len().min(out.len());
            out[..n].copy_from_slice(&remaining[..n]);
            self.frame_ptr += n;
            let done = self.frame_ptr >= self.frame.len();
            (n, done, done && self.is_final)
        }

        fn has_next_hdlc_frame(&self) -> bool {
            self.has_next
        }
    }

    #[test]
    fn non_ecm_sequence_runs_no_signal_to_no_signal() {
        let mut egress = T38Egress::new();
        egress.octets_per_data_packet = 4;
        egress.start_non_ecm(TrainingModem::V29, 9600, false, 0);
        let mut source = FakeSource {
            non_ecm: vec![0xaau8, 0xbb].into(),
            frame: Vec::new(),
            frame_ptr: 0,
            is_final: false,
            has_next: false,
        };
        let mut sent = Vec::new();
        let mut samples = 0u32;
        for _ in 0..64 {
            egress.send_timeout(samples, &mut source, &mut |ifp| sent.push(ifp));
            samples += 10_000;
            if egress.is_idle() {
                break;
            }
        }
        assert!(matches!(sent.first(), Some(T38Ifp::Indicator(T38Indicator::NoSignal))));
        assert!(matches!(sent.last(), Some(T38Ifp::Indicator(T38Indicator::NoSignal))));
        let sig_end_count = sent
            .iter()
            .filter(|ifp| matches!(ifp, T38Ifp::Data { field_type: T38FieldType::T4NonEcmSigEnd, .. }))
            .count();
        assert_eq!(sig_end_count, egress.data_end_tx_count.max(1) as usize);
    }

    #[test]
    fn hdlc_sequence_ends_with_no_signal_after_final_frame() {
        let mut egress = T38Egress::new();
        egress.octets_per_data_packet = 8;
        egress.start_hdlc(TrainingModem::V17, 9600, false, 0);
        let mut source = FakeSource {
            non_ecm: Default::default(),
            frame: vec![0xff, 0x13, 0x01, 0x02],
            frame_ptr: 0,
            is_final: true,
            has_next: false,
        };
        let mut sent = Vec::new();
        let mut samples = 0u32;
        for _ in 0..16 {
            egress.send_timeout(samples, &mut source, &mut |ifp| sent.push(ifp));
            samples += 10_000;
            if egress.is_idle() {
                break;
            }
        }
        assert!(matches!(sent.last(), Some(T38Ifp::Indicator(T38Indicator::NoSignal))));
    }
}
