//! T.38 inbound indicator/data/missing handling (`spec.md` §4.6).

use crate::consts::MID_RX_TIMEOUT_SAMPLES;
use crate::hdlc::{HdlcRxBuffer, bit_reverse_buf, bit_reverse_byte};
use crate::t38::{T38FieldType, T38Indicator};

/// Events raised while processing inbound T.38 indicators/data, consumed by
/// the session the same way audio-path `BitEvent`s and HDLC frames are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum T38IngressEvent {
    /// Carrier (or the simulated equivalent) has dropped.
    CarrierDown,
    /// Training succeeded on the non-ECM path.
    TrainingSucceeded,
    /// A complete, line-to-DTE bit-reversed HDLC frame is ready for
    /// `hdlc_accept`. `ok` reflects whether the peer reported a good or bad
    /// FCS.
    HdlcFrameReady { frame: Vec<u8>, ok: bool },
    /// A chunk of non-ECM image data, already bit-reversed to DTE order.
    NonEcmData(Vec<u8>),
    /// The non-ECM burst has completed.
    NonEcmComplete,
}

/// T.38 inbound state: current indicator, the mid-receive timeout deadline,
/// and the HDLC reassembly buffer.
pub struct T38Ingress {
    current_indicator: Option<T38Indicator>,
    timeout_rx_samples: u32,
    pub missing_data: bool,
    hdlc_rx: HdlcRxBuffer,
    training_reported: bool,
    non_ecm_sig_end_seen: bool,
}

impl T38Ingress {
    pub fn new() -> Self {
        Self {
            current_indicator: None,
            timeout_rx_samples: 0,
            missing_data: false,
            hdlc_rx: HdlcRxBuffer::new(),
            training_reported: false,
            non_ecm_sig_end_seen: false,
        }
    }

    fn in_non_ecm(&self) -> bool {
        // A non-ECM burst is active once the first T4_NON_ECM_DATA field has
        // arrived under the current indicator, tracked here as
        // `training_reported` since that flag is set on exactly that event.
        self.training_reported
    }

    /// `process_rx_indicator(ind)`: duplicates of the current indicator are
    /// ignored; training indicators arm the mid-receive timeout; `NO_SIGNAL`
    /// while a carrier was present reports carrier-down.
    pub fn process_rx_indicator(&mut self, indicator: T38Indicator, samples: u32) -> Vec<T38IngressEvent> {
        if self.current_indicator == Some(indicator) {
            return Vec::new();
        }
        let mut events = Vec::new();
        if indicator == T38Indicator::NoSignal
            && matches!(
                self.current_indicator,
                Some(T38Indicator::V21Preamble) | Some(T38Indicator::Cng) | Some(T38Indicator::Training { .. })
            )
        {
            events.push(T38IngressEvent::CarrierDown);
        }
        if matches!(indicator, T38Indicator::Training { .. } | T38Indicator::V21Preamble) {
            self.timeout_rx_samples = samples + MID_RX_TIMEOUT_SAMPLES;
        }
        self.hdlc_rx.reset();
        self.missing_data = false;
        self.training_reported = false;
        self.non_ecm_sig_end_seen = false;
        self.current_indicator = Some(indicator);
        events
    }

    /// `process_rx_data(type, field_type, buf, len)`.
    pub fn process_rx_data(&mut self, field_type: T38FieldType, buf: &[u8], samples: u32) -> Vec<T38IngressEvent> {
        match field_type {
            T38FieldType::HdlcData => {
                if self.timeout_rx_samples == 0 {
                    self.timeout_rx_samples = samples + MID_RX_TIMEOUT_SAMPLES;
                    if buf.first() != Some(&0xff) {
                        self.missing_data = true;
                    }
                }
                for &b in buf {
                    self.hdlc_rx.push(bit_reverse_byte(b));
                }
                Vec::new()
            }
            T38FieldType::HdlcFcsOk => self.deliver_hdlc(true, false),
            T38FieldType::HdlcFcsOkSigEnd => self.deliver_hdlc(true, true),
            T38FieldType::HdlcFcsBad => {
                self.hdlc_rx.reset();
                Vec::new()
            }
            T38FieldType::HdlcFcsBadSigEnd => {
                self.hdlc_rx.reset();
                vec![T38IngressEvent::CarrierDown]
            }
            T38FieldType::HdlcSigEnd => {
                if self.in_non_ecm() {
                    // Peer-quirk tolerance: some peers send HDLC_SIG_END
                    // where a T4_NON_ECM_SIG_END was expected.
                    self.finish_non_ecm(&[])
                } else {
                    self.hdlc_rx.reset();
                    vec![T38IngressEvent::CarrierDown]
                }
            }
            T38FieldType::T4NonEcmData => {
                let mut events = Vec::new();
                if !self.training_reported {
                    events.push(T38IngressEvent::TrainingSucceeded);
                    self.training_reported = true;
                }
                let mut out = buf.to_vec();
                bit_reverse_buf(&mut out);
                events.push(T38IngressEvent::NonEcmData(out));
                events
            }
            T38FieldType::T4NonEcmSigEnd => {
                if self.non_ecm_sig_end_seen {
                    return Vec::new();
                }
                self.non_ecm_sig_end_seen = true;
                self.finish_non_ecm(buf)
            }
        }
    }

    fn deliver_hdlc(&mut self, ok: bool, sig_end: bool) -> Vec<T38IngressEvent> {
        let mut events = Vec::new();
        if !self.hdlc_rx.is_empty() && !self.missing_data {
            events.push(T38IngressEvent::HdlcFrameReady {
                frame: self.hdlc_rx.as_slice().to_vec(),
                ok,
            });
        }
        self.hdlc_rx.reset();
        self.timeout_rx_samples = 0;
        if sig_end {
            events.push(T38IngressEvent::CarrierDown);
        }
        events
    }

    fn finish_non_ecm(&mut self, trailing: &[u8]) -> Vec<T38IngressEvent> {
        let mut events = Vec::new();
        if !trailing.is_empty() {
            let mut out = trailing.to_vec();
            bit_reverse_buf(&mut out);
            events.push(T38IngressEvent::NonEcmData(out));
        }
        events.push(T38IngressEvent::NonEcmComplete);
        self.timeout_rx_samples = 0;
        events
    }

    /// `process_rx_missing`: no retransmission request exists; recovery is
    /// best-effort.
    pub fn process_rx_missing(&mut self) {
        self.missing_data = true;
    }
}

impl Default for T38Ingress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdlc_data_without_indicator_and_bad_first_byte_sets_missing_data() {
        let mut ingress = T38Ingress::new();
        let events = ingress.process_rx_data(T38FieldType::HdlcData, &[0x21, 0x01], 0);
        assert!(events.is_empty());
        assert!(ingress.missing_data);
        let events = ingress.process_rx_data(T38FieldType::HdlcFcsOk, &[], 1000);
        assert!(events.is_empty(), "frame with missing_data must be discarded");
    }

    #[test]
    fn well_formed_hdlc_frame_is_delivered_on_fcs_ok() {
        let mut ingress = T38Ingress::new();
        ingress.process_rx_indicator(T38Indicator::V21Preamble, 0);
        ingress.process_rx_data(T38FieldType::HdlcData, &[0xff, 0x03], 10);
        let events = ingress.process_rx_data(T38FieldType::HdlcFcsOk, &[], 20);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], T38IngressEvent::HdlcFrameReady { ok: true, .. }));
    }

    #[test]
    fn duplicate_non_ecm_sig_end_is_suppressed() {
        let mut ingress = T38Ingress::new();
        ingress.process_rx_data(T38FieldType::T4NonEcmData, &[0x01], 0);
        let first = ingress.process_rx_data(T38FieldType::T4NonEcmSigEnd, &[], 10);
        assert!(first.contains(&T38IngressEvent::NonEcmComplete));
        let second = ingress.process_rx_data(T38FieldType::T4NonEcmSigEnd, &[], 20);
        assert!(second.is_empty());
    }

    #[test]
    fn no_signal_after_preamble_reports_carrier_down() {
        let mut ingress = T38Ingress::new();
        ingress.process_rx_indicator(T38Indicator::V21Preamble, 0);
        let events = ingress.process_rx_indicator(T38Indicator::NoSignal, 100);
        assert_eq!(events, vec![T38IngressEvent::CarrierDown]);
    }
}
