//! T.38 real-time fax relay support: the timed-step egress pump
//! (`spec.md` §4.5) and the ingress indicator/data/missing handlers
//! (`spec.md` §4.6). Both sides share the indicator and field-type
//! vocabulary defined here.
//!
//! Naming follows the `T38Indicator` / `T38FieldType` conventions of the
//! `spandsp` T.38 core referenced in the example pack, without pulling in
//! its packetization layer — this crate only needs the payload-level
//! vocabulary, leaving IFP/UDPTL sequencing to the `T38PacketHandler`
//! collaborator (`spec.md` §1).

pub mod egress;
pub mod ingress;

use crate::callbacks::ms_to_samples;

/// Which fast modem a training indicator names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainingModem {
    V17,
    V27ter,
    V29,
}

/// T.38 indicator values this crate emits or consumes (`spec.md` §4.5/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum T38Indicator {
    NoSignal,
    Cng,
    Ced,
    V21Preamble,
    Training {
        modem: TrainingModem,
        bit_rate: u32,
        short_train: bool,
    },
}

/// T.38 data field types (`spec.md` §4.5/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum T38FieldType {
    HdlcData,
    HdlcFcsOk,
    HdlcFcsOkSigEnd,
    HdlcFcsBad,
    HdlcFcsBadSigEnd,
    HdlcSigEnd,
    T4NonEcmData,
    T4NonEcmSigEnd,
}

/// One outbound IFP payload, handed to the session's `T38PacketHandler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum T38Ifp {
    Indicator(T38Indicator),
    Data {
        field_type: T38FieldType,
        payload: Vec<u8>,
    },
}

/// Approximate training time, in milliseconds, for a given indicator.
///
/// `spec.md` §4.5 calls for this tabulated per indicator × {with_tep,
/// without_tep} × {plain, with_flags}; since the real modulation timing
/// lives in the out-of-scope DSP engine (`spec.md` §1), these are
/// representative figures in the right ballpark per modem family, not
/// values transcribed from a specific DSP implementation.
pub fn training_time_ms(indicator: T38Indicator, use_tep: bool, with_flags: bool) -> u32 {
    let base = match indicator {
        T38Indicator::V21Preamble => 1000,
        T38Indicator::Training {
            modem: TrainingModem::V17,
            short_train,
            ..
        } => {
            if short_train {
                93
            } else {
                1393
            }
        }
        T38Indicator::Training {
            modem: TrainingModem::V27ter,
            bit_rate,
            ..
        } => {
            if bit_rate >= 4800 {
                708
            } else {
                943
            }
        }
        T38Indicator::Training {
            modem: TrainingModem::V29,
            short_train,
            ..
        } => {
            if short_train {
                100
            } else {
                200
            }
        }
        T38Indicator::NoSignal | T38Indicator::Cng | T38Indicator::Ced => 0,
    };
    let tep = if use_tep { 100 } else { 0 };
    let flags = if with_flags { 113 } else { 0 };
    base + tep + flags
}

pub(crate) fn samples_for_ms(ms: u32) -> u32 {
    ms_to_samples(ms)
}
