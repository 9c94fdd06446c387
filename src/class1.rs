//! Class-1 command dispatch (`spec.md` §4.4): translates the numeric
//! parameters carried by `AT+FTS`, `AT+FRH`, `AT+FTM`, `AT+FRM` etc. into a
//! concrete modem selection or silence action. The AT interpreter that
//! parses those commands into `(direction, operation, val)` triples is an
//! out-of-scope collaborator (`spec.md` §1); this module only covers what
//! happens once that triple is in hand.

use crate::error::{Result, T31Error};
use crate::modem::FastModem;

/// Which side of the link a class-1 command concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// The operation letter from the AT command (`S` = pace silence, `H` = HDLC,
/// anything else = the numeric modem-selection table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Silence,
    Hdlc,
    Default,
}

/// Resolved modem family for a dispatch result; `V21` only arises from the
/// `'H'` operation, never from the default table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemSelection {
    V21,
    V27ter,
    V29,
    V17,
}

/// What the session should do in response to a dispatched class-1 command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class1Action {
    /// `'S'` in the send direction: restart into `SILENCE_TX` for this many
    /// samples.
    SilenceTx { duration_samples: u32 },
    /// `'S'` in the receive direction: enter `DELIVERY` awaiting this many
    /// samples of silence.
    SilenceRxAwait { duration_samples: u32 },
    /// Start transmitting with the given modem: respond `CONNECT`
    /// immediately and enter `STUFFED` mode.
    ModemTx {
        modem: ModemSelection,
        bit_rate: u32,
        short_train: bool,
    },
    /// Start receiving with the given modem: enter `DELIVERY` mode.
    ModemRx {
        modem: ModemSelection,
        bit_rate: u32,
        short_train: bool,
    },
}

/// Samples per 10 ms unit at the session's fixed 8 kHz clock.
const SAMPLES_PER_10MS: u32 = 80;

fn lookup_default(val: i32) -> Option<(ModemSelection, u32, bool)> {
    use ModemSelection::*;
    Some(match val {
        24 => (V27ter, 2400, false),
        48 => (V27ter, 4800, false),
        72 => (V29, 7200, false),
        96 => (V29, 9600, false),
        73 => (V17, 7200, false),
        74 => (V17, 7200, true),
        97 => (V17, 9600, false),
        98 => (V17, 9600, true),
        121 => (V17, 12000, false),
        122 => (V17, 12000, true),
        145 => (V17, 14400, false),
        146 => (V17, 14400, true),
        _ => return None,
    })
}

/// Dispatches one class-1 command triple, per `spec.md` §4.4.
pub fn process_class1_cmd(direction: Direction, operation: Operation, val: i32) -> Result<Class1Action> {
    match operation {
        Operation::Silence => {
            let duration_samples = (val.max(0) as u32) * SAMPLES_PER_10MS;
            Ok(match direction {
                Direction::Send => Class1Action::SilenceTx { duration_samples },
                Direction::Receive => Class1Action::SilenceRxAwait { duration_samples },
            })
        }
        Operation::Hdlc => {
            if val != 3 {
                return Err(T31Error::UnknownClass1Value(val));
            }
            Ok(match direction {
                Direction::Send => Class1Action::ModemTx {
                    modem: ModemSelection::V21,
                    bit_rate: 300,
                    short_train: false,
                },
                Direction::Receive => Class1Action::ModemRx {
                    modem: ModemSelection::V21,
                    bit_rate: 300,
                    short_train: false,
                },
            })
        }
        Operation::Default => {
            let (modem, bit_rate, short_train) =
                lookup_default(val).ok_or(T31Error::UnknownClass1Value(val))?;
            Ok(match direction {
                Direction::Send => Class1Action::ModemTx {
                    modem,
                    bit_rate,
                    short_train,
                },
                Direction::Receive => Class1Action::ModemRx {
                    modem,
                    bit_rate,
                    short_train,
                },
            })
        }
    }
}

/// Converts a resolved [`ModemSelection`] plus direction into the concrete
/// [`FastModem`] tag `modem.rs` uses to build a TX/RX handler, when the
/// selection is a fast modem (never called for `V21`).
pub fn as_fast_modem(modem: ModemSelection) -> Option<FastModem> {
    match modem {
        ModemSelection::V21 => None,
        ModemSelection::V27ter => Some(FastModem::V27ter),
        ModemSelection::V29 => Some(FastModem::V29),
        ModemSelection::V17 => Some(FastModem::V17),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_tx_converts_val_to_samples() {
        let action = process_class1_cmd(Direction::Send, Operation::Silence, 80).unwrap();
        assert_eq!(
            action,
            Class1Action::SilenceTx {
                duration_samples: 6400
            }
        );
    }

    #[test]
    fn silence_rx_awaits_samples() {
        let action = process_class1_cmd(Direction::Receive, Operation::Silence, 10).unwrap();
        assert_eq!(
            action,
            Class1Action::SilenceRxAwait {
                duration_samples: 800
            }
        );
    }

    #[test]
    fn hdlc_val_3_selects_v21_long_training() {
        let action = process_class1_cmd(Direction::Receive, Operation::Hdlc, 3).unwrap();
        assert_eq!(
            action,
            Class1Action::ModemRx {
                modem: ModemSelection::V21,
                bit_rate: 300,
                short_train: false,
            }
        );
    }

    #[test]
    fn hdlc_other_val_is_unknown() {
        let err = process_class1_cmd(Direction::Send, Operation::Hdlc, 7).unwrap_err();
        assert_eq!(err, T31Error::UnknownClass1Value(7));
    }

    #[test]
    fn default_table_maps_short_train_variants() {
        let action = process_class1_cmd(Direction::Send, Operation::Default, 98).unwrap();
        assert_eq!(
            action,
            Class1Action::ModemTx {
                modem: ModemSelection::V17,
                bit_rate: 9600,
                short_train: true,
            }
        );
    }

    #[test]
    fn unmapped_value_is_unknown_class1_value() {
        let err = process_class1_cmd(Direction::Send, Operation::Default, 999).unwrap_err();
        assert_eq!(err, T31Error::UnknownClass1Value(999));
    }
}
