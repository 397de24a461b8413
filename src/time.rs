//! Split-representation timestamp arithmetic.
//!
//! PTP time is carried as a (seconds, nanoseconds) pair on the wire and inside the hardware
//! timestamping unit, so the whole engine computes on that split form instead of flat nanosecond
//! integers. [`Timestamp`] is the unsigned variant used for absolute times, [`TimestampSigned`]
//! the signed variant used for offsets and differences, with both fields carrying the same sign.

use crate::error::Error;

/// Nanoseconds in one second.
pub const NS_IN_SECOND: u32 = 1_000_000_000;

/// Ten milliseconds in nanoseconds: the turnaround and residence watchdog ceiling.
pub const TEN_MS_IN_NS: u64 = 10_000_000;

/// An absolute point in time as `(seconds, nanoseconds)` with `nanoseconds < 10⁹`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Timestamp {
    /// Whole seconds.
    pub seconds: u64,
    /// Nanoseconds within the second, `[0, 10⁹)`.
    pub nanoseconds: u32,
}

impl Timestamp {
    /// Zero time.
    pub const ZERO: Timestamp = Timestamp {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Create a timestamp, normalizing a nanoseconds part of one second or more into the seconds
    /// field.
    pub const fn new(seconds: u64, nanoseconds: u32) -> Self {
        Self {
            seconds: seconds + (nanoseconds / NS_IN_SECOND) as u64,
            nanoseconds: nanoseconds % NS_IN_SECOND,
        }
    }

    /// Create a timestamp from the 10-octet wire form, rejecting an out-of-range nanoseconds
    /// field.
    pub fn from_wire(seconds: u64, nanoseconds: u32) -> Result<Self, Error> {
        if nanoseconds >= NS_IN_SECOND {
            return Err(Error::InvalidTimestamp);
        }

        Ok(Self {
            seconds,
            nanoseconds,
        })
    }

    /// Create a timestamp from a flat nanosecond count.
    pub const fn from_ns(ns: u64) -> Self {
        Self {
            seconds: ns / NS_IN_SECOND as u64,
            nanoseconds: (ns % NS_IN_SECOND as u64) as u32,
        }
    }

    /// Flatten into nanoseconds.
    ///
    /// Truncates for times beyond `u64` nanosecond range (over 584 years).
    pub const fn as_ns(self) -> u64 {
        (self.seconds)
            .wrapping_mul(NS_IN_SECOND as u64)
            .wrapping_add(self.nanoseconds as u64)
    }

    /// `self − other`, failing when `other` is later than `self` or either operand is
    /// denormalized.
    pub fn checked_sub(self, other: Timestamp) -> Result<Timestamp, Error> {
        if self.nanoseconds >= NS_IN_SECOND
            || other.nanoseconds >= NS_IN_SECOND
            || (self < other)
        {
            return Err(Error::InvalidTimestamp);
        }

        if self.nanoseconds >= other.nanoseconds {
            Ok(Timestamp {
                seconds: self.seconds - other.seconds,
                nanoseconds: self.nanoseconds - other.nanoseconds,
            })
        } else {
            Ok(Timestamp {
                seconds: (self.seconds - other.seconds) - 1,
                nanoseconds: (self.nanoseconds + NS_IN_SECOND) - other.nanoseconds,
            })
        }
    }

    /// `self − ns`, delegating to [`Timestamp::checked_sub`].
    pub fn checked_sub_ns(self, ns: u64) -> Result<Timestamp, Error> {
        self.checked_sub(Timestamp::from_ns(ns))
    }

    /// `self + ns` with carry into the seconds field.
    pub const fn add_ns(self, ns: u64) -> Timestamp {
        let total = self.nanoseconds as u64 + ns % NS_IN_SECOND as u64;

        Timestamp {
            seconds: self.seconds + ns / NS_IN_SECOND as u64 + total / NS_IN_SECOND as u64,
            nanoseconds: (total % NS_IN_SECOND as u64) as u32,
        }
    }

    /// Whether `self` is strictly after `other`.
    pub const fn is_after(self, other: Timestamp) -> bool {
        self.seconds > other.seconds
            || (self.seconds == other.seconds && self.nanoseconds > other.nanoseconds)
    }

    /// Reinterpret as a signed timestamp.
    pub const fn as_signed(self) -> TimestampSigned {
        TimestampSigned {
            seconds: self.seconds as i64,
            nanoseconds: self.nanoseconds as i32,
        }
    }
}

/// A signed time difference as `(seconds, nanoseconds)` with both fields carrying the same sign.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimestampSigned {
    /// Whole seconds, signed.
    pub seconds: i64,
    /// Nanoseconds, signed, magnitude below 10⁹. Carries the same sign as `seconds` after
    /// [`TimestampSigned::sub`].
    pub nanoseconds: i32,
}

impl TimestampSigned {
    /// Zero difference.
    pub const ZERO: TimestampSigned = TimestampSigned {
        seconds: 0,
        nanoseconds: 0,
    };

    /// `self − other`, rebalancing so that the seconds and nanoseconds parts leave with matching
    /// signs.
    pub const fn sub(self, other: TimestampSigned) -> TimestampSigned {
        let mut ns = self.nanoseconds - other.nanoseconds;
        let mut s = if self.seconds == other.seconds {
            return TimestampSigned {
                seconds: 0,
                nanoseconds: ns,
            };
        } else {
            self.seconds - other.seconds
        };

        if ns < 0 && s >= 0 {
            ns += NS_IN_SECOND as i32;
            s -= 1;
        } else if ns >= 0 && s < 0 {
            ns -= NS_IN_SECOND as i32;
            s += 1;
        }

        TimestampSigned {
            seconds: s,
            nanoseconds: ns,
        }
    }

    /// Flatten into signed nanoseconds.
    pub const fn as_ns(self) -> i64 {
        self.seconds * NS_IN_SECOND as i64 + self.nanoseconds as i64
    }

    /// Magnitude in nanoseconds.
    pub const fn abs_ns(self) -> u64 {
        self.as_ns().unsigned_abs()
    }
}

/// Convert a log₂ message interval into nanoseconds.
///
/// A negative log halves the one second base per step, a positive log doubles it. The special
/// value `127` ("stop sending") maps to zero.
pub const fn log_interval_to_ns(log: i8) -> u64 {
    if log == 127 {
        return 0;
    }

    if log < 0 {
        (NS_IN_SECOND as u64) >> log.unsigned_abs()
    } else {
        (NS_IN_SECOND as u64) << log as u32
    }
}

/// Cast an `f64` to `i32`, saturating at the type bounds instead of invoking UB-adjacent casts on
/// wild controller outputs.
pub(crate) fn f64_to_i32_saturating(value: f64) -> i32 {
    if value <= i32::MIN as f64 {
        i32::MIN
    } else if value >= i32::MAX as f64 {
        i32::MAX
    } else {
        value as i32
    }
}

/// Absolute value without pulling in `std`/`libm`.
pub(crate) fn f64_abs(value: f64) -> f64 {
    if value < 0.0 { -value } else { value }
}

/// A frequency adjustment expressed the way timestamping MACs consume it: two pseudo-timestamp
/// deltas whose ratio encodes `1 + ppb·10⁻⁹`.
///
/// A positive ppb puts the surplus nanoseconds on the ingress side, a negative one on the origin
/// side; both deltas keep a one second base.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PseudoRateRatio {
    /// Ingress-side delta (numerator).
    pub ingress_delta: Timestamp,
    /// Origin-side delta (denominator).
    pub origin_delta: Timestamp,
}

impl PseudoRateRatio {
    /// Encode a parts-per-billion adjustment.
    pub const fn from_ppb(ppb: i32) -> Self {
        let (ingress_ns, origin_ns) = if ppb > 0 {
            (ppb as u32, 0)
        } else {
            (0, ppb.unsigned_abs())
        };

        Self {
            ingress_delta: Timestamp {
                seconds: 1,
                nanoseconds: ingress_ns,
            },
            origin_delta: Timestamp {
                seconds: 1,
                nanoseconds: origin_ns,
            },
        }
    }

    /// The identity adjustment (0 ppb).
    pub const IDENTITY: PseudoRateRatio = PseudoRateRatio::from_ppb(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_round_trip() {
        heckcheck::check(|(seconds, nanoseconds): (u32, u32)| {
            let ts = Timestamp::from_wire(seconds as u64, nanoseconds % NS_IN_SECOND).unwrap();

            assert_eq!(
                ts.as_ns(),
                seconds as u64 * NS_IN_SECOND as u64 + (nanoseconds % NS_IN_SECOND) as u64
            );

            Ok(())
        });
    }

    #[test]
    fn sub_then_add_restores() {
        heckcheck::check(|(a_s, a_ns, b_s, b_ns): (u32, u32, u32, u32)| {
            let a = Timestamp::new(a_s as u64, a_ns % NS_IN_SECOND);
            let b = Timestamp::new(b_s as u64, b_ns % NS_IN_SECOND);

            let (hi, lo) = if a.is_after(b) { (a, b) } else { (b, a) };

            let diff = hi.checked_sub(lo).unwrap();

            assert_eq!(lo.add_ns(diff.as_ns()), hi);

            Ok(())
        });
    }

    #[test]
    fn wire_rejects_denormalized() {
        assert_eq!(
            Timestamp::from_wire(1, NS_IN_SECOND),
            Err(Error::InvalidTimestamp)
        );
    }

    #[test]
    fn unsigned_sub_underflow() {
        let early = Timestamp::new(10, 0);
        let late = Timestamp::new(11, 500);

        assert_eq!(early.checked_sub(late), Err(Error::InvalidTimestamp));
    }

    #[test]
    fn unsigned_sub_borrow() {
        let a = Timestamp::new(10, 100);
        let b = Timestamp::new(9, 200);

        assert_eq!(
            a.checked_sub(b).unwrap(),
            Timestamp::new(0, NS_IN_SECOND - 100)
        );
    }

    #[test]
    fn signed_sub_rebalances_mixed_signs() {
        let a = TimestampSigned {
            seconds: 5,
            nanoseconds: 100,
        };
        let b = TimestampSigned {
            seconds: 2,
            nanoseconds: 800,
        };

        let diff = a.sub(b);

        assert_eq!(diff.seconds, 2);
        assert_eq!(diff.nanoseconds, NS_IN_SECOND as i32 - 700);

        let neg = b.sub(a);

        assert_eq!(neg.seconds, -2);
        assert_eq!(neg.nanoseconds, -(NS_IN_SECOND as i32) + 700);
        assert_eq!(neg.as_ns(), -diff.as_ns());
    }

    #[test]
    fn signed_sub_same_seconds() {
        let a = TimestampSigned {
            seconds: 3,
            nanoseconds: 100,
        };
        let b = TimestampSigned {
            seconds: 3,
            nanoseconds: 400,
        };

        assert_eq!(a.sub(b).as_ns(), -300);
    }

    #[test]
    fn log_intervals() {
        assert_eq!(log_interval_to_ns(0), 1_000_000_000);
        assert_eq!(log_interval_to_ns(-3), 125_000_000);
        assert_eq!(log_interval_to_ns(3), 8_000_000_000);
        assert_eq!(log_interval_to_ns(127), 0);
    }

    #[test]
    fn saturating_cast() {
        assert_eq!(f64_to_i32_saturating(1e12), i32::MAX);
        assert_eq!(f64_to_i32_saturating(-1e12), i32::MIN);
        assert_eq!(f64_to_i32_saturating(-1234.9), -1234);
    }

    #[test]
    fn pseudo_ratio_sides() {
        let fast = PseudoRateRatio::from_ppb(250);

        assert_eq!(fast.ingress_delta.nanoseconds, 250);
        assert_eq!(fast.origin_delta.nanoseconds, 0);

        let slow = PseudoRateRatio::from_ppb(-250);

        assert_eq!(slow.ingress_delta.nanoseconds, 0);
        assert_eq!(slow.origin_delta.nanoseconds, 250);
    }
}
