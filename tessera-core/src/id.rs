//! Packed 64-bit identifiers for RDF terms.
//!
//! [`Id`] is a tagged union: the high 4 bits select a [`Datatype`], the low
//! 60 bits carry the payload. Integers use offset-binary so that the natural
//! `u64` ordering is correct within the `Int` tag; doubles store the `f64`
//! bit pattern shifted right by 4 (the dropped mantissa bits read back as
//! zero); dates store days from the common era.
//!
//! Payload accessors assert the tag. Calling the wrong accessor is a
//! programming error, not a recoverable condition.

use crate::datatype::Datatype;
use chrono::NaiveDate;

const TAG_SHIFT: u32 = 60;
const PAYLOAD_MASK: u64 = (1u64 << TAG_SHIFT) - 1;

/// Offset for i60 offset-binary encoding: 2^59
const I60_OFFSET: u64 = 1u64 << 59;

/// Maximum representable positive i60 value: 2^59 - 1
const I60_MAX: i64 = (1i64 << 59) - 1;

/// Minimum representable negative i60 value: -2^59
const I60_MIN: i64 = -(1i64 << 59);

/// Width of the wire representation in bytes.
pub const ID_SIZE: usize = std::mem::size_of::<Id>();

/// Fixed-width opaque identifier with a datatype tag.
///
/// Layout: `[tag: 4 bits][payload: 60 bits]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Id(u64);

impl Id {
    /// The undefined identifier (unbound table cells).
    pub const UNDEFINED: Id = Id(0);

    #[inline]
    fn pack(tag: Datatype, payload: u64) -> Id {
        debug_assert!(payload <= PAYLOAD_MASK);
        Id(((tag as u64) << TAG_SHIFT) | (payload & PAYLOAD_MASK))
    }

    #[inline]
    fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    /// The datatype tag of this identifier.
    #[inline]
    pub fn datatype(self) -> Datatype {
        Datatype::from_tag(self.0 >> TAG_SHIFT)
    }

    // ---- Constructors ----

    /// Encode a signed integer. Values outside the i60 range are an error
    /// of the caller.
    pub fn from_int(value: i64) -> Id {
        assert!(
            (I60_MIN..=I60_MAX).contains(&value),
            "integer out of i60 range: {value}"
        );
        Id::pack(Datatype::Int, (value as u64).wrapping_add(I60_OFFSET) & PAYLOAD_MASK)
    }

    /// Encode a double. The low 4 mantissa bits are dropped.
    pub fn from_double(value: f64) -> Id {
        Id::pack(Datatype::Double, value.to_bits() >> 4)
    }

    pub fn from_bool(value: bool) -> Id {
        Id::pack(Datatype::Bool, value as u64)
    }

    /// Encode a calendar date as days from the common era.
    pub fn from_date(date: NaiveDate) -> Id {
        let days = chrono::Datelike::num_days_from_ce(&date) as i64;
        Id::pack(Datatype::Date, (days as u64).wrapping_add(I60_OFFSET) & PAYLOAD_MASK)
    }

    pub fn from_vocab_index(index: u64) -> Id {
        Id::pack(Datatype::VocabIndex, index)
    }

    pub fn from_local_vocab_index(index: u64) -> Id {
        Id::pack(Datatype::LocalVocabIndex, index)
    }

    pub fn from_word_vocab_index(index: u64) -> Id {
        Id::pack(Datatype::WordVocabIndex, index)
    }

    pub fn from_text_record_index(index: u64) -> Id {
        Id::pack(Datatype::TextRecordIndex, index)
    }

    pub fn from_blank_node_index(index: u64) -> Id {
        Id::pack(Datatype::BlankNodeIndex, index)
    }

    // ---- Tag-specific accessors ----

    pub fn int_value(self) -> i64 {
        assert_eq!(self.datatype(), Datatype::Int, "accessor tag mismatch");
        self.payload() as i64 - I60_OFFSET as i64
    }

    pub fn double_value(self) -> f64 {
        assert_eq!(self.datatype(), Datatype::Double, "accessor tag mismatch");
        f64::from_bits(self.payload() << 4)
    }

    pub fn bool_value(self) -> bool {
        assert_eq!(self.datatype(), Datatype::Bool, "accessor tag mismatch");
        self.payload() != 0
    }

    pub fn date_value(self) -> NaiveDate {
        assert_eq!(self.datatype(), Datatype::Date, "accessor tag mismatch");
        let days = self.payload() as i64 - I60_OFFSET as i64;
        NaiveDate::from_num_days_from_ce_opt(days as i32)
            .expect("date payload out of chrono range")
    }

    pub fn vocab_index(self) -> u64 {
        assert_eq!(self.datatype(), Datatype::VocabIndex, "accessor tag mismatch");
        self.payload()
    }

    pub fn local_vocab_index(self) -> u64 {
        assert_eq!(self.datatype(), Datatype::LocalVocabIndex, "accessor tag mismatch");
        self.payload()
    }

    pub fn word_vocab_index(self) -> u64 {
        assert_eq!(self.datatype(), Datatype::WordVocabIndex, "accessor tag mismatch");
        self.payload()
    }

    pub fn text_record_index(self) -> u64 {
        assert_eq!(self.datatype(), Datatype::TextRecordIndex, "accessor tag mismatch");
        self.payload()
    }

    pub fn blank_node_index(self) -> u64 {
        assert_eq!(self.datatype(), Datatype::BlankNodeIndex, "accessor tag mismatch");
        self.payload()
    }

    // ---- Wire form ----

    /// The raw little-endian byte form used by the binary exporter.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; ID_SIZE] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; ID_SIZE]) -> Id {
        Id(u64::from_le_bytes(bytes))
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({:?}:{})", self.datatype(), self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        for v in [0i64, 1, -1, 42, -42, I60_MAX, I60_MIN] {
            let id = Id::from_int(v);
            assert_eq!(id.datatype(), Datatype::Int);
            assert_eq!(id.int_value(), v);
        }
    }

    #[test]
    fn test_int_ordering_within_tag() {
        assert!(Id::from_int(-5) < Id::from_int(0));
        assert!(Id::from_int(0) < Id::from_int(7));
    }

    #[test]
    fn test_double_round_trip_drops_low_bits() {
        let id = Id::from_double(2.5);
        assert_eq!(id.double_value(), 2.5);
        // Low mantissa bits are truncated, not rounded.
        let noisy = f64::from_bits(2.5f64.to_bits() | 0xF);
        assert_eq!(Id::from_double(noisy).double_value(), 2.5);
    }

    #[test]
    fn test_bool_and_date() {
        assert!(Id::from_bool(true).bool_value());
        assert!(!Id::from_bool(false).bool_value());

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(Id::from_date(date).date_value(), date);
    }

    #[test]
    fn test_index_tags() {
        let id = Id::from_vocab_index(17);
        assert_eq!(id.datatype(), Datatype::VocabIndex);
        assert_eq!(id.vocab_index(), 17);
        assert_eq!(Id::from_blank_node_index(3).blank_node_index(), 3);
        assert_eq!(Id::from_text_record_index(9).text_record_index(), 9);
    }

    #[test]
    #[should_panic(expected = "accessor tag mismatch")]
    fn test_wrong_accessor_panics() {
        Id::from_int(1).vocab_index();
    }

    #[test]
    fn test_le_bytes_round_trip() {
        let id = Id::from_vocab_index(0xABCD);
        assert_eq!(Id::from_le_bytes(id.to_le_bytes()), id);
        assert_eq!(ID_SIZE, 8);
    }

    #[test]
    fn test_undefined() {
        assert_eq!(Id::UNDEFINED.datatype(), Datatype::Undefined);
    }
}
