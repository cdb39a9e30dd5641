//! Datatype tags for packed identifiers.

/// Closed set of datatype tags an [`Id`](crate::Id) can carry.
///
/// The numeric values are the high-nibble tags of the packed representation
/// and must not be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Datatype {
    /// No value; sorts before everything.
    Undefined = 0,
    /// Signed 60-bit integer, stored offset-binary.
    Int = 1,
    /// `f64` bit pattern with the low 4 mantissa bits dropped.
    Double = 2,
    /// Boolean.
    Bool = 3,
    /// Calendar date, stored as days from the common era.
    Date = 4,
    /// Index into the global vocabulary.
    VocabIndex = 5,
    /// Index into a per-result local vocabulary.
    LocalVocabIndex = 6,
    /// Index into the text-word vocabulary.
    WordVocabIndex = 7,
    /// Index of a text record (excerpt source).
    TextRecordIndex = 8,
    /// Blank node number.
    BlankNodeIndex = 9,
}

impl Datatype {
    /// Decode a high-nibble tag. Tags outside the closed set are an
    /// invariant violation.
    pub(crate) fn from_tag(tag: u64) -> Datatype {
        match tag {
            0 => Datatype::Undefined,
            1 => Datatype::Int,
            2 => Datatype::Double,
            3 => Datatype::Bool,
            4 => Datatype::Date,
            5 => Datatype::VocabIndex,
            6 => Datatype::LocalVocabIndex,
            7 => Datatype::WordVocabIndex,
            8 => Datatype::TextRecordIndex,
            9 => Datatype::BlankNodeIndex,
            _ => panic!("invalid datatype tag: {tag}"),
        }
    }
}
