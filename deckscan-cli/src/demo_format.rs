//! A small, self-contained [`FixedCodeDefinition`] used only by this demo
//! harness: a 6-bit code (landmark, 6 bits, landmark) addressing a 54-card
//! deck (52 + 2 jokers), with natural playing-card order as
//! `face_codes_ndo`. Real decks would be authored by the (out-of-scope)
//! code-definition registry; this mirrors the fixture the code-definition
//! module's own tests build, just sized up to a full deck.
use deckscan_core::Fixed;
use deckscan_iface::code_definition::FixedCodeDefinition;
use deckscan_iface::{Format, MarkDefinition, MarkType};

const CARD_COUNT: usize = 54;
const WORD_BITS: u32 = 6;

fn format() -> Format
{
    Format {
        name: "deckscan-demo-54".to_owned(),
        max_card_count: CARD_COUNT,
        max_card_count_with_reversed: CARD_COUNT,
        min_card_count: 40,
        reversible: true,
        invert_luma: false,
        face_codes_ndo: (0..CARD_COUNT as u32).collect()
    }
}

fn marks() -> Vec<MarkDefinition>
{
    let mut marks = Vec::with_capacity(2 + WORD_BITS as usize);
    marks.push(MarkDefinition {
        mark_type: MarkType::Landmark,
        width_ratio: Fixed::from_real(1.5),
        landmark_min_gap_ratio: Fixed::from_real(0.5)
    });
    for bit in 0..WORD_BITS as usize
    {
        marks.push(MarkDefinition {
            mark_type: MarkType::Bit { index: bit, count: WORD_BITS as usize },
            width_ratio: Fixed::from_real(1.0),
            landmark_min_gap_ratio: Fixed::ZERO
        });
    }
    marks.push(MarkDefinition {
        mark_type: MarkType::Landmark,
        width_ratio: Fixed::from_real(1.5),
        landmark_min_gap_ratio: Fixed::from_real(0.5)
    });
    marks
}

/// Build and prepare the demo definition. Codewords are assigned in index
/// order; `prepare_for_decode` builds the Hamming-correction table over the
/// unused codeword space above `CARD_COUNT`.
#[must_use]
pub fn build() -> FixedCodeDefinition
{
    let codes: Vec<u64> = (0..CARD_COUNT as u64).collect();
    let mut definition = FixedCodeDefinition::new(format(), marks(), vec![0, WORD_BITS as usize + 1], codes, WORD_BITS, 2.0, 9.0);
    definition.prepare_for_decode();
    definition
}
