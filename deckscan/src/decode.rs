//! The decoder (§4.6): combines a matched, traced and sampled deck's bit
//! columns into per-row codewords, maps each to a card index (with
//! Hamming-distance error correction baked into the code definition's
//! lookup table), and aggregates consecutive identical rows into
//! [`ScannedCard`] runs.
use deckscan_iface::CodeDefinition;

use crate::errors::DecodeOutcome;
use crate::mark_lines::MarkLines;

/// Tunables for one `decode` call (§6.1's `decode.*` group plus the format's
/// own `max_card_count`/`min_card_count`).
#[derive(Copy, Clone, Debug)]
pub struct DecodeParams
{
    pub enable_sharpness_detection: bool,
    pub minimum_sharpness_unit_scalar_threshold: f64,
    pub resample_bit_column_length_multiplier: f64,
    pub max_card_count: usize,
    pub min_card_count: usize,
    /// `calc_min_sample_height` for the matched angle, used to pick the
    /// deterministically-spaced subset of samples the sharpness gate reads
    /// (§4.6 step 1).
    pub min_sample_height: usize
}

/// One run of consecutive identical decoded rows (§3).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScannedCard
{
    pub card_index: usize,
    pub row_index: usize,
    pub count: u32,
    pub robustness: u8
}

impl ScannedCard
{
    /// Merge `other`'s counters into `self`: counts add, robustness adds
    /// saturating at `u8::MAX` (§9's open question on robustness
    /// arithmetic). Used only to merge adjacent runs that share a
    /// `card_index` (see [`crate::resolve`]), never across a genocide
    /// challenge between different indices.
    pub fn consume(&mut self, other: &ScannedCard)
    {
        self.count = self.count.saturating_add(other.count);
        self.robustness = self.robustness.saturating_add(other.robustness);
        self.row_index = self.row_index.max(other.row_index);
    }
}

/// A resolved deck: an ordered sequence of [`ScannedCard`] runs by row,
/// plus the format's minimum card count (needed by the decode outcome
/// check and carried forward for the history analyzer).
#[derive(Clone, Debug, Default)]
pub struct Deck
{
    pub cards: Vec<ScannedCard>,
    pub min_card_count: usize
}

impl Deck
{
    /// The ordered sequence of surviving card indices, one per resolved
    /// row (§4.9: "the raw per-row index list extracted from the
    /// aggregated cards").
    #[must_use]
    pub fn resolved_indices(&self) -> Vec<usize>
    {
        self.cards.iter().filter(|c| c.count > 0).map(|c| c.card_index).collect()
    }

    #[must_use]
    pub fn card_count(&self) -> usize
    {
        self.cards.iter().filter(|c| c.count > 0).count()
    }
}

/// `[+1, +1, -1, -1]` kernel response at one 4-sample window, normalized by
/// `amplitude` (the mark line's own `max - min`, clamped to at least 1 so a
/// perfectly flat line scores zero rather than dividing by zero).
fn kernel_response(window: &[i32], amplitude: f64) -> f64
{
    let raw = f64::from(window[0]) + f64::from(window[1]) - f64::from(window[2]) - f64::from(window[3]);
    raw.abs() / amplitude
}

/// The "maximum sharpness unit scalar" for one mark line (§4.6 step 1): the
/// largest `[+1,+1,-1,-1]` kernel response over a deterministically-spaced
/// subset of `min_sample_height` samples along the line.
fn mark_line_sharpness(samples: &[i32], min: i32, max: i32, min_sample_height: usize) -> f64
{
    if samples.len() < 4
    {
        return 0.0;
    }
    let amplitude = f64::from((max - min).max(1));
    let subset_len = min_sample_height.max(4).min(samples.len());
    let last = subset_len - 1;
    let indices: Vec<usize> = (0..subset_len).map(|i| (i * (samples.len() - 1)) / last.max(1)).collect();

    indices
        .windows(4)
        .map(|w| {
            let window = [samples[w[0]], samples[w[1]], samples[w[2]], samples[w[3]]];
            kernel_response(&window, amplitude)
        })
        .fold(0.0_f64, f64::max)
}

/// One decoded row: the resolved card index (`None` for `Unassigned`) and
/// whether the map had to error-correct the raw codeword to reach it.
struct DecodedRow
{
    card_index: usize,
    error_corrected: bool
}

fn pack_codewords(resampled: &[Vec<bool>], length: usize) -> Vec<u64>
{
    (0..length)
        .map(|row| {
            resampled.iter().enumerate().fold(0u64, |code, (bit, column)| {
                if column[row]
                {
                    code | (1 << bit)
                }
                else
                {
                    code
                }
            })
        })
        .collect()
}

fn translate(codewords: &[u64], definition: &dyn CodeDefinition) -> Vec<DecodedRow>
{
    codewords
        .iter()
        .filter_map(|&code| {
            let index = definition.map_code_to_error_corrected_index(code)?;
            let error_corrected = definition.map_index_to_code(index) != Some(code);
            Some(DecodedRow { card_index: index, error_corrected })
        })
        .collect()
}

/// Aggregate consecutive identical `card_index`es (ignoring the rows that
/// translated to `Unassigned` and were already filtered out, per §4.6 step
/// 5) into [`ScannedCard`] runs.
fn aggregate(rows: Vec<DecodedRow>) -> Vec<ScannedCard>
{
    let mut cards: Vec<ScannedCard> = Vec::new();
    let mut run_non_corrected = 0u32;
    let mut run_corrected = 0u32;

    for (row_index, row) in rows.iter().enumerate()
    {
        if row.error_corrected
        {
            run_corrected += 1;
        }
        else
        {
            run_non_corrected += 1;
        }

        let run_ends_here = rows.get(row_index + 1).is_none_or(|next| next.card_index != row.card_index);
        if run_ends_here
        {
            cards.push(ScannedCard {
                card_index: row.card_index,
                row_index,
                count: run_non_corrected + run_corrected,
                robustness: u8::from(run_non_corrected > run_corrected)
            });
            run_non_corrected = 0;
            run_corrected = 0;
        }
    }

    cards
}

/// Decode one frame's sampled mark lines into a [`Deck`] (§4.6).
///
/// Returns [`DecodeOutcome::GeneralFailure`] when the mark line count
/// doesn't match the code definition's bit-mark count (a precondition
/// violation, not a per-frame signal condition); [`DecodeOutcome::NotSharp`]
/// when the sharpness gate rejects every mark line; [`DecodeOutcome::TooFewCards`]
/// when the resolved deck falls short of `format.min_card_count`; otherwise
/// [`DecodeOutcome::Decoded`].
#[must_use]
pub fn decode(mark_lines: &MarkLines, definition: &dyn CodeDefinition, params: DecodeParams) -> DecodeOutcome
{
    if mark_lines.len() != definition.bit_marks().len()
    {
        return DecodeOutcome::GeneralFailure(format!(
            "mark line count {} does not match code definition bit count {}",
            mark_lines.len(),
            definition.bit_marks().len()
        ));
    }
    if mark_lines.is_empty()
    {
        return DecodeOutcome::GeneralFailure("code definition has no bit marks".to_owned());
    }

    if params.enable_sharpness_detection
    {
        let min_sharpness = mark_lines
            .lines
            .iter()
            .map(|line| mark_line_sharpness(&line.line.samples, line.min, line.max, params.min_sample_height))
            .fold(f64::INFINITY, f64::min);
        if min_sharpness < params.minimum_sharpness_unit_scalar_threshold
        {
            return DecodeOutcome::NotSharp;
        }
    }

    let length = (params.resample_bit_column_length_multiplier * params.max_card_count as f64).floor() as usize;
    let resampled = mark_lines.resample_bit_columns(length);
    let codewords = pack_codewords(&resampled, length);
    let rows = translate(&codewords, definition);
    let cards = aggregate(rows);

    let deck = Deck {
        cards,
        min_card_count: params.min_card_count
    };

    if deck.card_count() < params.min_card_count
    {
        return DecodeOutcome::TooFewCards;
    }

    DecodeOutcome::Decoded(deck)
}

#[cfg(test)]
mod tests
{
    use deckscan_core::geometry::IVec;
    use deckscan_core::sample_line::SampleLine;
    use deckscan_core::Fixed;
    use deckscan_iface::code_definition::FixedCodeDefinition;
    use deckscan_iface::{Format, MarkDefinition, MarkType};

    use super::*;
    use crate::mark_lines::MarkLine;

    fn format(max: usize, min: usize) -> Format
    {
        Format {
            name: "decode-test".to_owned(),
            max_card_count: max,
            max_card_count_with_reversed: max,
            min_card_count: min,
            reversible: false,
            invert_luma: false,
            face_codes_ndo: (0..max as u32).collect()
        }
    }

    fn two_bit_definition(max: usize, min: usize) -> FixedCodeDefinition
    {
        let marks = vec![
            MarkDefinition {
                mark_type: MarkType::Landmark,
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::from_real(0.5)
            },
            MarkDefinition {
                mark_type: MarkType::Bit { index: 0, count: 2 },
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::ZERO
            },
            MarkDefinition {
                mark_type: MarkType::Bit { index: 1, count: 2 },
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::ZERO
            },
            MarkDefinition {
                mark_type: MarkType::Landmark,
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::from_real(0.5)
            },
        ];
        let codes: Vec<u64> = (0..max as u64).collect();
        FixedCodeDefinition::new(format(max, min), marks, vec![0, 3], codes, 2, 2.0, 10.0)
    }

    fn mark_line_from_bits(bits: Vec<bool>) -> MarkLine
    {
        let samples: Vec<i32> = bits.iter().map(|&b| if b { 0 } else { 255 }).collect();
        let len = samples.len() as i32;
        MarkLine {
            mark_type: MarkType::Bit { index: 0, count: 1 },
            line: SampleLine {
                p0: IVec::new(0, 0),
                p1: IVec::new(0, len - 1),
                samples
            },
            bit_column: bits,
            min: 0,
            max: 255
        }
    }

    fn params(max: usize, min: usize) -> DecodeParams
    {
        DecodeParams {
            enable_sharpness_detection: false,
            minimum_sharpness_unit_scalar_threshold: 0.7,
            resample_bit_column_length_multiplier: 1.0,
            max_card_count: max,
            min_card_count: min,
            min_sample_height: 4
        }
    }

    #[test]
    fn decodes_four_distinct_rows_into_four_scanned_cards()
    {
        let mut definition = two_bit_definition(4, 4);
        assert!(definition.prepare_for_decode());

        // Codeword per row: 0b00, 0b01, 0b10, 0b11 -> indices 0,1,2,3.
        let bit0 = vec![false, true, false, true];
        let bit1 = vec![false, false, true, true];
        let mark_lines = MarkLines {
            lines: vec![mark_line_from_bits(bit0), mark_line_from_bits(bit1)]
        };

        let outcome = decode(&mark_lines, &definition, params(4, 4));
        match outcome
        {
            DecodeOutcome::Decoded(deck) =>
            {
                assert_eq!(deck.resolved_indices(), vec![0, 1, 2, 3]);
                assert!(deck.cards.iter().all(|c| c.count == 1));
            }
            other => panic!("expected Decoded, got {other:?}")
        }
    }

    #[test]
    fn consecutive_identical_rows_aggregate_into_one_scanned_card()
    {
        let mut definition = two_bit_definition(2, 2);
        assert!(definition.prepare_for_decode());

        let bit0 = vec![false, false, false, true, true];
        let bit1 = vec![false, false, false, false, false];
        let mark_lines = MarkLines {
            lines: vec![mark_line_from_bits(bit0), mark_line_from_bits(bit1)]
        };

        let mut decode_params = params(2, 2);
        decode_params.resample_bit_column_length_multiplier = 2.5;
        let outcome = decode(&mark_lines, &definition, decode_params);
        match outcome
        {
            DecodeOutcome::Decoded(deck) =>
            {
                assert_eq!(deck.cards.len(), 2);
                assert_eq!(deck.cards[0].card_index, 0);
                assert_eq!(deck.cards[0].count, 3);
                assert_eq!(deck.cards[1].card_index, 1);
                assert_eq!(deck.cards[1].count, 2);
            }
            other => panic!("expected Decoded, got {other:?}")
        }
    }

    #[test]
    fn too_few_resolved_cards_is_too_few_cards()
    {
        let mut definition = two_bit_definition(4, 4);
        assert!(definition.prepare_for_decode());

        let bit0 = vec![false];
        let bit1 = vec![false];
        let mark_lines = MarkLines {
            lines: vec![mark_line_from_bits(bit0), mark_line_from_bits(bit1)]
        };
        let mut decode_params = params(4, 4);
        decode_params.resample_bit_column_length_multiplier = 1.0;
        decode_params.max_card_count = 1;
        assert!(matches!(decode(&mark_lines, &definition, decode_params), DecodeOutcome::TooFewCards));
    }

    #[test]
    fn mismatched_bit_count_is_general_failure()
    {
        let mut definition = two_bit_definition(4, 4);
        assert!(definition.prepare_for_decode());
        let mark_lines = MarkLines {
            lines: vec![mark_line_from_bits(vec![false, true])]
        };
        assert!(matches!(decode(&mark_lines, &definition, params(4, 4)), DecodeOutcome::GeneralFailure(_)));
    }
}
