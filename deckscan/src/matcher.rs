//! The deck matcher (§4.3): turns one sample line into a scored alignment
//! against a code definition's landmark/bit pattern.
use deckscan_core::rolling::RollingWindowArray;
use deckscan_core::sample_line::SampleLine;
use deckscan_imageprocs::edge::{self, EdgeDetectorParams};
use deckscan_iface::{CodeDefinition, DeckMatchResult, MarkLocation};

/// Tunables for one `match_deck` call. Window sizes are expected to
/// already be scaled by the caller (`image_height / 720`, per §4.1/§4.3).
#[derive(Copy, Clone, Debug)]
pub struct MatchParams
{
    pub window_size: usize,
    pub min_max_window_size: usize,
    pub overlap: i32,
    pub sensitivity: f64,
    pub minimum_threshold: i32,
    pub invert_luma: bool,
    pub max_deck_match_error: f64
}

/// Run the edge detector over `line` (inverting luma first when the
/// format calls for it), pair up start/end edges into mark locations, and
/// ask `definition` to align them. Returns `None` when the edge detector
/// fails outright, no complete marks were formed, no alignment was found,
/// or the alignment's error meets or exceeds `params.max_deck_match_error`.
pub fn match_deck(
    definition: &dyn CodeDefinition,
    line: &SampleLine,
    params: MatchParams,
    scratch: &mut RollingWindowArray
) -> Option<DeckMatchResult>
{
    let working_line = if params.invert_luma { invert(line) } else { line.clone() };

    let edge_params = EdgeDetectorParams {
        window_size: params.window_size,
        min_max_window_size: params.min_max_window_size,
        overlap: params.overlap,
        sensitivity: params.sensitivity,
        minimum_threshold: params.minimum_threshold
    };

    let edges = edge::detect(&working_line, edge_params, scratch).ok()?;
    let marks = pair_marks(&edges);
    if marks.is_empty()
    {
        return None;
    }

    let result = definition.best_match(&marks)?;
    if result.match_error >= params.max_deck_match_error
    {
        return None;
    }
    Some(result)
}

/// `255 - luma` for every sample, so a format printed light-on-dark scans
/// the same as one printed dark-on-light.
fn invert(line: &SampleLine) -> SampleLine
{
    SampleLine {
        p0: line.p0,
        p1: line.p1,
        samples: line.samples.iter().map(|&s| 255 - s).collect()
    }
}

/// Walk edges in scan order, opening a mark at each start edge (negative
/// slope) and closing it at the next end edge (positive slope). A start
/// edge with no following end edge before the line ends is discarded, as
/// is an end edge with no open start.
fn pair_marks(edges: &[deckscan_core::Edge]) -> Vec<MarkLocation>
{
    let mut marks = Vec::new();
    let mut open: Option<deckscan_core::Edge> = None;
    let mut scan_index = 0usize;

    for &edge in edges
    {
        if edge.is_start()
        {
            open = Some(edge);
        }
        else if edge.is_end()
        {
            if let Some(start) = open.take()
            {
                marks.push(MarkLocation {
                    start,
                    end: edge,
                    scan_index,
                    matched_definition_index: -1
                });
                scan_index += 1;
            }
        }
    }

    marks
}

#[cfg(test)]
mod tests
{
    use deckscan_core::geometry::IVec;
    use deckscan_core::Fixed;
    use deckscan_iface::{Format, MarkDefinition, MarkType};

    use deckscan_iface::code_definition::FixedCodeDefinition;

    use super::*;

    fn params() -> MatchParams
    {
        MatchParams {
            window_size: 3,
            min_max_window_size: 0,
            overlap: 0,
            sensitivity: 0.2,
            minimum_threshold: 1,
            invert_luma: false,
            max_deck_match_error: 10.0
        }
    }

    fn two_landmark_definition() -> FixedCodeDefinition
    {
        let format = Format {
            name: "test-two-landmark".to_owned(),
            max_card_count: 2,
            max_card_count_with_reversed: 2,
            min_card_count: 2,
            reversible: false,
            invert_luma: false,
            face_codes_ndo: vec![0, 1]
        };
        let marks = vec![
            MarkDefinition {
                mark_type: MarkType::Landmark,
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::from_real(0.5)
            },
            MarkDefinition {
                mark_type: MarkType::Bit { index: 0, count: 1 },
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::from_real(0.5)
            },
            MarkDefinition {
                mark_type: MarkType::Landmark,
                width_ratio: Fixed::from_real(1.0),
                landmark_min_gap_ratio: Fixed::from_real(0.5)
            },
        ];
        FixedCodeDefinition::new(format, marks, vec![0, 2], vec![0b0, 0b1], 1, 2.0, 3.0)
    }

    fn line_from_samples(samples: Vec<i32>) -> SampleLine
    {
        SampleLine {
            p0: IVec::new(0, 0),
            p1: IVec::new(samples.len() as i32 - 1, 0),
            samples
        }
    }

    #[test]
    fn three_equal_marks_match_the_three_mark_definition()
    {
        let definition = two_landmark_definition();
        // bright,dark(landmark),bright,dark(bit),bright,dark(landmark),bright,
        // four samples per segment so the window-3 edge detector has room
        // to settle on each plateau (mirrors the edge-detector's own tests).
        let samples: Vec<i32> = [220, 220, 220, 220, 10, 10, 10, 10, 220, 220, 220, 220, 10, 10, 10, 10, 220, 220, 220, 220, 10, 10, 10, 10, 220, 220, 220, 220].to_vec();
        let line = line_from_samples(samples);
        let mut scratch = RollingWindowArray::new();
        let result = match_deck(&definition, &line, params(), &mut scratch);
        assert!(result.is_some());
        assert_eq!(result.unwrap().location.marks.len(), 3);
    }

    #[test]
    fn flat_line_has_no_marks_and_no_match()
    {
        let definition = two_landmark_definition();
        let line = line_from_samples(vec![128; 20]);
        let mut scratch = RollingWindowArray::new();
        assert!(match_deck(&definition, &line, params(), &mut scratch).is_none());
    }

    #[test]
    fn inverted_luma_still_detects_marks()
    {
        let definition = two_landmark_definition();
        // Same pattern as above but light-on-dark.
        let samples: Vec<i32> = [35, 35, 35, 35, 245, 245, 245, 245, 35, 35, 35, 35, 245, 245, 245, 245, 35, 35, 35, 35, 245, 245, 245, 245, 35, 35, 35, 35].to_vec();
        let line = line_from_samples(samples);
        let mut scratch = RollingWindowArray::new();
        let mut inverted_params = params();
        inverted_params.invert_luma = true;
        let result = match_deck(&definition, &line, inverted_params, &mut scratch);
        assert!(result.is_some());
    }
}
