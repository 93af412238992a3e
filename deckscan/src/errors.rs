//! The outcome state machines the pipeline returns at each stage (§7).
use crate::decode::Deck;
use crate::mark_lines::MarkLines;

/// What one search line contributed this frame (§4.9, §7).
#[derive(Debug)]
pub enum SearchOutcome
{
    /// No search line produced a match within error/size limits.
    NotFound,
    /// A deck was matched but failed the minimum width/height check.
    TooSmall,
    /// A deck was matched, traced and sampled; ready for the decoder.
    Decodable(MarkLines)
}

/// The decoder's result (§4.6, §7).
#[derive(Debug)]
pub enum DecodeOutcome
{
    /// Every mark line's sharpness fell below threshold.
    NotSharp,
    /// The decoded deck has fewer than `format.min_card_count` cards.
    TooFewCards,
    /// A pre-condition the decoder cannot recover from (e.g. the code
    /// definition was never `prepare_for_decode`d).
    GeneralFailure(String),
    Decoded(Deck)
}

/// The temporal history analyzer's result (§4.8, §7).
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome
{
    /// Consolidation found no valid HEAD-to-TAIL path.
    Inconclusive,
    /// Fewer than `analysis.min_history_entries` entries exist yet.
    InsufficientHistory,
    /// A path was found but its confidence is below the minimum
    /// threshold (and low-confidence reporting is disabled).
    InsufficientConfidence,
    SuccessLowConfidence { indices: Vec<usize>, confidence: f64 },
    SuccessHighConfidence { indices: Vec<usize>, confidence: f64 }
}
