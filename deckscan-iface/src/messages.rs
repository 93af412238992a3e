//! Typed message payloads exchanged with an external controller (§6.4).
//!
//! The core is oblivious to framing and transport: these are plain data
//! the scan manager's caller builds from an [`crate::AnalysisResult`] and
//! hands to the (out-of-scope) network transport. Each variant corresponds
//! to one of the 16-byte-identified payloads in §6.4.
use std::time::Duration;

use crate::config::ConfigValue;

/// `ScanMetadata.status_code`, the 2-letter status the host reports
/// alongside `frame_count` (§6.4, §7).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StatusCode
{
    /// `NotSharp` decode outcome.
    NS,
    /// `TooSmall` search outcome.
    TS,
    /// `NotFound` search outcome.
    NF,
    /// `TooFewCards` decode outcome.
    TF,
    /// `Inconclusive` analysis outcome.
    IN,
    /// `InsufficientHistory` analysis outcome.
    NH,
    /// `InsufficientConfidence` analysis outcome (no low-confidence report).
    NC,
    /// `SuccessLowConfidence` analysis outcome.
    RL,
    /// `SuccessHighConfidence` analysis outcome.
    RH,
    /// `GeneralFailure` decode outcome.
    GF
}

impl StatusCode
{
    #[must_use]
    pub const fn as_str(self) -> &'static str
    {
        match self
        {
            StatusCode::NS => "NS",
            StatusCode::TS => "TS",
            StatusCode::NF => "NF",
            StatusCode::TF => "TF",
            StatusCode::IN => "IN",
            StatusCode::NH => "NH",
            StatusCode::NC => "NC",
            StatusCode::RL => "RL",
            StatusCode::RH => "RH",
            StatusCode::GF => "GF"
        }
    }
}

/// A deck-order report for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanReport
{
    pub high_confidence: bool,
    pub format_id: String,
    pub confidence_factor: f64,
    pub indices: Vec<usize>,
    pub robustness: Vec<u8>,
    pub report_count: u64
}

/// Per-frame status and running frame counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanMetadata
{
    pub frame_count: u64,
    pub status_code: StatusCode
}

/// Wall-clock durations recorded by the scan manager (§4.9).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PerformanceStats
{
    pub scan_ms: Duration,
    pub full_frame_ms: Duration,
    pub frame_to_frame_ms: Duration
}

/// Which debug overlay a [`Viewport`] frame represents.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ViewportType
{
    LumaResampled = 0,
    LumaCenterRect = 1
}

/// A debug-overlay frame handed to the (out-of-scope) on-screen viewer.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport
{
    pub viewport_type: ViewportType,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>
}

/// A named command from the external controller; the core ignores these
/// and passes them upward unexamined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandName
{
    Shutdown,
    Reboot,
    CheckForUpdates
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command
{
    pub name: CommandName,
    pub parameters: Vec<String>
}

/// All messages exchanged with the external controller (§6.4).
#[derive(Clone, Debug)]
pub enum Message
{
    ScanReport(ScanReport),
    ScanMetadata(ScanMetadata),
    PerformanceStats(PerformanceStats),
    Viewport(Viewport),
    Command(Command),
    ConfigValue { key: String, value: ConfigValue },
    ConfigValueList { keys: Vec<String> },
    TriggerVibration { duration: Duration },
    ServerConnect { address: String }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn status_codes_match_the_two_letter_spec_vocabulary()
    {
        for code in [
            StatusCode::NS,
            StatusCode::TS,
            StatusCode::NF,
            StatusCode::TF,
            StatusCode::IN,
            StatusCode::NH,
            StatusCode::NC,
            StatusCode::RL,
            StatusCode::RH,
            StatusCode::GF
        ]
        {
            assert_eq!(code.as_str().len(), 2);
        }
    }
}
