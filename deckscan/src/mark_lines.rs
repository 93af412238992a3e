//! The mark-line sampler (§4.5): samples one vertical line per bit mark
//! down the deck's traced extent, in either linear or contoured mode, and
//! binarizes each into a bit column.
use std::fmt::{self, Display, Formatter};

use deckscan_core::geometry::{IVec, Line, Vec2};
use deckscan_core::sample_line::SampleLine;
use deckscan_core::ImageBuffer;
use deckscan_iface::{CodeDefinition, MarkType};

use crate::trace::LandmarkContours;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleMode
{
    Linear,
    Contoured
}

#[derive(Copy, Clone, Debug)]
pub struct MarkLineParams
{
    pub mode: SampleMode,
    pub average_offset_multiplier: f64
}

#[derive(Debug, Eq, PartialEq)]
pub enum MarkLineError
{
    /// A sample line for one of the bit columns could not be formed
    /// (fell entirely outside the buffer).
    CouldNotFormLine,
    /// The code definition has no bit marks, or no bit-neighboring
    /// landmarks to sample between.
    NoBitMarks
}

impl Display for MarkLineError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        match self
        {
            MarkLineError::CouldNotFormLine => write!(f, "could not form a sample line for a bit column"),
            MarkLineError::NoBitMarks => write!(f, "code definition has no bit marks to sample")
        }
    }
}

impl std::error::Error for MarkLineError {}

/// One bit column's vertical sample line, plus its binarized reading.
#[derive(Clone, Debug)]
pub struct MarkLine
{
    pub mark_type: MarkType,
    pub line: SampleLine,
    pub bit_column: Vec<bool>,
    pub min: i32,
    pub max: i32
}

/// The full ordered set of bit-only mark lines produced for one matched,
/// traced deck.
#[derive(Clone, Debug, Default)]
pub struct MarkLines
{
    pub lines: Vec<MarkLine>
}

impl MarkLines
{
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.lines.is_empty()
    }

    /// Nearest-neighbor resample every bit column to `length` (§4.6 step
    /// 2). Returns one `Vec<bool>` per mark line, each of length `length`.
    #[must_use]
    pub fn resample_bit_columns(&self, length: usize) -> Vec<Vec<bool>>
    {
        self.lines
            .iter()
            .map(|mark_line| resample_nearest(&mark_line.bit_column, length))
            .collect()
    }
}

fn resample_nearest(bits: &[bool], length: usize) -> Vec<bool>
{
    if bits.is_empty() || length == 0
    {
        return vec![false; length];
    }
    (0..length)
        .map(|i| {
            let t = i as f64 / length.max(1) as f64;
            let src = ((t * bits.len() as f64) as usize).min(bits.len() - 1);
            bits[src]
        })
        .collect()
}

fn binarize(samples: &[i32], multiplier: f64) -> (Vec<bool>, i32, i32)
{
    let min = samples.iter().copied().min().unwrap_or(0);
    let max = samples.iter().copied().max().unwrap_or(0);
    let threshold = min as f64 + (max - min) as f64 * multiplier;
    let bits = samples.iter().map(|&s| f64::from(s) < threshold).collect();
    (bits, min, max)
}

/// Sample every bit column, either in linear mode (a straight line from
/// the traced top edge to the traced bottom edge at each bit's normalized
/// horizontal offset) or contoured mode (stepping the left/right contour
/// arrays in lockstep and sampling a 3-point cross at each row).
pub fn sample_mark_lines(
    image: &ImageBuffer<'_, u8>,
    contours: &LandmarkContours,
    definition: &dyn CodeDefinition,
    params: MarkLineParams
) -> Result<MarkLines, MarkLineError>
{
    let landmarks = definition.bit_neighboring_landmarks();
    let (Some(&from), Some(&to)) = (landmarks.first(), landmarks.last()) else {
        return Err(MarkLineError::NoBitMarks);
    };
    let centers = definition.normalize_bit_marks(from, to);
    let bit_defs = definition.bit_marks();
    if centers.is_empty() || bit_defs.len() != centers.len()
    {
        return Err(MarkLineError::NoBitMarks);
    }

    let lines = match params.mode
    {
        SampleMode::Linear => sample_linear(image, contours, &centers)?,
        SampleMode::Contoured => sample_contoured(image, contours, &centers)?
    };

    let mark_lines = lines
        .into_iter()
        .zip(bit_defs.iter())
        .map(|(line, def)| {
            let (bit_column, min, max) = binarize(&line.samples, params.average_offset_multiplier);
            MarkLine {
                mark_type: def.mark_type,
                line,
                bit_column,
                min,
                max
            }
        })
        .collect();

    Ok(MarkLines { lines: mark_lines })
}

fn sample_linear(image: &ImageBuffer<'_, u8>, contours: &LandmarkContours, centers: &[deckscan_core::Fixed]) -> Result<Vec<SampleLine>, MarkLineError>
{
    let top = Line::new(
        *contours.left.first().ok_or(MarkLineError::CouldNotFormLine)?,
        *contours.right.first().ok_or(MarkLineError::CouldNotFormLine)?
    );
    let bottom = Line::new(
        *contours.left.last().ok_or(MarkLineError::CouldNotFormLine)?,
        *contours.right.last().ok_or(MarkLineError::CouldNotFormLine)?
    );
    let rect = image.rect();

    centers
        .iter()
        .map(|&t| {
            let t = t.to_real();
            let p0 = lerp_ivec(top.p0, top.p1, t);
            let p1 = lerp_ivec(bottom.p0, bottom.p1, t);
            SampleLine::sample_wide(image, Line::new(p0, p1), rect).ok_or(MarkLineError::CouldNotFormLine)
        })
        .collect()
}

fn sample_contoured(image: &ImageBuffer<'_, u8>, contours: &LandmarkContours, centers: &[deckscan_core::Fixed]) -> Result<Vec<SampleLine>, MarkLineError>
{
    let rows = contours.left.len().max(contours.right.len());
    if rows == 0
    {
        return Err(MarkLineError::CouldNotFormLine);
    }

    // `matrix[bit_index][row]`, filled one row at a time.
    let mut matrix = vec![Vec::with_capacity(rows); centers.len()];
    let mut endpoints = vec![(IVec::new(0, 0), IVec::new(0, 0)); centers.len()];

    for row in 0..rows
    {
        let left = *contours.left.get(row.min(contours.left.len() - 1)).unwrap();
        let right = *contours.right.get(row.min(contours.right.len() - 1)).unwrap();
        let segment = Line::new(left, right);
        let direction = segment.direction();
        let normal = direction.orthogonal();

        for (bit_index, &t) in centers.iter().enumerate()
        {
            let t = t.to_real();
            let p0 = left.to_real();
            let p1 = right.to_real();
            let center = Vec2::new(p0.x + (p1.x - p0.x) * t, p0.y + (p1.y - p0.y) * t);
            let plus = center + normal;
            let minus = center - normal;

            let a = i32::from(sample_point(image, minus));
            let b = i32::from(sample_point(image, center));
            let c = i32::from(sample_point(image, plus));
            matrix[bit_index].push((a + 6 * b + c) / 8);

            if row == 0
            {
                endpoints[bit_index].0 = center.round_to_ivec();
            }
            if row == rows - 1
            {
                endpoints[bit_index].1 = center.round_to_ivec();
            }
        }
    }

    Ok(matrix
        .into_iter()
        .zip(endpoints)
        .map(|(samples, (p0, p1))| SampleLine { p0, p1, samples })
        .collect())
}

fn sample_point(image: &ImageBuffer<'_, u8>, p: Vec2) -> u8
{
    image.get(p.x.round() as i32, p.y.round() as i32).unwrap_or(0)
}

fn lerp_ivec(a: IVec, b: IVec, t: f64) -> IVec
{
    let a = a.to_real();
    let b = b.to_real();
    IVec::new((a.x + (b.x - a.x) * t).round() as i32, (a.y + (b.y - a.y) * t).round() as i32)
}

#[cfg(test)]
mod tests
{
    use deckscan_core::Fixed;
    use deckscan_iface::code_definition::FixedCodeDefinition;
    use deckscan_iface::{Format, MarkDefinition};

    use super::*;

    fn image_with_vertical_bars(width: usize, height: usize, bars: &[(usize, usize)]) -> ImageBuffer<'static, u8>
    {
        let mut image: ImageBuffer<'static, u8> = ImageBuffer::owned(width, height);
        for y in 0..height
        {
            for x in 0..width
            {
                let dark = bars.iter().any(|&(bx, bw)| x >= bx && x < bx + bw);
                image.set(x, y, if dark { 10 } else { 220 });
            }
        }
        image
    }

    fn definition_with_one_bit() -> FixedCodeDefinition
    {
        let format = Format {
            name: "mark-line-test".to_owned(),
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

    fn contours(width: usize, height: usize) -> LandmarkContours
    {
        LandmarkContours {
            left: vec![IVec::new(10, 0), IVec::new(10, height as i32 - 1)],
            right: vec![IVec::new(width as i32 - 10, 0), IVec::new(width as i32 - 10, height as i32 - 1)]
        }
    }

    #[test]
    fn linear_mode_produces_one_mark_line_per_bit()
    {
        let image = image_with_vertical_bars(60, 20, &[(28, 4)]);
        let definition = definition_with_one_bit();
        let contours = contours(60, 20);
        let params = MarkLineParams {
            mode: SampleMode::Linear,
            average_offset_multiplier: 0.5
        };
        let mark_lines = sample_mark_lines(&image, &contours, &definition, params).unwrap();
        assert_eq!(mark_lines.len(), 1);
        assert_eq!(mark_lines.lines[0].line.len(), 20);
    }

    #[test]
    fn contoured_mode_produces_one_mark_line_per_bit()
    {
        let image = image_with_vertical_bars(60, 20, &[(28, 4)]);
        let definition = definition_with_one_bit();
        let contours = contours(60, 20);
        let params = MarkLineParams {
            mode: SampleMode::Contoured,
            average_offset_multiplier: 0.5
        };
        let mark_lines = sample_mark_lines(&image, &contours, &definition, params).unwrap();
        assert_eq!(mark_lines.len(), 1);
        assert_eq!(mark_lines.lines[0].bit_column.len(), 2);
    }

    #[test]
    fn resample_bit_columns_matches_requested_length()
    {
        let image = image_with_vertical_bars(60, 20, &[(28, 4)]);
        let definition = definition_with_one_bit();
        let contours = contours(60, 20);
        let params = MarkLineParams {
            mode: SampleMode::Linear,
            average_offset_multiplier: 0.5
        };
        let mark_lines = sample_mark_lines(&image, &contours, &definition, params).unwrap();
        let resampled = mark_lines.resample_bit_columns(54);
        assert_eq!(resampled.len(), 1);
        assert_eq!(resampled[0].len(), 54);
    }
}
