//! The temporal history analyzer (§4.8): fuses the raw per-row index
//! lists produced by successive frames into a link-graph, consolidates it
//! into a single HEAD-to-TAIL path, attempts to recover cards the
//! consolidation dropped, and classifies the result's confidence.
use std::collections::HashSet;

use deckscan_iface::Format;

use crate::errors::AnalyzeOutcome;

/// Tunables for `add_entry`/`analyze` (§6.1's `analysis.*` group).
#[derive(Copy, Clone, Debug)]
pub struct HistoryParams
{
    pub max_history_age_ms: u64,
    pub min_history_entries: usize,
    pub missing_card_popularity: f64,
    pub minimum_confidence_factor_threshold: f64,
    pub high_confidence_factor_threshold: f64,
    pub enable_low_confidence_reports: bool
}

/// One distinct raw index sequence ever observed, with one timestamp per
/// observation. `count` is the number of timestamps (§3).
#[derive(Clone, Debug)]
pub struct HistoryEntry
{
    pub indices: Vec<usize>,
    pub timestamps: Vec<u64>
}

impl HistoryEntry
{
    #[must_use]
    pub fn count(&self) -> usize
    {
        self.timestamps.len()
    }
}

/// A directed, weighted edge in the link matrix: `source`/`target` are
/// card indices or the reserved HEAD/TAIL sentinels (§3).
#[derive(Copy, Clone, Debug)]
pub struct Link
{
    pub source: usize,
    pub target: usize,
    pub count: u32
}

/// Row-per-source outgoing-link table, sized to `maxCardCountWithReversed + 2`
/// so both sentinels have their own row (§3).
#[derive(Clone, Debug)]
pub struct LinkMatrix
{
    rows: Vec<Vec<Link>>,
    head: usize,
    tail: usize
}

impl LinkMatrix
{
    fn new(max_card_count_with_reversed: usize) -> Self
    {
        let head = max_card_count_with_reversed;
        let tail = head + 1;
        LinkMatrix {
            rows: vec![Vec::new(); tail + 1],
            head,
            tail
        }
    }

    fn add_weight(&mut self, source: usize, target: usize, count: u32)
    {
        if let Some(existing) = self.rows[source].iter_mut().find(|link| link.target == target)
        {
            existing.count += count;
        }
        else
        {
            self.rows[source].push(Link { source, target, count });
        }
    }

    fn outgoing(&self, source: usize) -> &[Link]
    {
        &self.rows[source]
    }

    fn has_link(&self, source: usize, target: usize) -> bool
    {
        self.rows[source].iter().any(|link| link.target == target)
    }

    fn weight(&self, source: usize, target: usize) -> Option<u32>
    {
        self.rows[source].iter().find(|link| link.target == target).map(|link| link.count)
    }
}

/// Accumulates per-frame decoded index lists and turns them into a
/// consolidated, confidence-rated deck ordering.
#[derive(Clone, Debug, Default)]
pub struct TemporalHistory
{
    entries: Vec<HistoryEntry>,
    format_name: Option<String>,
    max_card_count: usize,
    max_card_count_with_reversed: usize,
    reversible: bool
}

impl TemporalHistory
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize
    {
        self.entries.len()
    }

    /// Record one frame's resolved index sequence (§4.8). A format-name
    /// change wipes all history before adopting the new format; otherwise
    /// entries are pruned to `max_history_age_ms` first.
    pub fn add_entry(&mut self, indices: &[usize], format: &Format, now_ms: u64, params: &HistoryParams)
    {
        if self.format_name.as_deref() != Some(format.name.as_str())
        {
            self.entries.clear();
            self.format_name = Some(format.name.clone());
            self.max_card_count = format.max_card_count;
            self.max_card_count_with_reversed = format.max_card_count_with_reversed;
            self.reversible = format.reversible;
        }
        else
        {
            for entry in &mut self.entries
            {
                entry.timestamps.retain(|&t| now_ms.saturating_sub(t) <= params.max_history_age_ms);
            }
            self.entries.retain(|entry| !entry.timestamps.is_empty());
        }

        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.indices == indices)
        {
            entry.timestamps.push(now_ms);
        }
        else
        {
            self.entries.push(HistoryEntry {
                indices: indices.to_vec(),
                timestamps: vec![now_ms]
            });
        }
    }

    fn build_link_matrix(&self) -> LinkMatrix
    {
        let mut matrix = LinkMatrix::new(self.max_card_count_with_reversed);
        for entry in &self.entries
        {
            let count = entry.count() as u32;
            if count == 0
            {
                continue;
            }
            let mut node = matrix.head;
            for &index in &entry.indices
            {
                matrix.add_weight(node, index, count);
                node = index;
            }
            matrix.add_weight(node, matrix.tail, count);
        }
        matrix
    }

    /// Walk `matrix` from HEAD, greedily following the heaviest outgoing
    /// link at each step, applying the mutual-link tie-break for a
    /// two-way tie (§4.8). Returns the consolidated edge sequence, or
    /// `None` when the path is inconclusive or loops.
    fn consolidate(matrix: &LinkMatrix) -> Option<Vec<Link>>
    {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut current = matrix.head;

        while current != matrix.tail
        {
            if !visited.insert(current)
            {
                return None;
            }
            let outgoing = matrix.outgoing(current);
            let max_count = outgoing.iter().map(|link| link.count).max()?;
            let candidates: Vec<&Link> = outgoing.iter().filter(|link| link.count == max_count).collect();

            let chosen = match candidates.as_slice()
            {
                [only] => **only,
                [a, b] =>
                {
                    let a_to_b = matrix.has_link(a.target, b.target);
                    let b_to_a = matrix.has_link(b.target, a.target);
                    if a_to_b && !b_to_a
                    {
                        **a
                    }
                    else if b_to_a && !a_to_b
                    {
                        **b
                    }
                    else
                    {
                        return None;
                    }
                }
                _ => return None
            };

            path.push(chosen);
            current = chosen.target;
        }

        Some(path)
    }

    /// For cards absent from `path`, look for a triple `(foundSource →
    /// missingSource → missingTarget)` whose prelink weight is the unique
    /// maximum among candidates and meets the popularity floor; splice it
    /// into the path in place of the consolidated link it displaces
    /// (§4.8).
    fn recover_missing_cards(&self, matrix: &LinkMatrix, mut path: Vec<Link>, total_entries: u32, params: &HistoryParams) -> Vec<Link>
    {
        let present: HashSet<usize> = path.iter().map(|link| link.target).filter(|&t| t != matrix.tail).collect();
        let popularity_floor = (total_entries as f64 * params.missing_card_popularity).ceil();

        for missing in 0..self.max_card_count
        {
            if present.contains(&missing)
            {
                continue;
            }
            if self.reversible
            {
                let counterpart = reversed_counterpart(missing, self.max_card_count);
                if present.contains(&counterpart)
                {
                    continue;
                }
            }

            let mut best: Option<(usize, usize, usize, u32)> = None; // (edge_index, found_source, target, count)
            let mut tied = false;

            for link in matrix.outgoing(missing)
            {
                let target = link.target;
                let Some(edge_index) = path.iter().position(|edge| edge.target == target) else {
                    continue;
                };
                let found_source = path[edge_index].source;
                let Some(prelink_count) = matrix.weight(found_source, missing) else {
                    continue;
                };

                match best
                {
                    Some((_, _, _, best_count)) if prelink_count > best_count =>
                    {
                        best = Some((edge_index, found_source, target, prelink_count));
                        tied = false;
                    }
                    Some((_, _, _, best_count)) if prelink_count == best_count =>
                    {
                        tied = true;
                    }
                    None => best = Some((edge_index, found_source, target, prelink_count)),
                    _ => {}
                }
            }

            let Some((edge_index, found_source, target, count)) = best else {
                continue;
            };
            if tied || f64::from(count) < popularity_floor
            {
                continue;
            }

            let postlink_count = matrix.weight(missing, target).unwrap_or(count);
            path.splice(
                edge_index..=edge_index,
                [
                    Link {
                        source: found_source,
                        target: missing,
                        count
                    },
                    Link {
                        source: missing,
                        target,
                        count: postlink_count
                    },
                ]
            );
        }

        path
    }

    /// Build the link matrix, consolidate it, attempt missing-card
    /// recovery, and classify the confidence of the result (§4.8).
    #[must_use]
    pub fn analyze(&self, params: &HistoryParams) -> AnalyzeOutcome
    {
        let total_entries: u32 = self.entries.iter().map(|entry| entry.count() as u32).sum();
        if (total_entries as usize) < params.min_history_entries
        {
            return AnalyzeOutcome::InsufficientHistory;
        }

        let matrix = self.build_link_matrix();
        let Some(path) = Self::consolidate(&matrix) else {
            return AnalyzeOutcome::Inconclusive;
        };

        let path = self.recover_missing_cards(&matrix, path, total_entries, params);

        let indices: Vec<usize> = path.iter().map(|link| link.target).filter(|&t| t != matrix.tail).collect();
        let avg_link_count = path.iter().map(|link| f64::from(link.count)).sum::<f64>() / path.len() as f64;
        let confidence = if total_entries == 0 { 0.0 } else { (avg_link_count / f64::from(total_entries)) * 100.0 };

        if confidence >= params.high_confidence_factor_threshold
        {
            AnalyzeOutcome::SuccessHighConfidence { indices, confidence }
        }
        else if confidence >= params.minimum_confidence_factor_threshold
        {
            if params.enable_low_confidence_reports
            {
                AnalyzeOutcome::SuccessLowConfidence { indices, confidence }
            }
            else
            {
                AnalyzeOutcome::InsufficientConfidence
            }
        }
        else
        {
            AnalyzeOutcome::InsufficientConfidence
        }
    }
}

/// The reversed-deck counterpart of a face index, assuming `faceCodesNdo`
/// lists the non-reversed faces first and their mirror-printed
/// counterparts immediately after (an assumption documented as an open
/// question resolution, since the source data model leaves the mapping
/// unspecified).
fn reversed_counterpart(index: usize, max_card_count: usize) -> usize
{
    if index < max_card_count
    {
        index + max_card_count
    }
    else
    {
        index - max_card_count
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn format(name: &str, max_card_count: usize, max_with_reversed: usize, reversible: bool) -> Format
    {
        Format {
            name: name.to_owned(),
            max_card_count,
            max_card_count_with_reversed: max_with_reversed,
            min_card_count: 1,
            reversible,
            invert_luma: false,
            face_codes_ndo: (0..max_card_count as u32).collect()
        }
    }

    fn params() -> HistoryParams
    {
        HistoryParams {
            max_history_age_ms: 4000,
            min_history_entries: 15,
            missing_card_popularity: 0.5,
            minimum_confidence_factor_threshold: 70.0,
            high_confidence_factor_threshold: 90.0,
            enable_low_confidence_reports: true
        }
    }

    #[test]
    fn fewer_than_minimum_entries_is_insufficient_history()
    {
        let mut history = TemporalHistory::new();
        let format = format("mds12-54", 54, 56, false);
        for tick in 0..5
        {
            history.add_entry(&[0, 1, 2], &format, tick, &params());
        }
        assert_eq!(history.analyze(&params()), AnalyzeOutcome::InsufficientHistory);
    }

    #[test]
    fn a_single_repeated_sequence_reaches_full_confidence()
    {
        let mut history = TemporalHistory::new();
        let format = format("mds12-54", 4, 6, false);
        for tick in 0..16
        {
            history.add_entry(&[0, 1, 2, 3], &format, tick, &params());
        }
        match history.analyze(&params())
        {
            AnalyzeOutcome::SuccessHighConfidence { indices, confidence } =>
            {
                assert_eq!(indices, vec![0, 1, 2, 3]);
                assert!((confidence - 100.0).abs() < 1e-9);
            }
            other => panic!("expected SuccessHighConfidence, got {other:?}")
        }
    }

    #[test]
    fn path_always_brackets_head_and_tail_with_no_repeated_sources()
    {
        let mut history = TemporalHistory::new();
        let format = format("mds12-54", 4, 6, false);
        for tick in 0..20
        {
            history.add_entry(&[0, 1, 2, 3], &format, tick, &params());
        }
        let AnalyzeOutcome::SuccessHighConfidence { indices, .. } = history.analyze(&params()) else {
            panic!("expected a successful analysis");
        };
        // indices excludes HEAD/TAIL and every source visited was unique by
        // construction of `consolidate`'s `visited` set.
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn format_switch_wipes_history()
    {
        let mut history = TemporalHistory::new();
        let format_a = format("mds12-54", 4, 6, false);
        for tick in 0..20
        {
            history.add_entry(&[0, 1, 2, 3], &format_a, tick, &params());
        }
        let format_b = format("other-format", 4, 6, false);
        history.add_entry(&[0, 1, 2, 3], &format_b, 20, &params());
        assert_eq!(history.entry_count(), 1);
        assert_eq!(history.analyze(&params()), AnalyzeOutcome::InsufficientHistory);
    }

    #[test]
    fn idempotent_add_entry_increases_count_by_two_without_new_entries()
    {
        let mut history = TemporalHistory::new();
        let format = format("mds12-54", 4, 6, false);
        history.add_entry(&[0, 1], &format, 10, &params());
        history.add_entry(&[0, 1], &format, 10, &params());
        assert_eq!(history.entry_count(), 1);
        assert_eq!(history.entries[0].count(), 2);
    }

    #[test]
    fn majority_path_includes_card_confirmed_by_strict_dominance()
    {
        let mut history = TemporalHistory::new();
        let format = format("mds12-54", 5, 7, false);
        for tick in 0..14
        {
            history.add_entry(&[1, 2, 3, 4], &format, tick, &params());
        }
        for tick in 14..20
        {
            history.add_entry(&[1, 2, 4], &format, tick, &params());
        }
        match history.analyze(&params())
        {
            AnalyzeOutcome::SuccessHighConfidence { indices, .. } | AnalyzeOutcome::SuccessLowConfidence { indices, .. } =>
            {
                assert_eq!(indices, vec![1, 2, 3, 4]);
            }
            other => panic!("expected a successful analysis, got {other:?}")
        }
    }

    #[test]
    fn recover_missing_cards_splices_a_high_popularity_triple_into_the_path()
    {
        let history = TemporalHistory {
            max_card_count: 4,
            max_card_count_with_reversed: 4,
            reversible: false,
            ..TemporalHistory::default()
        };
        let mut matrix = LinkMatrix::new(history.max_card_count_with_reversed);
        let head = matrix.head;
        let tail = matrix.tail;
        // Direct path never visits card 2, but 2 has strong outgoing
        // weight toward 3, and 1 has strong weight toward 2 as well -
        // the recovery triple (1 -> 2 -> 3) should outrank leaving 2 out.
        matrix.add_weight(head, 1, 20);
        matrix.add_weight(1, 3, 20);
        matrix.add_weight(1, 2, 18);
        matrix.add_weight(2, 3, 18);
        matrix.add_weight(3, tail, 20);

        let path = vec![
            Link { source: head, target: 1, count: 20 },
            Link { source: 1, target: 3, count: 20 },
            Link { source: 3, target: tail, count: 20 },
        ];

        let mut params = params();
        params.missing_card_popularity = 0.5;
        let recovered = history.recover_missing_cards(&matrix, path, 20, &params);

        let indices: Vec<usize> = recovered.iter().map(|link| link.target).filter(|&t| t != tail).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn recover_missing_cards_leaves_a_low_popularity_triple_out()
    {
        let history = TemporalHistory {
            max_card_count: 4,
            max_card_count_with_reversed: 4,
            reversible: false,
            ..TemporalHistory::default()
        };
        let mut matrix = LinkMatrix::new(history.max_card_count_with_reversed);
        let head = matrix.head;
        let tail = matrix.tail;
        matrix.add_weight(head, 1, 20);
        matrix.add_weight(1, 3, 20);
        matrix.add_weight(1, 2, 2);
        matrix.add_weight(2, 3, 2);
        matrix.add_weight(3, tail, 20);

        let path = vec![
            Link { source: head, target: 1, count: 20 },
            Link { source: 1, target: 3, count: 20 },
            Link { source: 3, target: tail, count: 20 },
        ];

        let recovered = history.recover_missing_cards(&matrix, path, 20, &params());
        let indices: Vec<usize> = recovered.iter().map(|link| link.target).filter(|&t| t != tail).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
