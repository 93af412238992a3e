//! The row resolver (§4.7): collapses the decoder's raw, position-ordered
//! `ScannedCard` runs down to one card per physical row via the
//! "genocide" dominance rule, resolving disputes between adjacent runs
//! that disagree about a row's card index.
use crate::decode::{Deck, ScannedCard};

/// Compare two adjacent, differently-indexed runs. Returns `Some(true)`
/// when `a` dominates `b` (clear `b`), `Some(false)` when `b` dominates
/// `a` (clear `a`), or `None` when neither dominates and both survive
/// (§4.7: "if neither dominates, both survive").
fn challenge_genocide(a: &ScannedCard, b: &ScannedCard, genocide_scale_factor: f64) -> Option<bool>
{
    let (count_a, count_b) = (f64::from(a.count), f64::from(b.count));
    let (max, min) = (count_a.max(count_b), count_a.min(count_b));
    if min <= 0.0 || max <= genocide_scale_factor * min
    {
        return None;
    }
    Some(count_a > count_b)
}

/// Resolve the decoder's raw run sequence into one card per row (§4.7).
///
/// Walks the runs left to right, maintaining a stack of surviving cards.
/// Each new run is challenged against the top of the stack: a differing
/// index triggers [`challenge_genocide`], clearing the loser outright
/// (dropping it without absorbing its counters, per the open-question
/// resolution in §9); a matching index merges via
/// [`ScannedCard::consume`] instead, since that is the one case the
/// source's `consume` helper is documented for — folding two runs that
/// turned out to describe the same row once the run between them lost
/// its challenge.
#[must_use]
pub fn resolve(deck: &Deck, genocide_scale_factor: f64) -> Deck
{
    let mut stack: Vec<ScannedCard> = Vec::with_capacity(deck.cards.len());

    for card in &deck.cards
    {
        if card.count == 0
        {
            continue;
        }
        let mut incoming = *card;
        loop
        {
            let Some(top) = stack.last_mut() else {
                stack.push(incoming);
                break;
            };
            if top.card_index == incoming.card_index
            {
                top.consume(&incoming);
                break;
            }
            match challenge_genocide(top, &incoming, genocide_scale_factor)
            {
                Some(true) => break,      // top dominates; incoming is dropped entirely
                Some(false) =>
                {
                    // incoming dominates; clear top and re-challenge against
                    // whatever is now exposed underneath it.
                    stack.pop();
                    continue;
                }
                None =>
                {
                    stack.push(incoming);
                    break;
                }
            }
        }
    }

    Deck {
        cards: stack,
        min_card_count: deck.min_card_count
    }
}
