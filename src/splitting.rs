//! Liability splitting, padding and shuffling.
//!
//! The custodian's raw liability list would leak account balances if it were
//! mapped to leaves directly. Before the tree is built the list is therefore
//! obfuscated:
//!
//! 1. every liability is split at a uniformly random point, and the pieces
//!    are split further until no piece exceeds the configured threshold;
//! 2. the list is grown to the next power of two by splitting more pieces,
//!    falling back to zero-amount dummy entries when nothing is left to
//!    split;
//! 3. the list is shuffled with a cryptographic RNG.
//!
//! The total amount is preserved exactly through all three stages.
//!
//! All randomized functions are generic over the RNG so that tests can
//! inject a seeded one; the public entry point draws from the operating
//! system's CSPRNG.

use rand::{rngs::OsRng, CryptoRng, Rng};

use crate::{liability::Liability, threshold::SplitThreshold};

/// Split, pad and shuffle the liability list for tree construction.
///
/// The returned list has power-of-two length (zero counts as a power of two,
/// so an empty book stays empty), every non-dummy entry carries an amount in
/// `[1, threshold]`, and every input liability with an amount above 1 is
/// represented by at least two entries.
pub fn obfuscate_liabilities(
    liabilities: Vec<Liability>,
    threshold: SplitThreshold,
) -> Vec<Liability> {
    obfuscate_liabilities_with_rng(liabilities, threshold, &mut OsRng)
}

/// Same as [obfuscate_liabilities] but with a caller-provided RNG.
pub fn obfuscate_liabilities_with_rng<R: Rng + CryptoRng>(
    liabilities: Vec<Liability>,
    threshold: SplitThreshold,
    rng: &mut R,
) -> Vec<Liability> {
    let mut list = split_and_pad(liabilities, threshold, rng);
    shuffle(&mut list, rng);
    list
}

/// Stages 1 & 2: mandatory first split, recursive split below the
/// threshold, growth to a power of two, dummy padding.
///
/// Split out from the shuffle so that tests can assert on the pre-shuffle
/// order.
fn split_and_pad<R: Rng + CryptoRng>(
    liabilities: Vec<Liability>,
    threshold: SplitThreshold,
    rng: &mut R,
) -> Vec<Liability> {
    let threshold = threshold.as_u64();

    let mut list = Vec::with_capacity(liabilities.len() * 2);
    for liability in liabilities {
        let (left, right) = split_once(liability, rng);
        split_below(left, threshold, rng, &mut list);
        if let Some(right) = right {
            split_below(right, threshold, rng, &mut list);
        }
    }

    let target = next_power_of_two(list.len());
    let deficit = target - list.len();
    let mut list = grow(list, deficit, rng);

    // grow can fall short when the list is dominated by unit amounts;
    // dummies make up the difference.
    while list.len() < target {
        list.push(Liability::dummy());
    }

    list
}

/// Split a liability at a uniformly random point.
///
/// Amounts of 0 and 1 cannot be split and pass through whole. Neither child
/// of a split ever has a zero amount.
fn split_once<R: Rng + CryptoRng>(
    liability: Liability,
    rng: &mut R,
) -> (Liability, Option<Liability>) {
    if liability.amount <= 1 {
        return (liability, None);
    }
    let r = rng.gen_range(1..=liability.amount - 1);
    let rest = liability.with_amount(liability.amount - r);
    (liability.with_amount(r), Some(rest))
}

/// Recursively split until every piece is at most `threshold`, appending
/// pieces to `out` in left-to-right order.
///
/// Terminates because both children of a split are strictly smaller than
/// their parent and never zero.
fn split_below<R: Rng + CryptoRng>(
    liability: Liability,
    threshold: u64,
    rng: &mut R,
    out: &mut Vec<Liability>,
) {
    if liability.amount <= threshold {
        out.push(liability);
        return;
    }
    match split_once(liability, rng) {
        (left, Some(right)) => {
            split_below(left, threshold, rng, out);
            split_below(right, threshold, rng, out);
        }
        // unreachable in practice: amount > threshold >= 1 always splits
        (left, None) => out.push(left),
    }
}

/// Stage 2: try to obtain `d` extra entries by splitting existing ones.
///
/// The first `d` entries are each split once. Entries with amount 1 do not
/// split, so the round may come up short; the shortfall is carried into a
/// recursive round over the remaining tail. The recursion depth is bounded
/// by `log2(list length) + 1`.
fn grow<R: Rng + CryptoRng>(mut list: Vec<Liability>, d: usize, rng: &mut R) -> Vec<Liability> {
    if d == 0 {
        return list;
    }

    let tail = list.split_off(d);
    let head = list;

    let mut result = Vec::with_capacity(2 * d + tail.len());
    for liability in head {
        let (left, right) = split_once(liability, rng);
        result.push(left);
        if let Some(right) = right {
            result.push(right);
        }
    }

    let deficit = 2 * d - result.len();
    let take = deficit.min(tail.len());
    result.extend(grow(tail, take, rng));
    result
}

/// Stage 3: a uniformly random permutation.
///
/// Each entry gets an independent 64-bit random tag and the list is sorted
/// by tag; the stable sort breaks (vanishingly rare) tag collisions
/// deterministically.
fn shuffle<R: Rng + CryptoRng>(list: &mut Vec<Liability>, rng: &mut R) {
    let mut tagged: Vec<(u64, Liability)> =
        list.drain(..).map(|l| (rng.next_u64(), l)).collect();
    tagged.sort_by_key(|(tag, _)| *tag);
    list.extend(tagged.into_iter().map(|(_, liability)| liability));
}

/// The smallest power of two at least `n`, with 0 mapping to 0 so that an
/// empty book produces an empty tree.
fn next_power_of_two(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        n.next_power_of_two()
    }
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::Key;
    use rand::{rngs::StdRng, SeedableRng};

    fn liability(account_id: u64, amount: u64) -> Liability {
        Liability::new(account_id, Key::from([account_id as u8; 32]), amount)
    }

    fn amounts(list: &[Liability]) -> Vec<u64> {
        list.iter().map(|l| l.amount).collect()
    }

    #[test]
    fn zero_maps_to_zero() {
        assert_eq!(next_power_of_two(0), 0);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(5), 8);
    }

    #[test]
    fn empty_input_stays_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let out =
            obfuscate_liabilities_with_rng(Vec::new(), SplitThreshold::default(), &mut rng);
        assert!(out.is_empty());
    }

    // Amounts [1, 2, 3] with a high threshold always end up, pre-shuffle, as
    // six unit amounts followed by two dummies, regardless of RNG draws.
    #[test]
    fn small_amounts_split_to_units_and_dummies() {
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let input = vec![liability(1, 1), liability(2, 2), liability(3, 3)];
            let out = split_and_pad(input, SplitThreshold::from(100_000), &mut rng);

            assert_eq!(amounts(&out), vec![1, 1, 1, 1, 1, 1, 0, 0]);
            assert!(out[6].is_dummy());
            assert!(out[7].is_dummy());
        }
    }

    #[test]
    fn singleton_above_threshold_splits_below_it() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = vec![liability(1, 10_000_001)];
        let out = obfuscate_liabilities_with_rng(input, SplitThreshold::from(5_000_000), &mut rng);

        assert!(out.len() >= 4);
        assert!(out.len().is_power_of_two());
        assert!(out.iter().all(|l| l.amount <= 5_000_000));
        assert_eq!(out.iter().map(|l| l.amount).sum::<u64>(), 10_000_001);
    }

    #[test]
    fn all_unit_amounts_are_padded_with_dummies() {
        let mut rng = StdRng::seed_from_u64(3);
        let input = (1..=5).map(|id| liability(id, 1)).collect();
        let out = obfuscate_liabilities_with_rng(input, SplitThreshold::default(), &mut rng);

        assert_eq!(out.len(), 8);
        assert_eq!(out.iter().filter(|l| l.is_dummy()).count(), 3);
        assert_eq!(out.iter().map(|l| l.amount).sum::<u64>(), 5);
    }

    #[test]
    fn postconditions_hold_for_mixed_books() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let input = vec![
                liability(1, 1),
                liability(2, 4_999_999),
                liability(3, 5_000_001),
                liability(4, 123_456_789),
                liability(5, 2),
            ];
            let total: u64 = input.iter().map(|l| l.amount).sum();
            let out =
                obfuscate_liabilities_with_rng(input, SplitThreshold::from(5_000_000), &mut rng);

            assert!(out.len().is_power_of_two());
            assert_eq!(out.iter().map(|l| l.amount).sum::<u64>(), total);
            for l in &out {
                if l.is_dummy() {
                    continue;
                }
                assert!(l.amount >= 1);
                assert!(l.amount <= 5_000_000);
            }
            // every account with amount > 1 is represented at least twice
            for id in 2..=5 {
                assert!(out.iter().filter(|l| l.account_id == id).count() >= 2);
            }
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut list: Vec<Liability> = (0..64).map(|i| liability(i, i + 1)).collect();
        let mut expected = amounts(&list);
        shuffle(&mut list, &mut rng);

        let mut shuffled = amounts(&list);
        assert_ne!(shuffled, expected, "64 elements staying put is a bug, not luck");
        shuffled.sort_unstable();
        expected.sort_unstable();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn shuffle_is_deterministic_given_the_rng() {
        let make = || -> Vec<Liability> { (0..32).map(|i| liability(i, i + 1)).collect() };

        let mut a = make();
        let mut b = make();
        shuffle(&mut a, &mut StdRng::seed_from_u64(42));
        shuffle(&mut b, &mut StdRng::seed_from_u64(42));

        assert_eq!(amounts(&a), amounts(&b));
    }
}
