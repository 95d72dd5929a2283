//! Deterministic feed ordering primitives.
//!
//! The product feed must look shuffled but stay stable for a given seed:
//! every page request with the same seed has to observe the same global
//! order, and different clients (different seeds) should see different,
//! well-mixed orders. Both the PRNG and the mixing algorithm are fixed
//! bit-for-bit — callers on other stacks reproduce the exact same
//! permutation from the same seed.
//!
//! Pipeline: seed string -> FNV-1a 32-bit hash -> xorshift32 stream ->
//! Fisher-Yates shuffle -> round-robin interleave across groups.
//!
//! Callers must canonicalize the input order (sort by id) before shuffling
//! so the same logical set always starts from the same sequence.

use std::collections::HashMap;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// Sentinel group for items without a usable group key.
pub const UNKNOWN_GROUP: &str = "__unknown__";

/// FNV-1a over the seed's UTF-8 bytes, 32-bit wraparound.
pub fn hash_seed(seed: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in seed.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// xorshift32 generator, normalized to [0, 1).
///
/// Zero is a fixed point of the xorshift step; a seed hashing to zero is
/// nudged to a fixed odd constant so the stream never degenerates.
#[derive(Debug, Clone)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    pub fn from_seed(seed: &str) -> Self {
        let hash = hash_seed(seed);
        Self {
            state: if hash == 0 { 0x9E37_79B9 } else { hash },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// Fisher-Yates shuffle driven by the seed-derived xorshift stream.
///
/// Identical seed and identical input sequence always yield an identical
/// output sequence.
pub fn shuffle<T: Clone>(items: &[T], seed: &str) -> Vec<T> {
    let mut arr: Vec<T> = items.to_vec();
    let mut rng = Xorshift32::from_seed(seed);

    let len = arr.len();
    for i in (1..len).rev() {
        let j = (rng.next_f64() * (i as f64 + 1.0)) as usize;
        arr.swap(i, j);
    }

    arr
}

/// Round-robin interleave of items bucketed by a group key.
///
/// Buckets are keyed by `key_fn` (blank keys fall into [`UNKNOWN_GROUP`]);
/// the group order and each bucket's internal order are shuffled under
/// seeds derived from `seed`, then items are emitted one per group in
/// rotation until every bucket is exhausted. The output is a permutation
/// of the input; 0 or 1 items pass through unchanged.
pub fn mix_by_group<T, F>(items: &[T], seed: &str, key_fn: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    if items.len() <= 1 {
        return items.to_vec();
    }

    // First-seen key order is the canonical input to the group shuffle.
    let mut group_keys: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<T>> = HashMap::new();
    for item in items {
        let raw = key_fn(item).trim();
        let key = if raw.is_empty() { UNKNOWN_GROUP } else { raw };
        if !buckets.contains_key(key) {
            group_keys.push(key.to_string());
        }
        buckets.entry(key.to_string()).or_default().push(item.clone());
    }

    let shuffled_keys = shuffle(&group_keys, &format!("groups:{seed}"));
    let shuffled_buckets: Vec<Vec<T>> = shuffled_keys
        .iter()
        .map(|key| {
            let bucket = buckets.remove(key).unwrap_or_default();
            shuffle(&bucket, &format!("group:{key}:{seed}"))
        })
        .collect();

    let mut pointers = vec![0usize; shuffled_buckets.len()];
    let mut out = Vec::with_capacity(items.len());
    let mut remaining = shuffled_buckets.len();

    while remaining > 0 {
        remaining = 0;
        for (bucket, ptr) in shuffled_buckets.iter().zip(pointers.iter_mut()) {
            if *ptr < bucket.len() {
                out.push(bucket[*ptr].clone());
                *ptr += 1;
                if *ptr < bucket.len() {
                    remaining += 1;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_hash_seed_known_vectors() {
        // Reference FNV-1a 32-bit values.
        assert_eq!(hash_seed(""), 0x811c_9dc5);
        assert_eq!(hash_seed("a"), 0xe40c_292c);
        assert_eq!(hash_seed("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_xorshift_stream_is_deterministic_and_bounded() {
        let mut a = Xorshift32::from_seed("abc");
        let mut b = Xorshift32::from_seed("abc");
        for _ in 0..100 {
            let v = a.next_f64();
            assert_eq!(v, b.next_f64());
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_xorshift_zero_hash_does_not_freeze() {
        let mut rng = Xorshift32 { state: 0x9E37_79B9 };
        let first = rng.next_u32();
        assert_ne!(first, 0);
        assert_ne!(first, rng.next_u32());
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let items: Vec<String> = (0..50).map(|i| format!("p{i:02}")).collect();
        assert_eq!(shuffle(&items, "seed-1"), shuffle(&items, "seed-1"));
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let items: Vec<u32> = (0..100).collect();
        let mut shuffled = shuffle(&items, "xyz");
        shuffled.sort_unstable();
        assert_eq!(shuffled, items);
    }

    #[test]
    fn test_different_seeds_give_different_orders() {
        let items: Vec<u32> = (0..64).collect();
        assert_ne!(shuffle(&items, "alpha"), shuffle(&items, "beta"));
    }

    #[test]
    fn test_shuffle_handles_trivial_inputs() {
        let empty: Vec<u32> = vec![];
        assert!(shuffle(&empty, "s").is_empty());
        assert_eq!(shuffle(&[7u32], "s"), vec![7]);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        group: String,
    }

    fn item(id: &str, group: &str) -> Item {
        Item {
            id: id.to_string(),
            group: group.to_string(),
        }
    }

    #[test]
    fn test_mix_is_a_permutation_of_input() {
        let items: Vec<Item> = (0..30)
            .map(|i| item(&format!("p{i:02}"), ["a", "b", "c"][i % 3]))
            .collect();
        let mixed = mix_by_group(&items, "s1", |it| &it.group);

        let mut got: Vec<&str> = mixed.iter().map(|it| it.id.as_str()).collect();
        let mut want: Vec<&str> = items.iter().map(|it| it.id.as_str()).collect();
        got.sort_unstable();
        want.sort_unstable();
        assert_eq!(got, want);
    }

    #[test]
    fn test_mix_is_deterministic() {
        let items: Vec<Item> = (0..20)
            .map(|i| item(&format!("p{i:02}"), ["x", "y"][i % 2]))
            .collect();
        assert_eq!(
            mix_by_group(&items, "s", |it| &it.group),
            mix_by_group(&items, "s", |it| &it.group)
        );
    }

    #[test]
    fn test_mix_interleaves_groups_round_robin() {
        // Equal-sized groups: no two adjacent items may share a group until
        // a group is exhausted, so the first cycle covers every group once.
        let items: Vec<Item> = (0..12)
            .map(|i| item(&format!("p{i:02}"), ["a", "b", "c"][i % 3]))
            .collect();
        let mixed = mix_by_group(&items, "mixer", |it| &it.group);

        let first_cycle: Vec<&str> = mixed[..3].iter().map(|it| it.group.as_str()).collect();
        let mut sorted = first_cycle.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_mix_blank_groups_share_the_unknown_bucket() {
        let items = vec![item("p1", ""), item("p2", "   "), item("p3", "shoes")];
        let mixed = mix_by_group(&items, "s", |it| &it.group);
        assert_eq!(mixed.len(), 3);

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for it in &mixed {
            *counts.entry(it.id.as_str()).or_default() += 1;
        }
        assert!(counts.values().all(|&c| c == 1));
    }

    #[test]
    fn test_mix_degrades_to_identity_for_tiny_inputs() {
        let empty: Vec<Item> = vec![];
        assert!(mix_by_group(&empty, "s", |it| &it.group).is_empty());

        let one = vec![item("p1", "a")];
        assert_eq!(mix_by_group(&one, "s", |it| &it.group), one);
    }

    #[test]
    fn test_single_group_mix_equals_bucket_shuffle() {
        // Canonical sort first, as callers are required to do.
        let mut items = vec![item("p3", "shoes"), item("p1", "shoes"), item("p2", "shoes")];
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let mixed = mix_by_group(&items, "abc", |it| &it.group);
        let expected = shuffle(&items, "group:shoes:abc");
        assert_eq!(mixed, expected);
    }
}
