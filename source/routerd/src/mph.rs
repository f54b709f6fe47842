//! Minimal perfect hashing over small sets of fixed-width byte keys.
//!
//! Hash-and-displace construction: keys are grouped into buckets by a
//! first-level hash, then buckets are assigned displacement values, largest
//! first, until every key of the set lands on a distinct slot in
//! `[0, len)`. If a bucket cannot be placed the whole attempt restarts with
//! a fresh seed; a set that survives no seed fails construction.
//!
//! `lookup` accepts *any* key and always returns a slot in range. For keys
//! outside the construction set the slot is meaningless, so callers must
//! compare the key against whatever they stored at the slot before trusting
//! it; the hash is a hint, not a membership test.

const MAX_SEED_ATTEMPTS: u64 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mph {
    seed: u64,
    displacements: Vec<u32>,
    len: usize,
}

impl Mph {
    /// Build over a set of distinct keys. Returns `None` when no seed
    /// produces a collision-free placement (or the set is empty).
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Option<Mph> {
        let len = keys.len();
        if len == 0 {
            return None;
        }
        let bucket_count = len.div_ceil(2);

        'seeds: for attempt in 0..MAX_SEED_ATTEMPTS {
            let seed = splitmix64(0x9e37_79b9_7f4a_7c15 ^ attempt);

            let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); bucket_count];
            for (index, key) in keys.iter().enumerate() {
                let bucket = (hash(key.as_ref(), seed) % bucket_count as u64) as usize;
                buckets[bucket].push(index);
            }

            let mut order: Vec<usize> = (0..bucket_count).collect();
            order.sort_by_key(|&b| std::cmp::Reverse(buckets[b].len()));

            let displacement_limit = len as u32 * 16 + 256;
            let mut displacements = vec![0u32; bucket_count];
            let mut occupied = vec![false; len];

            for &bucket in &order {
                if buckets[bucket].is_empty() {
                    break;
                }

                let mut placed = false;
                'displacements: for d in 0..displacement_limit {
                    let mut slots = Vec::with_capacity(buckets[bucket].len());
                    for &key_index in &buckets[bucket] {
                        let slot = (hash(keys[key_index].as_ref(), seed ^ mix(d))
                            % len as u64) as usize;
                        if occupied[slot] || slots.contains(&slot) {
                            continue 'displacements;
                        }
                        slots.push(slot);
                    }

                    for &slot in &slots {
                        occupied[slot] = true;
                    }
                    displacements[bucket] = d;
                    placed = true;
                    break;
                }

                if !placed {
                    continue 'seeds;
                }
            }

            return Some(Mph {
                seed,
                displacements,
                len,
            });
        }

        None
    }

    pub fn lookup(&self, key: &[u8]) -> usize {
        let bucket = (hash(key, self.seed) % self.displacements.len() as u64) as usize;
        let d = self.displacements[bucket];
        (hash(key, self.seed ^ mix(d)) % self.len as u64) as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn mix(displacement: u32) -> u64 {
    splitmix64(0x517c_c1b7_2722_0a95 ^ displacement as u64)
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn hash(key: &[u8], seed: u64) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325 ^ seed;
    for &byte in key {
        h ^= byte as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^ (h >> 33)
}
