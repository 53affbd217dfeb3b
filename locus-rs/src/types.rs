/// Index of a bundle buffer inside the pool arena.
pub type SlotIdx = usize;
/// 1-based guide transcript id; 0 means "not a guide".
pub type GuideId = u32;
/// Globally unique gene number, assigned as bundles complete.
pub type GeneId = u64;

// AHash-backed maps for hot lookups (junction counts, chromosome sets).
// `HashMapExt` / `HashSetExt` provide `new()` and `with_capacity()`.
pub(crate) type HashMap<K, V> = ahash::HashMap<K, V>;
pub(crate) type HashSet<K> = ahash::HashSet<K>;
pub(crate) use ahash::HashMapExt;
pub(crate) use ahash::HashSetExt;
