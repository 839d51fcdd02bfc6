//! Deterministic, dependency-free text embeddings.
//!
//! Produces a fixed-dimension (256), L2-normalised vector from arbitrary text
//! using the hashing trick over three feature families:
//! - lowercased token hashes (signed bucket allocation)
//! - character 3-grams, weighted down relative to whole tokens
//! - "code signal" features (keywords, brackets, language markers)
//!
//! No network calls, no randomness, no external crates: the same input text
//! always produces the same vector. This makes the embedder safe to call from
//! anywhere — memory writes, cache scoring, semantic search — without an I/O
//! budget or a model to warm up.

/// Fixed embedding dimension used throughout the cognitive memory stack.
pub const DIM: usize = 256;

const TOKEN_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.3;
const KEYWORD_WEIGHT: f32 = 0.5;
const BRACKET_WEIGHT: f32 = 0.2;
const LANG_MARKER_WEIGHT: f32 = 0.12;

const CODE_KEYWORDS: &[&str] = &[
    "fn", "let", "const", "struct", "enum", "impl", "trait", "pub", "match", "if", "else", "for",
    "while", "return", "async", "await", "mut", "use", "mod", "unsafe", "class", "def",
    "function", "var", "public", "private", "static", "void", "import", "package", "interface",
    "try", "catch", "throw", "yield",
];

const LANG_MARKERS: &[&str] = &["fn ", "def ", "function ", "class ", "=>", "::", "->"];

/// A dense embedding vector. Kept as a plain `Vec<f32>` (length [`DIM`]) so
/// callers can store it directly in `serde`-derived structs without needing
/// const-generic array support in their own types.
pub type Embedding = Vec<f32>;

/// Embeds `text` into a unit-length [`DIM`]-dimensional vector.
///
/// Empty or whitespace-only input produces the zero vector (undefined
/// direction); callers should treat it as "no signal" rather than comparing
/// it with [`cosine_similarity`].
pub fn embed(text: &str) -> Embedding {
    let mut v = vec![0f32; DIM];
    if text.trim().is_empty() {
        return v;
    }
    let lower = text.to_lowercase();

    apply_tokens(&lower, &mut v);
    apply_trigrams(&lower, &mut v);
    apply_code_signals(&lower, text, &mut v);

    l2_normalize(&mut v);
    v
}

fn apply_tokens(lower: &str, v: &mut [f32]) {
    for tok in lower.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if tok.is_empty() {
            continue;
        }
        let h = fnv1a(tok.as_bytes());
        add_signed(v, h, TOKEN_WEIGHT);
    }
}

fn apply_trigrams(lower: &str, v: &mut [f32]) {
    let chars: Vec<char> = lower.chars().collect();
    if chars.len() < 3 {
        return;
    }
    for w in chars.windows(3) {
        let s: String = w.iter().collect();
        let h = fnv1a(s.as_bytes());
        add_signed(v, h, TRIGRAM_WEIGHT);
    }
}

fn apply_code_signals(lower: &str, original: &str, v: &mut [f32]) {
    for kw in CODE_KEYWORDS {
        if contains_word(lower, kw) {
            let h = fnv1a(kw.as_bytes());
            bucket_of(v, h, KEYWORD_WEIGHT);
        }
    }

    let bracket_count = original
        .chars()
        .filter(|c| matches!(c, '{' | '}' | '(' | ')' | '[' | ']'))
        .count();
    if bracket_count > 0 {
        let h = fnv1a(b"__bracket_cluster__");
        let scaled = BRACKET_WEIGHT * (bracket_count.min(10) as f32 / 10.0);
        bucket_of(v, h, scaled);
    }

    for marker in LANG_MARKERS {
        if lower.contains(marker) {
            let h = fnv1a(marker.as_bytes());
            bucket_of(v, h, LANG_MARKER_WEIGHT);
        }
    }
}

/// Crude word-boundary containment check: avoids matching `fn` inside `defn`.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !(c.is_alphanumeric() || c == '_')).any(|t| t == word)
}

fn add_signed(v: &mut [f32], hash: u64, weight: f32) {
    let sign = if (hash >> 63) & 1 == 1 { 1.0 } else { -1.0 };
    bucket_of(v, hash, sign * weight);
}

fn bucket_of(v: &mut [f32], hash: u64, amount: f32) {
    let idx = (hash as usize) % v.len();
    v[idx] += amount;
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// FNV-1a 64-bit hash. Deterministic, stable across runs and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut h = OFFSET;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(PRIME);
    }
    h
}

/// Cosine similarity between two (not necessarily normalised) vectors,
/// clamped to `[-1, 1]`. Callers should treat a score `<= 0` as "no match".
///
/// Returns `0.0` if either vector has (near-)zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= 1e-12 || nb <= 1e-12 {
        return 0.0;
    }
    (dot / (na * nb)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_to_unit_length() {
        let v = embed("fn main() { println!(\"hello world\"); }");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((0.99..=1.01).contains(&norm), "norm was {norm}");
    }

    #[test]
    fn deterministic_across_calls() {
        let a = embed("SELECT * FROM users WHERE id = ?");
        let b = embed("SELECT * FROM users WHERE id = ?");
        assert_eq!(a, b);
    }

    #[test]
    fn identical_text_is_perfectly_similar() {
        let a = embed("async fn fetch(url: &str) -> Result<String>");
        let b = embed("async fn fetch(url: &str) -> Result<String>");
        let sim = cosine_similarity(&a, &b);
        assert!((sim - 1.0).abs() < 1e-4, "sim was {sim}");
    }

    #[test]
    fn unrelated_text_scores_lower_than_identical() {
        let a = embed("fn parse_unified_diff(input: &str) -> Vec<Hunk>");
        let b = embed("SELECT count(*) FROM invoices GROUP BY customer_id");
        let same = cosine_similarity(&a, &a);
        let diff = cosine_similarity(&a, &b);
        assert!(diff < same);
    }

    #[test]
    fn empty_text_yields_zero_vector() {
        let v = embed("");
        assert!(v.iter().all(|x| *x == 0.0));
        let v2 = embed("   \n\t");
        assert!(v2.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn similarity_is_bounded() {
        let a = embed("the quick brown fox");
        let b = embed("jumps over the lazy dog");
        let sim = cosine_similarity(&a, &b);
        assert!((-1.0..=1.0).contains(&sim));
    }
}
