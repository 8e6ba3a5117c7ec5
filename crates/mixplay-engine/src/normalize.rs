//! Corpus and query text normalization.
//!
//! Lookup keys are lower-cased with accents folded to their base letter
//! and punctuation stripped, so "Amour," and "amour" land on the same
//! index entry.

/// Fold common Latin diacritics to their ASCII base letter.
fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Normalize one word for indexing and lookup.
pub fn normalize_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.trim().to_lowercase().chars() {
        match c {
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            _ => {
                let folded = fold_diacritic(c);
                if folded.is_alphanumeric() {
                    out.push(folded);
                }
            }
        }
    }
    out
}

/// Split a target phrase into normalized query tokens.
///
/// Tokens that normalize to nothing (pure punctuation) are dropped.
pub fn tokenize_phrase(phrase: &str) -> Vec<String> {
    phrase
        .split_whitespace()
        .map(normalize_word)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Normalized text of a run of words, joined with single spaces.
/// Chunk index keys use this form.
pub fn join_normalized<'a, I>(words: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    words.into_iter().collect::<Vec<_>>().join(" ")
}
