// ABOUTME: Verification code generator producing human-pronounceable word passphrases
// ABOUTME: Also maps code letters to dictionary words for spoken-mnemonic display

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use std::sync::OnceLock;

static WORDLIST: &str = include_str!("wordlist.txt");

fn words() -> &'static [&'static str] {
    static WORDS: OnceLock<Vec<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        WORDLIST
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    })
}

/// Generate a passphrase of `length` randomly chosen dictionary words
/// joined by `separator`.
pub fn generate(length: usize, separator: &str) -> String {
    let pool = words();
    let mut rng = OsRng;
    (0..length)
        .map(|_| *pool.choose(&mut rng).expect("word list is not empty"))
        .collect::<Vec<_>>()
        .join(separator)
}

/// All dictionary words starting with the given character, case-insensitive.
pub fn words_starting_with(c: char) -> Vec<&'static str> {
    let needle = c.to_ascii_lowercase();
    words()
        .iter()
        .filter(|w| w.starts_with(needle))
        .copied()
        .collect()
}

/// Map each alphanumeric character of a code to a dictionary word beginning
/// with that character. Display-only; carries no security weight.
pub fn mnemonic_for(code: &str) -> Vec<&'static str> {
    code.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .filter_map(|c| words_starting_with(c).first().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_word_count() {
        let phrase = generate(6, "-");
        assert_eq!(phrase.split('-').count(), 6);
        for word in phrase.split('-') {
            assert!(words().contains(&word));
        }
    }

    #[test]
    fn test_generate_custom_separator() {
        let phrase = generate(4, " ");
        assert_eq!(phrase.split(' ').count(), 4);
    }

    #[test]
    fn test_every_letter_has_words() {
        for c in 'a'..='z' {
            assert!(
                !words_starting_with(c).is_empty(),
                "no dictionary words start with '{}'",
                c
            );
        }
    }

    #[test]
    fn test_words_starting_with_is_case_insensitive() {
        assert_eq!(words_starting_with('A'), words_starting_with('a'));
    }

    #[test]
    fn test_mnemonic_matches_code_letters() {
        let mnemonic = mnemonic_for("ABCD");
        assert_eq!(mnemonic.len(), 4);
        for (c, word) in "abcd".chars().zip(&mnemonic) {
            assert!(word.starts_with(c));
        }
    }

    #[test]
    fn test_mnemonic_skips_separators() {
        // Separator characters carry no letter and produce no word
        assert_eq!(mnemonic_for("A-B").len(), 2);
    }
}
