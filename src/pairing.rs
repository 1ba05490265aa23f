// ABOUTME: Pairing protocol state machine binding an unverified wand to a user
// ABOUTME: Handles code normalization, transcript extraction, and the verified transition

use uuid::Uuid;

use crate::entities::wand;
use crate::error::{AppError, Result};
use crate::passphrase;
use crate::storage::Storage;

pub const VERIFICATION_CODE_LENGTH: usize = 6;
pub const CODE_SEPARATOR: &str = "-";

/// Leading word that marks a spoken phrase as a pairing attempt; it is not
/// part of the code itself.
pub const TRIGGER_WORD: &str = "associate";

/// Canonical form of a verification code for comparison. A multi-word code
/// (the stored passphrase, or a respoken phrase) reduces to the uppercased
/// first letter of each word; a single token is uppercased whole. Both sides
/// of a comparison go through this, which makes matching case-insensitive
/// and lets the device submit either the initials or the full passphrase.
pub fn normalize_code(code: &str) -> String {
    let words: Vec<&str> = code
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    match words.as_slice() {
        [] => String::new(),
        [single] => single.to_ascii_uppercase(),
        many => many
            .iter()
            .filter_map(|w| w.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .collect(),
    }
}

/// Extract a candidate code from a transcribed spoken phrase: the uppercased
/// first letter of each word, skipping the leading trigger word. Lossy and
/// best-effort; a mis-heard word start simply produces a non-matching code.
pub fn extract_candidate_code(transcript: &str) -> String {
    let mut words = transcript
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .peekable();

    if let Some(first) = words.peek() {
        if first.eq_ignore_ascii_case(TRIGGER_WORD) {
            words.next();
        }
    }

    words
        .filter_map(|w| w.chars().next())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Spoken-word expansion of a code, one dictionary word per letter of the
/// normalized form. Display-only.
pub fn mnemonic_for_code(code: &str) -> String {
    passphrase::mnemonic_for(&normalize_code(code)).join(" ")
}

/// Return the caller's pending wand, creating one if none exists. Idempotent:
/// repeated calls without an intervening verification return the same wand
/// and code, so the pairing flow never forks.
pub async fn get_or_create_pending_wand(storage: &Storage, user_id: Uuid) -> Result<wand::Model> {
    if let Some(existing) = storage.unverified_wand_for_user(user_id).await? {
        return Ok(existing);
    }

    let code = passphrase::generate(VERIFICATION_CODE_LENGTH, CODE_SEPARATOR);
    let wand = storage.insert_wand(user_id, &code).await?;
    tracing::info!(wand_id = %wand.id, user_id = %user_id, "created pending wand");
    Ok(wand)
}

/// Attempt the PENDING -> VERIFIED transition. Preconditions are checked in
/// order, each with its own failure: the wand must exist, must have an owner,
/// must be unverified, and the candidate must match the stored code. The flip
/// itself is a single conditional update; losing a concurrent race reports
/// CONFLICT rather than success.
pub async fn confirm(storage: &Storage, wand_id: Uuid, candidate: &str) -> Result<wand::Model> {
    let Some(wand) = storage.get_wand(wand_id).await? else {
        return Err(AppError::NotFound(format!("wand {} does not exist", wand_id)));
    };

    if wand.owner_id.is_none() {
        return Err(AppError::Forbidden(
            "This wand does not belong to a user".to_string(),
        ));
    }

    if wand.verified {
        return Err(AppError::AlreadyVerified);
    }

    let Some(stored_code) = wand.verification_code else {
        // Unverified wand without a code cannot be confirmed
        return Err(AppError::InvalidCode);
    };

    if normalize_code(candidate) != normalize_code(&stored_code) {
        tracing::warn!(wand_id = %wand_id, "verification code mismatch");
        return Err(AppError::InvalidCode);
    }

    let affected = storage.mark_wand_verified(wand_id, &stored_code).await?;
    if affected == 0 {
        // A concurrent confirm won the conditional update; classify from
        // current state so the caller knows whether to stop retrying.
        return match storage.get_wand(wand_id).await? {
            Some(current) if current.verified => Err(AppError::AlreadyVerified),
            Some(_) => Err(AppError::InvalidCode),
            None => Err(AppError::NotFound(format!("wand {} does not exist", wand_id))),
        };
    }

    tracing::info!(wand_id = %wand_id, "wand verified");
    storage
        .get_wand(wand_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("wand {} does not exist", wand_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_passphrase_to_initials() {
        assert_eq!(normalize_code("able-baker-cat-dog"), "ABCD");
        assert_eq!(normalize_code("able baker cat dog"), "ABCD");
    }

    #[test]
    fn test_normalize_single_token_uppercases() {
        assert_eq!(normalize_code("abcd"), "ABCD");
        assert_eq!(normalize_code("AbCd"), "ABCD");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_code(""), "");
        assert_eq!(normalize_code("---"), "");
    }

    #[test]
    fn test_initials_match_passphrase() {
        assert_eq!(
            normalize_code("ABCD"),
            normalize_code("able-baker-cat-dog")
        );
    }

    #[test]
    fn test_extract_skips_trigger_word() {
        assert_eq!(extract_candidate_code("associate able baker cat dog"), "ABCD");
        assert_eq!(extract_candidate_code("Associate able baker cat dog"), "ABCD");
    }

    #[test]
    fn test_extract_without_trigger_word() {
        assert_eq!(extract_candidate_code("able baker cat dog"), "ABCD");
    }

    #[test]
    fn test_extract_handles_punctuation() {
        assert_eq!(
            extract_candidate_code("Associate, able. Baker cat; dog!"),
            "ABCD"
        );
    }

    #[test]
    fn test_extract_empty_transcript() {
        assert_eq!(extract_candidate_code(""), "");
        assert_eq!(extract_candidate_code("associate"), "");
    }

    #[test]
    fn test_mnemonic_expands_normalized_code() {
        let mnemonic = mnemonic_for_code("able-baker-cat-dog");
        let words: Vec<&str> = mnemonic.split(' ').collect();
        assert_eq!(words.len(), 4);
        for (c, word) in "abcd".chars().zip(words) {
            assert!(word.starts_with(c));
        }
    }
}
