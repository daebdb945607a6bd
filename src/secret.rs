use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Raw entropy per generated secret. 32 bytes encodes to 43 base64url
/// characters, comfortably past brute-force range.
const SECRET_BYTES: usize = 32;

/// Generate an opaque secret of the form `{prefix}_{base64url(random)}`.
///
/// The prefix makes leaked credentials greppable (and tells secret scanners
/// what they found) without adding any guessable structure to the random
/// part.
pub fn generate_secret(prefix: &str) -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(bytes))
}

/// One-way hash for at-rest storage: base64url-encoded SHA-256.
///
/// This is the only form in which a token secret ever reaches the store.
pub fn hash_secret(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Compare a presented plaintext against a stored hash in constant time.
pub fn verify_secret(plaintext: &str, stored_hash: &str) -> bool {
    constant_time_eq(&hash_secret(plaintext), stored_hash)
}

/// PKCE challenge from a verifier - S256 only (OAuth 2.1 dropped "plain",
/// and so do we): `base64url(sha256(verifier))`.
pub fn compute_code_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// PKCE verification in constant time.
pub fn verify_code_verifier(code_verifier: &str, code_challenge: &str) -> bool {
    constant_time_eq(&compute_code_challenge(code_verifier), code_challenge)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_carry_prefix_and_entropy() {
        let secret = generate_secret("gr_access");
        assert!(secret.starts_with("gr_access_"));
        // 32 bytes -> 43 chars of base64url
        assert_eq!(secret.len(), "gr_access_".len() + 43);
    }

    #[test]
    fn generated_secrets_are_unique() {
        assert_ne!(generate_secret("gr_access"), generate_secret("gr_access"));
    }

    #[test]
    fn hash_is_deterministic_and_input_sensitive() {
        assert_eq!(hash_secret("abc"), hash_secret("abc"));
        assert_ne!(hash_secret("abc"), hash_secret("abd"));
    }

    #[test]
    fn verify_secret_matches_own_hash() {
        let secret = generate_secret("gr_refresh");
        let stored = hash_secret(&secret);
        assert!(verify_secret(&secret, &stored));
        assert!(!verify_secret("something else", &stored));
    }

    #[test]
    fn pkce_s256_rfc7636_appendix_b_vector() {
        // the worked example from RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert_eq!(compute_code_challenge(verifier), challenge);
        assert!(verify_code_verifier(verifier, challenge));
    }

    #[test]
    fn pkce_rejects_wrong_verifier() {
        let challenge = compute_code_challenge("correct-verifier-value");
        assert!(!verify_code_verifier("wrong-verifier-value", &challenge));
    }
}
