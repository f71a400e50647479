use sha2::{Digest, Sha256};

/// Derive the per-tenant vector namespace from a user's email address.
///
/// The readable prefix replaces `@` and `.` with `-`; the 8-hex-char
/// SHA-256 suffix keeps distinct emails distinct even when the replacement
/// would conflate them (`a.b@c.com` vs `a-b@c-com`).
///
/// ```rust
/// use querybridge::namespace::derive_namespace;
///
/// let ns = derive_namespace("user@example.com");
/// assert!(ns.starts_with("user-example-com-"));
/// assert_eq!(ns, derive_namespace("user@example.com"));
/// ```
pub fn derive_namespace(email: &str) -> String {
    let base = email.replace('@', "-").replace('.', "-");
    let digest = Sha256::digest(email.as_bytes());
    format!("{}-{}", base, hex::encode(&digest[..4]))
}
