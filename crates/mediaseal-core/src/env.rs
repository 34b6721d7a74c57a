//! Environment abstraction for deterministic testing.
//!
//! Decouples the cryptor from system randomness. Production code uses
//! [`SystemEnv`] (OS cryptographic RNG); tests supply a deterministic
//! implementation so IV counter seeding is reproducible.

/// Abstract source of randomness.
///
/// # Safety
///
/// Implementations MUST use cryptographically secure entropy in
/// production - the IV counter seed feeds directly into AES-GCM nonce
/// construction.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u16`.
    ///
    /// Convenience for seeding per-stream send counters.
    fn random_u16(&self) -> u16 {
        let mut bytes = [0u8; 2];
        self.random_bytes(&mut bytes);
        u16::from_be_bytes(bytes)
    }
}

/// Production environment using the OS cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. This is intentional - a cryptor without
/// functioning cryptographic randomness cannot operate securely, and RNG
/// failure indicates OS-level issues.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot seed IVs securely");
    }
}
