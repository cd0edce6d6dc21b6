//! Cryptography for the login exchange: RSA key transport with
//! PKCS#1 v1.5 padding and the session-server "signed hex" hash.
//!
//! The transport cipher itself (AES-128 in CFB8 mode) lives in the
//! protocol codec; this module only negotiates its key.

use num_bigint::BigInt;
use rand::RngCore;
use rsa::{
    pkcs8::{DecodePublicKey, EncodePublicKey},
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
};
use sha1::{Digest, Sha1};

/// An error in the login key exchange.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("verify token echoed by the client does not match")]
    VerifyTokenMismatch,
    #[error("malformed public key: {0}")]
    InvalidPublicKey(#[from] rsa::pkcs8::spki::Error),
    #[error(transparent)]
    Rsa(#[from] rsa::Error),
}

/// Key size for the ephemeral keypair presented to connecting clients.
/// Matches what notchian servers generate.
const SERVER_KEY_BITS: usize = 1024;

/// Generates a random AES-128 shared secret.
pub fn generate_shared_secret() -> [u8; 16] {
    let mut secret = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Generates a random verify-token nonce.
pub fn generate_verify_token() -> [u8; 4] {
    let mut token = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut token);
    token
}

/// Encrypts the shared secret and verify token with the server's
/// DER-encoded RSA public key, as sent in EncryptionResponse.
pub fn encrypt_token_and_secret(
    public_key_der: &[u8],
    verify_token: &[u8],
    shared_secret: &[u8; 16],
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let public_key = RsaPublicKey::from_public_key_der(public_key_der)?;
    let mut rng = rand::thread_rng();
    let encrypted_secret = public_key.encrypt(&mut rng, Pkcs1v15Encrypt, shared_secret)?;
    let encrypted_token = public_key.encrypt(&mut rng, Pkcs1v15Encrypt, verify_token)?;
    Ok((encrypted_secret, encrypted_token))
}

/// The ephemeral keypair the proxy presents when impersonating a server.
pub struct ServerKeypair {
    private_key: RsaPrivateKey,
    public_key_der: Vec<u8>,
}

impl ServerKeypair {
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), SERVER_KEY_BITS)?;
        let public_key_der = private_key
            .to_public_key()
            .to_public_key_der()?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private_key,
            public_key_der,
        })
    }

    /// The SubjectPublicKeyInfo DER encoding sent in EncryptionRequest.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.private_key.decrypt(Pkcs1v15Encrypt, data)?)
    }
}

/// Computes the hash presented to the session server on join:
/// SHA1(serverId ‖ sharedSecret ‖ publicKey), rendered as a signed
/// hexadecimal integer (two's complement, minus sign when negative).
pub fn server_hash(server_id: &str, shared_secret: &[u8; 16], public_key_der: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key_der);
    let digest = hasher.finalize();
    BigInt::from_signed_bytes_be(digest.as_slice()).to_str_radix(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from the protocol documentation: the hash of a
    // bare name with no secret or key appended.
    #[test]
    fn server_hash_signed_hex() {
        let empty = [0u8; 16];
        let hash = |name: &str| {
            let mut hasher = Sha1::new();
            hasher.update(name.as_bytes());
            BigInt::from_signed_bytes_be(hasher.finalize().as_slice()).to_str_radix(16)
        };
        assert_eq!(hash("Notch"), "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48");
        assert_eq!(hash("jeb_"), "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1");
        assert_eq!(hash("simon"), "88e16a1019277b15d58faf0541e11910eb756f6");

        // the composed form must match the concatenated digest
        let composed = server_hash("", &empty, &[]);
        let mut hasher = Sha1::new();
        hasher.update(empty);
        assert_eq!(
            composed,
            BigInt::from_signed_bytes_be(hasher.finalize().as_slice()).to_str_radix(16)
        );
    }

    #[test]
    fn key_exchange_round_trip() {
        let keypair = ServerKeypair::generate().unwrap();
        let secret = generate_shared_secret();
        let token = generate_verify_token();

        let (encrypted_secret, encrypted_token) =
            encrypt_token_and_secret(keypair.public_key_der(), &token, &secret).unwrap();
        assert_ne!(encrypted_secret, secret.to_vec());

        assert_eq!(keypair.decrypt(&encrypted_secret).unwrap(), secret.to_vec());
        assert_eq!(keypair.decrypt(&encrypted_token).unwrap(), token.to_vec());
    }
}
