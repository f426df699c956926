//! Privacy (encryption) for SNMPv3 scoped PDUs.
//!
//! - DES-CBC (RFC 3414 8.1.1): salt = engineBoots || local counter, IV = preIV XOR salt
//! - AES-CFB-128 (RFC 3826 3.1): IV = engineBoots || engineTime || 8-byte salt
//!
//! Failures are reported as [`PrivacyError`]; the caller decides whether a
//! failure is a local encryption error or an undecryptable incoming message.

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::{MasterKey, extend_key};
use super::PrivProtocol;
use crate::error::internal::CryptoErrorKind;

type CryptoResult<T> = std::result::Result<T, CryptoErrorKind>;

/// A privacy operation that could not be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PrivacyError(CryptoErrorKind);

impl PrivacyError {
    #[cfg(test)]
    pub(crate) fn kind(&self) -> CryptoErrorKind {
        self.0
    }
}

const DES_BLOCK: usize = 8;
const SALT_LEN: usize = 8;

/// Localized privacy key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Localize the privacy master key to `engine_id`, extending it when the
    /// auth digest is shorter than the cipher needs.
    pub fn from_master_key(master: &MasterKey, protocol: PrivProtocol, engine_id: &[u8]) -> Self {
        let localized = master.localize(engine_id);
        Self {
            key: extend_key(master.protocol(), localized.as_bytes(), protocol.key_len()),
            protocol,
        }
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// Encrypt a serialized scoped PDU.
    ///
    /// For DES only the low 32 bits of `salt` are used, as the local counter.
    /// Returns the ciphertext and the msgPrivacyParameters to send with it.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes), PrivacyError> {
        let sealed = match self.protocol {
            PrivProtocol::Des => self.encrypt_des(plaintext, engine_boots, salt as u32),
            _ => self.encrypt_aes(plaintext, engine_boots, engine_time, salt),
        };
        sealed.map_err(PrivacyError)
    }

    /// Decrypt an encrypted scoped PDU using the received privacy parameters.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes, PrivacyError> {
        let salt: [u8; SALT_LEN] = priv_params.try_into().map_err(|_| {
            PrivacyError(CryptoErrorKind::InvalidPrivParamsLength {
                expected: SALT_LEN,
                actual: priv_params.len(),
            })
        })?;
        let opened = match self.protocol {
            PrivProtocol::Des => self.decrypt_des(ciphertext, &salt),
            _ => self.decrypt_aes(ciphertext, engine_boots, engine_time, &salt),
        };
        opened.map_err(PrivacyError)
    }

    fn des_key_and_iv(&self, salt: &[u8; SALT_LEN]) -> CryptoResult<(&[u8], [u8; 8])> {
        if self.key.len() < 16 {
            return Err(CryptoErrorKind::InvalidKeyLength);
        }
        let (key, pre_iv) = (&self.key[..8], &self.key[8..16]);
        let mut iv = [0u8; 8];
        for (i, byte) in iv.iter_mut().enumerate() {
            *byte = pre_iv[i] ^ salt[i];
        }
        Ok((key, iv))
    }

    fn encrypt_des(&self, plaintext: &[u8], engine_boots: u32, counter: u32) -> CryptoResult<(Bytes, Bytes)> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbc = cbc::Encryptor<des::Des>;

        let mut salt = [0u8; SALT_LEN];
        salt[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt[4..].copy_from_slice(&counter.to_be_bytes());
        let (key, iv) = self.des_key_and_iv(&salt)?;

        // Zero-pad to the block size; the BER length inside tells the receiver where data ends.
        let padded_len = plaintext.len().div_ceil(DES_BLOCK) * DES_BLOCK;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);

        let cipher =
            DesCbc::new_from_slices(key, &iv).map_err(|_| CryptoErrorKind::InvalidKeyLength)?;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
            .map_err(|_| CryptoErrorKind::CipherError)?;
        Ok((Bytes::copy_from_slice(ciphertext), Bytes::copy_from_slice(&salt)))
    }

    fn decrypt_des(&self, ciphertext: &[u8], salt: &[u8; SALT_LEN]) -> CryptoResult<Bytes> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
        type DesCbc = cbc::Decryptor<des::Des>;

        if !ciphertext.len().is_multiple_of(DES_BLOCK) {
            return Err(CryptoErrorKind::InvalidCiphertextLength {
                length: ciphertext.len(),
                block_size: DES_BLOCK,
            });
        }
        let (key, iv) = self.des_key_and_iv(salt)?;
        let cipher =
            DesCbc::new_from_slices(key, &iv).map_err(|_| CryptoErrorKind::InvalidKeyLength)?;
        let mut buffer = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| CryptoErrorKind::CipherError)?;
        Ok(Bytes::copy_from_slice(plaintext))
    }

    fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8; SALT_LEN]) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(salt);
        iv
    }

    fn encrypt_aes(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> CryptoResult<(Bytes, Bytes)> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let salt = salt.to_be_bytes();
        let iv = Self::aes_iv(engine_boots, engine_time, &salt);
        let key = self.aes_key()?;
        let mut buffer = plaintext.to_vec();
        match self.protocol {
            PrivProtocol::Aes192 => cfb_mode::Encryptor::<aes::Aes192>::new_from_slices(key, &iv)
                .map_err(|_| CryptoErrorKind::InvalidKeyLength)?
                .encrypt(&mut buffer),
            PrivProtocol::Aes256 => cfb_mode::Encryptor::<aes::Aes256>::new_from_slices(key, &iv)
                .map_err(|_| CryptoErrorKind::InvalidKeyLength)?
                .encrypt(&mut buffer),
            _ => cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(key, &iv)
                .map_err(|_| CryptoErrorKind::InvalidKeyLength)?
                .encrypt(&mut buffer),
        }
        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt)))
    }

    fn decrypt_aes(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: &[u8; SALT_LEN],
    ) -> CryptoResult<Bytes> {
        use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

        let iv = Self::aes_iv(engine_boots, engine_time, salt);
        let key = self.aes_key()?;
        let mut buffer = ciphertext.to_vec();
        match self.protocol {
            PrivProtocol::Aes192 => cfb_mode::Decryptor::<aes::Aes192>::new_from_slices(key, &iv)
                .map_err(|_| CryptoErrorKind::InvalidKeyLength)?
                .decrypt(&mut buffer),
            PrivProtocol::Aes256 => cfb_mode::Decryptor::<aes::Aes256>::new_from_slices(key, &iv)
                .map_err(|_| CryptoErrorKind::InvalidKeyLength)?
                .decrypt(&mut buffer),
            _ => cfb_mode::Decryptor::<aes::Aes128>::new_from_slices(key, &iv)
                .map_err(|_| CryptoErrorKind::InvalidKeyLength)?
                .decrypt(&mut buffer),
        }
        Ok(Bytes::from(buffer))
    }

    fn aes_key(&self) -> CryptoResult<&[u8]> {
        self.key
            .get(..self.protocol.key_len())
            .ok_or(CryptoErrorKind::InvalidKeyLength)
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v3::AuthProtocol;

    const ENGINE_ID: &[u8] = &[0x80, 0x00, 0x1F, 0x88, 0x04, 0x01, 0x02, 0x03];

    fn key(auth: AuthProtocol, protocol: PrivProtocol) -> PrivKey {
        let master = MasterKey::from_password(auth, b"privpassword");
        PrivKey::from_master_key(&master, protocol, ENGINE_ID)
    }

    #[test]
    fn test_des_round_trip_pads_to_block() {
        let key = key(AuthProtocol::Md5, PrivProtocol::Des);
        let plaintext = b"thirteen byte";
        let (ciphertext, params) = key.encrypt(plaintext, 7, 100, 0xDEAD_BEEF).unwrap();
        assert_eq!(ciphertext.len(), 16);
        assert_eq!(&params[..], &[0, 0, 0, 7, 0xDE, 0xAD, 0xBE, 0xEF]);

        let decrypted = key.decrypt(&ciphertext, 7, 100, &params).unwrap();
        assert_eq!(&decrypted[..plaintext.len()], plaintext);
        assert!(decrypted[plaintext.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_aes_round_trip_all_sizes() {
        for (auth, protocol) in [
            (AuthProtocol::Sha1, PrivProtocol::Aes128),
            (AuthProtocol::Sha1, PrivProtocol::Aes192),
            (AuthProtocol::Sha1, PrivProtocol::Aes256),
            (AuthProtocol::Sha512, PrivProtocol::Aes256),
        ] {
            let key = key(auth, protocol);
            let plaintext = b"arbitrary length scoped pdu";
            let (ciphertext, params) = key.encrypt(plaintext, 3, 1234, 42).unwrap();
            assert_eq!(ciphertext.len(), plaintext.len());
            assert_eq!(&params[..], &42u64.to_be_bytes());
            assert_eq!(&key.decrypt(&ciphertext, 3, 1234, &params).unwrap()[..], plaintext);
        }
    }

    #[test]
    fn test_aes_wrong_engine_time_garbles() {
        let key = key(AuthProtocol::Sha256, PrivProtocol::Aes128);
        let (ciphertext, params) = key.encrypt(b"0123456789abcdef", 1, 500, 9).unwrap();
        let decrypted = key.decrypt(&ciphertext, 1, 501, &params).unwrap();
        assert_ne!(&decrypted[..], b"0123456789abcdef");
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let des = key(AuthProtocol::Md5, PrivProtocol::Des);
        assert_eq!(
            des.decrypt(&[0u8; 12], 0, 0, &[0u8; 8]).unwrap_err().kind(),
            CryptoErrorKind::InvalidCiphertextLength {
                length: 12,
                block_size: 8
            }
        );
        assert_eq!(
            des.decrypt(&[0u8; 16], 0, 0, &[0u8; 4]).unwrap_err().kind(),
            CryptoErrorKind::InvalidPrivParamsLength {
                expected: 8,
                actual: 4
            }
        );
        let short = PrivKey::from_bytes(PrivProtocol::Aes256, vec![0u8; 16]);
        assert_eq!(
            short.encrypt(b"x", 0, 0, 0).unwrap_err().kind(),
            CryptoErrorKind::InvalidKeyLength
        );
        assert_eq!(
            short.encrypt(b"x", 0, 0, 0).unwrap_err().to_string(),
            "invalid key length"
        );
    }

    #[test]
    fn test_localization_differs_per_engine() {
        let master = MasterKey::from_password(AuthProtocol::Sha1, b"privpassword");
        let a = PrivKey::from_master_key(&master, PrivProtocol::Aes128, b"engine-a");
        let b = PrivKey::from_master_key(&master, PrivProtocol::Aes128, b"engine-b");
        assert_ne!(a.key, b.key);
    }
}
