//! Reversible obfuscation for tokens at rest.
//!
//! Tokens are XORed byte-wise against a cycling key and base64 encoded so the
//! state file never holds them as plain text. Anyone who can read the file and
//! knows (or guesses) the key can recover the tokens: this is not a
//! confidentiality control and must not be treated as one.

use base64ct::{Base64, Encoding};

#[derive(Clone, Debug)]
pub struct Obfuscator {
    key: Vec<u8>,
}

impl Obfuscator {
    /// An empty key degenerates to plain base64.
    #[must_use]
    pub fn new(key: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
        }
    }

    #[must_use]
    pub fn obfuscate(&self, plain: &str) -> String {
        Base64::encode_string(&self.xor(plain.as_bytes()))
    }

    /// Returns `None` when the input is not valid base64 or does not decode to UTF-8.
    #[must_use]
    pub fn reveal(&self, encoded: &str) -> Option<String> {
        let bytes = Base64::decode_vec(encoded.trim()).ok()?;
        String::from_utf8(self.xor(&bytes)).ok()
    }

    fn xor(&self, data: &[u8]) -> Vec<u8> {
        if self.key.is_empty() {
            return data.to_vec();
        }

        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }
}
