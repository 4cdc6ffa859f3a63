//! Request encoding and response decoding for the three Netease wire variants.
//!
//! | Variant     | Cipher                              | Form field(s)          |
//! |-------------|-------------------------------------|------------------------|
//! | `Web`       | AES-128-CBC ×2 + RSA-wrapped key    | `params`, `encSecKey`  |
//! | `Encrypted` | AES-128-ECB over a signed path/body | `params`               |
//! | `Linux`     | AES-128-ECB over a forward envelope | `eparams`              |
//!
//! WEAPI flow: JSON → AES-CBC(preset_key) → base64 → AES-CBC(random_key) → base64 = params
//! RSA:  `reverse(random_key)` → zero-pad to 128 bytes → `modpow(e, n)` → hex = `encSecKey`
//!
//! EAPI flow: `md5("nobody{path}use{json}md5forencrypt")` = digest,
//! `"{path}-36cd479b6b5-{json}-36cd479b6b5-{digest}"` → AES-ECB → HEX = params

use aes::Aes128;
use base64::{Engine, engine::general_purpose::STANDARD as B64};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use md5::{Digest, Md5};
use num_bigint::BigUint;
use rand::Rng;
use serde_json::{Value, json};

use crate::error::{NeteaseError, Result};

const IV: &[u8; 16] = b"0102030405060708";
const PRESET_KEY: &[u8; 16] = b"0CoJUm6Qyw8W8jud";
const EAPI_KEY: &[u8; 16] = b"e82ckenh8dichen8";
const LINUXAPI_KEY: &[u8; 16] = b"rFgB&h#%2?^eDg:Q";
const EAPI_SEPARATOR: &str = "-36cd479b6b5-";

// RSA-1024 public key extracted from Netease web client
const RSA_MODULUS_HEX: &str = "\
    e0b509f6259df8642dbc35662901477df22677ec152b5ff68ace615bb7b72515\
    2b3ab17a876aea8a5aa76d2e417629ec4ee341f56135fccf695280104e0312ec\
    bda92557c93870114af6c9d05c4f7f0c3685b7a46bee255932575cce10b424d\
    813cfe4875d3e82047b97ddef52741d546b8e289dc6935b3ece0462db0a22b8e7";
const RSA_EXPONENT: u32 = 65537;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;

/// Wire variant of a Netease API call.
///
/// Selected explicitly by the caller; the path is never inspected to guess it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// `weapi`: browser scheme.
    Web,
    /// `eapi`: mobile-app scheme with a signed digest.
    Encrypted,
    /// `linuxapi`: legacy Linux client forward scheme.
    Linux,
}

/// Form fields produced by [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    fields: Vec<(&'static str, String)>,
}

impl EncodedRequest {
    /// Look up a single field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Render as an `application/x-www-form-urlencoded` body.
    pub fn to_form(&self) -> String {
        self.fields
            .iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Encode `params` for `variant`.
///
/// `path` is the `/api/...` form of the endpoint; the `Web` variant ignores it
/// (the path travels in the URL only).
pub fn encode(path: &str, params: &Value, variant: Variant) -> EncodedRequest {
    let fields = match variant {
        Variant::Web => {
            let (params, enc_sec_key) = weapi_encrypt(&params.to_string());
            vec![("params", params), ("encSecKey", enc_sec_key)]
        }
        Variant::Encrypted => vec![("params", eapi_encrypt(path, &params.to_string()))],
        Variant::Linux => {
            let envelope = json!({
                "method": "POST",
                "url": format!("https://music.163.com{path}"),
                "params": params,
            });
            let ct = aes_ecb_encrypt(envelope.to_string().as_bytes(), LINUXAPI_KEY);
            vec![("eparams", hex::encode_upper(ct))]
        }
    };
    EncodedRequest { fields }
}

/// Decode a raw response body for `variant`.
///
/// `Web` and `Linux` responses are plain JSON. `Encrypted` responses are
/// AES-ECB decrypted with the eapi key first; when that fails the body is
/// parsed as plain JSON instead. Some eapi endpoints answer errors
/// unencrypted, so this fallback is observed behaviour rather than a
/// guarantee of the wire format.
pub fn decode(raw: &[u8], variant: Variant) -> Result<Value> {
    match variant {
        Variant::Web | Variant::Linux => parse_json(raw),
        Variant::Encrypted => eapi_decrypt_response(raw).or_else(|_| parse_json(raw)),
    }
}

/// Reverse an eapi `params` field into `(path, body)`, verifying its digest.
pub fn decrypt_eapi_params(params_hex: &str) -> Result<(String, Value)> {
    let ct = hex::decode(params_hex).map_err(|e| NeteaseError::Decode(e.to_string()))?;
    let plain = aes_ecb_decrypt(&ct, EAPI_KEY)?;
    let text = String::from_utf8(plain).map_err(|e| NeteaseError::Decode(e.to_string()))?;

    let (path, rest) = text
        .split_once(EAPI_SEPARATOR)
        .ok_or_else(|| NeteaseError::Decode("missing path separator".into()))?;
    let (body, digest) = rest
        .rsplit_once(EAPI_SEPARATOR)
        .ok_or_else(|| NeteaseError::Decode("missing digest separator".into()))?;

    if eapi_digest(path, body) != digest {
        return Err(NeteaseError::Decode("eapi digest mismatch".into()));
    }
    Ok((path.to_owned(), parse_json(body.as_bytes())?))
}

/// Reverse a linuxapi `eparams` field into its `{method, url, params}` envelope.
pub fn decrypt_linux_params(eparams_hex: &str) -> Result<Value> {
    let ct = hex::decode(eparams_hex).map_err(|e| NeteaseError::Decode(e.to_string()))?;
    parse_json(&aes_ecb_decrypt(&ct, LINUXAPI_KEY)?)
}

/// Encrypt `data` (JSON string) using the WEAPI scheme with a fresh random key.
///
/// Returns `(params, encSecKey)`.
fn weapi_encrypt(data: &str) -> (String, String) {
    weapi_encrypt_with_key(data, &random_key())
}

fn weapi_encrypt_with_key(data: &str, secret_key: &[u8; 16]) -> (String, String) {
    // First AES pass: encrypt with preset key
    let pass1 = B64.encode(aes_cbc_encrypt(data.as_bytes(), PRESET_KEY, IV));
    // Second AES pass: encrypt with random key
    let params = B64.encode(aes_cbc_encrypt(pass1.as_bytes(), secret_key, IV));
    (params, rsa_encrypt(secret_key))
}

fn eapi_encrypt(path: &str, text: &str) -> String {
    let digest = eapi_digest(path, text);
    let data = format!("{path}{EAPI_SEPARATOR}{text}{EAPI_SEPARATOR}{digest}");
    hex::encode_upper(aes_ecb_encrypt(data.as_bytes(), EAPI_KEY))
}

fn eapi_digest(path: &str, text: &str) -> String {
    let message = format!("nobody{path}use{text}md5forencrypt");
    hex::encode(Md5::digest(message.as_bytes()))
}

fn eapi_decrypt_response(raw: &[u8]) -> Result<Value> {
    if raw.is_empty() || raw.len() % 16 != 0 {
        return Err(NeteaseError::Decode("not an eapi cipher block stream".into()));
    }
    parse_json(&aes_ecb_decrypt(raw, EAPI_KEY)?)
}

fn parse_json(raw: &[u8]) -> Result<Value> {
    serde_json::from_slice(raw).map_err(|e| NeteaseError::Decode(e.to_string()))
}

/// Buffer with room for PKCS7 padding (always 1..=16 extra bytes).
fn padded_buffer(plaintext: &[u8]) -> Vec<u8> {
    let pad_len = 16 - (plaintext.len() % 16);
    let mut buf = vec![0u8; plaintext.len() + pad_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    buf
}

/// AES-128-CBC encrypt with PKCS7 padding.
fn aes_cbc_encrypt(plaintext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let mut buf = padded_buffer(plaintext);
    let ct = Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .expect("buffer is correctly sized");
    ct.to_vec()
}

/// AES-128-ECB encrypt with PKCS7 padding.
fn aes_ecb_encrypt(plaintext: &[u8], key: &[u8; 16]) -> Vec<u8> {
    let mut buf = padded_buffer(plaintext);
    let ct = Aes128EcbEnc::new(key.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .expect("buffer is correctly sized");
    ct.to_vec()
}

/// AES-128-ECB decrypt with PKCS7 unpadding.
fn aes_ecb_decrypt(data: &[u8], key: &[u8; 16]) -> Result<Vec<u8>> {
    let mut buf = data.to_vec();
    Aes128EcbDec::new(key.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map(<[u8]>::to_vec)
        .map_err(|e| NeteaseError::Decode(e.to_string()))
}

/// RSA `NO_PADDING` encrypt: reverse key, zero-pad to 128 bytes, `modpow(e, n)`, hex output.
fn rsa_encrypt(key: &[u8; 16]) -> String {
    let mut reversed: Vec<u8> = key.iter().copied().rev().collect();

    // Zero-pad on the left to 128 bytes (1024 bits)
    let mut padded = vec![0u8; 128 - reversed.len()];
    padded.append(&mut reversed);

    let m = BigUint::from_bytes_be(&padded);
    let n = BigUint::parse_bytes(RSA_MODULUS_HEX.as_bytes(), 16).expect("invalid RSA modulus");
    let e = BigUint::from(RSA_EXPONENT);

    format!("{:0>256x}", m.modpow(&e, &n))
}

/// Generate a random 16-byte alphanumeric key.
fn random_key() -> [u8; 16] {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    let mut key = [0u8; 16];
    for b in &mut key {
        *b = CHARSET[rng.random_range(0..CHARSET.len())];
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    type Aes128CbcDec = cbc::Decryptor<Aes128>;

    fn aes_cbc_decrypt(data: &[u8], key: &[u8; 16]) -> Vec<u8> {
        let mut buf = data.to_vec();
        Aes128CbcDec::new(key.into(), IV.into())
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn weapi_layers_invert_with_known_key() {
        let key = *b"abcdefghijklmnop";
        let body = r#"{"ids":"[12345]","br":320000,"csrf_token":""}"#;
        let (params, enc_sec_key) = weapi_encrypt_with_key(body, &key);

        let outer = aes_cbc_decrypt(&B64.decode(&params).unwrap(), &key);
        let inner = aes_cbc_decrypt(&B64.decode(outer).unwrap(), PRESET_KEY);
        assert_eq!(inner, body.as_bytes());
        assert_eq!(enc_sec_key, rsa_encrypt(&key));
    }

    #[test]
    fn weapi_produces_two_fields() {
        let req = encode("/api/search", &json!({"s": "test", "type": 1}), Variant::Web);
        assert!(!req.field("params").unwrap().is_empty());
        // encSecKey should be 256 hex chars (128 bytes)
        assert_eq!(req.field("encSecKey").unwrap().len(), 256);
    }

    #[test]
    fn weapi_key_is_fresh_per_call() {
        let a = encode("/api/x", &json!({}), Variant::Web);
        let b = encode("/api/x", &json!({}), Variant::Web);
        assert_ne!(a.field("encSecKey"), b.field("encSecKey"));
    }

    #[test]
    fn rsa_output_length() {
        assert_eq!(rsa_encrypt(b"abcdefghijklmnop").len(), 256);
    }

    #[test]
    fn eapi_params_roundtrip() {
        let params = json!({"ids": "[12345]", "br": 320_000, "header": {"os": "pc"}});
        let req = encode("/api/song/enhance/player/url", &params, Variant::Encrypted);
        let hex = req.field("params").unwrap();
        assert!(hex.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));

        let (path, body) = decrypt_eapi_params(hex).unwrap();
        assert_eq!(path, "/api/song/enhance/player/url");
        assert_eq!(body, params);
    }

    #[test]
    fn eapi_params_reject_tampered_digest() {
        let data = format!("/api/x{EAPI_SEPARATOR}{{}}{EAPI_SEPARATOR}deadbeef");
        let hex = hex::encode_upper(aes_ecb_encrypt(data.as_bytes(), EAPI_KEY));
        assert!(matches!(decrypt_eapi_params(&hex), Err(NeteaseError::Decode(_))));
    }

    #[test]
    fn linux_params_roundtrip() {
        let params = json!({"id": 347_230, "lv": -1});
        let req = encode("/api/song/lyric", &params, Variant::Linux);
        let envelope = decrypt_linux_params(req.field("eparams").unwrap()).unwrap();
        assert_eq!(envelope["method"], "POST");
        assert_eq!(envelope["url"], "https://music.163.com/api/song/lyric");
        assert_eq!(envelope["params"], params);
    }

    #[test]
    fn eapi_response_decrypts() {
        let body = json!({"code": 200, "data": [1, 2, 3]});
        let raw = aes_ecb_encrypt(body.to_string().as_bytes(), EAPI_KEY);
        assert_eq!(decode(&raw, Variant::Encrypted).unwrap(), body);
    }

    #[test]
    fn eapi_response_falls_back_to_plain_json() {
        let raw = br#"{"code":-460,"message":"cheating"}"#;
        let v = decode(raw, Variant::Encrypted).unwrap();
        assert_eq!(v["code"], -460);
    }

    #[test]
    fn undecodable_bodies_fail() {
        assert!(matches!(decode(b"<html>", Variant::Web), Err(NeteaseError::Decode(_))));
        assert!(matches!(
            decode(&[0u8; 32], Variant::Encrypted),
            Err(NeteaseError::Decode(_))
        ));
    }

    #[test]
    fn form_body_is_url_encoded() {
        let req = EncodedRequest {
            fields: vec![("params", "a+b/c=".into()), ("encSecKey", "ff".into())],
        };
        assert_eq!(req.to_form(), "params=a%2Bb%2Fc%3D&encSecKey=ff");
    }
}
