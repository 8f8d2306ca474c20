//! PEM encoding for certificate and private key files

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::errors::{CryptoError, CryptoResult};

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

const LINE_WIDTH: usize = 64;

/// Wrap bytes in a PEM block
pub fn encode_pem(label: &str, bytes: &[u8]) -> String {
    let body = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Extract the bytes of the first PEM block with the given label
pub fn decode_pem(text: &str, label: &'static str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let start = text.find(&begin)? + begin.len();
    let stop = start + text[start..].find(&end)?;

    let body: String = text[start..stop]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD.decode(body).ok()
}

pub fn read_pem(path: &Path, label: &'static str) -> CryptoResult<Vec<u8>> {
    let text = fs::read_to_string(path).map_err(|e| CryptoError::file_access(path, e))?;
    decode_pem(&text, label).ok_or_else(|| CryptoError::MalformedPem {
        path: path.display().to_string(),
        label,
    })
}

pub fn write_pem(path: &Path, label: &str, bytes: &[u8]) -> CryptoResult<()> {
    fs::write(path, encode_pem(label, bytes)).map_err(|e| CryptoError::file_access(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let bytes: Vec<u8> = (0..=255).collect();
        let pem = encode_pem(CERTIFICATE_LABEL, &bytes);

        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.lines().all(|l| l.len() <= LINE_WIDTH || l.starts_with("-----")));
        assert_eq!(decode_pem(&pem, CERTIFICATE_LABEL), Some(bytes));
    }

    #[test]
    fn test_wrong_label() {
        let pem = encode_pem(PRIVATE_KEY_LABEL, &[1, 2, 3]);
        assert_eq!(decode_pem(&pem, CERTIFICATE_LABEL), None);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_pem(&dir.path().join("missing.pem"), CERTIFICATE_LABEL);
        assert!(matches!(result, Err(CryptoError::FileAccess { .. })));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        write_pem(&path, PRIVATE_KEY_LABEL, &[7; 32]).unwrap();
        assert_eq!(read_pem(&path, PRIVATE_KEY_LABEL).unwrap(), vec![7; 32]);
    }
}
