use crate::extender::{Codec, ExtenderError, Payload};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Standard base64 with padding. Whitespace in the encoded form is ignored.
///
/// The decoded bytes are the whole value: only the empty path is valid.
#[derive(Debug, Clone)]
pub struct Base64Extender {
    decoded: Vec<u8>,
}

fn ensure_empty(path: &[String]) -> Result<(), ExtenderError> {
    if path.is_empty() {
        return Ok(());
    }
    Err(ExtenderError::InvalidPath {
        encoding: Base64Extender::NAME,
        path: path.join("."),
        message: "base64 payloads have no inner path".to_string(),
    })
}

impl Codec for Base64Extender {
    const NAME: &'static str = "base64";

    fn parse(payload: &[u8]) -> Result<Self, ExtenderError> {
        let compact: Vec<u8> = payload
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let decoded = STANDARD
            .decode(compact)
            .map_err(|err| ExtenderError::InvalidPayload {
                encoding: Self::NAME,
                message: err.to_string(),
            })?;
        Ok(Self { decoded })
    }

    fn payload(&self) -> Result<Vec<u8>, ExtenderError> {
        Ok(STANDARD.encode(&self.decoded).into_bytes())
    }

    fn get(&self, path: &[String]) -> Result<Vec<u8>, ExtenderError> {
        ensure_empty(path)?;
        Ok(self.decoded.clone())
    }

    fn set(&mut self, path: &[String], value: Payload<'_>) -> Result<(), ExtenderError> {
        ensure_empty(path)?;
        self.decoded = value.to_bytes(Self::NAME)?.into_owned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ignores_line_breaks() {
        let codec = Base64Extender::parse(b"aGVsbG8g\nd29ybGQ=\n").unwrap();
        assert_eq!(codec.get(&[]).unwrap(), b"hello world");
    }

    #[test]
    fn set_reencodes() {
        let mut codec = Base64Extender::parse(b"b2xk").unwrap();
        codec.set(&[], Payload::Raw(b"new value")).unwrap();
        assert_eq!(codec.payload().unwrap(), b"bmV3IHZhbHVl");
    }

    #[test]
    fn inner_path_is_rejected() {
        let codec = Base64Extender::parse(b"").unwrap();
        let err = codec.get(&["x".to_string()]).unwrap_err();
        assert!(matches!(err, ExtenderError::InvalidPath { .. }));
    }

    #[test]
    fn invalid_alphabet_is_rejected() {
        assert!(matches!(
            Base64Extender::parse(b"not*base64"),
            Err(ExtenderError::InvalidPayload { .. })
        ));
    }
}
