//! Guest program images: raw big-endian binaries and hex word listings.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("line {line}: `{token}` is not a 32-bit hex word")]
    BadWord { line: usize, token: String },
    #[error("binary image length {0} is not a multiple of 4")]
    Truncated(usize),
}

/// Parses a listing of hex instruction words.
///
/// Words are separated by whitespace and may carry a `0x` prefix. Everything after a `#` on a
/// line is a comment.
pub fn parse_hex_listing(text: &str) -> Result<Vec<u32>, ImageError> {
    let mut words = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let code = line.split('#').next().unwrap_or_default();
        for token in code.split_whitespace() {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let word = u32::from_str_radix(digits, 16).map_err(|_| ImageError::BadWord {
                line: i + 1,
                token: token.to_owned(),
            })?;
            words.push(word);
        }
    }
    Ok(words)
}

/// Splits a raw big-endian image into instruction words.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, ImageError> {
    if bytes.len() % 4 != 0 {
        return Err(ImageError::Truncated(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn listing_with_comments() {
        let text = "\
# header
24080064  # addiu $t0, $zero, 100
0x00000000 0X0000000D

";
        assert_eq!(
            parse_hex_listing(text),
            Ok(vec![0x2408_0064, 0, 0x0000_000d])
        );
    }

    #[test]
    fn bad_word_names_its_line() {
        assert_eq!(
            parse_hex_listing("00000000\n123456789\n"),
            Err(ImageError::BadWord {
                line: 2,
                token: "123456789".to_owned()
            })
        );
        assert!(parse_hex_listing("nop").is_err());
    }

    #[test]
    fn binary_is_big_endian() {
        assert_eq!(
            words_from_bytes(&[0x24, 0x08, 0x00, 0x64, 0, 0, 0, 0x0d]),
            Ok(vec![0x2408_0064, 0x0d])
        );
        assert_eq!(words_from_bytes(&[1, 2, 3]), Err(ImageError::Truncated(3)));
    }
}
