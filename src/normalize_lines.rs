//! # Line ending normalization module
//!
//! Canonical text, as hashed for text signatures, uses CRLF line endings.

/// Rewrites `\r`, `\n` and `\r\n` line endings to `\r\n`, one chunk at a time.
///
/// A `\r` at the end of one chunk and a `\n` at the start of the next form a single line
/// ending.
#[derive(Debug, Default, Clone)]
pub(crate) struct CrlfNormalizer {
    prev_was_cr: bool,
}

impl CrlfNormalizer {
    pub(crate) fn normalize(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        out.reserve(chunk.len());
        for &byte in chunk {
            match byte {
                b'\r' => {
                    out.extend_from_slice(b"\r\n");
                    self.prev_was_cr = true;
                }
                b'\n' => {
                    if !self.prev_was_cr {
                        out.extend_from_slice(b"\r\n");
                    }
                    self.prev_was_cr = false;
                }
                _ => {
                    out.push(byte);
                    self.prev_was_cr = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(chunks: &[&[u8]]) -> Vec<u8> {
        let mut normalizer = CrlfNormalizer::default();
        let mut out = Vec::new();
        for chunk in chunks {
            normalizer.normalize(chunk, &mut out);
        }
        out
    }

    #[test]
    fn test_mixed_line_endings() {
        let input = b"This is a string \n with \r some \n\r\n random newlines\r\r\n\n";
        assert_eq!(
            normalize(&[input]),
            b"This is a string \r\n with \r\n some \r\n\r\n random newlines\r\n\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        assert_eq!(normalize(&[b"a\r", b"\nb"]), b"a\r\nb".to_vec());
        assert_eq!(normalize(&[b"a\r", b"b\n"]), b"a\r\nb\r\n".to_vec());
    }
}
