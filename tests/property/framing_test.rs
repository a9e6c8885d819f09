// tests/property/framing_test.rs

//! Property-based tests for line framing
//! Tests that decoding does not depend on how the byte stream is chunked

use bytes::BytesMut;
use linerelay::core::protocol::LineCodec;
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

/// Splits `bytes` at the given cut points (taken modulo the length).
fn chunk(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return vec![];
    }
    let mut points: Vec<usize> = cuts.iter().map(|c| c % bytes.len()).collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| bytes[w[0]..w[1]].to_vec()).collect()
}

fn decode_all(chunks: &[Vec<u8>]) -> Vec<String> {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    for piece in chunks {
        buf.extend_from_slice(piece);
        while let Some(line) = codec.decode(&mut buf).unwrap() {
            out.push(line);
        }
    }
    while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
        out.push(line);
    }
    out
}

proptest! {
    #[test]
    fn test_lines_survive_arbitrary_chunking(
        lines in prop::collection::vec("[^\r\n]{0,200}", 1..=30),
        cuts in prop::collection::vec(any::<usize>(), 0..=20),
        crlf in any::<bool>(),
    ) {
        let terminator = if crlf { "\r\n" } else { "\n" };
        let wire: String = lines.iter().map(|l| format!("{l}{terminator}")).collect();

        let decoded = decode_all(&chunk(wire.as_bytes(), &cuts));
        prop_assert_eq!(decoded, lines);
    }

    #[test]
    fn test_unterminated_tail_is_delivered(
        lines in prop::collection::vec("[^\r\n]{0,50}", 0..=10),
        tail in "[^\r\n]{1,50}",
        cuts in prop::collection::vec(any::<usize>(), 0..=10),
    ) {
        let mut wire: String = lines.iter().map(|l| format!("{l}\n")).collect();
        wire.push_str(&tail);

        let mut expected = lines.clone();
        expected.push(tail);
        prop_assert_eq!(decode_all(&chunk(wire.as_bytes(), &cuts)), expected);
    }

    #[test]
    fn test_encoded_line_decodes_to_itself(line in "[^\r\n]{0,500}") {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(line.as_str(), &mut buf).unwrap();
        prop_assert_eq!(buf.last().copied(), Some(b'\n'));
        prop_assert_eq!(codec.decode(&mut buf).unwrap(), Some(line));
        prop_assert!(buf.is_empty());
    }
}
