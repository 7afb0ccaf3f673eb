//! 帧编解码
//!
//! 线路格式（两个通道相同，逐字节）：
//!
//! ```text
//! '$' HEADER ',' LENGTH ',' DATA ',' '*' CKSUM_HEX2 '\r\n'
//! ```
//!
//! - `LENGTH`：`DATA` 的十进制 ASCII 字节长度
//! - `CKSUM_HEX2`：`HEADER ',' LENGTH ',' DATA ','` 所有字节的异或，两位大写十六进制
//!
//! 解码器是可恢复的：数据不足时返回 [`Decoded::Incomplete`]，不消费任何帧字节，
//! 调用方读取更多数据后重试即可。

use crate::constants::*;
use bytes::{BufMut, Bytes, BytesMut};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// 异或校验和
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// 将校验和渲染为两位大写十六进制（补零）
pub fn checksum_hex(value: u8) -> [u8; 2] {
    [
        HEX_DIGITS[(value >> 4) as usize],
        HEX_DIGITS[(value & 0x0F) as usize],
    ]
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

fn parse_checksum(hi: u8, lo: u8) -> Option<u8> {
    Some((hex_value(hi)? << 4) | hex_value(lo)?)
}

/// 一条完整的线路帧
///
/// `checksum` 是发送方声明的校验和；解码时另外保存本地重新计算的值，
/// 通过 [`TmFrame::checksum_valid`] 判断两者是否一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmFrame {
    /// 帧头（如 `TMSVR`、`TMSCT`、`TMSTA`、`CPERR`）
    pub header: String,
    /// 数据块（可能内嵌二进制子协议）
    pub data: Bytes,
    /// 声明的校验和
    pub checksum: u8,
    computed: u8,
}

impl TmFrame {
    /// 构建一个待发送的帧（校验和自动计算）
    pub fn new(header: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let header = header.into();
        let data = data.into();
        let computed = span_checksum(&header, data.len(), &data);
        Self {
            header,
            data,
            checksum: computed,
            computed,
        }
    }

    /// 数据块长度（即 `LENGTH` 字段）
    pub fn length(&self) -> usize {
        self.data.len()
    }

    /// 声明的校验和是否与本地计算结果一致
    pub fn checksum_valid(&self) -> bool {
        self.checksum == self.computed
    }

    /// 本地计算的校验和
    pub fn computed_checksum(&self) -> u8 {
        self.computed
    }

    /// 数据块的 UTF-8 视图（纯文本帧使用）
    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// 编码到缓冲区末尾
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_frame(&self.header, &self.data, dst);
    }

    /// 编码为独立的字节串
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(encoded_len(&self.header, self.data.len()));
        self.encode(&mut dst);
        dst.freeze()
    }
}

fn decimal_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

/// 帧编码后的总字节数
pub fn encoded_len(header: &str, data_len: usize) -> usize {
    1 + header.len() + 1 + decimal_digits(data_len) + 1 + data_len + TRAILER_LEN
}

fn span_checksum(header: &str, length: usize, data: &[u8]) -> u8 {
    checksum(header.as_bytes())
        ^ P_SEPR
        ^ checksum(length.to_string().as_bytes())
        ^ P_SEPR
        ^ checksum(data)
        ^ P_SEPR
}

/// 编码一帧并追加到 `dst`
///
/// 校验和覆盖 `header,length,data,`，不含前导 `$` 与 `*HH\r\n` 后缀。
pub fn encode_frame(header: &str, data: &[u8], dst: &mut BytesMut) {
    let length = data.len().to_string();
    dst.reserve(encoded_len(header, data.len()));
    dst.put_u8(P_HEAD);

    let span_start = dst.len();
    dst.put_slice(header.as_bytes());
    dst.put_u8(P_SEPR);
    dst.put_slice(length.as_bytes());
    dst.put_u8(P_SEPR);
    dst.put_slice(data);
    dst.put_u8(P_SEPR);
    let csum = checksum(&dst[span_start..]);

    dst.put_u8(P_CSUM);
    dst.put_slice(&checksum_hex(csum));
    dst.put_slice(P_END);
}

/// 单次解码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// 完整帧；`consumed` 包含帧之前的 `noise` 个噪声字节
    Frame {
        frame: TmFrame,
        consumed: usize,
        noise: usize,
    },
    /// 数据不足，需要更多字节；`discard` 为可以安全丢弃的前导噪声字节数
    Incomplete { discard: usize },
    /// 从 `$` 开始的字节不构成合法帧，丢弃 `skip` 字节后重新扫描
    Malformed { skip: usize, reason: &'static str },
}

/// 从缓冲区头部解码一帧
///
/// 不修改缓冲区，由调用方根据返回值推进读指针。
pub fn decode_frame(buf: &[u8], max_data_len: usize) -> Decoded {
    let Some(head) = buf.iter().position(|&b| b == P_HEAD) else {
        return Decoded::Incomplete { discard: buf.len() };
    };
    let malformed = |reason| Decoded::Malformed {
        skip: head + 1,
        reason,
    };

    // === 帧头 ===
    let header_start = head + 1;
    let Some(header_len) = buf[header_start..].iter().position(|&b| b == P_SEPR) else {
        if buf.len() - header_start > MAX_HEADER_LEN {
            return malformed("header too long");
        }
        if !buf[header_start..].iter().all(u8::is_ascii_uppercase) {
            return malformed("invalid header");
        }
        return Decoded::Incomplete { discard: head };
    };
    let header_end = header_start + header_len;
    let header_bytes = &buf[header_start..header_end];
    if header_bytes.is_empty()
        || header_bytes.len() > MAX_HEADER_LEN
        || !header_bytes.iter().all(u8::is_ascii_uppercase)
    {
        // 帧头里混入的 `$` 由下一轮扫描当作新的帧起点
        return malformed("invalid header");
    }
    let header = String::from_utf8_lossy(header_bytes);

    // === 长度字段 ===
    let len_start = header_end + 1;
    let Some(len_len) = buf[len_start..].iter().position(|&b| b == P_SEPR) else {
        if buf.len() - len_start > MAX_LENGTH_DIGITS {
            return malformed("length field too long");
        }
        return Decoded::Incomplete { discard: head };
    };
    let len_end = len_start + len_len;
    let digits = &buf[len_start..len_end];
    if digits.is_empty()
        || digits.len() > MAX_LENGTH_DIGITS
        || !digits.iter().all(u8::is_ascii_digit)
    {
        return malformed("invalid length field");
    }
    let length = digits.iter().fold(0usize, |acc, d| acc * 10 + (d - b'0') as usize);
    if length > max_data_len {
        return malformed("data length exceeds limit");
    }

    // === 数据块 + 尾部 ===
    let data_start = len_end + 1;
    let data_end = data_start + length;
    let frame_end = data_end + TRAILER_LEN;
    if buf.len() < frame_end {
        return Decoded::Incomplete { discard: head };
    }

    let trailer = &buf[data_end..frame_end];
    if trailer[0] != P_SEPR || trailer[1] != P_CSUM || &trailer[4..6] != P_END {
        return malformed("invalid frame trailer");
    }
    let Some(declared) = parse_checksum(trailer[2], trailer[3]) else {
        return malformed("invalid checksum digits");
    };

    // 校验范围与编码时完全一致：header,length,data,
    let computed = checksum(&buf[header_start..=data_end]);

    Decoded::Frame {
        frame: TmFrame {
            header: header.into_owned(),
            data: Bytes::copy_from_slice(&buf[data_start..data_end]),
            checksum: declared,
            computed,
        },
        consumed: frame_end,
        noise: head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(header: &str, data: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(header, data, &mut buf);
        buf
    }

    fn expect_frame(decoded: Decoded) -> (TmFrame, usize) {
        match decoded {
            Decoded::Frame { frame, consumed, .. } => (frame, consumed),
            other => panic!("Expected Frame, got {:?}", other),
        }
    }

    #[test]
    fn test_listen_node_example_frame() {
        let data = "3,PTP(CPP,0,0,0,0,0,0,50,200,100,true)";
        assert_eq!(data.len(), 38);

        let span = format!("TMSCT,38,{},", data);
        let expected_csum = span.bytes().fold(0u8, |acc, b| acc ^ b);
        let expected = format!("$TMSCT,38,{},*{:02X}\r\n", data, expected_csum);

        let buf = encode("TMSCT", data.as_bytes());
        assert_eq!(&buf[..], expected.as_bytes());
    }

    #[test]
    fn test_empty_data_checksum() {
        let frame = TmFrame::new("TMSVR", Bytes::new());
        let expected = b"TMSVR,0,,".iter().fold(0u8, |acc, b| acc ^ b);
        assert_eq!(frame.checksum, expected);

        let (decoded, _) = expect_frame(decode_frame(&frame.to_bytes(), DEFAULT_MAX_DATA_LEN));
        assert!(decoded.checksum_valid());
        assert_eq!(decoded.length(), 0);
    }

    #[test]
    fn test_status_query_frame_bytes() {
        // 机器人文档中的状态查询帧
        let frame = TmFrame::new(HEADER_TMSTA, &b"00"[..]);
        assert_eq!(&frame.to_bytes()[..], b"$TMSTA,2,00,*41\r\n");
    }

    #[test]
    fn test_checksum_hex_is_zero_padded_uppercase() {
        assert_eq!(&checksum_hex(0x0A), b"0A");
        assert_eq!(&checksum_hex(0xF3), b"F3");
        assert_eq!(&checksum_hex(0x00), b"00");
    }

    #[test]
    fn test_decode_skips_leading_noise() {
        let mut buf = BytesMut::from(&b"garbage\r\n"[..]);
        buf.extend_from_slice(&encode("TMSCT", b"1,OK"));

        let (frame, consumed) = expect_frame(decode_frame(&buf, DEFAULT_MAX_DATA_LEN));
        assert_eq!(frame.header, "TMSCT");
        assert_eq!(&frame.data[..], b"1,OK");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_decode_without_head_is_incomplete() {
        let decoded = decode_frame(b"no frame here", DEFAULT_MAX_DATA_LEN);
        assert_eq!(decoded, Decoded::Incomplete { discard: 13 });
    }

    #[test]
    fn test_decode_short_data_is_incomplete() {
        let full = encode("TMSVR", b"0123456789");
        for cut in 1..full.len() {
            match decode_frame(&full[..cut], DEFAULT_MAX_DATA_LEN) {
                Decoded::Incomplete { discard } => assert_eq!(discard, 0),
                other => panic!("cut at {} should be incomplete, got {:?}", cut, other),
            }
        }
    }

    #[test]
    fn test_decode_data_may_contain_delimiters() {
        // 数据块按声明长度切片，内部的 `,` `*` `\r\n` 不影响解析
        let data = b"a,b*c\r\n$d";
        let buf = encode("TMSVR", data);
        let (frame, consumed) = expect_frame(decode_frame(&buf, DEFAULT_MAX_DATA_LEN));
        assert_eq!(&frame.data[..], data);
        assert_eq!(consumed, buf.len());
        assert!(frame.checksum_valid());
    }

    #[test]
    fn test_decode_checksum_mismatch_still_delivers() {
        let mut buf = encode("TMSCT", b"1,OK");
        let len = buf.len();
        // 篡改校验和高位
        buf[len - 4] = if buf[len - 4] == b'0' { b'1' } else { b'0' };

        let (frame, _) = expect_frame(decode_frame(&buf, DEFAULT_MAX_DATA_LEN));
        assert!(!frame.checksum_valid());
        assert_eq!(&frame.data[..], b"1,OK");
    }

    #[test]
    fn test_decode_lowercase_checksum_accepted() {
        let frame = TmFrame::new("TMSCT", &b"2,OK"[..]);
        let hex = checksum_hex(frame.checksum);
        let raw = format!(
            "$TMSCT,4,2,OK,*{}\r\n",
            std::str::from_utf8(&hex).unwrap().to_ascii_lowercase()
        );
        let (decoded, _) = expect_frame(decode_frame(raw.as_bytes(), DEFAULT_MAX_DATA_LEN));
        assert!(decoded.checksum_valid());
    }

    #[test]
    fn test_decode_invalid_length_is_malformed() {
        let decoded = decode_frame(b"$TMSVR,x1,abc,*00\r\n", DEFAULT_MAX_DATA_LEN);
        assert!(matches!(decoded, Decoded::Malformed { skip: 1, .. }));
    }

    #[test]
    fn test_decode_bad_trailer_is_malformed() {
        let decoded = decode_frame(b"$TMSVR,3,abcXX*00\r\n", DEFAULT_MAX_DATA_LEN);
        assert!(matches!(decoded, Decoded::Malformed { .. }));
    }

    #[test]
    fn test_decode_length_over_limit_is_malformed() {
        let decoded = decode_frame(b"$TMSVR,100,", 16);
        assert!(matches!(decoded, Decoded::Malformed { .. }));
    }

    #[test]
    fn test_decode_stray_head_in_header_is_malformed() {
        let mut buf = BytesMut::from(&b"$x"[..]);
        buf.extend_from_slice(&encode("TMSVR", b"1,0,"));

        let decoded = decode_frame(&buf, DEFAULT_MAX_DATA_LEN);
        assert!(matches!(decoded, Decoded::Malformed { skip: 1, .. }));

        // 跳过后从内层 `$` 重新对齐
        let (frame, consumed) = expect_frame(decode_frame(&buf[1..], DEFAULT_MAX_DATA_LEN));
        assert_eq!(frame.header, "TMSVR");
        assert_eq!(&frame.data[..], b"1,0,");
        assert_eq!(consumed, buf.len() - 1);
    }

    #[test]
    fn test_decode_rejects_non_uppercase_header() {
        for raw in [&b"$TMsvr,0,,*00\r\n"[..], b"$TM1,0,,*00\r\n", b"$TM SCT,0,,*00\r\n"] {
            let decoded = decode_frame(raw, DEFAULT_MAX_DATA_LEN);
            assert!(
                matches!(decoded, Decoded::Malformed { skip: 1, .. }),
                "{:?} should be malformed, got {:?}",
                String::from_utf8_lossy(raw),
                decoded
            );
        }
    }

    #[test]
    fn test_decode_partial_header_with_garbage_fails_early() {
        // 未等到 `,` 也能判定帧头非法
        let decoded = decode_frame(b"$T$TMS", DEFAULT_MAX_DATA_LEN);
        assert!(matches!(decoded, Decoded::Malformed { skip: 1, .. }));
    }

    #[test]
    fn test_encoded_len() {
        let frame = TmFrame::new("TMSCT", &b"0,Pause()"[..]);
        assert_eq!(frame.to_bytes().len(), encoded_len("TMSCT", 9));
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(
            header in "[A-Z]{1,8}",
            data in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let buf = encode(&header, &data);
            let (frame, consumed) = expect_frame(decode_frame(&buf, DEFAULT_MAX_DATA_LEN));
            prop_assert_eq!(&frame.header, &header);
            prop_assert_eq!(&frame.data[..], &data[..]);
            prop_assert!(frame.checksum_valid());
            prop_assert_eq!(consumed, buf.len());
        }
    }
}
