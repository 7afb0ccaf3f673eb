//! 流式帧重组
//!
//! TCP 是字节流，一次读取可能只包含半帧，也可能包含多帧。
//! [`FrameAssembler`] 累积原始字节并按线路顺序逐个取出完整帧，
//! 尾部不完整的帧保留到下一次 `feed()`。

use crate::constants::DEFAULT_MAX_DATA_LEN;
use crate::frame::{Decoded, TmFrame, decode_frame};
use bytes::{Buf, BytesMut};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// 帧重组器
///
/// # Example
///
/// ```
/// use tm_protocol::{FrameAssembler, TmFrame};
///
/// let wire = TmFrame::new("TMSCT", &b"1,OK"[..]).to_bytes();
/// let (a, b) = wire.split_at(5);
///
/// let mut assembler = FrameAssembler::new();
/// assembler.feed(a);
/// assert!(assembler.next_frame().is_none());
/// assembler.feed(b);
/// let frame = assembler.next_frame().unwrap();
/// assert_eq!(frame.header, "TMSCT");
/// ```
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    max_data_len: usize,
    malformed: u64,
    noise_bytes: u64,
}

impl FrameAssembler {
    /// 使用默认数据块上限创建
    pub fn new() -> Self {
        Self::with_max_data_len(DEFAULT_MAX_DATA_LEN)
    }

    /// 指定单帧数据块上限
    pub fn with_max_data_len(max_data_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_data_len,
            malformed: 0,
            noise_bytes: 0,
        }
    }

    /// 追加原始字节（任意长度，1 字节到多帧均可）
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// 取出下一个完整帧
    ///
    /// 返回 `None` 表示缓冲区中只剩不完整的帧（或为空）。
    pub fn next_frame(&mut self) -> Option<TmFrame> {
        loop {
            match decode_frame(&self.buf, self.max_data_len) {
                Decoded::Frame {
                    frame,
                    consumed,
                    noise,
                } => {
                    self.noise_bytes += noise as u64;
                    self.buf.advance(consumed);
                    return Some(frame);
                },
                Decoded::Incomplete { discard } => {
                    if discard > 0 {
                        self.noise_bytes += discard as u64;
                        self.buf.advance(discard);
                    }
                    return None;
                },
                Decoded::Malformed { skip, .. } => {
                    // 丢弃这个 `$`，从下一个候选位置重新扫描
                    self.malformed += 1;
                    self.noise_bytes += skip as u64;
                    self.buf.advance(skip);
                },
            }
        }
    }

    /// 以迭代器形式取出当前所有完整帧
    pub fn frames(&mut self) -> impl Iterator<Item = TmFrame> + '_ {
        std::iter::from_fn(move || self.next_frame())
    }

    /// 当前缓存的字节数
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// 是否没有任何缓存字节
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 因格式错误被丢弃的帧起始数
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// 被丢弃的噪声字节总数
    pub fn noise_bytes(&self) -> u64 {
        self.noise_bytes
    }

    /// 清空缓存
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_frame;
    use proptest::prelude::*;

    fn wire(frames: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (header, data) in frames {
            encode_frame(header, data, &mut buf);
        }
        buf.to_vec()
    }

    fn collect(assembler: &mut FrameAssembler) -> Vec<(String, Vec<u8>)> {
        assembler
            .frames()
            .map(|f| (f.header.clone(), f.data.to_vec()))
            .collect()
    }

    #[test]
    fn test_coalesced_frames() {
        let bytes = wire(&[("TMSCT", b"1,OK"), ("TMSTA", b"00,true,"), ("TMSVR", b"")]);
        let mut assembler = FrameAssembler::new();
        assembler.feed(&bytes);

        let frames = collect(&mut assembler);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].0, "TMSCT");
        assert_eq!(frames[1].0, "TMSTA");
        assert_eq!(frames[2].0, "TMSVR");
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_byte_by_byte_feed() {
        let bytes = wire(&[("TMSCT", b"1,OK"), ("TMSCT", b"2,OK")]);
        let mut assembler = FrameAssembler::new();
        let mut frames = Vec::new();
        for b in &bytes {
            assembler.feed(std::slice::from_ref(b));
            frames.extend(collect(&mut assembler));
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].1, b"2,OK".to_vec());
    }

    #[test]
    fn test_partial_frame_retained() {
        let bytes = wire(&[("TMSCT", b"1,OK"), ("TMSCT", b"2,OK")]);
        let mut assembler = FrameAssembler::new();
        assembler.feed(&bytes[..bytes.len() - 3]);

        assert_eq!(collect(&mut assembler).len(), 1);
        assert!(assembler.buffered_len() > 0);

        assembler.feed(&bytes[bytes.len() - 3..]);
        assert_eq!(collect(&mut assembler).len(), 1);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_noise_between_frames_dropped() {
        let mut bytes = b"\r\nnoise".to_vec();
        bytes.extend(wire(&[("TMSCT", b"1,OK")]));
        bytes.extend_from_slice(b"junk");
        bytes.extend(wire(&[("TMSCT", b"2,OK")]));

        let mut assembler = FrameAssembler::new();
        assembler.feed(&bytes);
        assert_eq!(collect(&mut assembler).len(), 2);
        assert_eq!(assembler.noise_bytes(), 11);
    }

    #[test]
    fn test_malformed_start_resyncs() {
        let mut bytes = b"$TMSVR,zz,".to_vec();
        bytes.extend(wire(&[("TMSCT", b"1,OK")]));

        let mut assembler = FrameAssembler::new();
        assembler.feed(&bytes);
        let frames = collect(&mut assembler);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, b"1,OK".to_vec());
        assert_eq!(assembler.malformed_count(), 1);
    }

    #[test]
    fn test_stray_head_before_frame_resyncs() {
        let mut bytes = b"x$".to_vec();
        bytes.extend(wire(&[("TMSVR", b"1,0,")]));

        let mut assembler = FrameAssembler::new();
        assembler.feed(&bytes);
        let frames = collect(&mut assembler);
        assert_eq!(frames, vec![("TMSVR".to_string(), b"1,0,".to_vec())]);
        assert_eq!(assembler.malformed_count(), 1);
        assert!(assembler.is_empty());
    }

    proptest! {
        #[test]
        fn prop_split_feed_matches_whole_feed(
            datas in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..6),
            split_seed in any::<usize>(),
        ) {
            let frames: Vec<(&str, &[u8])> = datas.iter().map(|d| ("TMSVR", d.as_slice())).collect();
            let bytes = wire(&frames);
            let split = split_seed % (bytes.len() + 1);

            let mut whole = FrameAssembler::new();
            whole.feed(&bytes);
            let expected = collect(&mut whole);

            let mut parts = FrameAssembler::new();
            parts.feed(&bytes[..split]);
            let mut actual = collect(&mut parts);
            parts.feed(&bytes[split..]);
            actual.extend(collect(&mut parts));

            prop_assert_eq!(expected.len(), datas.len());
            prop_assert_eq!(actual, expected);
        }
    }
}
