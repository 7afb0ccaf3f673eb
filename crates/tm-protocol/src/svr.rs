//! Ethernet Slave（TMSVR）数据块子协议
//!
//! TMSVR 帧的数据块格式：
//!
//! ```text
//! SCRIPT_ID ',' MODE ',' (NAME_LEN:u16le NAME VALUE_LEN:u16le VALUE)*
//! ```
//!
//! 条目名为 UTF-8，值的解释取决于数据表中的声明类型（见 [`crate::item`]）。

use crate::ProtocolError;
use crate::constants::{LINE_TERMINATOR, P_SEPR, SVR_SCRIPT_ID, SVR_WRITE_MODE};
use crate::item::ItemValue;
use bytes::{BufMut, Bytes, BytesMut};

/// 单个 TLV 条目（值保持原始字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvrItem {
    pub name: String,
    pub value: Bytes,
}

impl SvrItem {
    pub fn new(name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 解析后的 TMSVR 数据块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvrPayload {
    /// 脚本 ID（本端写入的回显为 `svr`）
    pub script_id: String,
    /// 模式字段
    pub mode: String,
    /// 条目列表（线路顺序）
    pub items: Vec<SvrItem>,
}

impl SvrPayload {
    /// 是否为本端写入的回显
    pub fn is_self_echo(&self) -> bool {
        self.script_id == SVR_SCRIPT_ID
    }

    /// 按名称查找条目
    pub fn get(&self, name: &str) -> Option<&SvrItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// 条目名和值长度（用于数据表发现）
    pub fn item_sizes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.items.iter().map(|item| (item.name.as_str(), item.value.len()))
    }
}

fn split_field<'a>(buf: &'a [u8], field: &str) -> Result<(&'a [u8], &'a [u8]), ProtocolError> {
    let pos = buf
        .iter()
        .position(|&b| b == P_SEPR)
        .ok_or_else(|| ProtocolError::Truncated(format!("missing separator after {}", field)))?;
    Ok((&buf[..pos], &buf[pos + 1..]))
}

fn utf8_field(bytes: &[u8], field: &str) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidUtf8 {
            item: field.to_owned(),
        })
}

fn take_prefixed<'a>(buf: &mut &'a [u8], what: &str) -> Result<&'a [u8], ProtocolError> {
    let data: &'a [u8] = *buf;
    if data.len() < 2 {
        return Err(ProtocolError::Truncated(format!("{} length prefix", what)));
    }
    let len = u16::from_le_bytes([data[0], data[1]]) as usize;
    let rest = &data[2..];
    if rest.len() < len {
        return Err(ProtocolError::Truncated(format!(
            "{}: declared {} bytes, {} available",
            what,
            len,
            rest.len()
        )));
    }
    let (value, tail) = rest.split_at(len);
    *buf = tail;
    Ok(value)
}

/// 解析 TMSVR 数据块
///
/// 回显帧（脚本 ID 为 `svr`）的主体是文本而非 TLV，此时 `items` 为空。
pub fn parse_svr_payload(data: &Bytes) -> Result<SvrPayload, ProtocolError> {
    let (script_id, rest) = split_field(data, "script id")?;
    let script_id = utf8_field(script_id, "script id")?;

    let (mode, body) = split_field(rest, "mode")?;
    let mode = utf8_field(mode, "mode")?;

    let mut payload = SvrPayload {
        script_id,
        mode,
        items: Vec::new(),
    };
    if payload.is_self_echo() {
        return Ok(payload);
    }

    // 切片共享 `data` 的底层存储，避免逐条目拷贝
    let base = data.len() - body.len();
    let mut cursor = body;
    while !cursor.is_empty() {
        let name = take_prefixed(&mut cursor, "item name")?;
        let name = utf8_field(name, "item name")?;
        let value = take_prefixed(&mut cursor, &name)?;
        let start = base + (body.len() - cursor.len()) - value.len();
        payload.items.push(SvrItem {
            name,
            value: data.slice(start..start + value.len()),
        });
    }
    Ok(payload)
}

/// 编码 TMSVR 数据块（模拟机器人端或测试使用）
pub fn encode_svr_payload(script_id: &str, mode: &str, items: &[SvrItem]) -> Bytes {
    let mut dst = BytesMut::new();
    dst.put_slice(script_id.as_bytes());
    dst.put_u8(P_SEPR);
    dst.put_slice(mode.as_bytes());
    dst.put_u8(P_SEPR);
    for item in items {
        dst.put_u16_le(item.name.len() as u16);
        dst.put_slice(item.name.as_bytes());
        dst.put_u16_le(item.value.len() as u16);
        dst.put_slice(&item.value);
    }
    dst.freeze()
}

/// 构建 Ethernet Slave 写入数据块：`svr,2,item=value\r\n`
///
/// 列表值渲染为 `{v0,v1,...}`，字符串原样写入。
pub fn format_svr_write(item: &str, value: &ItemValue) -> String {
    format!(
        "{}{}{}{}{}={}{}",
        SVR_SCRIPT_ID, P_SEPR as char, SVR_WRITE_MODE, P_SEPR as char, item, value, LINE_TERMINATOR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(values: &[f32]) -> Bytes {
        values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>().into()
    }

    #[test]
    fn test_parse_two_items() {
        let data = encode_svr_payload(
            "0",
            "0",
            &[
                SvrItem::new("Robot_Link", Bytes::from_static(&[1])),
                SvrItem::new("Joint_Angle", floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])),
            ],
        );

        let payload = parse_svr_payload(&data).unwrap();
        assert_eq!(payload.script_id, "0");
        assert_eq!(payload.mode, "0");
        assert!(!payload.is_self_echo());
        assert_eq!(payload.items.len(), 2);

        let sizes: Vec<_> = payload.item_sizes().collect();
        assert_eq!(sizes, vec![("Robot_Link", 1), ("Joint_Angle", 24)]);
        assert_eq!(payload.get("Joint_Angle").unwrap().value, floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
    }

    #[test]
    fn test_float_list_value_lengths() {
        let three = encode_svr_payload("1", "0", &[SvrItem::new("Coord", floats(&[1.0, 2.0, 3.0]))]);
        let payload = parse_svr_payload(&three).unwrap();
        assert_eq!(payload.items[0].value.len(), 12);

        let one = encode_svr_payload("1", "0", &[SvrItem::new("Speed", floats(&[1.0]))]);
        let payload = parse_svr_payload(&one).unwrap();
        assert_eq!(payload.items[0].value.len(), 4);
    }

    #[test]
    fn test_self_echo_detected() {
        let data = Bytes::from_static(b"svr,2,Ctrl_DO0=1\r\n");
        let payload = parse_svr_payload(&data).unwrap();
        assert!(payload.is_self_echo());
        assert!(payload.items.is_empty());
    }

    #[test]
    fn test_truncated_value_is_error() {
        let mut data = encode_svr_payload("0", "0", &[SvrItem::new("Robot_Link", Bytes::from_static(&[1]))]).to_vec();
        data.pop();
        let err = parse_svr_payload(&Bytes::from(data)).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated(_)));
    }

    #[test]
    fn test_missing_mode_is_error() {
        let err = parse_svr_payload(&Bytes::from_static(b"0")).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated(_)));
    }

    #[test]
    fn test_empty_body_has_no_items() {
        let payload = parse_svr_payload(&Bytes::from_static(b"3,0,")).unwrap();
        assert!(payload.items.is_empty());
    }

    #[test]
    fn test_format_svr_write() {
        assert_eq!(format_svr_write("Ctrl_DO0", &ItemValue::Int(1)), "svr,2,Ctrl_DO0=1\r\n");
        assert_eq!(
            format_svr_write("Point", &ItemValue::FloatList(vec![1.0, 2.5, -3.0])),
            "svr,2,Point={1,2.5,-3}\r\n"
        );
        assert_eq!(
            format_svr_write("Msg", &ItemValue::Str("hello".into())),
            "svr,2,Msg=hello\r\n"
        );
    }
}
