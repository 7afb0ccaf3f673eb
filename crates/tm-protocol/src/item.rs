//! Ethernet Slave 数据表条目类型
//!
//! 数据表中每个条目都带有一个声明类型（持久化为单字符标签），
//! 线路上的原始字节按声明类型解码。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 条目声明类型
///
/// | 标签 | 类型 | 线路编码 |
/// |------|------|----------|
/// | `s` | 字符串 | UTF-8 |
/// | `f` | 浮点（标量或列表） | 小端 IEEE-754 f32 |
/// | `i` | 整数（标量或列表） | 小端 i32 |
/// | `?` | 布尔 | 单字节，非零为真 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ItemType {
    String,
    Float,
    Int,
    Bool,
}

impl ItemType {
    /// 全部类型（用于交互式选择）
    pub const ALL: [ItemType; 4] = [
        ItemType::String,
        ItemType::Float,
        ItemType::Int,
        ItemType::Bool,
    ];

    /// 持久化标签
    pub fn tag(self) -> &'static str {
        match self {
            ItemType::String => "s",
            ItemType::Float => "f",
            ItemType::Int => "i",
            ItemType::Bool => "?",
        }
    }

    /// 从持久化标签解析
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "s" => Some(ItemType::String),
            "f" => Some(ItemType::Float),
            "i" => Some(ItemType::Int),
            "?" => Some(ItemType::Bool),
            _ => None,
        }
    }

    /// 人类可读描述
    pub fn description(self) -> &'static str {
        match self {
            ItemType::String => "string",
            ItemType::Float => "float",
            ItemType::Int => "integer",
            ItemType::Bool => "boolean",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.tag(), self.description())
    }
}

impl FromStr for ItemType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::from_tag(&s)
            .or_else(|| match s.as_str() {
                "string" | "str" => Some(ItemType::String),
                "float" => Some(ItemType::Float),
                "int" | "integer" => Some(ItemType::Int),
                "bool" | "boolean" => Some(ItemType::Bool),
                _ => None,
            })
            .ok_or_else(|| ProtocolError::ParseError(format!("unknown item type: {}", s)))
    }
}

/// 条目当前值
///
/// 浮点以 f64 保存（线路为 f32，加宽不丢精度）；整数保持 i32。
/// `Null` 表示新发现、尚未收到数据的条目。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ItemValue {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    IntList(Vec<i32>),
    Float(f64),
    FloatList(Vec<f64>),
    Str(String),
}

impl ItemValue {
    /// 是否为列表值
    pub fn is_list(&self) -> bool {
        matches!(self, ItemValue::IntList(_) | ItemValue::FloatList(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ItemValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ItemValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 数值标量（整数会被转换为 f64）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ItemValue::Float(v) => Some(*v),
            ItemValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// 数值列表（整数列表会被转换为 f64）
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        match self {
            ItemValue::FloatList(v) => Some(v.clone()),
            ItemValue::IntList(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    /// 展平为字符串序列（CSV 行使用）
    pub fn flatten_into(&self, out: &mut Vec<String>) {
        match self {
            ItemValue::IntList(v) => out.extend(v.iter().map(|x| x.to_string())),
            ItemValue::FloatList(v) => out.extend(v.iter().map(|x| x.to_string())),
            other => out.push(other.to_string()),
        }
    }
}

/// 写入 Ethernet Slave 时使用的字面量格式：
/// 标量为 `value`，列表为 `{v0,v1,...}`
impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
            f.write_str("{")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", v)?;
            }
            f.write_str("}")
        }

        match self {
            ItemValue::Null => f.write_str("null"),
            ItemValue::Bool(b) => write!(f, "{}", b),
            ItemValue::Int(v) => write!(f, "{}", v),
            ItemValue::Float(v) => write!(f, "{}", v),
            ItemValue::Str(s) => f.write_str(s),
            ItemValue::IntList(v) => list(f, v),
            ItemValue::FloatList(v) => list(f, v),
        }
    }
}

impl From<bool> for ItemValue {
    fn from(v: bool) -> Self {
        ItemValue::Bool(v)
    }
}

impl From<i32> for ItemValue {
    fn from(v: i32) -> Self {
        ItemValue::Int(v)
    }
}

impl From<f32> for ItemValue {
    fn from(v: f32) -> Self {
        ItemValue::Float(v as f64)
    }
}

impl From<f64> for ItemValue {
    fn from(v: f64) -> Self {
        ItemValue::Float(v)
    }
}

impl From<&str> for ItemValue {
    fn from(v: &str) -> Self {
        ItemValue::Str(v.to_owned())
    }
}

impl From<String> for ItemValue {
    fn from(v: String) -> Self {
        ItemValue::Str(v)
    }
}

impl From<Vec<i32>> for ItemValue {
    fn from(v: Vec<i32>) -> Self {
        ItemValue::IntList(v)
    }
}

impl From<Vec<f64>> for ItemValue {
    fn from(v: Vec<f64>) -> Self {
        ItemValue::FloatList(v)
    }
}

impl<const N: usize> From<[f64; N]> for ItemValue {
    fn from(v: [f64; N]) -> Self {
        ItemValue::FloatList(v.to_vec())
    }
}

/// 按声明类型解码线路字节
///
/// - `Bool`：必须正好 1 字节
/// - `Float`/`Int`：长度必须是 4 的倍数；1 个元素解码为标量，否则为列表
/// - `String`：UTF-8
pub fn decode_item(name: &str, ty: ItemType, bytes: &[u8]) -> Result<ItemValue, ProtocolError> {
    match ty {
        ItemType::Bool => match bytes {
            [b] => Ok(ItemValue::Bool(*b != 0)),
            _ => Err(ProtocolError::InvalidLength {
                expected: 1,
                actual: bytes.len(),
            }),
        },
        ItemType::Float | ItemType::Int => {
            if bytes.len() % 4 != 0 {
                return Err(ProtocolError::MalformedNumeric {
                    item: name.to_owned(),
                    len: bytes.len(),
                });
            }
            let words = bytes.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]);
            Ok(match (ty, bytes.len() / 4) {
                (ItemType::Float, 1) => ItemValue::Float(f32::from_le_bytes(le_word(bytes)) as f64),
                (ItemType::Float, _) => {
                    ItemValue::FloatList(words.map(|w| f32::from_le_bytes(w) as f64).collect())
                },
                (_, 1) => ItemValue::Int(i32::from_le_bytes(le_word(bytes))),
                (_, _) => ItemValue::IntList(words.map(i32::from_le_bytes).collect()),
            })
        },
        ItemType::String => std::str::from_utf8(bytes)
            .map(|s| ItemValue::Str(s.to_owned()))
            .map_err(|_| ProtocolError::InvalidUtf8 {
                item: name.to_owned(),
            }),
    }
}

fn le_word(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

/// 按声明类型编码为线路字节（`decode_item` 的逆过程）
///
/// 值与类型不匹配时返回 `ParseError`。
pub fn encode_item(ty: ItemType, value: &ItemValue) -> Result<Vec<u8>, ProtocolError> {
    let mismatch = || ProtocolError::ParseError(format!("value {} does not match type {}", value, ty));
    match (ty, value) {
        (ItemType::Bool, ItemValue::Bool(b)) => Ok(vec![*b as u8]),
        (ItemType::Int, ItemValue::Int(v)) => Ok(v.to_le_bytes().to_vec()),
        (ItemType::Int, ItemValue::IntList(v)) => Ok(v.iter().flat_map(|x| x.to_le_bytes()).collect()),
        (ItemType::Float, ItemValue::Float(v)) => Ok((*v as f32).to_le_bytes().to_vec()),
        (ItemType::Float, ItemValue::FloatList(v)) => {
            Ok(v.iter().flat_map(|x| (*x as f32).to_le_bytes()).collect())
        },
        (ItemType::String, ItemValue::Str(s)) => Ok(s.as_bytes().to_vec()),
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for ty in ItemType::ALL {
            assert_eq!(ItemType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ItemType::from_tag("x"), None);
    }

    #[test]
    fn test_item_type_from_str() {
        assert_eq!("F".parse::<ItemType>().unwrap(), ItemType::Float);
        assert_eq!("boolean".parse::<ItemType>().unwrap(), ItemType::Bool);
        assert!("tensor".parse::<ItemType>().is_err());
    }

    #[test]
    fn test_decode_float_list_of_three() {
        let mut bytes = Vec::new();
        for v in [1.5f32, -2.25, 100.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let value = decode_item("Coord", ItemType::Float, &bytes).unwrap();
        assert_eq!(value, ItemValue::FloatList(vec![1.5, -2.25, 100.0]));
    }

    #[test]
    fn test_decode_single_float_is_scalar() {
        let value = decode_item("Speed", ItemType::Float, &0.5f32.to_le_bytes()).unwrap();
        assert_eq!(value, ItemValue::Float(0.5));
    }

    #[test]
    fn test_decode_int_scalar_and_list() {
        let value = decode_item("Count", ItemType::Int, &(-7i32).to_le_bytes()).unwrap();
        assert_eq!(value, ItemValue::Int(-7));

        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        let value = decode_item("Pair", ItemType::Int, &bytes).unwrap();
        assert_eq!(value, ItemValue::IntList(vec![1, 2]));
    }

    #[test]
    fn test_decode_malformed_numeric() {
        let err = decode_item("Joint_Angle", ItemType::Float, &[0u8; 6]).unwrap_err();
        match err {
            ProtocolError::MalformedNumeric { item, len } => {
                assert_eq!(item, "Joint_Angle");
                assert_eq!(len, 6);
            },
            other => panic!("Expected MalformedNumeric, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bool_and_string() {
        assert_eq!(
            decode_item("Robot_Link", ItemType::Bool, &[1]).unwrap(),
            ItemValue::Bool(true)
        );
        assert_eq!(
            decode_item("Robot_Link", ItemType::Bool, &[0]).unwrap(),
            ItemValue::Bool(false)
        );
        assert!(decode_item("Robot_Link", ItemType::Bool, &[0, 1]).is_err());
        assert_eq!(
            decode_item("Project", ItemType::String, b"demo").unwrap(),
            ItemValue::Str("demo".into())
        );
        assert!(decode_item("Project", ItemType::String, &[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(ItemValue::FloatList(vec![1.0, 2.5]).to_string(), "{1,2.5}");
        assert_eq!(ItemValue::Int(3).to_string(), "3");
        assert_eq!(ItemValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_flatten_into() {
        let mut row = Vec::new();
        ItemValue::Str("t".into()).flatten_into(&mut row);
        ItemValue::FloatList(vec![1.0, 2.0]).flatten_into(&mut row);
        assert_eq!(row, vec!["t", "1", "2"]);
    }

    #[test]
    fn test_encode_matches_decode() {
        let value = ItemValue::FloatList(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let bytes = encode_item(ItemType::Float, &value).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(decode_item("Joint_Angle", ItemType::Float, &bytes).unwrap(), value);

        assert!(encode_item(ItemType::Bool, &ItemValue::Int(1)).is_err());
    }
}
