//! 命令行参数解析工具
//!
//! 位姿与条目值的文本解析

use anyhow::{Result, bail};
use tm_sdk::prelude::{ItemValue, Pose};

/// 解析 6 个逗号分隔的数值为位姿
pub fn parse_pose(text: &str) -> Result<Pose> {
    let values = text
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if values.len() != 6 {
        bail!("A pose needs 6 values, got {}", values.len());
    }

    let mut pose = [0.0; 6];
    pose.copy_from_slice(&values);
    Ok(pose)
}

/// 解析写入值
///
/// `true`/`false` 为布尔，`{..}` 或含逗号的文本为列表（全为整数时为整数列表），
/// 其余依次尝试整数、浮点，最后作为字符串。
pub fn parse_value(text: &str) -> ItemValue {
    let trimmed = text.trim();
    match trimmed {
        "true" => return ItemValue::Bool(true),
        "false" => return ItemValue::Bool(false),
        _ => {},
    }

    let list = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .or_else(|| trimmed.contains(',').then_some(trimmed));
    if let Some(body) = list {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if let Ok(ints) = parts.iter().map(|p| p.parse::<i32>()).collect::<std::result::Result<Vec<_>, _>>() {
            return ItemValue::IntList(ints);
        }
        if let Ok(floats) = parts.iter().map(|p| p.parse::<f64>()).collect::<std::result::Result<Vec<_>, _>>() {
            return ItemValue::FloatList(floats);
        }
        return ItemValue::Str(text.to_owned());
    }

    if let Ok(v) = trimmed.parse::<i32>() {
        return ItemValue::Int(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return ItemValue::Float(v);
    }
    ItemValue::Str(text.to_owned())
}

/// 格式化位姿用于输出
pub fn format_pose(pose: &Pose) -> String {
    pose.iter().map(|v| format!("{:>9.3}", v)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pose() {
        assert_eq!(parse_pose("0, 0, 90, 0, 90, 0").unwrap(), [0.0, 0.0, 90.0, 0.0, 90.0, 0.0]);
        assert!(parse_pose("1,2,3").is_err());
        assert!(parse_pose("1,2,3,4,5,x").is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), ItemValue::Bool(true));
        assert_eq!(parse_value("42"), ItemValue::Int(42));
        assert_eq!(parse_value("1.5"), ItemValue::Float(1.5));
        assert_eq!(parse_value("{1,2}"), ItemValue::IntList(vec![1, 2]));
        assert_eq!(parse_value("1.5,2"), ItemValue::FloatList(vec![1.5, 2.0]));
        assert_eq!(parse_value("hello"), ItemValue::Str("hello".into()));
        assert_eq!(parse_value("a,b"), ItemValue::Str("a,b".into()));
    }

    #[test]
    fn test_format_pose() {
        let text = format_pose(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(text.contains("1.000") && text.contains("6.000"));
    }
}
