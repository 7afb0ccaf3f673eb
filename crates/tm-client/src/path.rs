//! 路径文件
//!
//! 每行一个位姿，六个数值以逗号或空白分隔；空行与 `#` 开头的行被忽略。

use crate::error::{ClientError, Result};
use std::path::Path;
use tm_protocol::Pose;

/// 解析路径文本
pub fn parse_poses(text: &str) -> Result<Vec<Pose>> {
    let mut poses = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<f64>().map_err(|_| ClientError::PathFormat {
                    line: index + 1,
                    reason: format!("'{}' is not a number", field),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        let pose: Pose = values.try_into().map_err(|v: Vec<f64>| ClientError::PathFormat {
            line: index + 1,
            reason: format!("expected 6 values, found {}", v.len()),
        })?;
        poses.push(pose);
    }
    Ok(poses)
}

/// 从文件读取路径
pub fn load_poses(path: impl AsRef<Path>) -> Result<Vec<Pose>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ClientError::PathFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_poses(&text)
}
