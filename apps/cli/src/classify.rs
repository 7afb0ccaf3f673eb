//! 交互式条目分类
//!
//! 连接时遇到数据表中没有的条目，通过 inquire 让用户选择类型。

use tm_sdk::prelude::{ItemClassifier, ItemType};
use tracing::warn;

/// 按线路字节数给出的建议类型
pub fn suggested_type(size: usize) -> ItemType {
    match size {
        1 => ItemType::Bool,
        n if n % 4 == 0 => ItemType::Float,
        _ => ItemType::String,
    }
}

/// 在终端上询问用户的分类器
pub struct PromptClassifier;

impl ItemClassifier for PromptClassifier {
    fn classify(&self, name: &str, size: usize) -> Option<ItemType> {
        let suggested = suggested_type(size);
        let cursor = ItemType::ALL.iter().position(|&t| t == suggested).unwrap_or(0);

        let message = format!("New item '{}' ({} bytes), select its type:", name, size);
        match inquire::Select::new(&message, ItemType::ALL.to_vec())
            .with_starting_cursor(cursor)
            .prompt()
        {
            Ok(ty) => Some(ty),
            Err(e) => {
                warn!("No type selected for {}: {}", name, e);
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_type() {
        assert_eq!(suggested_type(1), ItemType::Bool);
        assert_eq!(suggested_type(24), ItemType::Float);
        assert_eq!(suggested_type(23), ItemType::String);
    }
}
