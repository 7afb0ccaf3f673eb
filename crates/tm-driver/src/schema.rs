//! 数据表（schema）持久化
//!
//! 每个会话一个 JSON 文件 `<table_dir>/<session>.json`：
//!
//! ```json
//! { "Robot_Link": ["?", false], "Joint_Angle": ["f", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]] }
//! ```
//!
//! 内置条目的类型始终以代码为准，文件中保存的最近值优先；
//! 文件缺少的内置条目用默认值补齐。

use crate::error::DriverError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tm_protocol::{ItemType, ItemValue};
use tracing::{debug, warn};

/// 连接状态条目
pub const ITEM_ROBOT_LINK: &str = "Robot_Link";
/// 机器人时间戳条目（`%Y-%m-%dT%H:%M:%S%.f`）
pub const ITEM_CURRENT_TIME: &str = "Current_Time";
/// 两次 `Current_Time` 之间的毫秒差（本地计算）
pub const ITEM_DT: &str = "dt";
/// 关节角（度）
pub const ITEM_JOINT_ANGLE: &str = "Joint_Angle";
/// 基座标系下的工具位姿
pub const ITEM_COORD_BASE_TOOL: &str = "Coord_Base_Tool";

/// 数据表中的一个条目
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub ty: ItemType,
    pub value: ItemValue,
}

impl SchemaEntry {
    pub fn new(ty: ItemType, value: impl Into<ItemValue>) -> Self {
        Self {
            ty,
            value: value.into(),
        }
    }

    /// 新发现、尚无数据的条目
    pub fn empty(ty: ItemType) -> Self {
        Self {
            ty,
            value: ItemValue::Null,
        }
    }
}

/// 条目名 → 条目
pub type Schema = BTreeMap<String, SchemaEntry>;

/// 内置条目及其默认值
pub fn builtin_entries() -> Schema {
    let mut schema = Schema::new();
    schema.insert(ITEM_ROBOT_LINK.into(), SchemaEntry::new(ItemType::Bool, false));
    schema.insert(
        ITEM_CURRENT_TIME.into(),
        SchemaEntry::new(ItemType::String, "2099-06-25T15:45:30.123"),
    );
    schema.insert(ITEM_DT.into(), SchemaEntry::new(ItemType::Int, 0));
    schema.insert(ITEM_JOINT_ANGLE.into(), SchemaEntry::new(ItemType::Float, [0.0; 6]));
    schema.insert(
        ITEM_COORD_BASE_TOOL.into(),
        SchemaEntry::new(ItemType::Float, [0.0; 6]),
    );
    schema
}

/// 条目分类端口
///
/// 数据表中没有的条目出现时，由调用方注入的分类器决定其类型。
/// 返回 `None` 表示无法分类，打开通道会以 `UnknownItemType` 失败。
pub trait ItemClassifier: Send + Sync {
    /// `size` 为该条目在首帧中的值字节数
    fn classify(&self, name: &str, size: usize) -> Option<ItemType>;
}

impl<F> ItemClassifier for F
where
    F: Fn(&str, usize) -> Option<ItemType> + Send + Sync,
{
    fn classify(&self, name: &str, size: usize) -> Option<ItemType> {
        self(name, size)
    }
}

/// 基于预置映射表的分类器
///
/// # Example
///
/// ```
/// use tm_driver::{ItemClassifier, StaticClassifier};
/// use tm_protocol::ItemType;
///
/// let classifier = StaticClassifier::new()
///     .with("Ctrl_DO0", ItemType::Bool)
///     .with("Point_Cur", ItemType::Float);
/// assert_eq!(classifier.classify("Ctrl_DO0", 1), Some(ItemType::Bool));
/// assert_eq!(classifier.classify("Project_Name", 8), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    types: HashMap<String, ItemType>,
}

impl StaticClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, ty: ItemType) -> Self {
        self.insert(name, ty);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: ItemType) {
        self.types.insert(name.into(), ty);
    }
}

impl<S: Into<String>> FromIterator<(S, ItemType)> for StaticClassifier {
    fn from_iter<I: IntoIterator<Item = (S, ItemType)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().map(|(name, ty)| (name.into(), ty)).collect(),
        }
    }
}

impl ItemClassifier for StaticClassifier {
    fn classify(&self, name: &str, _size: usize) -> Option<ItemType> {
        self.types.get(name).copied()
    }
}

/// 数据表文件
#[derive(Debug, Clone)]
pub struct SchemaStore {
    path: PathBuf,
}

impl SchemaStore {
    /// `session` 末尾的 `.json` 会被规范化掉，避免生成 `x.json.json`
    pub fn new(table_dir: impl AsRef<Path>, session: &str) -> Self {
        let session = session.strip_suffix(".json").unwrap_or(session);
        Self {
            path: table_dir.as_ref().join(format!("{}.json", session)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// 读取并与内置条目合并，不写文件
    ///
    /// 文件不存在时：`create_missing` 为真则返回内置默认值（由调用方决定何时 [`save`](Self::save)），
    /// 否则返回 `SchemaNotFound`。
    pub fn load(&self, create_missing: bool) -> Result<Schema, DriverError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !create_missing {
                    return Err(DriverError::SchemaNotFound {
                        path: self.path.clone(),
                    });
                }
                debug!("No schema file at {}, starting from built-ins", self.path.display());
                return Ok(builtin_entries());
            },
            Err(source) => {
                return Err(DriverError::SchemaIo {
                    path: self.path.clone(),
                    source,
                });
            },
        };

        let persisted = parse_schema(&text)?;
        debug!(
            "Loaded {} items from {}",
            persisted.len(),
            self.path.display()
        );
        Ok(merge_builtins(persisted))
    }

    /// 写回文件（整体覆盖）
    pub fn save(&self, schema: &Schema) -> Result<(), DriverError> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|source| DriverError::SchemaIo {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(&schema_to_json(schema))?;
        fs::write(&self.path, text).map_err(|source| DriverError::SchemaIo {
            path: self.path.clone(),
            source,
        })
    }
}

/// 内置条目类型以代码为准，值以文件为准
fn merge_builtins(mut persisted: Schema) -> Schema {
    for (name, builtin) in builtin_entries() {
        match persisted.get_mut(&name) {
            Some(entry) if entry.ty == builtin.ty => {},
            Some(entry) => {
                warn!(
                    "Schema declares {} as '{}', built-in type '{}' takes precedence",
                    name,
                    entry.ty.tag(),
                    builtin.ty.tag()
                );
                *entry = builtin;
            },
            None => {
                persisted.insert(name, builtin);
            },
        }
    }
    persisted
}

fn parse_schema(text: &str) -> Result<Schema, DriverError> {
    let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
        return Err(DriverError::SchemaFormat("top level must be an object".into()));
    };

    let mut schema = Schema::new();
    for (name, raw) in map {
        let entry = match raw.as_array().map(Vec::as_slice) {
            Some([Value::String(tag), value]) => {
                let ty = ItemType::from_tag(tag).ok_or_else(|| {
                    DriverError::SchemaFormat(format!("item {}: unknown type tag '{}'", name, tag))
                })?;
                let value = value_from_json(ty, value).ok_or_else(|| {
                    DriverError::SchemaFormat(format!("item {}: value {} is not a '{}'", name, value, tag))
                })?;
                SchemaEntry { ty, value }
            },
            _ => {
                return Err(DriverError::SchemaFormat(format!(
                    "item {}: expected [type, value]",
                    name
                )));
            },
        };
        schema.insert(name, entry);
    }
    Ok(schema)
}

fn schema_to_json(schema: &Schema) -> Value {
    let map: Map<String, Value> = schema
        .iter()
        .map(|(name, entry)| {
            (
                name.clone(),
                Value::Array(vec![Value::from(entry.ty.tag()), value_to_json(&entry.value)]),
            )
        })
        .collect();
    Value::Object(map)
}

fn value_to_json(value: &ItemValue) -> Value {
    match value {
        ItemValue::Null => Value::Null,
        ItemValue::Bool(b) => Value::from(*b),
        ItemValue::Int(v) => Value::from(*v),
        ItemValue::IntList(v) => Value::from(v.clone()),
        ItemValue::Float(v) => Value::from(*v),
        ItemValue::FloatList(v) => Value::from(v.clone()),
        ItemValue::Str(s) => Value::from(s.as_str()),
    }
}

fn json_int(value: &Value) -> Option<i32> {
    // 旧文件中 dt 可能以浮点毫秒保存
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
        .and_then(|v| i32::try_from(v).ok())
}

fn value_from_json(ty: ItemType, value: &Value) -> Option<ItemValue> {
    if value.is_null() {
        return Some(ItemValue::Null);
    }
    match ty {
        ItemType::Bool => value.as_bool().map(ItemValue::Bool),
        ItemType::String => value.as_str().map(|s| ItemValue::Str(s.to_owned())),
        ItemType::Int => match value {
            Value::Array(items) => items
                .iter()
                .map(json_int)
                .collect::<Option<Vec<_>>>()
                .map(ItemValue::IntList),
            _ => json_int(value).map(ItemValue::Int),
        },
        ItemType::Float => match value {
            Value::Array(items) => items
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<_>>>()
                .map(ItemValue::FloatList),
            _ => value.as_f64().map(ItemValue::Float),
        },
    }
}
