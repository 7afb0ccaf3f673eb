//! 状态表
//!
//! 后台读线程写入、前台调用者读取的共享条目表。
//! 所有访问都经过同一把 `parking_lot::Mutex`，数据表文件的写入也在持锁期间完成，
//! 因此同一会话内不会出现交错的写文件操作。

use crate::error::DriverError;
use crate::schema::*;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tm_protocol::{ItemType, ItemValue, ProtocolError, SvrPayload, decode_item};
use tracing::{trace, warn};

/// `Current_Time` 的时间戳格式
pub const CURRENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// 单帧应用结果
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// 成功更新的条目数
    pub applied: usize,
    /// 数据表中没有的条目（被跳过）
    pub unknown: SmallVec<[String; 2]>,
    /// 解码失败的条目（值保持不变）
    pub errors: SmallVec<[(String, ProtocolError); 2]>,
}

#[derive(Debug)]
struct TableInner {
    entries: Schema,
    store: Option<SchemaStore>,
}

/// 条目名 → (类型, 最近值) 的共享表
#[derive(Debug)]
pub struct StateTable {
    inner: Mutex<TableInner>,
}

impl StateTable {
    /// `store` 为 `None` 时只在内存中维护（不持久化）
    pub fn new(entries: Schema, store: Option<SchemaStore>) -> Self {
        Self {
            inner: Mutex::new(TableInner { entries, store }),
        }
    }

    /// 仅包含内置条目的内存表
    pub fn in_memory() -> Self {
        Self::new(builtin_entries(), None)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ItemValue> {
        self.inner.lock().entries.get(name).map(|e| e.value.clone())
    }

    pub fn item_type(&self, name: &str) -> Option<ItemType> {
        self.inner.lock().entries.get(name).map(|e| e.ty)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// 整表拷贝
    pub fn snapshot(&self) -> Schema {
        self.inner.lock().entries.clone()
    }

    /// 一次加锁读取多个条目（缺失的条目为 `Null`）
    pub fn values(&self, names: &[String]) -> Vec<ItemValue> {
        let inner = self.inner.lock();
        names
            .iter()
            .map(|name| {
                inner
                    .entries
                    .get(name)
                    .map(|e| e.value.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    fn pose(&self, name: &str) -> Option<[f64; 6]> {
        let list = self.get(name)?.as_f64_list()?;
        list.try_into().ok()
    }

    /// 关节角（6 轴），未收到数据时为 `None`
    pub fn joint_angle(&self) -> Option<[f64; 6]> {
        self.pose(ITEM_JOINT_ANGLE)
    }

    /// 基座标系下的工具位姿
    pub fn coord_base_tool(&self) -> Option<[f64; 6]> {
        self.pose(ITEM_COORD_BASE_TOOL)
    }

    pub fn robot_link(&self) -> Option<bool> {
        self.get(ITEM_ROBOT_LINK)?.as_bool()
    }

    pub fn current_time(&self) -> Option<String> {
        self.get(ITEM_CURRENT_TIME)?.as_str().map(str::to_owned)
    }

    /// 最近两次 `Current_Time` 的毫秒差
    pub fn dt_ms(&self) -> Option<i32> {
        match self.get(ITEM_DT)? {
            ItemValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// 数据表中没有的条目名及其值长度
    pub fn unknown_items<'a>(&self, payload: &'a SvrPayload) -> Vec<(&'a str, usize)> {
        let inner = self.inner.lock();
        payload
            .item_sizes()
            .filter(|(name, _)| !inner.entries.contains_key(*name))
            .collect()
    }

    /// 批量加入新条目并持久化一次
    ///
    /// 已存在的条目保持不变（条目只增不减）。
    pub fn add_items(&self, items: &[(String, ItemType)]) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        let mut added = false;
        for (name, ty) in items {
            if !inner.entries.contains_key(name) {
                inner.entries.insert(name.clone(), SchemaEntry::empty(*ty));
                added = true;
            }
        }
        if added && let Some(store) = &inner.store {
            store.save(&inner.entries)?;
        }
        Ok(())
    }

    /// 将当前内容写回数据表文件
    pub fn persist(&self) -> Result<(), DriverError> {
        let inner = self.inner.lock();
        match &inner.store {
            Some(store) => store.save(&inner.entries),
            None => Ok(()),
        }
    }

    /// 按声明类型解码并更新条目
    ///
    /// 未知条目与解码失败的条目不会中断整帧处理，结果记录在返回值中。
    pub fn apply(&self, payload: &SvrPayload) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut inner = self.inner.lock();

        for item in &payload.items {
            let Some(ty) = inner.entries.get(&item.name).map(|e| e.ty) else {
                report.unknown.push(item.name.clone());
                continue;
            };
            let value = match decode_item(&item.name, ty, &item.value) {
                Ok(value) => value,
                Err(e) => {
                    report.errors.push((item.name.clone(), e));
                    continue;
                },
            };

            if item.name == ITEM_CURRENT_TIME
                && let ItemValue::Str(now) = &value
            {
                let previous = inner.entries.get(ITEM_CURRENT_TIME).and_then(|e| e.value.as_str());
                let dt = previous.map(|prev| time_delta_ms(prev, now)).unwrap_or(0);
                trace!("Current_Time {} (dt = {} ms)", now, dt);
                inner
                    .entries
                    .entry(ITEM_DT.to_owned())
                    .or_insert_with(|| SchemaEntry::empty(ItemType::Int))
                    .value = ItemValue::Int(dt);
            }

            if let Some(entry) = inner.entries.get_mut(&item.name) {
                entry.value = value;
                report.applied += 1;
            }
        }
        report
    }
}

/// 两个时间戳之间的毫秒差，亚毫秒部分四舍五入；解析失败或时间未前进时为 0
pub fn time_delta_ms(previous: &str, current: &str) -> i32 {
    let parse = |s: &str| NaiveDateTime::parse_from_str(s, CURRENT_TIME_FORMAT);
    match (parse(previous), parse(current)) {
        (Ok(prev), Ok(now)) => {
            let delta = now - prev;
            // 微秒溢出只会出现在相隔极久的时间戳上，此时退回截断
            let ms = delta
                .num_microseconds()
                .map(|us| (us + 500).div_euclid(1000))
                .unwrap_or_else(|| delta.num_milliseconds());
            ms.clamp(0, i32::MAX as i64) as i32
        },
        (_, Err(e)) => {
            warn!("Unparseable Current_Time '{}': {}", current, e);
            0
        },
        (Err(_), _) => 0,
    }
}
