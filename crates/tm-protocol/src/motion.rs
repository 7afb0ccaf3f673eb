//! 运动指令与脚本函数格式化
//!
//! 生成 Listen Node 可执行的 TMscript 文本行，由 `CommandChannel` 打包发送。
//! 位姿是不透明的 6 元组（笛卡尔坐标或关节角），本模块不做任何运动学解释。
//!
//! 每种运动指令有一份固定的 [`MotionProfile`]：允许的数据格式、默认参数、
//! 以及是否带精确定位 / 圆弧角参数。调用方通过 [`MotionOptions`] 覆盖默认值。

use crate::item::ItemValue;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 位姿：`(x, y, z, rx, ry, rz)` 或 `(J1..J6)`
pub type Pose = [f64; 6];

/// 运动指令格式化错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    #[error("Data format {format} is not supported by {command} (expected one of {supported})")]
    UnsupportedDataFormat {
        command: &'static str,
        format: DataFormat,
        supported: String,
    },

    #[error("Option {option} is not supported by {command}")]
    UnsupportedOption {
        command: &'static str,
        option: &'static str,
    },

    #[error("Unknown data format: {0}")]
    UnknownDataFormat(String),

    #[error("{command} requires at least one pose")]
    EmptyPath { command: &'static str },

    #[error("Circle takes a mid point and an end point, use format_circle()")]
    CircleArity,
}

/// 三字母数据格式代码
///
/// - 第 1 位：坐标（`J` 关节角、`C` 当前基座标系、`T` 当前工具坐标系）
/// - 第 2 位：速度（`P` 百分比、`A` 受项目速度影响的 mm/s、`D` 不受影响的 mm/s）
/// - 第 3 位：融合（`P` 百分比、`R` 半径 mm）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataFormat {
    Jpp,
    Cpp,
    Tpp,
    Cap,
    Tap,
    Jap,
    Car,
    Cdp,
    Cdr,
    Jdp,
}

impl DataFormat {
    /// 脚本中的代码（大写）
    pub fn code(self) -> &'static str {
        match self {
            DataFormat::Jpp => "JPP",
            DataFormat::Cpp => "CPP",
            DataFormat::Tpp => "TPP",
            DataFormat::Cap => "CAP",
            DataFormat::Tap => "TAP",
            DataFormat::Jap => "JAP",
            DataFormat::Car => "CAR",
            DataFormat::Cdp => "CDP",
            DataFormat::Cdr => "CDR",
            DataFormat::Jdp => "JDP",
        }
    }

    /// 人类可读说明
    pub fn describe(self) -> String {
        let code = self.code().as_bytes();
        let coordinate = match code[0] {
            b'J' => "joint angles",
            b'T' => "tool frame coordinates",
            _ => "current base frame coordinates",
        };
        let speed = match code[1] {
            b'P' => "percentage",
            b'A' => "velocity in mm/s (scaled by project speed)",
            _ => "velocity in mm/s (not scaled by project speed)",
        };
        let blending = match code[2] {
            b'P' => "percentage",
            _ => "radius in mm",
        };
        format!(
            "poses as {}, speed as {}, blending as {}",
            coordinate, speed, blending
        )
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DataFormat {
    type Err = MotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JPP" => Ok(DataFormat::Jpp),
            "CPP" => Ok(DataFormat::Cpp),
            "TPP" => Ok(DataFormat::Tpp),
            "CAP" => Ok(DataFormat::Cap),
            "TAP" => Ok(DataFormat::Tap),
            "JAP" => Ok(DataFormat::Jap),
            "CAR" => Ok(DataFormat::Car),
            "CDP" => Ok(DataFormat::Cdp),
            "CDR" => Ok(DataFormat::Cdr),
            "JDP" => Ok(DataFormat::Jdp),
            _ => Err(MotionError::UnknownDataFormat(s.to_owned())),
        }
    }
}

/// 运动指令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionKind {
    Ptp,
    Line,
    PLine,
    Circle,
    MovePtp,
    MoveLine,
    MovePLine,
}

/// 运动指令的固定参数表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionProfile {
    /// 脚本函数名
    pub command: &'static str,
    pub data_formats: &'static [DataFormat],
    pub default_format: DataFormat,
    pub default_blending: u32,
    pub default_time_acc: u32,
    /// 是否带精确定位参数
    pub has_precision: bool,
    /// 是否带圆弧角参数
    pub has_arc_angle: bool,
}

const DEFAULT_BLENDING: u32 = 100;
const DEFAULT_TIME_ACC: u32 = 200;

const PTP: MotionProfile = MotionProfile {
    command: "PTP",
    data_formats: &[DataFormat::Jpp, DataFormat::Cpp],
    default_format: DataFormat::Cpp,
    default_blending: DEFAULT_BLENDING,
    default_time_acc: DEFAULT_TIME_ACC,
    has_precision: true,
    has_arc_angle: false,
};

const LINE: MotionProfile = MotionProfile {
    command: "Line",
    data_formats: &[
        DataFormat::Cpp,
        DataFormat::Cdp,
        DataFormat::Cap,
        DataFormat::Car,
        DataFormat::Cdr,
    ],
    default_format: DataFormat::Cap,
    ..PTP
};

const PLINE: MotionProfile = MotionProfile {
    command: "PLine",
    data_formats: &[DataFormat::Cap, DataFormat::Cdp, DataFormat::Jap, DataFormat::Jdp],
    default_format: DataFormat::Cap,
    default_blending: 5,
    has_precision: false,
    ..PTP
};

const CIRCLE: MotionProfile = MotionProfile {
    command: "Circle",
    data_formats: &[DataFormat::Cpp, DataFormat::Cap, DataFormat::Cdp],
    default_format: DataFormat::Cap,
    has_arc_angle: true,
    ..PTP
};

const MOVE_PTP: MotionProfile = MotionProfile {
    command: "Move_PTP",
    data_formats: &[DataFormat::Cpp, DataFormat::Tpp, DataFormat::Jpp],
    ..PTP
};

const MOVE_LINE: MotionProfile = MotionProfile {
    command: "Move_Line",
    data_formats: &[DataFormat::Cap, DataFormat::Tap, DataFormat::Jap],
    default_format: DataFormat::Cap,
    ..PTP
};

const MOVE_PLINE: MotionProfile = MotionProfile {
    command: "Move_PLine",
    has_precision: false,
    ..MOVE_LINE
};

impl MotionKind {
    pub const ALL: [MotionKind; 7] = [
        MotionKind::Ptp,
        MotionKind::Line,
        MotionKind::PLine,
        MotionKind::Circle,
        MotionKind::MovePtp,
        MotionKind::MoveLine,
        MotionKind::MovePLine,
    ];

    pub fn profile(self) -> &'static MotionProfile {
        match self {
            MotionKind::Ptp => &PTP,
            MotionKind::Line => &LINE,
            MotionKind::PLine => &PLINE,
            MotionKind::Circle => &CIRCLE,
            MotionKind::MovePtp => &MOVE_PTP,
            MotionKind::MoveLine => &MOVE_LINE,
            MotionKind::MovePLine => &MOVE_PLINE,
        }
    }
}

/// 运动参数覆盖项（`None` 使用指令默认值）
///
/// # Example
///
/// ```
/// use tm_protocol::{DataFormat, MotionKind, MotionOptions, format_motion};
///
/// let options = MotionOptions::new()
///     .data_format(DataFormat::Jpp)
///     .blending(50);
/// let lines = format_motion(MotionKind::Ptp, &[[0.0, 0.0, 90.0, 0.0, 90.0, 0.0]], 20.0, &options).unwrap();
/// assert_eq!(lines, vec!["PTP(JPP,0,0,90,0,90,0,20,200,50,true)"]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionOptions {
    pub data_format: Option<DataFormat>,
    pub blending: Option<u32>,
    pub time_acc: Option<u32>,
    pub precision_positioning: Option<bool>,
    pub arc_angle: Option<i32>,
}

impl MotionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_format(mut self, format: DataFormat) -> Self {
        self.data_format = Some(format);
        self
    }

    pub fn blending(mut self, blending: u32) -> Self {
        self.blending = Some(blending);
        self
    }

    pub fn time_acc(mut self, time_acc: u32) -> Self {
        self.time_acc = Some(time_acc);
        self
    }

    pub fn precision_positioning(mut self, enabled: bool) -> Self {
        self.precision_positioning = Some(enabled);
        self
    }

    pub fn arc_angle(mut self, angle: i32) -> Self {
        self.arc_angle = Some(angle);
        self
    }

    /// 按指令参数表校验并填充默认值
    pub fn resolve(&self, kind: MotionKind) -> Result<ResolvedOptions, MotionError> {
        let profile = kind.profile();
        let data_format = self.data_format.unwrap_or(profile.default_format);
        if !profile.data_formats.contains(&data_format) {
            return Err(MotionError::UnsupportedDataFormat {
                command: profile.command,
                format: data_format,
                supported: profile
                    .data_formats
                    .iter()
                    .map(|f| f.code())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        if self.precision_positioning.is_some() && !profile.has_precision {
            return Err(MotionError::UnsupportedOption {
                command: profile.command,
                option: "precision_positioning",
            });
        }
        if self.arc_angle.is_some() && !profile.has_arc_angle {
            return Err(MotionError::UnsupportedOption {
                command: profile.command,
                option: "arc_angle",
            });
        }

        Ok(ResolvedOptions {
            data_format,
            blending: self.blending.unwrap_or(profile.default_blending),
            time_acc: self.time_acc.unwrap_or(profile.default_time_acc),
            precision_positioning: self.precision_positioning.unwrap_or(true),
            arc_angle: self.arc_angle.unwrap_or(0),
        })
    }
}

/// 填充默认值后的运动参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOptions {
    pub data_format: DataFormat,
    pub blending: u32,
    pub time_acc: u32,
    pub precision_positioning: bool,
    pub arc_angle: i32,
}

fn pose_str(pose: &Pose) -> String {
    pose.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// 为每个位姿生成一行运动指令
///
/// `speed` 的单位由数据格式的第二位决定（百分比或 mm/s）。
pub fn format_motion(
    kind: MotionKind,
    poses: &[Pose],
    speed: f64,
    options: &MotionOptions,
) -> Result<Vec<String>, MotionError> {
    if kind == MotionKind::Circle {
        return Err(MotionError::CircleArity);
    }
    let profile = kind.profile();
    if poses.is_empty() {
        return Err(MotionError::EmptyPath {
            command: profile.command,
        });
    }
    let o = options.resolve(kind)?;

    Ok(poses
        .iter()
        .map(|pose| {
            let mut line = format!(
                "{}({},{},{},{},{}",
                profile.command,
                o.data_format,
                pose_str(pose),
                speed,
                o.time_acc,
                o.blending
            );
            if profile.has_precision {
                line.push_str(&format!(",{}", o.precision_positioning));
            }
            line.push(')');
            line
        })
        .collect())
}

/// 圆弧运动：经过 `mid`，终止于 `end`
pub fn format_circle(
    mid: &Pose,
    end: &Pose,
    speed: f64,
    options: &MotionOptions,
) -> Result<String, MotionError> {
    let o = options.resolve(MotionKind::Circle)?;
    Ok(format!(
        "Circle({},{},{},{},{},{},{},{})",
        o.data_format,
        pose_str(mid),
        pose_str(end),
        speed,
        o.time_acc,
        o.blending,
        o.arc_angle,
        o.precision_positioning
    ))
}

/// 设置队列标签；`wait` 为 1 时阻塞到标签完成
pub fn queue_tag(tag: u8, wait: u8) -> String {
    format!("QueueTag({}, {})", tag, wait)
}

/// 等待队列标签完成；`None` 等待全部标签
pub fn wait_queue_tag(tag: Option<u8>) -> String {
    match tag {
        Some(tag) => format!("WaitQueueTag({})", tag),
        None => "WaitQueueTag()".to_owned(),
    }
}

/// 停止运动并清空缓冲区
///
/// 模式：0 停止并清空缓冲区，1 停止并继续下一个脚本，2 停止并清空全部脚本。
pub fn stop_and_clear_buffer(mode: Option<u8>) -> String {
    match mode {
        Some(mode) => format!("StopAndClearBuffer({})", mode),
        None => "StopAndClearBuffer()".to_owned(),
    }
}

pub fn pause() -> String {
    "Pause()".to_owned()
}

pub fn resume() -> String {
    "Resume()".to_owned()
}

/// 退出 Listen Node；0 走失败分支，1 走成功分支
pub fn script_exit(mode: Option<u8>) -> String {
    match mode {
        Some(mode) => format!("ScriptExit({})", mode),
        None => "ScriptExit()".to_owned(),
    }
}

pub fn wait_for(millis: u32) -> String {
    format!("WaitFor({})", millis)
}

/// 通过脚本写入 Ethernet Slave 条目
pub fn svr_write(item: &str, value: &ItemValue) -> String {
    format!("svr_write({},{})", item, value)
}
