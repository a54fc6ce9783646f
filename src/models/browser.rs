use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// 浏览器类型枚举
///
/// - `SkyvernDefault`: 默认内置浏览器
/// - `LocalCustom`: 用户指定路径的本地Chrome
/// - `AdsPower`: AdsPower防关联浏览器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowserType {
    #[default]
    SkyvernDefault,
    LocalCustom,
    #[serde(rename = "adspower")]
    AdsPower,
}

impl std::fmt::Display for BrowserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserType::SkyvernDefault => write!(f, "skyvern_default"),
            BrowserType::LocalCustom => write!(f, "local_custom"),
            BrowserType::AdsPower => write!(f, "adspower"),
        }
    }
}

impl std::str::FromStr for BrowserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skyvern_default" => Ok(BrowserType::SkyvernDefault),
            "local_custom" | "local-custom" => Ok(BrowserType::LocalCustom),
            "adspower" => Ok(BrowserType::AdsPower),
            _ => Err(format!("Invalid browser type: {}", s)),
        }
    }
}

/// 浏览器配置模型，统一描述三种浏览器的选择参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowserConfig {
    /// 浏览器类型
    #[serde(rename = "type", default)]
    pub browser_type: BrowserType,
    /// 本地Chrome可执行文件路径，仅 local_custom 使用
    #[serde(default)]
    pub chrome_path: Option<String>,
    /// Chrome启动参数
    #[serde(default)]
    pub chrome_args: Option<Vec<String>>,
    /// AdsPower浏览器用户ID，仅 adspower 使用
    #[serde(default)]
    pub adspower_user_id: Option<String>,
    /// AdsPower浏览器分组ID
    #[serde(default)]
    pub adspower_group_id: Option<String>,
}

impl BrowserConfig {
    pub fn local_custom<T: Into<String>>(chrome_path: T) -> Self {
        Self {
            browser_type: BrowserType::LocalCustom,
            chrome_path: Some(chrome_path.into()),
            ..Default::default()
        }
    }

    pub fn adspower<T: Into<String>>(user_id: T) -> Self {
        Self {
            browser_type: BrowserType::AdsPower,
            adspower_user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// 检查当前类型所需的字段是否齐全
    pub fn validate(&self) -> AppResult<()> {
        match self.browser_type {
            BrowserType::SkyvernDefault => Ok(()),
            BrowserType::LocalCustom => match self.chrome_path.as_deref().map(str::trim) {
                Some(path) if !path.is_empty() => Ok(()),
                _ => Err(AppError::validation(
                    "本地自定义Chrome模式需要提供有效的chrome_path",
                )),
            },
            BrowserType::AdsPower => match self.adspower_user_id.as_deref().map(str::trim) {
                Some(user_id) if !user_id.is_empty() => Ok(()),
                _ => Err(AppError::validation(
                    "AdsPower模式需要提供有效的adspower_user_id",
                )),
            },
        }
    }
}

/// AdsPower浏览器信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserInfo {
    /// 浏览器用户ID
    #[serde(default)]
    pub user_id: String,
    /// 浏览器名称
    #[serde(default)]
    pub name: String,
    /// 浏览器序列号（AdsPower可能返回数字）
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    pub serial_number: String,
    /// 备注信息
    #[serde(default)]
    pub remark: Option<String>,
    /// 分组ID
    #[serde(default)]
    pub group_id: Option<String>,
    /// 浏览器状态：Active/Inactive
    #[serde(default = "default_browser_status")]
    pub status: String,
}

fn default_browser_status() -> String {
    "Unknown".to_string()
}

fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StringOrNumberVisitor;

    impl<'de> Visitor<'de> for StringOrNumberVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            // 整数值的浮点数按整数输出，避免出现 "12.0"
            if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
                Ok(format!("{}", value as i64))
            } else {
                Ok(value.to_string())
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

/// 远端服务状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// 服务是否可用
    pub available: bool,
    /// 状态信息
    pub message: String,
    /// 可用浏览器列表
    #[serde(default)]
    pub browsers: Vec<BrowserInfo>,
}

impl ServiceStatus {
    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        Self {
            available: false,
            message: message.into(),
            browsers: Vec::new(),
        }
    }

    /// 按用户ID查找浏览器
    pub fn find_browser(&self, user_id: &str) -> Option<&BrowserInfo> {
        self.browsers.iter().find(|b| b.user_id == user_id)
    }
}
