use serde::{Deserialize, Serialize};

const PE_MAGIC: [u8; 2] = [0x4D, 0x5A]; // "MZ"
const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const MACH_O_MAGICS: [[u8; 4]; 5] = [
    [0xFE, 0xED, 0xFA, 0xCE], // 32位
    [0xFE, 0xED, 0xFA, 0xCF], // 64位
    [0xCE, 0xFA, 0xED, 0xFE], // 32位小端
    [0xCF, 0xFA, 0xED, 0xFE], // 64位小端
    [0xCA, 0xFE, 0xBA, 0xBE], // Universal
];

/// 可执行文件的目标平台
///
/// 每个平台决定扩展名规则和文件头签名；没有已知签名的平台
/// 不做文件头判断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutablePlatform {
    Windows,
    Linux,
    MacOs,
    Unknown,
}

impl ExecutablePlatform {
    /// 当前编译目标对应的平台
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            ExecutablePlatform::Windows
        } else if cfg!(target_os = "macos") {
            ExecutablePlatform::MacOs
        } else if cfg!(target_os = "linux") {
            ExecutablePlatform::Linux
        } else {
            ExecutablePlatform::Unknown
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExecutablePlatform::Windows => "Windows PE",
            ExecutablePlatform::Linux => "Linux ELF",
            ExecutablePlatform::MacOs => "macOS Mach-O",
            ExecutablePlatform::Unknown => "未知平台",
        }
    }

    /// 扩展名是否符合平台习惯；返回 None 表示该平台不做扩展名判断
    pub fn extension_matches(&self, extension: Option<&str>) -> Option<bool> {
        match self {
            ExecutablePlatform::Windows => {
                Some(extension.is_some_and(|ext| ext.eq_ignore_ascii_case("exe")))
            }
            ExecutablePlatform::Linux | ExecutablePlatform::MacOs => {
                Some(extension.is_none_or(str::is_empty))
            }
            ExecutablePlatform::Unknown => None,
        }
    }

    /// 文件头是否为平台可执行格式；返回 None 表示该平台没有已知签名
    pub fn signature_matches(&self, header: &[u8]) -> Option<bool> {
        match self {
            ExecutablePlatform::Windows => Some(header.starts_with(&PE_MAGIC)),
            ExecutablePlatform::Linux => Some(header.starts_with(&ELF_MAGIC)),
            ExecutablePlatform::MacOs => {
                Some(MACH_O_MAGICS.iter().any(|magic| header.starts_with(magic)))
            }
            ExecutablePlatform::Unknown => None,
        }
    }

    /// 扩展名不符合时的修复建议
    pub fn extension_hint(&self) -> &'static str {
        match self {
            ExecutablePlatform::Windows => {
                "Windows下浏览器可执行文件应以 .exe 结尾，例如 C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe"
            }
            ExecutablePlatform::MacOs => {
                "macOS下请选择 .app 包内的二进制文件，例如 /Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
            }
            _ => {
                "可执行文件通常没有扩展名，请确认选择的是浏览器二进制而非脚本或快捷方式，例如 /usr/bin/google-chrome"
            }
        }
    }
}

/// 识别文件头对应的类型描述，用于诊断信息
pub fn describe_header(header: &[u8]) -> String {
    if header.is_empty() {
        return "空文件".to_string();
    }

    if let Some(kind) = infer::get(header) {
        return kind.mime_type().to_string();
    }

    if header.starts_with(&PE_MAGIC) {
        "application/x-msdownload".to_string()
    } else if header.starts_with(&ELF_MAGIC) {
        "application/x-executable".to_string()
    } else if header.starts_with(b"#!") {
        "text/x-shellscript".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}
