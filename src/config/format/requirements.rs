//! 依赖清单格式解析器 (简单原则：透明的文本解析)
//!
//! 每行一个 `name==version`，与 `pip freeze` 的输出兼容。

use crate::error::{Result, SetupError};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// 清单条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub version: String,
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// 已安装依赖的快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

/// PEP 503 名称规范化：小写，`-`/`_`/`.` 连续出现时统一为 `-`
pub fn normalize_name(name: &str) -> String {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATORS.get_or_init(|| Regex::new(r"[-_.]+").expect("静态正则"));
    re.replace_all(name.trim(), "-").to_lowercase()
}

impl Manifest {
    /// 解析清单文本
    ///
    /// 规则：
    /// - 忽略空行和以 # 开头的注释行
    /// - 忽略 `-e`/`--` 开头的选项行与 `name @ url` 形式的直接引用
    /// - 其余行必须是 `name==version`
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
                continue;
            }
            if line.contains(" @ ") {
                tracing::debug!(line, "跳过直接引用条目");
                continue;
            }

            let (name, version) = line.split_once("==").ok_or_else(|| {
                SetupError::Parse(format!("第 {} 行不是 name==version: '{}'", index + 1, line))
            })?;

            let name = name.trim();
            // 去掉环境标记，例如 `pywin32==306 ; sys_platform == "win32"`
            let version = version.split(';').next().unwrap_or("").trim();

            if name.is_empty() || version.is_empty() {
                return Err(SetupError::Parse(format!(
                    "第 {} 行缺少名称或版本: '{}'",
                    index + 1,
                    line
                )));
            }

            entries.push(ManifestEntry {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        Ok(Self { entries })
    }

    /// 序列化为清单文本（按规范化名称排序）
    pub fn serialize(&self) -> String {
        let sorted: BTreeMap<String, &ManifestEntry> = self
            .entries
            .iter()
            .map(|e| (normalize_name(&e.name), e))
            .collect();

        let mut content = String::new();
        for entry in sorted.values() {
            content.push_str(&entry.to_string());
            content.push('\n');
        }
        content
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按规范化名称查找版本
    pub fn version_of(&self, name: &str) -> Option<&str> {
        let wanted = normalize_name(name);
        self.entries
            .iter()
            .find(|e| normalize_name(&e.name) == wanted)
            .map(|e| e.version.as_str())
    }

    /// 返回清单中缺失的名称（保持输入顺序）
    pub fn missing<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|n| self.version_of(n).is_none())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Scikit_Learn"), "scikit-learn");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("a--_.b"), "a-b");
    }

    #[test]
    fn test_parse_freeze_output() {
        let content = "\
# generated
numpy==2.1.3
scikit_learn==1.5.2
pywin32==306 ; sys_platform == \"win32\"
-e git+https://example.invalid/repo.git#egg=local
mypkg @ file:///tmp/mypkg

";
        let manifest = Manifest::parse(content).unwrap();

        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.version_of("numpy"), Some("2.1.3"));
        assert_eq!(manifest.version_of("scikit-learn"), Some("1.5.2"));
        assert_eq!(manifest.version_of("pywin32"), Some("306"));
        assert_eq!(manifest.version_of("mypkg"), None);
    }

    #[test]
    fn test_parse_rejects_unpinned_line() {
        let result = Manifest::parse("numpy\n");
        assert!(matches!(result, Err(SetupError::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_empty_version() {
        let result = Manifest::parse("numpy==\n");
        assert!(matches!(result, Err(SetupError::Parse(_))));
    }

    #[test]
    fn test_serialize_sorted() {
        let manifest = Manifest::parse("pandas==2.2.3\nNLTK==3.9.1\nnumpy==2.1.3\n").unwrap();
        assert_eq!(
            manifest.serialize(),
            "NLTK==3.9.1\nnumpy==2.1.3\npandas==2.2.3\n"
        );
    }

    #[test]
    fn test_missing_names() {
        let manifest = Manifest::parse("pandas==2.2.3\n").unwrap();
        let wanted = vec!["pandas".to_string(), "nltk".to_string()];
        assert_eq!(manifest.missing(&wanted), vec!["nltk"]);
    }
}
