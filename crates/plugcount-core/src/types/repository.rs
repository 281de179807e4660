use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A plugin catalog tracked across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedRepository {
    pub name: String,
    pub remote_url: String,
    pub local_path: PathBuf,
    pub rule: EnumerationRule,
}

/// How plugin units are recognised inside a catalog's working tree.
///
/// Every variant defines an inclusion predicate. Hidden entries (names
/// starting with `.`) are never counted by any rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EnumerationRule {
    /// `<author>/<plugin>/` layout. Each subdirectory of a plugin directory
    /// is one plugin; a plugin directory with no subdirectories but at least
    /// one package file counts once.
    AuthorPackages {
        #[serde(default = "default_exclude")]
        exclude: Vec<String>,
        #[serde(default = "default_package_extension")]
        package_extension: String,
    },
    /// Each subdirectory of a listed category directory is one plugin.
    CategoryDirs {
        #[serde(default = "default_categories")]
        categories: Vec<String>,
    },
    /// Each file whose name matches `pattern` is one plugin.
    ManifestFiles {
        pattern: String,
        #[serde(default = "default_max_depth")]
        max_depth: usize,
    },
}

fn default_exclude() -> Vec<String> {
    [".git", ".github", ".assets", "logs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_package_extension() -> String {
    "difypkg".to_string()
}

fn default_categories() -> Vec<String> {
    ["agent-strategies", "extensions", "models", "tools", "migrations"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_depth() -> usize {
    3
}

impl EnumerationRule {
    /// Rule for the community catalog (`langgenius/dify-plugins`).
    pub fn community() -> Self {
        Self::AuthorPackages {
            exclude: default_exclude(),
            package_extension: default_package_extension(),
        }
    }

    /// Rule for the official catalog (`langgenius/dify-official-plugins`).
    pub fn official() -> Self {
        Self::CategoryDirs {
            categories: default_categories(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthorPackages { .. } => "author-packages",
            Self::CategoryDirs { .. } => "category-dirs",
            Self::ManifestFiles { .. } => "manifest-files",
        }
    }
}

/// Derives a working-copy directory name from a remote URL, e.g.
/// `https://github.com/langgenius/dify-plugins.git` -> `dify-plugins`.
pub fn checkout_dir_name(remote_url: &str) -> Option<String> {
    let trimmed = remote_url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_rule_with_defaults() {
        let rule: EnumerationRule = toml::from_str(r#"kind = "author-packages""#).unwrap();
        assert_eq!(rule, EnumerationRule::community());

        let rule: EnumerationRule = toml::from_str(r#"kind = "category-dirs""#).unwrap();
        assert_eq!(rule, EnumerationRule::official());
    }

    #[test]
    fn deserialize_manifest_rule() {
        let rule: EnumerationRule =
            toml::from_str("kind = \"manifest-files\"\npattern = '^manifest\\.yaml$'").unwrap();
        match rule {
            EnumerationRule::ManifestFiles { pattern, max_depth } => {
                assert_eq!(pattern, r"^manifest\.yaml$");
                assert_eq!(max_depth, 3);
            }
            other => panic!("unexpected rule: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = toml::from_str::<EnumerationRule>(r#"kind = "everything""#);
        assert!(result.is_err());
    }

    #[test]
    fn checkout_dir_name_from_urls() {
        assert_eq!(
            checkout_dir_name("https://github.com/langgenius/dify-plugins.git").as_deref(),
            Some("dify-plugins")
        );
        assert_eq!(
            checkout_dir_name("git@github.com:langgenius/dify-official-plugins.git").as_deref(),
            Some("dify-official-plugins")
        );
        assert_eq!(
            checkout_dir_name("/srv/mirrors/catalog/").as_deref(),
            Some("catalog")
        );
        assert_eq!(checkout_dir_name(""), None);
    }
}
