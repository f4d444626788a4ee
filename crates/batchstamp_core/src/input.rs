use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const EXTENSION_DDOC: &str = "ddoc";
pub const EXTENSION_BDOC: &str = "bdoc";
pub const DEFAULT_OUT_EXTENSION: &str = "asics";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeDir {
    pub path: PathBuf,
    /// When false only the top level of `path` is scanned.
    pub recursive: bool,
}

/// What a batch searches. Fixed for the lifetime of one crawl.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSpec {
    pub include: Vec<IncludeDir>,
    pub exclude: Vec<PathBuf>,
    pub file: Option<PathBuf>,
}

impl InputSpec {
    pub fn single_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn directory(path: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            include: vec![IncludeDir {
                path: path.into(),
                recursive,
            }],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.file.is_none()
    }

    /// Component-wise prefix match against the exclude list. Both sides must
    /// be spelled the same way; see [`InputSpec::with_absolute_dirs`].
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|excluded| path.starts_with(excluded))
    }

    /// Include and exclude directories rewritten with [`normalize_path`].
    pub fn with_absolute_dirs(mut self) -> Self {
        for dir in &mut self.include {
            dir.path = normalize_path(&dir.path);
        }
        for dir in &mut self.exclude {
            *dir = normalize_path(dir);
        }
        self
    }

    /// Like [`InputSpec::with_absolute_dirs`], also normalizing the single file.
    pub fn normalized(self) -> Self {
        let mut spec = self.with_absolute_dirs();
        spec.file = spec.file.as_deref().map(normalize_path);
        spec
    }
}

/// Canonical form of an existing path; absolute lexical form otherwise.
pub fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Per-batch settings handed to `Msg::Start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampOptions {
    pub time_server_url: String,
    /// Lowercase extensions without the dot.
    pub in_extensions: Vec<String>,
    pub out_extension: String,
    /// Explicit output path for single-file mode.
    pub file_out: Option<PathBuf>,
    /// Ask the presentation layer to confirm the file list before stamping.
    pub preview: bool,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            time_server_url: String::new(),
            in_extensions: vec![EXTENSION_DDOC.to_string(), EXTENSION_BDOC.to_string()],
            out_extension: DEFAULT_OUT_EXTENSION.to_string(),
            file_out: None,
            preview: false,
        }
    }
}

impl StampOptions {
    pub fn is_valid_out_extension(&self) -> bool {
        !self.out_extension.is_empty()
            && self
                .out_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    }
}

pub fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}

/// `dir/name.ddoc` becomes `dir/name.<out_extension>`; files without a known
/// input extension keep their full name and get the output extension appended.
pub fn output_path_for(input: &Path, in_extensions: &[String], out_extension: &str) -> PathBuf {
    let base = if matches_extension(input, in_extensions) {
        input.with_extension("")
    } else {
        input.to_path_buf()
    };
    let mut name = base.into_os_string();
    name.push(".");
    name.push(out_extension);
    PathBuf::from(name)
}
