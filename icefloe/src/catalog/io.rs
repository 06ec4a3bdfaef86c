use std::collections::HashMap;
use std::ops::Range;

use opendal::{Operator, Scheme};
use url::Url;

use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Operator args: root
pub const OP_ARGS_ROOT: &str = "root";
/// Operator args: bucket
pub const OP_ARGS_BUCKET: &str = "bucket";
/// s3 endpoint
pub const OP_ARGS_ENDPOINT: &str = "endpoint";
/// s3 region
pub const OP_ARGS_REGION: &str = "region";
/// s3 access key
pub const OP_ARGS_ACCESS_KEY: &str = "access_key_id";
/// s3 access secret
pub const OP_ARGS_ACCESS_SECRET: &str = "secret_access_key";

/// Args for creating opendal operator
#[derive(Debug, Clone)]
pub struct OperatorArgs {
    scheme: Scheme,
    args: HashMap<String, String>,
}

impl OperatorArgs {
    /// Create a builder with `Scheme`
    pub fn builder(scheme: Scheme) -> OperatorArgsBuilder {
        OperatorArgsBuilder(OperatorArgs {
            scheme,
            args: HashMap::new(),
        })
    }

    /// Creates a builder from a warehouse path.
    ///
    /// Supported forms are a local path (`/tmp/wh`), `file://`, `memory://`
    /// and `s3://`.
    pub fn builder_from_path(path: &str) -> Result<OperatorArgsBuilder> {
        if path.starts_with('/') {
            return Ok(OperatorArgs::builder(Scheme::Fs).with_arg(OP_ARGS_ROOT, path));
        }

        let url = Url::parse(path).map_err(|e| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Invalid warehouse path: {path}"),
            )
            .set_source(e)
        })?;

        let op = match url.scheme() {
            "file" => {
                OperatorArgs::builder(Scheme::Fs).with_arg(OP_ARGS_ROOT, url.path().to_string())
            }
            "memory" => OperatorArgs::builder(Scheme::Memory).with_arg(
                OP_ARGS_ROOT,
                format!("/{}{}", url.host_str().unwrap_or_default(), url.path()),
            ),
            "s3" | "s3a" => OperatorArgs::builder(Scheme::S3)
                .with_arg(OP_ARGS_ROOT, url.path().to_string())
                .with_arg(
                    OP_ARGS_BUCKET,
                    url.host_str()
                        .ok_or_else(|| {
                            Error::new(ErrorKind::DataInvalid, format!("Invalid s3 url: {path}"))
                        })?
                        .to_string(),
                ),
            _ => {
                return Err(Error::new(
                    ErrorKind::FeatureUnsupported,
                    format!("Unsupported warehouse path: {path}"),
                ));
            }
        };

        Ok(op)
    }
}

/// Operator args builder.
pub struct OperatorArgsBuilder(OperatorArgs);

impl OperatorArgsBuilder {
    /// Add arg.
    pub fn with_arg(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.0.args.insert(key.to_string(), value.to_string());
        self
    }

    /// Add all args
    pub fn with_args(mut self, args: impl Iterator<Item = (impl ToString, impl ToString)>) -> Self {
        self.0
            .args
            .extend(args.map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    /// Build arg.
    pub fn build(self) -> OperatorArgs {
        self.0
    }
}

impl TryFrom<&OperatorArgs> for Operator {
    type Error = Error;

    fn try_from(args: &OperatorArgs) -> Result<Self> {
        Ok(Operator::via_map(args.scheme, args.args.clone())?)
    }
}

/// File access of a warehouse.
///
/// Metadata always records absolute locations such as
/// `memory://wh/db/t/metadata/00001-<uuid>.metadata.json`. `FileIO` maps
/// them onto an operator rooted at the warehouse.
///
/// Cloning is cheap and clones share the same storage, which matters for the
/// memory backend: two operators built from the same args don't see each
/// other's files.
#[derive(Clone, Debug)]
pub struct FileIO {
    op: Operator,
    root: String,
}

impl FileIO {
    /// Create file io for a warehouse path, see
    /// [`OperatorArgs::builder_from_path`].
    pub fn from_path(warehouse: &str) -> Result<Self> {
        let args = OperatorArgs::builder_from_path(warehouse)?.build();
        Ok(Self::new(Operator::try_from(&args)?, warehouse))
    }

    /// Wrap an operator whose root is the location `root`.
    pub fn new(op: Operator, root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            op,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// Location of the warehouse.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Underlying operator.
    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Absolute location of `path`, relative to the warehouse.
    pub fn absolute_path(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    /// Path relative to the warehouse of the absolute location `path`.
    pub fn relative_path<'a>(&self, path: &'a str) -> Result<&'a str> {
        path.strip_prefix(self.root.as_str())
            .and_then(|p| p.strip_prefix('/'))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Location {path} is not under warehouse {}", self.root),
                )
            })
    }

    /// Read a whole file.
    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.op.read(self.relative_path(path)?).await?)
    }

    /// Read the byte `range` of a file.
    pub async fn read_range(&self, path: &str, range: Range<u64>) -> Result<Vec<u8>> {
        Ok(self
            .op
            .read_with(self.relative_path(path)?)
            .range(range)
            .await?)
    }

    /// Length in bytes of a file.
    pub async fn file_length(&self, path: &str) -> Result<u64> {
        Ok(self
            .op
            .stat(self.relative_path(path)?)
            .await?
            .content_length())
    }

    /// Whether a file exists.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.op.is_exist(self.relative_path(path)?).await?)
    }

    /// Write a whole file, replacing any previous content.
    pub async fn write(&self, path: &str, bs: Vec<u8>) -> Result<()> {
        Ok(self.op.write(self.relative_path(path)?, bs).await?)
    }

    /// Delete a file, deleting a missing file succeeds.
    pub async fn delete(&self, path: &str) -> Result<()> {
        Ok(self.op.delete(self.relative_path(path)?).await?)
    }

    /// Delete everything under the directory `path`.
    pub async fn delete_dir(&self, path: &str) -> Result<()> {
        let dir = format!("{}/", self.relative_path(path)?.trim_end_matches('/'));
        Ok(self.op.remove_all(&dir).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_from_path() {
        assert!(OperatorArgs::builder_from_path("/tmp/wh").is_ok());
        assert!(OperatorArgs::builder_from_path("file:///tmp/wh").is_ok());
        assert!(OperatorArgs::builder_from_path("memory://wh").is_ok());
        assert!(OperatorArgs::builder_from_path("s3://bucket/wh").is_ok());
        assert_eq!(
            OperatorArgs::builder_from_path("hdfs://nn/wh")
                .err()
                .map(|e| e.kind()),
            Some(ErrorKind::FeatureUnsupported)
        );
    }

    #[test]
    fn test_paths() {
        let io = FileIO::from_path("memory://wh/").unwrap();
        assert_eq!(io.root(), "memory://wh");
        assert_eq!(io.absolute_path("db/t"), "memory://wh/db/t");
        assert_eq!(io.relative_path("memory://wh/db/t").unwrap(), "db/t");
        assert!(io.relative_path("memory://other/db/t").is_err());
    }

    #[tokio::test]
    async fn test_read_write() {
        let io = FileIO::from_path("memory://wh").unwrap();
        let path = io.absolute_path("db/t/metadata/a.json");
        io.write(&path, b"hello world".to_vec()).await.unwrap();

        let shared = io.clone();
        assert!(shared.exists(&path).await.unwrap());
        assert_eq!(shared.file_length(&path).await.unwrap(), 11);
        assert_eq!(shared.read_range(&path, 6..11).await.unwrap(), b"world");

        io.delete_dir(&io.absolute_path("db/t")).await.unwrap();
        assert!(!shared.exists(&path).await.unwrap());
    }
}
