//! Binary downloads (registration templates and the like).

use std::path::{Path, PathBuf};

use reqwest::Response;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};

use crate::error::ClientError;

/// A downloaded body together with the name the server suggested for it.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Download {
    pub(crate) async fn from_response(response: Response) -> Result<Self, ClientError> {
        let headers = response.headers();
        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(Self {
            filename,
            content_type,
            bytes,
        })
    }

    /// Write the body into `dir` under the server's filename, or `fallback`
    /// when the server sent none. Returns the written path.
    pub fn save_to(&self, dir: &Path, fallback: &str) -> Result<PathBuf, ClientError> {
        let name = self
            .filename
            .as_deref()
            .and_then(|n| Path::new(n).file_name())
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback);
        std::fs::create_dir_all(dir)?;
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes)?;
        tracing::info!(path = %path.display(), size = self.bytes.len(), "Saved download");
        Ok(path)
    }
}

/// Filename from a `Content-Disposition` header value. An RFC 5987
/// `filename*` parameter wins over a plain `filename`.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = raw.trim().rsplit('\'').next().unwrap_or_default();
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    if !decoded.is_empty() {
                        return Some(decoded.into_owned());
                    }
                }
            }
            "filename" => {
                let name = raw.trim().trim_matches('"');
                if !name.is_empty() {
                    plain = Some(name.to_string());
                }
            }
            _ => {}
        }
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filename() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="student_template.xlsx""#),
            Some("student_template.xlsx".to_string())
        );
    }

    #[test]
    fn test_extended_filename_wins() {
        assert_eq!(
            parse_content_disposition(
                "attachment; filename=\"template.xlsx\"; filename*=UTF-8''%E5%AD%A6%E7%94%9F%E6%A8%A1%E6%9D%BF.xlsx"
            ),
            Some("学生模板.xlsx".to_string())
        );
    }

    #[test]
    fn test_no_filename() {
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn test_save_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let download = Download {
            filename: Some("../../etc/passwd".into()),
            content_type: None,
            bytes: b"x".to_vec(),
        };
        let path = download.save_to(dir.path(), "fallback.bin").unwrap();
        assert_eq!(path, dir.path().join("passwd"));

        let download = Download {
            filename: None,
            content_type: None,
            bytes: b"y".to_vec(),
        };
        let path = download.save_to(dir.path(), "fallback.bin").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"y");
    }
}
