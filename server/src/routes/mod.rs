//! API route handlers

pub mod analyze;
pub mod dataset;
pub mod health;
pub mod upload;

use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::error;

use crate::error::{ApiError, ApiResult};

/// A file part of a multipart body
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// First file sent under `field_name`; other parts are skipped
pub async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
) -> ApiResult<Option<UploadedFile>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        return Ok(Some(UploadedFile { file_name, bytes }));
    }
    Ok(None)
}

/// Run filesystem or model work on the blocking pool
///
/// Library errors map through `ApiError::from_library` with `fallback` as the
/// message for server-side failures.
pub async fn run_blocking<T, F>(fallback: &'static str, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> tumorscan::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            error!("{}: worker failed: {}", fallback, e);
            ApiError::internal(fallback)
        })?
        .map_err(|e| ApiError::from_library(e, fallback))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for building requests in route tests

    use axum::body::Body;
    use axum::http::{header, Request};

    pub const BOUNDARY: &str = "tumorscan-test-boundary";

    /// A multipart part: (field name, optional file name, content)
    pub type Part<'a> = (&'a str, Option<&'a str>, Vec<u8>);

    pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    pub fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
        use std::io::Cursor;
        use image::{ImageFormat, Rgb, RgbImage};

        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = shade.wrapping_add(((x * 3 + y) % 40) as u8);
            Rgb([v, v, v])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }
}
