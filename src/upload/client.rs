use super::types::{
    ConflictDirective, ExistenceAnswer, LaunchpadCheck, MessageBody, SelectedFile, UploadReply,
};
use crate::error::{ErrorContext, UploaderError};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Url};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// HTTP client for the collect server endpoints.
#[derive(Clone)]
pub struct CollectClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CollectClient {
    pub fn new(server_url: &str) -> Result<Self, UploaderError> {
        let trimmed = server_url.trim();
        if trimmed.is_empty() {
            return Err(UploaderError::Config("Server URL is empty".to_string()));
        }
        // join() replaces the last path segment unless the base ends in '/'
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| UploaderError::Config(format!("Invalid server URL {}: {}", trimmed, e)))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("launchpad-uploader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UploaderError> {
        self.base_url
            .join(path)
            .map_err(|e| UploaderError::Config(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// `<server>/launchpad/<id>`, the page listing files under a launchpad.
    pub fn launchpad_page(&self, launchpad_id: &str) -> Result<Url, UploaderError> {
        self.with_segment("launchpad/", launchpad_id)
    }

    fn with_segment(&self, path: &str, segment: &str) -> Result<Url, UploaderError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| UploaderError::Config("Server URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    pub async fn check_launchpad(&self, launchpad_id: &str) -> Result<LaunchpadCheck, UploaderError> {
        let url = self.with_segment("check_launchpad/", launchpad_id)?;
        debug!(%url, "Checking launchpad");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 200 {
            Ok(LaunchpadCheck::Resolved(body))
        } else {
            debug!(status = status.as_u16(), "Launchpad rejected");
            Ok(LaunchpadCheck::Rejected(body))
        }
    }

    pub async fn file_exists(
        &self,
        launchpad_id: &str,
        file_name: &str,
    ) -> Result<ExistenceAnswer, UploaderError> {
        let url = self.endpoint("file_exists/")?;
        let body = self
            .http
            .get(url)
            .query(&[("launchpad_id", launchpad_id), ("file_name", file_name)])
            .send()
            .await?
            .text()
            .await?;

        Ok(ExistenceAnswer::from_body(&body))
    }

    /// Streams `file` as the multipart field `file`. `on_progress(loaded, total)` fires
    /// whenever the whole-percent value changes, and always for the final chunk.
    pub async fn upload<F>(
        &self,
        launchpad_id: &str,
        file: &SelectedFile,
        directive: Option<ConflictDirective>,
        on_progress: F,
    ) -> Result<UploadReply, UploaderError>
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        let mut url = self.endpoint("upload/")?;
        url.query_pairs_mut().append_pair("launchpad_id", launchpad_id);
        if let Some(directive) = directive {
            url.query_pairs_mut()
                .append_pair("conflict", directive.as_query_value());
        }

        let handle = tokio::fs::File::open(&file.path)
            .await
            .context("Failed to open file for upload")?;
        // the file may have changed since it was picked; declare what is on disk now
        let total = handle
            .metadata()
            .await
            .context("Failed to read file metadata")?
            .len();
        if total != file.size {
            debug!(file = %file.name, picked = file.size, now = total, "File size changed since selection");
        }
        let reader = handle.take(total);
        let sent = Arc::new(AtomicU64::new(0));
        let last_percent = Arc::new(AtomicU64::new(u64::MAX));

        let stream = ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                let len = bytes.len() as u64;
                let loaded = sent.fetch_add(len, Ordering::Relaxed) + len;
                let percent = if total == 0 { 100 } else { loaded.min(total) * 100 / total };
                if last_percent.swap(percent, Ordering::Relaxed) != percent {
                    on_progress(loaded, total);
                }
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.name.clone());
        let form = Form::new().part("file", part);

        info!(file = %file.name, size = total, ?directive, "Uploading");
        let response = self.http.post(url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let message = match serde_json::from_str::<MessageBody>(&text) {
            Ok(body) => body.message,
            Err(_) if text.trim().is_empty() => format!("Upload failed with status: {}", status),
            Err(_) => text,
        };

        Ok(UploadReply { status, message })
    }

    /// Deletes a previously uploaded file by its server-side id.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), UploaderError> {
        let url = self.endpoint("delete_file")?;
        let response = self.http.post(url).form(&[("id", file_id)]).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(UploaderError::Server {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use warp::http::StatusCode;
    use warp::Filter;

    pub const KNOWN_LAUNCHPAD: &str = "1850000";
    pub const KNOWN_TITLE: &str = "collect fails on worker nodes";
    pub const EXISTING_FILE: &str = "existing.tgz";
    pub const INVALID_FILE: &str = "movie.mp4";
    pub const REJECTED_FILE: &str = "broken.tgz";

    /// Requests seen by the fake server, for assertions.
    #[derive(Default, Debug)]
    pub struct Seen {
        pub uploads: Vec<HashMap<String, String>>,
        pub deleted: Vec<String>,
    }

    /// Fake collect server bound to an ephemeral port. Returns its base URL.
    pub async fn spawn() -> (String, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));

        let check = warp::path!("check_launchpad" / String).map(|id: String| {
            if id == KNOWN_LAUNCHPAD {
                warp::reply::with_status(KNOWN_TITLE.to_string(), StatusCode::OK)
            } else {
                warp::reply::with_status(
                    "Error: Launchpad bug id does not exist".to_string(),
                    StatusCode::BAD_REQUEST,
                )
            }
        });

        let exists = warp::path!("file_exists")
            .and(warp::query::<HashMap<String, String>>())
            .map(|query: HashMap<String, String>| {
                match query.get("file_name").map(String::as_str) {
                    Some(EXISTING_FILE) => "1",
                    Some(INVALID_FILE) => "-1",
                    _ => "0",
                }
            });

        let upload_seen = seen.clone();
        let upload = warp::post()
            .and(warp::path!("upload"))
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::body::bytes())
            .map(
                move |query: HashMap<String, String>, body: warp::hyper::body::Bytes| {
                    let text = String::from_utf8_lossy(&body).to_string();
                    let mut record = query.clone();
                    record.insert("body".to_string(), text.clone());
                    upload_seen.lock().unwrap().uploads.push(record);

                    if text.contains(REJECTED_FILE) {
                        return warp::reply::with_status(
                            warp::reply::json(&json!({
                                "message": "Error: you did not supply a valid collect file in your request"
                            })),
                            StatusCode::BAD_REQUEST,
                        );
                    }
                    let conflict = query.get("conflict").cloned().unwrap_or_default();
                    warp::reply::with_status(
                        warp::reply::json(&json!({
                            "message": format!("file uploaded successfully (conflict={})", conflict)
                        })),
                        StatusCode::OK,
                    )
                },
            );

        let delete_seen = seen.clone();
        let delete = warp::post()
            .and(warp::path!("delete_file"))
            .and(warp::body::form::<HashMap<String, String>>())
            .map(move |form: HashMap<String, String>| {
                let id = form.get("id").cloned().unwrap_or_default();
                if id == "missing" {
                    return warp::reply::with_status("no such file".to_string(), StatusCode::NOT_FOUND);
                }
                delete_seen.lock().unwrap().deleted.push(id);
                warp::reply::with_status(String::new(), StatusCode::OK)
            });

        let routes = check.or(exists).or(upload).or(delete);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        (format!("http://{}", addr), seen)
    }
}
