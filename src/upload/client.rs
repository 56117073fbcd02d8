use crate::upload::types::{
    DownloadError, EventSink, FileSource, ProtocolError, SelectedFile, TransportError,
    UploadError, UploadResponse, WorkerEvent,
};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Url};
use std::io::Cursor;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::either::Either;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const FILE_FIELD: &str = "file";

/// Talks to the processing server: one multipart upload per attempt, and a
/// plain GET for the processed result.
#[derive(Clone)]
pub struct UploadClient {
    client: Client,
    server_url: Url,
    upload_url: Url,
}

impl UploadClient {
    pub fn new(server_url: Url, upload_url: Url) -> Self {
        Self {
            client: Client::new(),
            server_url,
            upload_url,
        }
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    /// Streams `file` as the `file` part of a multipart POST and returns the
    /// server-supplied download URL. Byte counts are reported on `events` as
    /// the body is consumed.
    pub async fn upload(
        &self,
        attempt: u64,
        file: &SelectedFile,
        events: &EventSink,
    ) -> Result<String, UploadError> {
        info!(
            attempt,
            file = %file.name,
            size = file.size,
            url = %self.upload_url,
            "starting upload"
        );

        let reader = match &file.source {
            FileSource::Path(path) => Either::Left(
                tokio::fs::File::open(path)
                    .await
                    .map_err(|e| TransportError::Read(e.to_string()))?,
            ),
            FileSource::Memory(bytes) => Either::Right(Cursor::new(bytes.clone())),
        };

        let total = file.size;
        let sink = events.clone();
        let mut sent = 0u64;
        let body = ReaderStream::new(reader).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                sink.send(WorkerEvent::UploadProgress {
                    attempt,
                    sent,
                    total,
                });
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.name.clone())
            .mime_str(&file.mime)
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(attempt, "upload request failed: {}", e);
                TransportError::Network(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        debug!(attempt, status, body = %body, "upload response received");

        interpret_response(status, &body)
    }

    /// Resolves a server-supplied link against the configured server URL.
    /// Absolute links are kept as they are.
    pub fn resolve(&self, href: &str) -> Result<Url, DownloadError> {
        self.server_url
            .join(href)
            .map_err(|e| DownloadError::InvalidUrl {
                href: href.to_string(),
                reason: e.to_string(),
            })
    }

    /// Fetches the processed video into `dest`, returning the bytes written.
    pub async fn download(&self, href: &str, dest: &Path) -> Result<u64, DownloadError> {
        let url = self.resolve(href)?;
        info!(url = %url, dest = %dest.display(), "downloading processed video");

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(DownloadError::Status(status));
        }

        let write_err = |source| DownloadError::Write {
            path: dest.to_path_buf(),
            source,
        };
        let mut out = tokio::fs::File::create(dest).await.map_err(write_err)?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await.map_err(write_err)?;
            written += chunk.len() as u64;
        }
        out.flush().await.map_err(write_err)?;

        info!(bytes = written, "download complete");
        Ok(written)
    }
}

/// Maps an upload response onto the download URL or the error to show.
///
/// Anything but 200 is a failure regardless of body; a 200 must carry JSON
/// with `downloadUrl` and no `error`.
pub fn interpret_response(status: u16, body: &str) -> Result<String, UploadError> {
    if status != 200 {
        return Err(TransportError::Status(status).into());
    }

    let parsed: UploadResponse =
        serde_json::from_str(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(ProtocolError::Server(error).into());
    }

    parsed
        .download_url
        .ok_or_else(|| ProtocolError::MissingDownloadUrl.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mockito::Matcher;
    use std::sync::mpsc;

    fn client_for(server: &mockito::ServerGuard) -> UploadClient {
        let base = Url::parse(&server.url()).unwrap();
        let upload = base.join("/upload").unwrap();
        UploadClient::new(base, upload)
    }

    fn clip(len: usize) -> SelectedFile {
        SelectedFile::from_bytes("clip.mp4", "video/mp4", Bytes::from(vec![b'v'; len]))
    }

    #[test]
    fn non_200_is_a_transport_failure_regardless_of_body() {
        let err = interpret_response(500, r#"{"downloadUrl":"/x"}"#).unwrap_err();
        assert_eq!(err, UploadError::Transport(TransportError::Status(500)));
        assert_eq!(err.to_string(), "Upload failed with status 500");

        let err = interpret_response(201, r#"{"downloadUrl":"/x"}"#).unwrap_err();
        assert_eq!(err, UploadError::Transport(TransportError::Status(201)));
    }

    #[test]
    fn error_field_wins_over_download_url() {
        let err = interpret_response(200, r#"{"error":"unsupported codec","downloadUrl":"/x"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported codec");
    }

    #[test]
    fn malformed_and_empty_bodies_are_protocol_errors() {
        assert!(matches!(
            interpret_response(200, "<html>oops</html>"),
            Err(UploadError::Protocol(ProtocolError::Malformed(_)))
        ));
        assert_eq!(
            interpret_response(200, "{}"),
            Err(UploadError::Protocol(ProtocolError::MissingDownloadUrl))
        );
    }

    #[test]
    fn resolve_joins_relative_links_and_keeps_absolute_ones() {
        let base = Url::parse("http://127.0.0.1:5000").unwrap();
        let client = UploadClient::new(base.clone(), base.join("/upload").unwrap());
        assert_eq!(
            client.resolve("/download/abc").unwrap().as_str(),
            "http://127.0.0.1:5000/download/abc"
        );
        assert_eq!(
            client.resolve("https://cdn.example.com/v.mp4").unwrap().as_str(),
            "https://cdn.example.com/v.mp4"
        );
    }

    #[tokio::test]
    async fn upload_posts_file_part_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data".to_string()),
            )
            .match_body(Matcher::Regex(
                r#"name="file"; filename="clip.mp4""#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"downloadUrl":"/files/clip_blurred.mp4"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let (tx, rx) = mpsc::channel();
        let file = clip(96 * 1024);

        let url = client.upload(7, &file, &EventSink::new(tx)).await.unwrap();
        assert_eq!(url, "/files/clip_blurred.mp4");
        mock.assert_async().await;

        let reports: Vec<(u64, u64, u64)> = rx
            .try_iter()
            .filter_map(|event| match event {
                WorkerEvent::UploadProgress {
                    attempt,
                    sent,
                    total,
                } => Some((attempt, sent, total)),
                _ => None,
            })
            .collect();
        assert!(!reports.is_empty());
        assert!(reports.iter().all(|(attempt, _, total)| *attempt == 7 && *total == file.size));
        assert!(reports.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(reports.last().map(|r| r.1), Some(file.size));
    }

    #[tokio::test]
    async fn upload_streams_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.webm");
        std::fs::write(&path, vec![1u8; 10_000]).unwrap();
        let file = SelectedFile::from_path(&path).unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_body(Matcher::Regex(r#"filename="holiday.webm""#.to_string()))
            .with_status(200)
            .with_body(r#"{"downloadUrl":"/download/1"}"#)
            .create_async()
            .await;

        let (tx, _rx) = mpsc::channel();
        let url = client_for(&server)
            .upload(1, &file, &EventSink::new(tx))
            .await
            .unwrap();
        assert_eq!(url, "/download/1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_status_fails_the_upload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload")
            .with_status(500)
            .with_body(r#"{"error":"Failed to process video"}"#)
            .create_async()
            .await;

        let (tx, _rx) = mpsc::channel();
        let err = client_for(&server)
            .upload(1, &clip(1024), &EventSink::new(tx))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Upload failed with status 500");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let base = Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
        let client = UploadClient::new(base.clone(), base.join("/upload").unwrap());

        let (tx, _rx) = mpsc::channel();
        let err = client
            .upload(1, &clip(16), &EventSink::new(tx))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Transport(TransportError::Network(_))
        ));
    }

    #[tokio::test]
    async fn download_writes_processed_video() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/download/abc")
            .with_status(200)
            .with_header("content-type", "video/mp4")
            .with_body(b"blurred-bytes".as_slice())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip_blurred.mp4");
        let written = client_for(&server)
            .download("/download/abc", &dest)
            .await
            .unwrap();

        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"blurred-bytes");
    }

    #[tokio::test]
    async fn download_rejects_missing_video() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/download/gone")
            .with_status(404)
            .with_body(r#"{"error":"Video not found"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client_for(&server)
            .download("/download/gone", &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Status(404)));
        assert!(!dir.path().join("out.mp4").exists());
    }
}
