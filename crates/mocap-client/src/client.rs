//! Render service HTTP client.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use mocap_models::{JobStatus, StatusDocument};
use reqwest::{Client, RequestBuilder, Response};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::progress::ProgressReporter;
use crate::submission::{JobSubmission, ROTATION_PARAM};

/// Client for one render server.
///
/// All requests for a job are issued one after another; the client never
/// has two requests in flight.
pub struct RenderClient {
    http: Client,
    config: ClientConfig,
}

impl RenderClient {
    /// Create a new render client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit, wait for completion and download every result video into
    /// `destination`. Returns the written paths in server order.
    pub async fn render<R: ProgressReporter>(
        &self,
        submission: &JobSubmission,
        destination: &Path,
        reporter: &mut R,
    ) -> ClientResult<Vec<PathBuf>> {
        let base_name = submission.base_name()?;
        let handle = self.submit(submission).await?;
        let files = self.poll(&handle, reporter).await?;
        self.retrieve(&files, destination, &base_name).await
    }

    /// Submit a render job. Returns the job handle, the status path to poll.
    pub async fn submit(&self, submission: &JobSubmission) -> ClientResult<String> {
        submission.check_inputs().await?;

        let render_url = self.config.url("/render");
        let url = render_url.as_str();
        info!(
            motion = %submission.motion_file.display(),
            audio = ?submission.audio_file,
            rotation = %submission.rotation,
            "Submitting render job to {}", url
        );

        let response = self
            .with_retry(|| async move {
                let form = submission.to_form().await?;
                self.authorized(self.http.post(url))
                    .query(&[(ROTATION_PARAM, submission.rotation.as_str())])
                    .multipart(form)
                    .send()
                    .await
                    .map_err(ClientError::Network)
            })
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let handle = body.trim().to_string();
        if handle.is_empty() {
            return Err(ClientError::Protocol(
                "Render request returned an empty job handle".to_string(),
            ));
        }

        debug!("Job handle: {}", handle);
        Ok(handle)
    }

    /// Poll a job until it reaches a terminal phase.
    ///
    /// Every observed status is passed to `reporter`. Returns the result file
    /// locators on `SUCCESS`; fails on `FAILURE`, on any unknown phase, and on
    /// any non-2xx status response. Without a configured deadline this polls
    /// for as long as the server keeps the job non-terminal.
    pub async fn poll<R: ProgressReporter>(
        &self,
        handle: &str,
        reporter: &mut R,
    ) -> ClientResult<Vec<String>> {
        let url = self.config.url(handle);
        let started = Instant::now();

        loop {
            let status = self.fetch_status(&url).await?;
            reporter.report(&status);

            match status {
                JobStatus::Success { files } => {
                    info!("Job finished with {} result file(s)", files.len());
                    return Ok(files);
                }
                JobStatus::Failure { error_detail } => {
                    return Err(ClientError::JobFailed(error_detail));
                }
                _ => {}
            }

            // The next request would go out after the deadline.
            if let Some(deadline) = self.config.deadline {
                if started.elapsed() + self.config.poll_interval > deadline {
                    warn!("Deadline of {:?} reached while polling {}", deadline, url);
                    return Err(ClientError::DeadlineExceeded(deadline));
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Download result videos into `destination`, named after `base_name`
    /// and each locator's position.
    ///
    /// The destination is created if missing; existing files in it are left
    /// alone. A failed download stops the remaining ones and files already
    /// written are kept.
    pub async fn retrieve(
        &self,
        locators: &[String],
        destination: &Path,
        base_name: &str,
    ) -> ClientResult<Vec<PathBuf>> {
        let naming = &self.config.naming;
        naming.check_count(locators.len())?;

        tokio::fs::create_dir_all(destination).await?;

        let mut written = Vec::with_capacity(locators.len());
        for (index, locator) in locators.iter().enumerate() {
            let file_name = naming.file_name(base_name, index).ok_or_else(|| {
                ClientError::retrieval(locator.as_str(), "no file name for this position")
            })?;
            let path = destination.join(file_name);

            self.download(locator, &path).await?;
            info!("Saved {} to {}", locator, path.display());
            written.push(path);
        }

        Ok(written)
    }

    async fn fetch_status(&self, url: &str) -> ClientResult<JobStatus> {
        let response = self
            .with_retry(|| async move {
                self.authorized(self.http.get(url))
                    .send()
                    .await
                    .map_err(ClientError::Network)
            })
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Poll {
                status: status.as_u16(),
                body,
            });
        }

        let document: StatusDocument = serde_json::from_str(&body).map_err(|e| {
            ClientError::Protocol(format!("Unreadable status document ({}): {}", e, body))
        })?;

        JobStatus::from_document(document).map_err(|e| {
            warn!("Rejecting status document from {}: {}", url, e);
            ClientError::from(e)
        })
    }

    async fn download(&self, locator: &str, path: &Path) -> ClientResult<()> {
        let download_url = self.config.url(locator);
        let url = download_url.as_str();

        let response = self
            .with_retry(|| async move {
                self.authorized(self.http.get(url))
                    .send()
                    .await
                    .map_err(ClientError::Network)
            })
            .await
            .map_err(|e| match e {
                ClientError::Network(e) => ClientError::retrieval(locator, e),
                other => other,
            })?;

        let response = ensure_success(response)
            .await
            .map_err(|reason| ClientError::retrieval(locator, reason))?;

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::retrieval(locator, e))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.config.token)
    }

    /// Execute with retry logic for transport failures.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    attempt += 1;
                    warn!(
                        "Request failed (attempt {}), retrying in {:?}: {}",
                        attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pass 2xx responses through, turn anything else into a readable reason.
async fn ensure_success(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(format!("server returned {}: {}", status.as_u16(), body))
}
