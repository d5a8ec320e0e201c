use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use tokio::{
    io::AsyncBufReadExt,
    sync::{Notify, watch},
    time::{Instant, MissedTickBehavior, interval},
};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::{
    auth::TokenProvider,
    error::{ErrorCode, SummarizeError, classify_error, classify_http_status},
    events::{ProgressEvent, parse_line},
    phase::{Phase, classify_hint, classify_status, is_complete_marker},
    types::{SummarizeRequest, SummaryResult, VideoInfo},
};

/// Ticker nudges stop this far below the active phase ceiling; only a real
/// phase advance crosses it.
const TICK_EPSILON: f32 = 0.5;

/// Observable snapshot of the attempt in flight, published synchronously as
/// events are processed.
#[derive(Clone, Debug, Default)]
pub struct ProgressState {
    pub phase: Phase,
    pub status: String,
    pub hint: Option<String>,
    /// Last raw status line from the server, for diagnostics.
    pub detail: Option<String>,
    pub progress: f32,
    pub elapsed_seconds: u64,
    pub error_code: Option<ErrorCode>,
}

/// Drives summarize attempts against the streaming endpoint.
///
/// At most one attempt is in flight per client: starting a new one closes the
/// prior stream before opening its own connection.
pub struct SummarizeClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    state: watch::Sender<ProgressState>,
    in_flight: Mutex<Option<Arc<Notify>>>,
}

impl SummarizeClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        let (state, _) = watch::channel(ProgressState::default());
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            state,
            in_flight: Mutex::new(None),
        }
    }

    /// Watch phase/status/progress updates for the attempt in flight.
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state.subscribe()
    }

    fn stream_endpoint(&self) -> String {
        format!("{}/api/summarize", self.base_url)
    }

    /// Run one summarization attempt to its settled outcome.
    ///
    /// Progress is approximate feedback, not a correctness-bearing value. No
    /// retries happen here; a failed attempt is restarted by calling again.
    pub async fn summarize(
        &self,
        request: SummarizeRequest,
    ) -> Result<SummaryResult, SummarizeError> {
        if request.url.trim().is_empty() {
            return Err(SummarizeError::EmptyUrl);
        }
        let cancel = self.begin_attempt();
        let mut attempt = Attempt::new(&self.state);

        // Racing the whole attempt against the supersede signal releases the
        // stream and the ticker on every exit path, including cancellation
        // mid-connect.
        let run = self.run_attempt(&mut attempt, &request);
        tokio::pin!(run);
        tokio::select! {
            biased;
            _ = cancel.notified() => Err(SummarizeError::Superseded),
            outcome = &mut run => outcome,
        }
    }

    async fn run_attempt(
        &self,
        attempt: &mut Attempt<'_>,
        request: &SummarizeRequest,
    ) -> Result<SummaryResult, SummarizeError> {
        attempt.advance(Phase::Connecting, 3.0, "Connecting to server…");

        let mut params: Vec<(&str, String)> = vec![
            ("url", request.url.clone()),
            ("mode", request.mode.as_str().to_string()),
            ("focus", request.focus.as_str().to_string()),
        ];
        if request.skip_cache {
            params.push(("skip_cache", "true".to_string()));
        }
        if let Some(template_id) = &request.template_id {
            params.push(("template_id", template_id.clone()));
        }
        if let Some(language) = &request.output_language {
            params.push(("output_language", language.clone()));
        }
        if request.enable_cot {
            params.push(("enable_cot", "true".to_string()));
        }
        if let Some(token) = self.tokens.bearer_token().await {
            params.push(("token", token));
        }

        let resp = match self
            .http
            .get(self.stream_endpoint())
            .query(&params)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Err(attempt.fail_before_stream(e)),
        };
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(attempt.fail_rejected(status, &body));
        }

        let bytes = resp.bytes_stream().map_err(io::Error::other);
        let mut lines = StreamReader::new(bytes).lines();

        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(outcome) = attempt.handle_line(&line) {
                            return outcome;
                        }
                    }
                    Ok(None) => return attempt.finish_eof(),
                    Err(e) => return attempt.finish_transport(e),
                },
                _ = ticker.tick() => attempt.tick(),
            }
        }
    }

    /// Best-effort metadata probe for a video URL.
    pub async fn video_info(&self, url: &str) -> Result<VideoInfo, SummarizeError> {
        let resp = self
            .http
            .post(format!("{}/video-info", self.base_url))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Install this attempt as the one in flight, closing any prior stream.
    fn begin_attempt(&self) -> Arc<Notify> {
        let cancel = Arc::new(Notify::new());
        let mut slot = self.in_flight.lock().expect("attempt slot poisoned");
        if let Some(prior) = slot.replace(cancel.clone()) {
            prior.notify_one();
        }
        cancel
    }
}

/// State of one attempt from start to settlement. Owns the result being
/// assembled and publishes every change to the watch channel.
struct Attempt<'a> {
    state: &'a watch::Sender<ProgressState>,
    snapshot: ProgressState,
    started: Instant,
    result: SummaryResult,
    have_summary: bool,
}

impl<'a> Attempt<'a> {
    fn new(state: &'a watch::Sender<ProgressState>) -> Self {
        Self {
            state,
            snapshot: ProgressState::default(),
            started: Instant::now(),
            result: SummaryResult::default(),
            have_summary: false,
        }
    }

    fn publish(&mut self) {
        self.snapshot.elapsed_seconds = self.started.elapsed().as_secs();
        self.state.send_replace(self.snapshot.clone());
    }

    /// Monotonic advance: the phase never moves backward and progress never
    /// decreases or exceeds the active phase's ceiling.
    fn advance(&mut self, phase: Phase, progress: f32, status: &str) {
        if phase > self.snapshot.phase {
            self.snapshot.phase = phase;
        }
        let capped = progress.min(self.snapshot.phase.ceiling());
        if capped > self.snapshot.progress {
            self.snapshot.progress = capped;
        }
        self.snapshot.status = status.to_string();
        self.publish();
    }

    /// 1 Hz liveness nudge toward (never reaching) the active ceiling.
    fn tick(&mut self) {
        if !self.snapshot.phase.is_terminal() {
            let limit = self.snapshot.phase.ceiling() - TICK_EPSILON;
            if self.snapshot.progress < limit {
                let nudged =
                    self.snapshot.progress + (limit - self.snapshot.progress) * 0.15;
                self.snapshot.progress = nudged.min(limit);
            }
        }
        self.publish();
    }

    fn handle_line(&mut self, line: &str) -> Option<Result<SummaryResult, SummarizeError>> {
        let event = match parse_line(line)? {
            Ok(event) => event,
            Err(e) => {
                // One bad payload never aborts the attempt.
                warn!("dropping malformed stream payload: {e}");
                return None;
            }
        };
        self.handle_event(event)
    }

    fn handle_event(
        &mut self,
        event: ProgressEvent,
    ) -> Option<Result<SummaryResult, SummarizeError>> {
        match event {
            ProgressEvent::Status { text } => {
                self.snapshot.detail = Some(text.clone());
                if let Some(hint) = classify_hint(&text) {
                    self.snapshot.hint = Some(hint.to_string());
                }
                if is_complete_marker(&text) && self.have_summary {
                    // Some server modes push "complete" detached from
                    // summary_complete; it is a terminal signal of its own.
                    return Some(Ok(self.settle_complete()));
                }
                match classify_status(&text) {
                    Some(class) => {
                        let label = class
                            .label
                            .map(str::to_string)
                            .unwrap_or_else(|| text.clone());
                        self.advance(class.phase, class.progress, &label);
                    }
                    None => {
                        self.snapshot.status = text;
                        self.publish();
                    }
                }
                None
            }
            ProgressEvent::VideoDownloaded { file } => {
                self.result.video_file = file;
                self.advance(Phase::Downloading, 40.0, "Video ready, analyzing…");
                None
            }
            ProgressEvent::TranscriptComplete { transcript } => {
                self.result.transcript = transcript;
                if !self.snapshot.phase.is_terminal() {
                    self.advance(Phase::Transcript, 60.0, "Transcript ready");
                }
                None
            }
            ProgressEvent::SummaryComplete {
                summary,
                transcript,
                video_file,
                usage,
            } => {
                self.result.summary = summary;
                if let Some(transcript) = transcript {
                    self.result.transcript = transcript;
                }
                if let Some(file) = video_file {
                    self.result.video_file = Some(file);
                }
                self.result.usage = usage;
                self.have_summary = true;
                Some(Ok(self.settle_complete()))
            }
            ProgressEvent::Error { code, message } => {
                Some(Err(self.fail(classify_error(code.as_deref(), &message), &message)))
            }
            ProgressEvent::Unrecognized { raw } => {
                debug!("ignoring unrecognized stream event: {raw}");
                None
            }
        }
    }

    fn settle_complete(&mut self) -> SummaryResult {
        self.snapshot.phase = Phase::Complete;
        self.snapshot.progress = 100.0;
        self.snapshot.status = "Done".to_string();
        self.publish();
        self.result.clone()
    }

    fn fail(&mut self, code: ErrorCode, message: &str) -> SummarizeError {
        self.snapshot.phase = Phase::Error;
        self.snapshot.status = code.status().to_string();
        self.snapshot.hint = Some(code.hint().to_string());
        self.snapshot.error_code = Some(code);
        self.publish();
        SummarizeError::Server {
            code,
            status: code.status().to_string(),
            hint: code.hint().to_string(),
            message: message.to_string(),
        }
    }

    fn fail_before_stream(&mut self, e: reqwest::Error) -> SummarizeError {
        self.snapshot.phase = Phase::Error;
        self.snapshot.status = "Connection failed".to_string();
        self.snapshot.error_code = Some(ErrorCode::Unknown);
        self.publish();
        SummarizeError::Http(e)
    }

    /// The server refused the stream request outright.
    fn fail_rejected(&mut self, status: StatusCode, body: &str) -> SummarizeError {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());
        let mut code = classify_error(None, &message);
        if code == ErrorCode::Unknown {
            code = classify_http_status(status);
        }
        self.fail(code, &message)
    }

    /// The stream closed without a terminal event.
    fn finish_eof(&mut self) -> Result<SummaryResult, SummarizeError> {
        if self.have_summary {
            debug!("stream closed after summary capture, treating as success");
            return Ok(self.settle_complete());
        }
        self.snapshot.phase = Phase::Error;
        self.snapshot.status = "Connection closed".to_string();
        self.snapshot.error_code = Some(ErrorCode::Unknown);
        self.publish();
        Err(SummarizeError::Disconnected)
    }

    /// Transport-level failure mid-stream. A known race with push-stream
    /// servers: the transport can error after the attempt already succeeded.
    fn finish_transport(&mut self, e: io::Error) -> Result<SummaryResult, SummarizeError> {
        if self.have_summary {
            debug!("transport error after summary capture, treating as success: {e}");
            return Ok(self.settle_complete());
        }
        self.snapshot.phase = Phase::Error;
        self.snapshot.status = "Connection lost".to_string();
        self.snapshot.error_code = Some(ErrorCode::Unknown);
        self.publish();
        Err(SummarizeError::Stream {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::{NoAuth, StaticToken};
    use crate::types::{Focus, Mode};

    fn client(base_url: &str) -> SummarizeClient {
        SummarizeClient::new(base_url, Arc::new(NoAuth))
    }

    fn stream_body(lines: &[&str]) -> String {
        lines
            .iter()
            .map(|l| format!("data: {l}\n"))
            .collect::<String>()
    }

    fn test_attempt(state: &watch::Sender<ProgressState>) -> Attempt<'_> {
        Attempt::new(state)
    }

    #[test]
    fn progress_is_monotonic_under_any_status_order() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);
        attempt.advance(Phase::Connecting, 3.0, "connecting");

        let mut last = 0.0f32;
        for text in [
            "Uploading audio",          // summarizing, 55
            "Downloading video: 90%",   // would be 41.5: stays put
            "Downloading video: 10%",   // would be 13.5: stays put
            "Parallel Analysis",        // 75
            "processing",               // 70: stays put
            "Found in cache",           // finalizing, 92
            "analyzing",                // 90: stays put
        ] {
            attempt.handle_event(ProgressEvent::Status {
                text: text.to_string(),
            });
            let progress = attempt.snapshot.progress;
            assert!(
                progress >= last,
                "{text}: progress went backward ({progress} < {last})"
            );
            assert!(
                progress <= attempt.snapshot.phase.ceiling(),
                "{text}: progress {progress} above ceiling"
            );
            last = progress;
        }
        assert_eq!(attempt.snapshot.phase, Phase::Finalizing);
    }

    #[test]
    fn ticker_never_reaches_the_ceiling() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);
        attempt.advance(Phase::Connecting, 3.0, "connecting");

        for _ in 0..1000 {
            attempt.tick();
        }
        assert!(attempt.snapshot.progress < Phase::Connecting.ceiling());

        // The phase boundary is what moves progress past the old ceiling.
        attempt.handle_event(ProgressEvent::VideoDownloaded { file: None });
        assert!(attempt.snapshot.progress >= Phase::Connecting.ceiling());
    }

    #[test]
    fn unmatched_status_shows_verbatim_without_phase_change() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);
        attempt.advance(Phase::Connecting, 3.0, "connecting");

        attempt.handle_event(ProgressEvent::Status {
            text: "Checking for subtitles...".to_string(),
        });
        assert_eq!(attempt.snapshot.phase, Phase::Connecting);
        assert_eq!(attempt.snapshot.status, "Checking for subtitles...");
        assert_eq!(attempt.snapshot.hint.as_deref(), Some("subtitle fast path"));
    }

    #[test]
    fn detached_complete_settles_only_after_summary_capture() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);

        let unsettled = attempt.handle_event(ProgressEvent::Status {
            text: "complete".to_string(),
        });
        assert!(unsettled.is_none());

        attempt.result.summary = "captured".to_string();
        attempt.have_summary = true;
        let settled = attempt.handle_event(ProgressEvent::Status {
            text: "complete".to_string(),
        });
        match settled {
            Some(Ok(result)) => assert_eq!(result.summary, "captured"),
            other => panic!("expected settlement, got {other:?}"),
        }
        assert_eq!(attempt.snapshot.phase, Phase::Complete);
        assert_eq!(attempt.snapshot.progress, 100.0);
    }

    #[test]
    fn transport_error_after_summary_is_a_success() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);
        attempt.result.summary = "captured".to_string();
        attempt.have_summary = true;

        let outcome = attempt.finish_transport(io::Error::other("reset by peer"));
        assert_eq!(outcome.unwrap().summary, "captured");
        assert_eq!(attempt.snapshot.phase, Phase::Complete);
    }

    #[test]
    fn transport_error_before_terminal_fails_the_attempt() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);

        let outcome = attempt.finish_transport(io::Error::other("reset by peer"));
        assert!(matches!(outcome, Err(SummarizeError::Stream { .. })));
        assert_eq!(attempt.snapshot.phase, Phase::Error);
    }

    #[test]
    fn server_error_classifies_and_keeps_the_original_message() {
        let (state, _rx) = watch::channel(ProgressState::default());
        let mut attempt = test_attempt(&state);

        let outcome = attempt.handle_event(ProgressEvent::Error {
            code: Some("CREDITS_EXCEEDED".to_string()),
            message: "no credits left".to_string(),
        });
        match outcome {
            Some(Err(SummarizeError::Server { code, message, .. })) => {
                assert_eq!(code, ErrorCode::CreditsExceeded);
                assert_eq!(message, "no credits left");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        assert_eq!(attempt.snapshot.phase, Phase::Error);
        assert_eq!(attempt.snapshot.error_code, Some(ErrorCode::CreditsExceeded));
    }

    #[tokio::test]
    async fn empty_url_is_rejected_up_front() {
        let client = client("http://127.0.0.1:9");
        let outcome = client.summarize(SummarizeRequest::new("  ")).await;
        assert!(matches!(outcome, Err(SummarizeError::EmptyUrl)));
    }

    #[tokio::test]
    async fn happy_path_resolves_with_the_assembled_result() {
        let server = MockServer::start().await;
        let body = stream_body(&[
            r#"{"type":"status","status":"Downloading video: 40%"}"#,
            r#"{"type":"video_downloaded","video_file":"v.mp4"}"#,
            r#"{"type":"transcript_complete","transcript":"the words"}"#,
            r##"{"type":"summary_complete","summary":"# Summary","usage":{"total_tokens":42}}"##,
        ]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .and(query_param("url", "https://example.com/v"))
            .and(query_param("mode", "smart"))
            .and(query_param("focus", "default"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mut rx = client.subscribe();
        let result = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await
            .unwrap();

        assert_eq!(result.summary, "# Summary");
        assert_eq!(result.transcript, "the words");
        assert_eq!(result.video_file.as_deref(), Some("v.mp4"));
        assert_eq!(result.usage.unwrap().total_tokens, Some(42));

        let state = rx.borrow_and_update().clone();
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.progress, 100.0);
    }

    #[tokio::test]
    async fn optional_params_are_sent_only_when_set() {
        let server = MockServer::start().await;
        let body = stream_body(&[r#"{"type":"summary_complete","summary":"s"}"#]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .and(query_param("skip_cache", "true"))
            .and(query_param("template_id", "t1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.clone(), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .and(query_param_is_missing("skip_cache"))
            .and(query_param_is_missing("template_id"))
            .and(query_param_is_missing("token"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());

        let mut request = SummarizeRequest::new("https://example.com/v");
        request.skip_cache = true;
        request.template_id = Some("t1".to_string());
        client.summarize(request).await.unwrap();

        client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn token_is_attached_when_the_provider_has_one() {
        let server = MockServer::start().await;
        let body = stream_body(&[r#"{"type":"summary_complete","summary":"s"}"#]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .and(query_param("token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SummarizeClient::new(server.uri(), Arc::new(StaticToken("secret".to_string())));
        client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn legacy_protocol_settles_from_the_final_status() {
        let server = MockServer::start().await;
        // Old servers: bare status lines, result inlined on "complete".
        let body = concat!(
            "{\"status\":\"Checking for subtitles...\"}\n",
            "{\"status\":\"Uploading audio\"}\n",
            "{\"status\":\"complete\",\"summary\":\"legacy summary\",\"transcript\":\"t\"}\n",
        );
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let result = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await
            .unwrap();
        assert_eq!(result.summary, "legacy summary");
        assert_eq!(result.transcript, "t");
    }

    #[tokio::test]
    async fn malformed_lines_do_not_abort_the_attempt() {
        let server = MockServer::start().await;
        let body = format!(
            "garbage without json\ndata: {{\"type\":\"status\",\n{}",
            stream_body(&[r#"{"type":"summary_complete","summary":"survived"}"#])
        );
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let result = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await
            .unwrap();
        assert_eq!(result.summary, "survived");
    }

    #[tokio::test]
    async fn explicit_error_event_rejects_with_classification() {
        let server = MockServer::start().await;
        let body = stream_body(&[r#"{"type":"error","code":"DOWNLOAD_FAILED","error":"yt-dlp died"}"#]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let outcome = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await;
        match outcome {
            Err(SummarizeError::Server { code, message, .. }) => {
                assert_eq!(code, ErrorCode::DownloadFailed);
                assert_eq!(message, "yt-dlp died");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_end_without_terminal_event_rejects() {
        let server = MockServer::start().await;
        let body = stream_body(&[r#"{"type":"status","status":"Downloading video: 10%"}"#]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mut rx = client.subscribe();
        let outcome = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await;
        assert!(matches!(outcome, Err(SummarizeError::Disconnected)));
        assert_eq!(rx.borrow_and_update().phase, Phase::Error);
    }

    #[tokio::test]
    async fn connect_failure_rejects_with_error_phase() {
        let client = client("http://127.0.0.1:9");
        let mut rx = client.subscribe();
        let outcome = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await;
        assert!(matches!(outcome, Err(SummarizeError::Http(_))));
        assert_eq!(rx.borrow_and_update().phase, Phase::Error);
    }

    #[tokio::test]
    async fn rejected_request_classifies_from_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .respond_with(
                ResponseTemplate::new(402)
                    .set_body_raw(r#"{"detail":"no credits left"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let outcome = client
            .summarize(SummarizeRequest::new("https://example.com/v"))
            .await;
        match outcome {
            Err(SummarizeError::Server { code, .. }) => {
                assert_eq!(code, ErrorCode::CreditsExceeded)
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn video_info_deserializes_the_probe() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/video-info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title": "A video",
                "thumbnail": "https://example.com/t.jpg",
                "duration": 93.0,
                "uploader": "someone",
                "view_count": 12345
            })))
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let info = client.video_info("https://example.com/v").await.unwrap();
        assert_eq!(info.title.as_deref(), Some("A video"));
        assert_eq!(info.view_count, Some(12345));
    }

    #[tokio::test]
    async fn superseding_start_cancels_the_prior_attempt() {
        let server = MockServer::start().await;
        let slow_body = stream_body(&[r#"{"type":"status","status":"Downloading video: 10%"}"#]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .and(query_param("url", "https://example.com/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(slow_body, "text/event-stream")
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
        let fast_body = stream_body(&[r#"{"type":"summary_complete","summary":"fast"}"#]);
        Mock::given(method("GET"))
            .and(path("/api/summarize"))
            .and(query_param("url", "https://example.com/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(fast_body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = Arc::new(client(&server.uri()));
        let slow = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .summarize(SummarizeRequest::new("https://example.com/slow"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let fast = client
            .summarize(SummarizeRequest::new("https://example.com/fast"))
            .await
            .unwrap();
        assert_eq!(fast.summary, "fast");

        let outcome = slow.await.unwrap();
        assert!(matches!(outcome, Err(SummarizeError::Superseded)));
    }

    #[tokio::test]
    async fn request_defaults_serialize_lowercase() {
        let request = SummarizeRequest::new("https://example.com/v");
        assert_eq!(request.mode, Mode::Smart);
        assert_eq!(request.focus, Focus::Default);
        assert_eq!(request.mode.as_str(), "smart");
        assert_eq!(request.focus.as_str(), "default");
    }
}
