//! The Speech Client (C7): converts captured audio to text via Azure or OpenAI Whisper.

use justwhisper_core::{LogEntry, Severity, SpeechProviderConfig};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::request::{Body, HttpRequest};
use crate::runtime::{execute, HttpResponse};
use crate::wav::encode_wav_mono_pcm16le;

#[derive(Debug, thiserror::Error)]
pub enum SpeechClientError {
    #[error("provider is missing a required credential")]
    MissingCredential,

    #[error("provider endpoint is invalid: {0}")]
    InvalidEndpoint(String),

    #[error("http error {status}: {body_excerpt}")]
    Http { status: u16, body_excerpt: String },

    #[error("io error: {0}")]
    Io(String),

    #[error("failed to prepare audio: {0}")]
    AudioConversion(String),

    #[error("failed to parse transcription response: {0}")]
    ResponseParse(String),
}

/// A known low-signal artifact: a transcript of exactly "you" usually means the mic picked up
/// almost nothing. Not an error, just worth telling the user about.
const QUIET_INPUT_ARTIFACT: &str = "you";

pub async fn transcribe(
    samples: &[f32],
    sample_rate_hz: u32,
    provider: &SpeechProviderConfig,
    log: &mut dyn FnMut(LogEntry),
) -> Result<String, SpeechClientError> {
    if !provider.is_usable() {
        return Err(SpeechClientError::MissingCredential);
    }

    log(info("speech.start", "starting transcription request"));

    let wav_bytes = encode_wav_mono_pcm16le(samples, sample_rate_hz);
    log(info("speech.convert", &format!("encoded {} bytes of wav", wav_bytes.len())));

    let req = build_request(provider, &wav_bytes)?;

    log(info("speech.send", &format!("sending request to {}", req.url)));
    let resp = execute(&req).await.map_err(|e| SpeechClientError::Io(e.to_string()))?;
    log(info(
        "speech.receive",
        &format!("received status {} ({} bytes)", resp.status, resp.body.len()),
    ));

    if resp.status >= 400 {
        let excerpt = body_excerpt(&resp);
        return Err(SpeechClientError::Http { status: resp.status, body_excerpt: excerpt });
    }

    let text = parse_verbose_json_response(&resp.body)?;
    log(info("speech.parse", "parsed transcription response"));

    if text.trim().eq_ignore_ascii_case(QUIET_INPUT_ARTIFACT) {
        log(LogEntry::new(0, Severity::Warn, "transcript was just \"you\" — try raising input gain"));
    }

    Ok(text)
}

fn info(stage: &str, detail: &str) -> LogEntry {
    LogEntry::new(0, Severity::Info, format!("[{stage}] {detail}"))
}

fn body_excerpt(resp: &HttpResponse) -> String {
    let text = String::from_utf8_lossy(&resp.body);
    text.chars().take(300).collect()
}

fn build_request(provider: &SpeechProviderConfig, wav_bytes: &[u8]) -> Result<HttpRequest, SpeechClientError> {
    let boundary = format!("Boundary-{}", uuid::Uuid::new_v4());
    let mut body: Vec<u8> = Vec::new();

    append_file(&mut body, &boundary, "file", "audio.wav", "audio/wav", wav_bytes);
    append_field(&mut body, &boundary, "response_format", "verbose_json");
    append_field(&mut body, &boundary, "language", "en");
    append_field(&mut body, &boundary, "temperature", "0.0");

    let (url, auth_header) = match provider {
        SpeechProviderConfig::AzureWhisper { api_key, endpoint, deployment, api_version } => {
            let endpoint = endpoint.trim_end_matches('/');
            let url = format!(
                "{endpoint}/openai/deployments/{deployment}/audio/transcriptions?api-version={api_version}"
            );
            (url, ("api-key".to_string(), api_key.clone()))
        }
        SpeechProviderConfig::OpenAiWhisper { api_key, model, base_url } => {
            append_field(&mut body, &boundary, "model", model);
            let base_url = base_url.trim_end_matches('/');
            let url = format!("{base_url}/audio/transcriptions");
            (url, ("Authorization".to_string(), format!("Bearer {api_key}")))
        }
    };

    if url::Url::parse(&url).is_err() {
        return Err(SpeechClientError::InvalidEndpoint(url));
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(HttpRequest {
        method: "POST".into(),
        url,
        headers: vec![
            ("Content-Type".into(), format!("multipart/form-data; boundary={boundary}")),
            auth_header,
        ],
        body: Body::MultipartFormData { boundary, bytes: body },
    })
}

fn append_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

fn append_file(body: &mut Vec<u8>, boundary: &str, name: &str, filename: &str, mime_type: &str, bytes: &[u8]) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

#[derive(Debug, Deserialize)]
struct VerboseJsonResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<VerboseJsonSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseJsonSegment {
    #[serde(default)]
    text: String,
}

fn last_resort_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""text"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid extraction regex"))
}

/// §4.7 response handling: verbose_json, falling back to segment concatenation, falling back
/// to plain text, falling back to a regex extraction of the first `"text":"..."` field.
fn parse_verbose_json_response(body: &[u8]) -> Result<String, SpeechClientError> {
    if let Ok(parsed) = serde_json::from_slice::<VerboseJsonResponse>(body) {
        if !parsed.text.trim().is_empty() {
            return Ok(parsed.text);
        }
        let joined = parsed
            .segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return Ok(joined);
        }
    }

    if let Ok(text) = std::str::from_utf8(body) {
        let trimmed = text.trim();
        if !trimmed.is_empty() && serde_json::from_str::<serde_json::Value>(trimmed).is_err() {
            return Ok(trimmed.to_string());
        }
    }

    if let Some(caps) = last_resort_text_re().captures(&String::from_utf8_lossy(body)) {
        return Ok(caps[1].replace("\\\"", "\"").replace("\\n", "\n"));
    }

    Err(SpeechClientError::ResponseParse("could not extract a transcript from the response body".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usable_openai() -> SpeechProviderConfig {
        SpeechProviderConfig::OpenAiWhisper {
            api_key: "sk-test".into(),
            model: "whisper-1".into(),
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    #[test]
    fn azure_endpoint_includes_deployment_and_api_version() {
        let provider = SpeechProviderConfig::AzureWhisper {
            api_key: "key".into(),
            endpoint: "https://example.openai.azure.com".into(),
            deployment: "whisper-deploy".into(),
            api_version: "2024-06-01".into(),
        };
        let req = build_request(&provider, &[]).unwrap();
        assert!(req.url.contains("/openai/deployments/whisper-deploy/audio/transcriptions"));
        assert!(req.url.contains("api-version=2024-06-01"));
        assert_eq!(req.header("api-key"), Some("key"));
    }

    #[test]
    fn openai_endpoint_uses_bearer_auth() {
        let req = build_request(&usable_openai(), &[]).unwrap();
        assert!(req.url.ends_with("/audio/transcriptions"));
        assert_eq!(req.header("authorization"), Some("Bearer sk-test"));
    }

    #[test]
    fn parses_verbose_json_text_field() {
        let body = br#"{"text":"hello world","language":"en","duration":1.2,"segments":[]}"#;
        assert_eq!(parse_verbose_json_response(body).unwrap(), "hello world");
    }

    #[test]
    fn falls_back_to_segment_concatenation() {
        let body = br#"{"text":"","segments":[{"text":"hello"},{"text":"world"}]}"#;
        assert_eq!(parse_verbose_json_response(body).unwrap(), "hello world");
    }

    #[test]
    fn falls_back_to_plain_text_body() {
        let body = b"just plain text, not json";
        assert_eq!(parse_verbose_json_response(body).unwrap(), "just plain text, not json");
    }

    #[test]
    fn last_resort_regex_extracts_text_field() {
        let body = br#"{"broken": "text":"salvaged" oops"#;
        assert_eq!(parse_verbose_json_response(body).unwrap(), "salvaged");
    }

    #[test]
    fn missing_credential_is_rejected_before_any_request() {
        let provider = SpeechProviderConfig::OpenAiWhisper {
            api_key: "".into(),
            model: "whisper-1".into(),
            base_url: "https://api.openai.com/v1".into(),
        };
        assert!(!provider.is_usable());
    }
}
