use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use super::{ExtractionError, ExtractionInput, TextExtractor};
use crate::config::OcrConfig;

/// Image OCR through the `tesseract` CLI.
///
/// Each call runs in its own child process, fed over stdin, so the async
/// workers never block on recognition. A semaphore caps how many processes
/// run at once; a dropped future kills its process.
pub struct TesseractOcr {
    binary: String,
    language: String,
    permits: Arc<Semaphore>,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    async fn recognize(&self, bytes: axum::body::Bytes) -> Result<String, ExtractionError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| ExtractionError::RecognitionFailure(err.to_string()))?;

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                ExtractionError::RecognitionFailure(format!(
                    "failed to start '{}': {err}",
                    self.binary
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&bytes).await {
                    tracing::debug!(error = %err, "tesseract closed stdin early");
                }
            });
        }

        let output = child.wait_with_output().await.map_err(|err| {
            ExtractionError::RecognitionFailure(format!("tesseract did not complete: {err}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::RecognitionFailure(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl TextExtractor for TesseractOcr {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<String, ExtractionError> {
        if !input.kind.is_image() {
            return Err(ExtractionError::RecognitionFailure(format!(
                "OCR needs a raster image, received {}",
                input.kind.mime_type()
            )));
        }

        let start = Instant::now();
        let size = input.bytes.len();
        let text = self.recognize(input.bytes).await?;
        tracing::debug!(
            elapsed_ms = %start.elapsed().as_millis(),
            size,
            chars = text.len(),
            language = %self.language,
            "ocr finished"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::applicant::ApplicantMetadata;
    use crate::intake::upload::DocumentKind;
    use axum::body::Bytes;
    use chrono::NaiveDate;

    fn applicant() -> ApplicantMetadata {
        ApplicantMetadata {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 6, 15).expect("valid"),
            age: 24,
        }
    }

    fn engine(binary: &str) -> TesseractOcr {
        TesseractOcr::new(&OcrConfig {
            tesseract_path: binary.to_string(),
            ..OcrConfig::default()
        })
    }

    #[tokio::test]
    async fn missing_binary_is_a_recognition_failure() {
        let applicant = applicant();
        let input = ExtractionInput {
            bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
            kind: DocumentKind::Png,
            applicant: &applicant,
        };
        match engine("/nonexistent/tesseract-binary").extract(input).await {
            Err(ExtractionError::RecognitionFailure(message)) => {
                assert!(message.contains("failed to start"), "{message}")
            }
            other => panic!("expected recognition failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pdf_input_is_refused() {
        let applicant = applicant();
        let input = ExtractionInput {
            bytes: Bytes::from_static(b"%PDF-1.4"),
            kind: DocumentKind::Pdf,
            applicant: &applicant,
        };
        assert!(matches!(
            engine("tesseract").extract(input).await,
            Err(ExtractionError::RecognitionFailure(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        // `false` ignores its arguments and exits 1.
        let applicant = applicant();
        let input = ExtractionInput {
            bytes: Bytes::from_static(b"\xff\xd8\xff"),
            kind: DocumentKind::Jpeg,
            applicant: &applicant,
        };
        match engine("false").extract(input).await {
            Err(ExtractionError::RecognitionFailure(message)) => {
                assert!(message.contains("exited"), "{message}")
            }
            other => panic!("expected recognition failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn feeds_stdin_and_trims_recognized_text() {
        use std::os::unix::fs::PermissionsExt;

        // Stands in for tesseract: echoes its arguments and the stdin size.
        let dir = tempfile::tempdir().expect("script dir");
        let script = dir.path().join("fake-tesseract");
        std::fs::write(
            &script,
            "#!/bin/sh\nsize=$(wc -c | tr -d ' ')\nprintf '\\n  args:%s\\n  bytes:%s  \\n\\n' \"$*\" \"$size\"\n",
        )
        .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let applicant = applicant();
        let image = vec![0x5a_u8; 2 * 1024 * 1024];
        let input = ExtractionInput {
            bytes: Bytes::from(image),
            kind: DocumentKind::Png,
            applicant: &applicant,
        };
        let text = engine(script.to_str().expect("utf-8 path"))
            .extract(input)
            .await
            .expect("recognized");

        assert_eq!(text, "args:stdin stdout -l eng\n  bytes:2097152");
    }
}
