//! Document Analysis
//!
//! Runs two chat-completion prompts over each uploaded investor document:
//! a management-commentary summary and an integrity matrix. A failed call
//! never fails the dossier; the error text takes the place of the answer.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::ChatCompletion;
use crate::documents::{
    extract_text, sha256_hex, truncate_chars, DocumentError, DocumentKind, MAX_PROMPT_CHARS,
};
use crate::models::{DocumentAnalysis, DocumentsSection, UploadedDocument};

pub const KEY_MISSING_MESSAGE: &str =
    "Chat-completion API key is missing. Upload analysis is disabled.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a financial analyst who summarizes \
investor presentations and earnings-call transcripts for retail investors.";

const INTEGRITY_SYSTEM_PROMPT: &str = "You are a forensic analyst assessing how \
candid and reliable a company's management is, based only on its own documents.";

fn summary_prompt(text: &str) -> String {
    format!(
        r#"Summarize the management commentary in the document below.

Cover:
1. Business performance in the period
2. Forward guidance and targets
3. Capital allocation plans
4. Risks management acknowledged

Answer as concise bullet points.

DOCUMENT:
---
{}
---"#,
        text
    )
}

fn integrity_prompt(text: &str) -> String {
    format!(
        r#"Build a management integrity matrix from the document below.

Score each criterion from 1 (poor) to 10 (excellent) with a one-line reason:
- Guidance Accuracy
- Delivery vs Promise
- Transparency
- Governance Flags

Answer as a Markdown table with columns Criterion | Score | Reason.

DOCUMENT:
---
{}
---"#,
        text
    )
}

/// Per-document analysis; `None` client means no key was configured.
#[derive(Clone)]
pub struct DocumentAnalyst {
    chat: Option<Arc<dyn ChatCompletion>>,
}

impl DocumentAnalyst {
    pub fn new(chat: Option<Arc<dyn ChatCompletion>>) -> Self {
        Self { chat }
    }

    pub async fn analyze(&self, uploads: &[UploadedDocument]) -> DocumentsSection {
        if uploads.is_empty() {
            return DocumentsSection::NotRequested;
        }

        let Some(chat) = &self.chat else {
            warn!(
                documents = uploads.len(),
                "Chat-completion key not configured, skipping document analysis"
            );
            return DocumentsSection::KeyMissing(KEY_MISSING_MESSAGE.to_string());
        };

        let mut seen = HashSet::new();
        let mut analyses = Vec::new();

        for upload in uploads {
            let sha256 = sha256_hex(&upload.bytes);
            if !seen.insert(sha256.clone()) {
                info!(file = %upload.file_name, "Skipping duplicate upload");
                continue;
            }

            analyses.push(self.analyze_one(chat.as_ref(), upload, sha256).await);
        }

        DocumentsSection::Analyzed(analyses)
    }

    async fn analyze_one(
        &self,
        chat: &dyn ChatCompletion,
        upload: &UploadedDocument,
        sha256: String,
    ) -> DocumentAnalysis {
        let text = match read_document(upload).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %upload.file_name, error = %e, "Text extraction failed");
                let message = format!("Could not read document: {}", e);
                return DocumentAnalysis {
                    file_name: upload.file_name.clone(),
                    sha256,
                    management_summary: message.clone(),
                    integrity_matrix: message,
                };
            }
        };

        let text = truncate_chars(&text, MAX_PROMPT_CHARS);
        info!(file = %upload.file_name, chars = text.chars().count(), "Analyzing document");

        let management_summary = ask(chat, SUMMARY_SYSTEM_PROMPT, &summary_prompt(text)).await;
        let integrity_matrix = ask(chat, INTEGRITY_SYSTEM_PROMPT, &integrity_prompt(text)).await;

        DocumentAnalysis {
            file_name: upload.file_name.clone(),
            sha256,
            management_summary,
            integrity_matrix,
        }
    }
}

/// Parsing is CPU-bound, so it runs on the blocking pool.
async fn read_document(upload: &UploadedDocument) -> Result<String, DocumentError> {
    let file_name = upload.file_name.clone();
    let bytes = upload.bytes.clone();
    let kind = DocumentKind::from_file_name(&file_name)?;

    tokio::task::spawn_blocking(move || extract_text(&file_name, &bytes))
        .await
        .map_err(|e| match kind {
            DocumentKind::Pdf => DocumentError::Pdf(e.to_string()),
            DocumentKind::Pptx => DocumentError::Pptx(e.to_string()),
        })?
}

async fn ask(chat: &dyn ChatCompletion, system: &str, prompt: &str) -> String {
    match chat.complete(system, prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Chat-completion call failed: {}", e);
            format!("Error during chat-completion call: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatError;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::Mutex;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Answers from a script and records every user prompt.
    struct FakeChat {
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeChat {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletion for FakeChat {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(user.to_string());
            if self.fail {
                return Err(ChatError::Api {
                    status: 503,
                    body: "overloaded".to_string(),
                });
            }
            if user.contains("integrity matrix") {
                Ok("| Transparency | 8 | Clear disclosures |".to_string())
            } else {
                Ok("- Revenue up".to_string())
            }
        }
    }

    fn pptx(text: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("ppt/slides/slide1.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            r#"<p:sld xmlns:a="a" xmlns:p="p"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#,
            text
        )
        .unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn upload(name: &str, bytes: Vec<u8>) -> UploadedDocument {
        UploadedDocument {
            file_name: name.to_string(),
            bytes,
        }
    }

    #[tokio::test]
    async fn test_no_uploads_is_not_requested() {
        let analyst = DocumentAnalyst::new(Some(FakeChat::new(false)));
        assert_eq!(analyst.analyze(&[]).await, DocumentsSection::NotRequested);
    }

    #[tokio::test]
    async fn test_missing_key_placeholder() {
        let analyst = DocumentAnalyst::new(None);
        let section = analyst.analyze(&[upload("deck.pptx", pptx("hello"))]).await;

        assert_eq!(section, DocumentsSection::KeyMissing(KEY_MISSING_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_two_prompts_per_document() {
        let chat = FakeChat::new(false);
        let analyst = DocumentAnalyst::new(Some(chat.clone()));

        let section = analyst
            .analyze(&[upload("deck.pptx", pptx("Order book at record high"))])
            .await;

        let DocumentsSection::Analyzed(analyses) = section else {
            panic!("expected analyses");
        };
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].management_summary, "- Revenue up");
        assert!(analyses[0].integrity_matrix.contains("Transparency"));

        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p.contains("Order book at record high")));
    }

    #[tokio::test]
    async fn test_call_failure_is_inline() {
        let analyst = DocumentAnalyst::new(Some(FakeChat::new(true)));
        let section = analyst.analyze(&[upload("deck.pptx", pptx("text"))]).await;

        let DocumentsSection::Analyzed(analyses) = section else {
            panic!("expected analyses");
        };
        assert_eq!(
            analyses[0].management_summary,
            "Error during chat-completion call: API returned 503: overloaded"
        );
        assert_eq!(analyses[0].integrity_matrix, analyses[0].management_summary);
    }

    #[tokio::test]
    async fn test_duplicate_uploads_analyzed_once() {
        let chat = FakeChat::new(false);
        let analyst = DocumentAnalyst::new(Some(chat.clone()));
        let bytes = pptx("same deck");

        let section = analyst
            .analyze(&[upload("a.pptx", bytes.clone()), upload("copy.pptx", bytes)])
            .await;

        let DocumentsSection::Analyzed(analyses) = section else {
            panic!("expected analyses");
        };
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].file_name, "a.pptx");
        assert_eq!(chat.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_prompt_text_is_truncated() {
        let chat = FakeChat::new(false);
        let analyst = DocumentAnalyst::new(Some(chat.clone()));
        let long = "x".repeat(MAX_PROMPT_CHARS + 500);

        analyst.analyze(&[upload("deck.pptx", pptx(&long))]).await;

        let prompt = &chat.prompts()[0];
        assert!(prompt.contains(&"x".repeat(MAX_PROMPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_PROMPT_CHARS + 1)));
    }

    #[tokio::test]
    async fn test_unreadable_document_reported_inline() {
        let chat = FakeChat::new(false);
        let analyst = DocumentAnalyst::new(Some(chat.clone()));

        let section = analyst.analyze(&[upload("notes.docx", vec![1, 2, 3])]).await;

        let DocumentsSection::Analyzed(analyses) = section else {
            panic!("expected analyses");
        };
        assert!(analyses[0].management_summary.starts_with("Could not read document"));
        assert!(chat.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_pdf_parser_panic_reported_inline() {
        let chat = FakeChat::new(false);
        let analyst = DocumentAnalyst::new(Some(chat.clone()));

        let section = analyst
            .analyze(&[
                upload("broken.pdf", crate::documents::pdf_without_media_box()),
                upload("deck.pptx", pptx("still analyzed")),
            ])
            .await;

        let DocumentsSection::Analyzed(analyses) = section else {
            panic!("expected analyses");
        };
        assert_eq!(analyses.len(), 2);
        assert!(analyses[0]
            .management_summary
            .starts_with("Could not read document: failed to read PDF"));
        assert_eq!(analyses[0].integrity_matrix, analyses[0].management_summary);
        assert_eq!(analyses[1].management_summary, "- Revenue up");

        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p.contains("still analyzed")));
    }
}
