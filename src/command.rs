//! The "generate tests" command — the single user-invocable entry point.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::document::DocumentEditor;
use crate::language::LanguageProfile;
use crate::workflow::{GenerationWorkflow, Outcome};

/// Command id as registered with the host editor.
pub const GENERATE_TESTS: &str = "Tenerate.generateTests";

/// Generate tests for the function under `cursor_line` (zero-based) and append
/// them to the document. Files of unsupported languages go through the same
/// validation policy as non-function lines.
pub async fn generate_tests(
    workflow: &GenerationWorkflow,
    editor: &DocumentEditor,
    cursor_line: usize,
    cancel: &CancellationToken,
) -> Outcome {
    let uri = editor.uri();
    let Some(profile) = LanguageProfile::for_file_name(&uri) else {
        return workflow.reject(format!("Test generation is not supported for {uri}"));
    };

    info!(command = GENERATE_TESTS, %uri, line = cursor_line + 1, "invoked");
    workflow.run(&profile, editor, cursor_line, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::client::{ClientResult, GenerationResult, GenerationService, SubmitRequest};
    use crate::config::ValidationPolicy;
    use crate::document::MemoryBuffer;
    use crate::notify::MemoryNotifier;
    use crate::workflow::{WorkflowError, WorkflowSettings};

    struct Unreachable;

    #[async_trait]
    impl GenerationService for Unreachable {
        async fn submit(&self, _: Option<&str>, _: &SubmitRequest) -> ClientResult<GenerationResult> {
            panic!("no network call expected");
        }

        async fn poll(&self, _: Option<&str>) -> ClientResult<GenerationResult> {
            panic!("no network call expected");
        }
    }

    #[tokio::test]
    async fn unsupported_language_never_calls_service() {
        let notifier = Arc::new(MemoryNotifier::new());
        let mut settings = WorkflowSettings::default();
        settings.validation_policy = ValidationPolicy::Notify;
        let workflow = GenerationWorkflow::new(Arc::new(Unreachable), notifier.clone(), settings);

        let buffer = Arc::new(MemoryBuffer::new("file:///src/lib.rs", "fn main() {}\ndef"));
        let editor = DocumentEditor::new(buffer.clone());

        let outcome = generate_tests(&workflow, &editor, 1, &CancellationToken::new()).await;
        assert!(matches!(
            outcome,
            Outcome::Rejected(WorkflowError::Validation(ref r)) if r.contains("not supported")
        ));
        assert_eq!(buffer.snapshot(), "fn main() {}\ndef");
        assert_eq!(notifier.messages().len(), 1);
    }

    #[test]
    fn command_id_matches_registered_name() {
        assert_eq!(GENERATE_TESTS, "Tenerate.generateTests");
    }
}
