//! Generation request — built once per run, correlated by its identifier.

use sha2::{Digest, Sha256};

use crate::client::SubmitRequest;
use crate::config::IdentifierMode;
use crate::language::LanguageProfile;

/// sha256 hex digest of the document URI.
pub fn document_identifier(uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Same value for the submit call and every poll of one run.
    pub document_identifier: Option<String>,
    pub source_text: String,
    pub trigger_line: String,
    pub function_name: String,
}

impl GenerationRequest {
    pub fn new(
        profile: &LanguageProfile,
        mode: IdentifierMode,
        uri: &str,
        source_text: String,
        trigger_line: String,
    ) -> Self {
        let document_identifier = match mode {
            IdentifierMode::DocumentHash => Some(document_identifier(uri)),
            IdentifierMode::None => None,
        };
        let function_name = profile.extract_function_name(&trigger_line);
        Self {
            document_identifier,
            source_text,
            trigger_line,
            function_name,
        }
    }

    /// Wire body. Falls back to the raw line when no name could be extracted.
    pub fn submit_body(&self) -> SubmitRequest {
        let function_name_or_line = if self.function_name.trim().is_empty() {
            self.trigger_line.clone()
        } else {
            self.function_name.clone()
        };
        SubmitRequest {
            code: self.source_text.clone(),
            function_name_or_line,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.document_identifier.as_deref()
    }
}
