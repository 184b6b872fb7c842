//! Language profiles — per-language syntax facts used to gate and label generation.
//!
//! A profile is plain data plus a handful of line predicates. The predicates are
//! deliberately loose substring checks: the remote service does the real code
//! understanding, this side only decides whether a request is worth sending.

/// Syntax facts for one supported language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    /// File extension without the dot (e.g. "py").
    pub file_extension: &'static str,
    /// Token that marks a function definition (e.g. "def").
    pub function_keyword: &'static str,
    /// Line comment leader (e.g. "#").
    pub comment_leader: &'static str,
    /// Substrings that indicate an assertion statement.
    pub assertion_markers: &'static [&'static str],
}

const PYTHON: LanguageProfile = LanguageProfile {
    file_extension: "py",
    function_keyword: "def",
    comment_leader: "#",
    assertion_markers: &["assert", "np.assert"],
};

/// Every profile this build knows about.
const PROFILES: &[LanguageProfile] = &[PYTHON];

impl LanguageProfile {
    /// The Python profile.
    pub fn python() -> Self {
        PYTHON
    }

    /// Pick the profile whose extension matches `file_name`, if any.
    pub fn for_file_name(file_name: &str) -> Option<Self> {
        PROFILES
            .iter()
            .find(|p| p.is_file_of_language(file_name))
            .cloned()
    }

    /// True iff the line contains the function keyword anywhere.
    ///
    /// This is a heuristic gate, not a parser: `# define x` passes too.
    pub fn is_function_definition_line(&self, line: &str) -> bool {
        line.contains(self.function_keyword)
    }

    /// Extract the function name from a definition line.
    ///
    /// Takes the text after the first keyword occurrence, skips one separator
    /// character, and stops at the first `(`. Returns an empty string when the
    /// line has no keyword, no `(`, or the `(` comes before the name.
    pub fn extract_function_name(&self, line: &str) -> String {
        let Some(keyword_at) = line.find(self.function_keyword) else {
            return String::new();
        };
        let after_keyword = keyword_at + self.function_keyword.len();
        let start = match line[after_keyword..].chars().next() {
            Some(sep) => after_keyword + sep.len_utf8(),
            None => return String::new(),
        };
        match line.find('(') {
            Some(end) if end >= start => line[start..end].to_string(),
            _ => String::new(),
        }
    }

    /// Suffix match against the file extension.
    pub fn is_file_of_language(&self, file_name: &str) -> bool {
        file_name.ends_with(self.file_extension)
    }

    /// True if any assertion marker occurs in the line.
    pub fn does_line_assert(&self, line: &str) -> bool {
        self.assertion_markers.iter().any(|m| line.contains(m))
    }

    /// Number of asserting lines in a block of text.
    pub fn count_assertions(&self, text: &str) -> usize {
        text.lines().filter(|l| self.does_line_assert(l)).count()
    }

    /// Prefix `text` with this language's comment leader.
    pub fn comment(&self, text: &str) -> String {
        format!("{} {}", self.comment_leader, text)
    }

    /// The in-document comment written when generation fails.
    pub fn failure_comment(&self) -> String {
        self.comment("Test generation failed. Please try again later.")
    }
}
