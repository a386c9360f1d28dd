//! Static completion tables forwarded at the input boundary. Suggestion
//! content is deliberately dumb: boilerplate when the line prefix is empty,
//! function suggestions when the prefix ends with an arrow. Anything smarter
//! belongs to the grammar collaborators.

use lazy_static::lazy_static;

use crate::model::Section;
use crate::text::TextPosition;

pub const KEYWORDS: [&str; 2] = ["Service", "import"];

const FUNCTION_TRIGGERS: [&str; 1] = ["->"];

lazy_static! {
    static ref FUNCTION_SUGGESTIONS: Vec<&'static str> = vec![
        "filter(x|",
        "project([x | $x.attribute1], ['attribute1'])",
        "distinct()",
        "limit(10)",
    ];
    static ref BOILERPLATE_SUGGESTIONS: Vec<&'static str> = vec![concat!(
        "Service package::path::serviceName\n",
        "{\n",
        "  documentation: '';\n",
        "  execution: Single\n",
        "  {\n",
        "    query: { | package::path::className.all() };\n",
        "    mapping: package::path::mappingName;\n",
        "    runtime: package::path::runtimeName;\n",
        "  }\n",
        "}\n"
    )];
}

/// A completion suggestion offered to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub description: String,
    pub text: String,
}

impl Completion {
    fn new(description: &str, text: &str) -> Self {
        Self {
            description: description.to_string(),
            text: text.to_string(),
        }
    }
}

/// Suggestions for the given position, derived from the line prefix only.
pub fn completions(section: &Section, position: &TextPosition) -> Vec<Completion> {
    let prefix = section.line_up_to(position);
    let mut completions = Vec::new();
    if prefix.is_empty() {
        completions.extend(
            BOILERPLATE_SUGGESTIONS
                .iter()
                .map(|s| Completion::new("Service boilerplate", s)),
        );
    }
    if FUNCTION_TRIGGERS.iter().any(|t| prefix.ends_with(t)) {
        completions.extend(
            FUNCTION_SUGGESTIONS
                .iter()
                .map(|s| Completion::new("Function evaluation", s)),
        );
    }
    completions
}
