// crates/lodestone-core/src/reference.rs
// Reference list, XML context block, and citation prompt assembly

use crate::config::CitationConfig;
use lodestone_types::{Reference, ResultItem};

/// Default instruction telling the model how to cite references in-text.
pub const DEFAULT_CITATION_PROMPT: &str = "When you use information from the references above, \
cite it inline with an HTML anchor of the form \
<a class=\"ref\" data-ref-id=\"ID\" data-ref-type=\"TYPE\" href=\"#ref:ID\">[ID]</a>, \
where ID is the reference id and TYPE is its type. \
Cite every claim that relies on a reference; do not invent reference ids.";

/// LLM-ready view over a set of result items.
#[derive(Debug, Clone)]
pub struct ReferenceContext {
    /// Typed reference views, in item order.
    pub references: Vec<Reference>,
    /// Newline-delimited `<references>` block.
    pub xml: String,
    /// Citation instruction, empty when auto-injection is off.
    pub prompt: String,
}

/// Build the context block for a set of items.
///
/// Items keep authority over their data; references are projections in the
/// order given (citation allocation order under a normal dispatch).
pub fn build_reference_context(items: &[ResultItem], citation: &CitationConfig) -> ReferenceContext {
    let references: Vec<Reference> = items.iter().map(Reference::from).collect();
    let xml = render_xml(&references);
    let prompt = if citation.auto_inject {
        citation
            .prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_CITATION_PROMPT.to_string())
    } else {
        String::new()
    };

    ReferenceContext {
        references,
        xml,
        prompt,
    }
}

fn render_xml(references: &[Reference]) -> String {
    let mut out = String::from("<references>\n");
    for reference in references {
        let ref_type = reference
            .ref_type
            .map(|t| t.as_str())
            .unwrap_or("unknown");
        out.push_str(&format!(
            "<ref id=\"{}\" type=\"{}\" weight=\"{:.1}\" source=\"{}\">\n",
            reference.id, ref_type, reference.weight, reference.source
        ));
        if let Some(title) = reference.title.as_deref() {
            if !title.is_empty() {
                out.push_str(title);
                out.push('\n');
            }
        }
        out.push_str(&reference.content);
        out.push('\n');
        if let Some(url) = reference.url.as_deref() {
            if !url.is_empty() {
                out.push_str("URL: ");
                out.push_str(url);
                out.push('\n');
            }
        }
        out.push_str("</ref>\n");
    }
    out.push_str("</references>");
    out
}
