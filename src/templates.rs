use crate::error::PipelineError;
use crate::prompts;

/// One step of a session analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Analyze,
    Summarize,
    /// Single-stage summary rendered straight from a transcript,
    /// keyed by session type rather than chain pipeline.
    Session,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
            Stage::Summarize => "summary",
            Stage::Session => "session",
        }
    }
}

fn lookup(pipeline: &str, stage: Stage) -> Option<&'static str> {
    match (pipeline, stage) {
        ("freeform", Stage::Extract) => Some(prompts::FREEFORM_EXTRACT_PROMPT),
        ("freeform", Stage::Analyze) => Some(prompts::FREEFORM_ANALYZE_PROMPT),
        ("freeform", Stage::Summarize) => {
            Some(prompts::FREEFORM_SUMMARY_PROMPT)
        }
        ("medication", Stage::Extract) => {
            Some(prompts::MEDICATION_EXTRACT_PROMPT)
        }
        ("medication", Stage::Analyze) => {
            Some(prompts::MEDICATION_ANALYZE_PROMPT)
        }
        ("medication", Stage::Summarize) => {
            Some(prompts::MEDICATION_SUMMARY_PROMPT)
        }
        ("conversation", Stage::Session) => {
            Some(prompts::CONVERSATION_SESSION_PROMPT)
        }
        ("medication", Stage::Session) => {
            Some(prompts::MEDICATION_SESSION_PROMPT)
        }
        ("default", Stage::Session) => Some(prompts::DEFAULT_SESSION_PROMPT),
        _ => None,
    }
}

/// Resolve the template for a (pipeline, stage) pair.
///
/// Resolution order: exact entry, then for the single-stage Session
/// pipeline the "default" entry, then its compiled-in fallback. The
/// chain stages have no default, so an unknown pipeline is an error.
pub fn resolve(
    pipeline: &str,
    stage: Stage,
) -> Result<&'static str, PipelineError> {
    let key = pipeline.to_ascii_lowercase();
    if let Some(template) = lookup(&key, stage) {
        return Ok(template);
    }
    if stage == Stage::Session {
        return Ok(lookup("default", Stage::Session)
            .unwrap_or(prompts::FALLBACK_SESSION_PROMPT));
    }
    Err(PipelineError::TemplateNotFound {
        pipeline: pipeline.to_string(),
        stage: stage.name().to_string(),
    })
}

/// Render a template by substituting each `{name}` placeholder with its
/// value. Substitution is literal string replacement, with no escaping
/// of the substituted content.
pub fn render(
    pipeline: &str,
    stage: Stage,
    substitutions: &[(&str, &str)],
) -> Result<String, PipelineError> {
    let template = resolve(pipeline, stage)?;
    let mut rendered = template.to_string();
    for (name, value) in substitutions {
        rendered = rendered.replace(&format!("{{{}}}", name), value);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::{render, resolve, Stage};
    use crate::error::PipelineError;

    #[test]
    fn chain_templates_substitute_all_placeholders() -> anyhow::Result<()> {
        let extract = render(
            "freeform",
            Stage::Extract,
            &[("transcript", "Patient: hello")],
        )?;
        assert!(extract.contains("Patient: hello"));
        assert!(!extract.contains("{transcript}"));

        let analyze = render(
            "medication",
            Stage::Analyze,
            &[("extracted_data", r#"{"medications": []}"#)],
        )?;
        assert!(analyze.contains(r#"{"medications": []}"#));
        assert!(!analyze.contains("{extracted_data}"));

        let summary = render(
            "freeform",
            Stage::Summarize,
            &[("extracted_data", "{}"), ("analyzed_data", "{}")],
        )?;
        assert!(!summary.contains("{extracted_data}"));
        assert!(!summary.contains("{analyzed_data}"));
        Ok(())
    }

    #[test]
    fn unknown_chain_pipeline_is_template_not_found() {
        let err = resolve("unknown", Stage::Extract).unwrap_err();
        match err {
            PipelineError::TemplateNotFound { pipeline, stage } => {
                assert_eq!(pipeline, "unknown");
                assert_eq!(stage, "extract");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unknown_session_type_falls_back_to_default() -> anyhow::Result<()> {
        let rendered =
            render("walk", Stage::Session, &[("transcript", "a short walk")])?;
        assert!(rendered.contains("a short walk"));
        assert!(!rendered.contains("{transcript}"));
        Ok(())
    }

    #[test]
    fn session_type_lookup_is_case_insensitive() -> anyhow::Result<()> {
        let upper = resolve("Medication", Stage::Session)?;
        let lower = resolve("medication", Stage::Session)?;
        assert_eq!(upper, lower);
        Ok(())
    }

    #[test]
    fn substitution_does_not_escape_values() -> anyhow::Result<()> {
        // A value containing template syntax is inserted verbatim.
        let rendered = render(
            "freeform",
            Stage::Extract,
            &[("transcript", "literal {braces} stay")],
        )?;
        assert!(rendered.contains("literal {braces} stay"));
        Ok(())
    }
}
