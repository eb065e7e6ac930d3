// Prompt templates for the session analysis pipelines. Placeholders use
// {name} tokens and are substituted literally by templates::render.

pub const FREEFORM_EXTRACT_PROMPT: &str = r####"
You are reviewing a transcript of a freeform conversation between a caregiver and a dementia patient.

Extract the concrete facts from the transcript below. Respond with a single JSON object and nothing else. Useful keys include "topics", "repeated_utterances", "medications_mentioned", "people_mentioned", "times_referenced", but include whatever the transcript supports.

Transcript:
{transcript}

Respond with valid JSON only. No markdown fences, no commentary.
"####;

pub const FREEFORM_ANALYZE_PROMPT: &str = r####"
You are analyzing structured data extracted from a caregiver-patient conversation.

Assess the patient's state from the extracted data below. Respond with a single JSON object describing analysis signals, for example "tone_indicators", "confusion_markers", "distress_indicators", "engagement_level".

Extracted data:
{extracted_data}

Respond with valid JSON only. No markdown fences, no commentary.
"####;

pub const FREEFORM_SUMMARY_PROMPT: &str = r####"
You are producing the final clinical summary of a caregiver-patient conversation, using the extracted facts and the analysis below.

Extracted data:
{extracted_data}

Analysis:
{analyzed_data}

Respond with a single JSON object with exactly these keys:
{
  "summary": "Two or three sentence summary of the session",
  "tone": "one word describing the patient's overall tone",
  "repeated_questions": ["questions the patient asked more than once"],
  "key_moments": ["notable moments in the session"],
  "tags": ["short topical tags"],
  "agitation_score": 0.0,
  "suggestions": "Care recommendations for the next session"
}

agitation_score is a number from 0.0 (calm) to 5.0 (severely agitated). Respond with valid JSON only.
"####;

pub const MEDICATION_EXTRACT_PROMPT: &str = r####"
You are reviewing a transcript of a medication session between a caregiver and a dementia patient.

Extract the concrete facts from the transcript below. Respond with a single JSON object. Useful keys include "medications", "doses_taken", "doses_refused", "repeated_utterances", "times_referenced", "patient_questions".

Transcript:
{transcript}

Respond with valid JSON only. No markdown fences, no commentary.
"####;

pub const MEDICATION_ANALYZE_PROMPT: &str = r####"
You are analyzing structured data extracted from a medication session with a dementia patient.

Assess adherence and the patient's state from the extracted data below. Respond with a single JSON object, for example with keys "adherence", "resistance_markers", "confusion_markers", "distress_indicators".

Extracted data:
{extracted_data}

Respond with valid JSON only. No markdown fences, no commentary.
"####;

pub const MEDICATION_SUMMARY_PROMPT: &str = r####"
You are producing the final clinical summary of a medication session, using the extracted facts and the analysis below.

Extracted data:
{extracted_data}

Analysis:
{analyzed_data}

Respond with a single JSON object with exactly these keys:
{
  "summary": "Two or three sentence summary of the session, noting adherence",
  "tone": "one word describing the patient's overall tone",
  "repeated_questions": ["questions the patient asked more than once"],
  "key_moments": ["notable moments, including each medication taken or refused"],
  "tags": ["short topical tags"],
  "agitation_score": 0.0,
  "suggestions": "Care recommendations for the next medication session"
}

agitation_score is a number from 0.0 (calm) to 5.0 (severely agitated). Respond with valid JSON only.
"####;

pub const CONVERSATION_SESSION_PROMPT: &str = r####"
You are analyzing a recorded conversation between a caregiver and a dementia patient. Provide a structured summary.

Transcript:
{transcript}

Respond with a single JSON object with exactly these keys:
{
  "summary": "Brief summary of the conversation",
  "repeated_questions": ["questions the patient asked more than once"],
  "agitation_score": 2.5,
  "mood_label": "calm",
  "suggestions": "Care recommendations"
}

agitation_score is a number from 0.0 (calm) to 5.0 (severely agitated). Respond with valid JSON only.
"####;

pub const MEDICATION_SESSION_PROMPT: &str = r####"
You are analyzing a recorded medication session with a dementia patient. Provide a structured summary focused on adherence.

Transcript:
{transcript}

Respond with a single JSON object with exactly these keys:
{
  "summary": "Brief summary, noting each medication taken or refused",
  "repeated_questions": ["questions the patient asked more than once"],
  "agitation_score": 2.5,
  "mood_label": "calm",
  "suggestions": "Care recommendations"
}

agitation_score is a number from 0.0 (calm) to 5.0 (severely agitated). Respond with valid JSON only.
"####;

pub const DEFAULT_SESSION_PROMPT: &str = r####"
You are analyzing a care session with a dementia patient. Provide a structured summary.

Transcript:
{transcript}

Respond with a single JSON object with exactly these keys:
{
  "summary": "Brief summary",
  "repeated_questions": ["questions the patient asked more than once"],
  "agitation_score": 2.5,
  "mood_label": "calm",
  "suggestions": "Care recommendations"
}

agitation_score is a number from 0.0 (calm) to 5.0 (severely agitated). Respond with valid JSON only.
"####;

// Last-resort template for the single-stage transcript pipeline. The
// chain stages have no equivalent; a missing chain template is an error.
pub const FALLBACK_SESSION_PROMPT: &str = r####"
You are analyzing a care session with a dementia patient. Provide a structured summary.

Transcript: {transcript}

Respond in JSON format:
{
  "summary": "Brief summary",
  "repeated_questions": ["example"],
  "agitation_score": 2.5,
  "mood_label": "calm",
  "suggestions": "Care recommendations"
}
"####;
