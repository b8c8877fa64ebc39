//! Embedded prompt templates
//!
//! Compiled into the binary; rendered with handlebars before each
//! collaborator call. All collaborator responses are JSON documents so the
//! schema layer can decode them without trusting free-form prose.

/// System prompt for the draft generator
pub const GENERATOR_SYSTEM: &str = r#"You are writing an evidence-grounded maturity assessment narrative.

Rules:
- Every claim must cite an evidence ID from the provided evidence list.
- Never invent evidence IDs. Never cite an ID that is not in the list.
- Write for a leadership audience: direct, specific, no filler.
- If information is missing, mark a gap instead of guessing.

Output ONLY a JSON object with this shape:
{
  "sections": [
    {"kind": "summary", "body": "...", "evidence_ids": ["obj-..."]},
    {"kind": "strengths", "body": "...", "evidence_ids": []},
    {"kind": "risks", "body": "...", "evidence_ids": []},
    {"kind": "recommendations", "body": "...", "evidence_ids": []},
    {"kind": "outlook", "body": "...", "evidence_ids": []}
  ],
  "evidence_ids_used": ["obj-..."],
  "gaps_marked": ["short description of anything you could not ground"]
}
"#;

/// User prompt for a generation round
pub const GENERATOR_USER: &str = r#"# Diagnostic input

{{diagnostic}}

# Allowed evidence IDs

{{#each evidence_ids}}- {{this}}
{{/each}}

{{#if answers}}
# Clarifying answers from the user

{{#each answers}}- Q: {{this.question}}
  A: {{this.answer}}{{#if this.low_confidence}} (answered quickly; treat with caution){{/if}}
{{/each}}
{{/if}}

{{#if rewrite_instructions}}
# Rewrite instructions from the previous review

{{#each rewrite_instructions}}- {{this}}
{{/each}}
{{/if}}

Write the five-section narrative now.
"#;

/// System prompt for the draft critic
pub const CRITIC_SYSTEM: &str = r#"You are reviewing a maturity assessment narrative against its diagnostic input.

Identify gaps: missing evidence, missing context, vague claims. For each gap,
decide whether a short clarifying question to the end user would close it.

Output ONLY a JSON object with this shape:
{
  "gaps": [
    {"gap_id": "gap-1", "section": "risks", "description": "...",
     "severity": 4, "related_evidence_ids": ["obj-..."]}
  ],
  "overall_quality": "red|yellow|green",
  "rewrite_instructions": ["..."],
  "generated_questions": [
    {"gap_id": "gap-1", "type": "yes_no|mcq|free_text", "text": "...",
     "options": ["..."], "rationale": "..."}
  ]
}

Severity is 1-5, higher = more important. Only propose a question when the
user plausibly knows the answer; otherwise emit a rewrite instruction.
"#;

/// User prompt for an assessment round
pub const CRITIC_ASSESS_USER: &str = r#"# Diagnostic input

{{diagnostic}}

# Draft under review

{{draft}}

Review the draft now.
"#;

/// User prompt for the final polish gate
pub const CRITIC_FINAL_USER: &str = r#"# Draft under final review

{{draft}}

Decide whether this narrative is ready to ship. Check for unsupported claims,
hedging filler, and any of these forbidden phrases: {{forbidden_phrases}}.

Output ONLY a JSON object with this shape:
{
  "ready": true,
  "edits": ["specific edit instructions if not ready"],
  "forbidden_matches": ["exact phrases found, if any"]
}
"#;
