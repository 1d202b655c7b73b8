// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use loft_store::DraftStore;

/// Marker appended when an inlined file was cut at the per-file line cap.
pub const CONTENT_TRUNCATED_MARKER: &str = "workshopContentTruncated";
/// Marker shown in place of content for opaque binary files.
pub const CONTENT_UNAVAILABLE_MARKER: &str = "workshopContentUnavailable";

/// Shared note on receipt/recall semantics, appended to every tool-capable
/// system prompt.  The engine never injects log ids into context; the model
/// counts receipts and recalls by id when it needs a full payload.
pub const TOOL_RECEIPTS_NOTE: &str = "\
Tool receipts: write tools return a short confirmation sentence instead of \
their full result. Every tool call is recorded in a log under an increasing \
entry id (the first call of the conversation is 1). Use recall_tool_result \
with that id to fetch the complete result JSON of an earlier call.";

pub const RESEARCH_SYSTEM_PROMPT: &str = "\
You are the research assistant of a document workbench. Inspect the \
workbench files with the read-only tools provided and produce a concise \
markdown briefing of everything relevant to the user's request: which files \
exist, their structure, and the facts a plan would depend on.\n\
- Do not propose edits and do not write files; this pass is read-only.\n\
- When you are done, reply with the briefing text itself and no tool calls.";

pub const PLAN_SYSTEM_PROMPT: &str = "\
You are the planning assistant of a document workbench. Using the research \
briefing provided, write an execution plan as a markdown checklist.\n\
Your reply MUST start with the heading '# Execution Plan' and MUST contain \
an '## Items' section listing each actionable step as a checkbox line of \
the exact form:\n\
- [ ] N. Label \u{2014} Description\n\
Number items from 1 upward. Keep each item independently executable. \
Free-form notes may follow in an '## Notes' section.";

pub const IMPLEMENT_SYSTEM_PROMPT: &str = "\
You are the implementation assistant of a document workbench. Execute \
exactly one checklist item of the plan below, using the tools provided. \
All writes land in a reviewable draft.\n\
- Work only on the current item; other items are handled separately.\n\
- When the item is complete, reply with a short completion note and no \
  further tool calls.\n\
- If the work reveals a genuinely missing step, you may propose it as a \
  top-level '- [ ] N. Label \u{2014} Description' line in your reply.";

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are the reporting assistant of a document workbench. Summarize for the \
user what the completed run changed: which files were created or modified, \
which plan items succeeded or failed and why. Be brief and concrete. Do \
not call tools.";

/// One manifest line per file in the effective tree.
pub fn file_manifest(drafts: &DraftStore) -> anyhow::Result<String> {
    let root = drafts.effective_root();
    let files = drafts.list_files()?;
    if files.is_empty() {
        return Ok("## Files\n(workbench is empty)\n".to_string());
    }
    let mut out = String::from("## Files\n");
    for path in files {
        let size = std::fs::metadata(root.join(&path)).map(|m| m.len()).unwrap_or(0);
        out.push_str(&format!("- {path} ({size} bytes)\n"));
    }
    Ok(out)
}

/// Inline the contents of small text files, cut at `max_lines` per file.
/// Binary files show only the unavailable marker.
pub fn inline_payloads(drafts: &DraftStore, max_lines: usize) -> anyhow::Result<String> {
    let files = drafts.list_files()?;
    let mut out = String::new();
    for path in files {
        out.push_str(&format!("### {path}\n"));
        match drafts.read_file(&path)? {
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(text) => {
                    let lines: Vec<&str> = text.lines().collect();
                    if lines.len() > max_lines {
                        out.push_str(&lines[..max_lines].join("\n"));
                        out.push('\n');
                        out.push_str(CONTENT_TRUNCATED_MARKER);
                        out.push('\n');
                    } else {
                        out.push_str(&text);
                        if !text.ends_with('\n') {
                            out.push('\n');
                        }
                    }
                }
                Err(_) => {
                    out.push_str(CONTENT_UNAVAILABLE_MARKER);
                    out.push('\n');
                }
            },
            None => {
                out.push_str(CONTENT_UNAVAILABLE_MARKER);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    Ok(out)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use loft_store::WorkbenchPaths;

    fn drafts() -> (tempfile::TempDir, DraftStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        paths.ensure_layout().unwrap();
        std::fs::write(paths.published().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        std::fs::write(paths.published().join("blob.bin"), [0u8, 159, 146, 150]).unwrap();
        (dir, DraftStore::new(&paths))
    }

    #[test]
    fn manifest_lists_every_file_with_size() {
        let (_d, drafts) = drafts();
        let m = file_manifest(&drafts).unwrap();
        assert!(m.contains("- a.txt (14 bytes)"));
        assert!(m.contains("- blob.bin (4 bytes)"));
    }

    #[test]
    fn manifest_of_empty_workbench_says_so() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        paths.ensure_layout().unwrap();
        let m = file_manifest(&DraftStore::new(&paths)).unwrap();
        assert!(m.contains("workbench is empty"));
    }

    #[test]
    fn payloads_inline_text_within_cap() {
        let (_d, drafts) = drafts();
        let p = inline_payloads(&drafts, 10).unwrap();
        assert!(p.contains("### a.txt"));
        assert!(p.contains("one\ntwo\nthree"));
        assert!(!p.contains(CONTENT_TRUNCATED_MARKER));
    }

    #[test]
    fn payloads_truncate_at_line_cap() {
        let (_d, drafts) = drafts();
        let p = inline_payloads(&drafts, 2).unwrap();
        assert!(p.contains("one\ntwo\n"));
        assert!(!p.contains("three"));
        assert!(p.contains(CONTENT_TRUNCATED_MARKER));
    }

    #[test]
    fn payloads_mark_binaries_unavailable() {
        let (_d, drafts) = drafts();
        let p = inline_payloads(&drafts, 10).unwrap();
        assert!(p.contains("### blob.bin"));
        assert!(p.contains(CONTENT_UNAVAILABLE_MARKER));
    }

    #[test]
    fn receipts_note_documents_recall() {
        assert!(TOOL_RECEIPTS_NOTE.contains("recall_tool_result"));
    }

    #[test]
    fn plan_prompt_pins_the_required_headings() {
        assert!(PLAN_SYSTEM_PROMPT.contains("# Execution Plan"));
        assert!(PLAN_SYSTEM_PROMPT.contains("## Items"));
        assert!(PLAN_SYSTEM_PROMPT.contains('\u{2014}'));
    }
}
