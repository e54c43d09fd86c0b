//! Pipeline-length policy: scans a compiled opcode stream for the
//! reciprocal opcode to decide the per-core scheduling channel count
//! (spec.md §4.5.1).

/// Two consecutive occurrences of this word mark the end of the fixed
/// prologue and the start of user code.
pub const STOP_SENTINEL: u32 = 0xC;

/// Placeholder opcode identifiers: the concrete fCore ISA encoding is
/// owned by the external compiler (spec.md §1 names it out of scope).
/// Only the scan's *behavior* in response to these opcodes is in scope.
pub const OPCODE_LDC: u32 = 0x1;
pub const OPCODE_REC: u32 = 0x2;

pub struct PipelineScan {
    pub has_reciprocal: bool,
}

/// Scans `words` for the reciprocal opcode after the two-sentinel
/// prologue. An `ldc` opcode causes the immediately-following word (its
/// constant operand) to be skipped.
pub fn scan_pipeline(words: &[u32]) -> PipelineScan {
    let start = words
        .windows(2)
        .position(|pair| pair[0] == STOP_SENTINEL && pair[1] == STOP_SENTINEL)
        .map(|i| i + 2);

    let mut has_reciprocal = false;
    if let Some(mut idx) = start {
        while idx < words.len() {
            let op = words[idx];
            if op == OPCODE_LDC {
                idx += 2;
                continue;
            }
            if op == OPCODE_REC {
                has_reciprocal = true;
            }
            idx += 1;
        }
    }
    PipelineScan { has_reciprocal }
}

/// 11 channels when the reciprocal opcode is present or the override is
/// set, else 8.
pub fn schedule_channel_count(has_reciprocal: bool, full_cores_override: bool) -> u32 {
    if has_reciprocal || full_cores_override {
        11
    } else {
        8
    }
}
