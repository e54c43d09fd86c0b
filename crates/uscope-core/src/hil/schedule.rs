//! Timebase divider and per-core phase-shift calculation (spec.md §4.5.2).

/// Measured slack between successive cores' enable windows; not derived
/// from any other constant, not user-tunable (spec.md §9 Open Questions).
pub const INTER_CORE_BUFFER_TICKS: u64 = 90;

/// Fixed portion of a core's pipeline length, in HIL clock ticks. Like
/// [`INTER_CORE_BUFFER_TICKS`], this is a measured hardware constant
/// external to this crate's scope (it characterizes the fCore pipeline,
/// not the driver); kept as a named placeholder pending the authoritative
/// value from the hardware team rather than invented from nothing.
pub const PIPELINE_FIXED_PORTION: u64 = 20;

/// Per-channel contribution to a core's pipeline length, in HIL clock
/// ticks. Same provenance caveat as [`PIPELINE_FIXED_PORTION`].
pub const PIPELINE_PER_CHANNEL_PORTION: u64 = 8;

/// `fixed_portion + n_channels * per_channel_portion`.
pub fn program_length(n_channels: u32) -> u64 {
    PIPELINE_FIXED_PORTION + n_channels as u64 * PIPELINE_PER_CHANNEL_PORTION
}

pub fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        0
    } else {
        a / gcd(a, b) * b
    }
}

/// LCM of every non-zero frequency; the identity element (1) is used when
/// none are non-zero, so a deploy with only "as fast as possible" cores
/// ends up with a period of exactly `hil_clock_frequency` ticks.
pub fn timebase_frequency(frequencies: &[u64]) -> u64 {
    frequencies
        .iter()
        .copied()
        .filter(|&f| f != 0)
        .fold(1u64, lcm)
}

/// One program's schedule entry: `divider - 1` and `shift` are what get
/// written to the sequencer registers.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    pub divider: u64,
    pub shift: u64,
}

/// `programs` is `(order, n_channels, sampling_frequency)` in deployment
/// index order (index `i` is `programs[i]`'s slot). Returns one
/// `ScheduleEntry` per program (same order as input) plus `min_timebase`.
pub fn compute_schedule(
    programs: &[(u32, u32, u64)],
    timebase_freq: u64,
) -> (Vec<ScheduleEntry>, u64) {
    let dividers: Vec<u64> = programs
        .iter()
        .map(|&(_, _, freq)| if freq == 0 { 1 } else { timebase_freq / freq })
        .collect();

    let mut order_indices: Vec<usize> = (0..programs.len()).collect();
    order_indices.sort_by_key(|&i| programs[i].0);

    let mut shifts = vec![0u64; programs.len()];
    let mut running = 2u64;
    for (pos, &idx) in order_indices.iter().enumerate() {
        if pos == 0 {
            shifts[idx] = 2;
            running = 2;
        } else {
            let prev_idx = order_indices[pos - 1];
            running += program_length(programs[prev_idx].1) + INTER_CORE_BUFFER_TICKS;
            shifts[idx] = running;
        }
    }

    let min_timebase: u64 = programs
        .iter()
        .map(|&(_, n_channels, _)| program_length(n_channels) + INTER_CORE_BUFFER_TICKS)
        .sum();

    let entries = dividers
        .into_iter()
        .zip(shifts)
        .map(|(divider, shift)| ScheduleEntry { divider, shift })
        .collect();

    (entries, min_timebase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timebase_frequency_of_all_zero_is_identity_one() {
        assert_eq!(timebase_frequency(&[0, 0]), 1);
    }

    #[test]
    fn timebase_frequency_is_lcm_of_nonzero_entries() {
        assert_eq!(timebase_frequency(&[0, 4, 6]), 12);
    }

    #[test]
    fn first_program_in_order_gets_shift_two() {
        let (entries, _) = compute_schedule(&[(0, 1, 0), (1, 1, 0)], 1);
        assert_eq!(entries[0].shift, 2);
    }

    #[test]
    fn second_program_shift_accounts_for_buffer_and_predecessor_length() {
        let (entries, _) = compute_schedule(&[(0, 1, 0), (1, 1, 0)], 1);
        let expected = 2 + program_length(1) + INTER_CORE_BUFFER_TICKS;
        assert_eq!(entries[1].shift, expected);
    }

    #[test]
    fn zero_frequency_yields_divider_one() {
        let (entries, _) = compute_schedule(&[(0, 1, 0)], 5);
        assert_eq!(entries[0].divider, 1);
    }
}
