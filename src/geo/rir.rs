use serde::{Deserialize, Serialize};

/// One row parsed from an RIR delegated-stats file: an allocation of `count`
/// addresses starting at `start`, assigned to `country`. Parsing the
/// pipe-delimited file itself is an external collaborator's job (§6); the
/// core only consumes the already-extracted `(cc, start, count)` triples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RirAllocation {
    pub start: u32,
    pub count: u32,
    pub country: String,
}

impl RirAllocation {
    /// `priority = 32 - floor(log2(count))`: smaller allocations (more
    /// specific) outrank larger ones.
    fn priority(&self) -> u32 {
        let count = self.count.max(1);
        32u32.saturating_sub(31 - count.leading_zeros())
    }

    fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.count)
    }
}

/// A non-overlapping, start-sorted run of address space tagged with the
/// highest-priority allocation active over it.
#[derive(Debug, Clone, PartialEq)]
pub struct RirSegment {
    pub start: u32,
    pub end: u64,
    pub country: String,
}

enum Event {
    Enter { pos: u32, order: usize },
    Exit { pos: u64, order: usize },
}

fn event_pos(e: &Event) -> u64 {
    match e {
        Event::Enter { pos, .. } => u64::from(*pos),
        Event::Exit { pos, .. } => *pos,
    }
}

/// Flatten possibly-overlapping allocations into a non-overlapping segment
/// list via a sweep-line. Where two allocations overlap with equal priority,
/// the one entered later in `allocations` (LIFO) wins.
pub fn flatten(allocations: &[RirAllocation]) -> Vec<RirSegment> {
    let mut events = Vec::with_capacity(allocations.len() * 2);
    for (order, alloc) in allocations.iter().enumerate() {
        events.push(Event::Enter {
            pos: alloc.start,
            order,
        });
        events.push(Event::Exit {
            pos: alloc.end(),
            order,
        });
    }
    // Exits before Enters at the same position: a range ending exactly where
    // another begins must not be treated as momentarily overlapping.
    events.sort_by(|a, b| {
        event_pos(a)
            .cmp(&event_pos(b))
            .then_with(|| matches!(a, Event::Enter { .. }).cmp(&matches!(b, Event::Enter { .. })))
    });

    let mut active: Vec<usize> = Vec::new();
    let mut prev_pos: Option<u64> = None;
    let mut segments = Vec::new();

    for event in &events {
        let pos = event_pos(event);
        if let Some(p) = prev_pos {
            if pos > p && !active.is_empty() {
                let winner = active
                    .iter()
                    .max_by_key(|&&order| (allocations[order].priority(), order))
                    .copied()
                    .unwrap();
                segments.push(RirSegment {
                    start: p as u32,
                    end: pos,
                    country: allocations[winner].country.clone(),
                });
            }
        }
        match event {
            Event::Enter { order, .. } => active.push(*order),
            Event::Exit { order, .. } => active.retain(|o| o != order),
        }
        prev_pos = Some(pos);
    }
    segments
}

/// Resolve an IP to its segment's country via binary search over the
/// start-sorted, non-overlapping segment list.
pub fn lookup(segments: &[RirSegment], ip: u32) -> Option<&str> {
    let idx = segments.partition_point(|seg| seg.start <= ip);
    if idx == 0 {
        return None;
    }
    let seg = &segments[idx - 1];
    if u64::from(ip) < seg.end {
        Some(seg.country.as_str())
    } else {
        None
    }
}
