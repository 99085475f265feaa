#![no_main]

use libfuzzer_sys::fuzz_target;
use stagewatch_state::{EventIngress, SlotStatus};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let mut ingress = EventIngress::new();
    for line in raw.lines() {
        let _ = ingress.ingest_frame(line);
    }

    let state = ingress.state();
    let slots = state.slots();
    for (position, slot) in slots.slots().iter().enumerate() {
        assert_eq!(slot.ordinal, position);
        assert_eq!(slots.slot_for(&slot.bound_key).map(|found| found.ordinal), Some(position));
        assert!(slots.pending_status(&slot.bound_key).is_none());
    }
    let terminal = slots.count_with_status(SlotStatus::Success)
        + slots.count_with_status(SlotStatus::Failed);
    assert!(terminal <= slots.count());

    let stats = ingress.stats();
    assert_eq!(stats.frames, raw.lines().count() as u64);
    assert!(stats.dispatched + stats.dropped + stats.rejected <= stats.frames);
});
