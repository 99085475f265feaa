#![no_main]

use libfuzzer_sys::fuzz_target;
use stagewatch_protocol::{decode_frame, decode_notification, Frame};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    match decode_frame(&raw) {
        Ok(Frame::Event { name, payload }) => {
            if let Some(notification) = decode_notification(&name, &payload) {
                assert_eq!(notification.event_name(), name.as_str());
            }
        }
        Ok(Frame::Open {
            ping_interval_ms,
            ping_timeout_ms,
            ..
        }) => {
            let _ = ping_interval_ms.saturating_add(ping_timeout_ms);
        }
        Ok(_) => {}
        Err(error) => {
            assert!(!error.to_string().trim().is_empty());
        }
    }
});
