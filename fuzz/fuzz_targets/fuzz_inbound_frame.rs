#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vantage_realtime::{route, Callback, Envelope, RouteOutcome};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let callback: Callback = Arc::new(move |envelope: &Envelope| {
        hits_clone.fetch_add(1, Ordering::Relaxed);
        // Envelopes handed to subscribers always serialize back.
        let _ = serde_json::to_string(envelope).unwrap();
    });

    let outcome = route(text, |_| vec![callback.clone(), callback.clone()]);

    match outcome {
        RouteOutcome::Dispatched(dispatch) => {
            assert_eq!(dispatch.delivered + dispatch.panicked, 2);
            assert_eq!(hits.load(Ordering::Relaxed), dispatch.delivered);
        }
        _ => assert_eq!(hits.load(Ordering::Relaxed), 0),
    }
});
