//! Integration tests — full filter sessions over the software device
//! and the recording transport: startup latency, degraded readback,
//! resolution changes, renames, and teardown ordering.

use framecast_core::{
    FilterHooks, MemoryTransport, RelayFilter, SoftwareDevice, TransportEvent,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Build a filter over a payload-retaining recording transport.
fn recording_filter(payload: &str) -> RelayFilter<MemoryTransport> {
    let mut transport = MemoryTransport::new();
    transport.retain_payloads(true);
    RelayFilter::new(transport, payload)
}

/// One host tick painting a solid color, then advance GPU time.
fn tick_solid(
    filter: &mut RelayFilter<MemoryTransport>,
    device: &mut SoftwareDevice,
    pixel: [u8; 4],
    width: u32,
    height: u32,
) {
    let mut source = move |d: &mut SoftwareDevice, _w: u32, _h: u32| d.fill_target(pixel);
    filter.render_tick(device, &mut source, width, height);
    device.end_frame();
}

/// Event log reduced to kind tags, for order assertions.
fn kinds(filter: &RelayFilter<MemoryTransport>) -> Vec<&'static str> {
    filter
        .pipeline()
        .endpoint()
        .transport()
        .events()
        .iter()
        .map(|e| match e {
            TransportEvent::SenderCreated { .. } => "create",
            TransportEvent::SenderDestroyed { .. } => "destroy",
            TransportEvent::FrameSent { .. } => "frame",
            TransportEvent::Flushed { .. } => "flush",
        })
        .collect()
}

/// Payload bytes of every sent frame, in send order.
fn payloads(filter: &RelayFilter<MemoryTransport>) -> Vec<Vec<u8>> {
    filter
        .pipeline()
        .endpoint()
        .transport()
        .events()
        .iter()
        .filter_map(|e| match e {
            TransportEvent::FrameSent { payload, .. } => payload.clone(),
            _ => None,
        })
        .collect()
}

/// Geometry of every sent frame, in send order.
fn frame_sizes(filter: &RelayFilter<MemoryTransport>) -> Vec<(u32, u32)> {
    filter
        .pipeline()
        .endpoint()
        .transport()
        .events()
        .iter()
        .filter_map(|e| match e {
            TransportEvent::FrameSent { width, height, .. } => Some((*width, *height)),
            _ => None,
        })
        .collect()
}

fn all_pixels(payload: &[u8], pixel: [u8; 4]) -> bool {
    payload.chunks(4).all(|px| px == pixel)
}

// ── Session lifecycle ────────────────────────────────────────────

#[test]
fn test_session_lifecycle() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter(r#"{"sender_name":"Relay Main"}"#);

    for shade in 1..=3u8 {
        tick_solid(&mut filter, &mut device, [shade; 4], 16, 9);
    }
    filter.teardown(&mut device);

    assert_eq!(
        kinds(&filter),
        ["create", "frame", "frame", "frame", "flush", "destroy"]
    );
    assert!(matches!(
        &filter.pipeline().endpoint().transport().events()[0],
        TransportEvent::SenderCreated { name, .. } if name == "Relay Main"
    ));

    let stats = filter.pipeline().stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.published, 3);
    assert_eq!(filter.pipeline().endpoint().transport().live_senders(), 0);
    assert_eq!(device.texture_count(), 0);
    assert_eq!(device.staging_count(), 0);

    // Destroy is idempotent; nothing new happens.
    filter.teardown(&mut device);
    assert_eq!(kinds(&filter).len(), 6);
}

#[test]
fn test_startup_publishes_zeros_then_content() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter("{}");

    tick_solid(&mut filter, &mut device, [200, 10, 10, 255], 16, 9);
    tick_solid(&mut filter, &mut device, [10, 200, 10, 255], 16, 9);

    let sent = payloads(&filter);
    assert_eq!(sent.len(), 2);
    assert!(sent[0].iter().all(|&b| b == 0));
    assert!(all_pixels(&sent[1], [200, 10, 10, 255]));
}

// ── Resolution change ────────────────────────────────────────────

#[test]
fn test_resize_flushes_then_reconnects() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter(r#"{"sender_name":"Relay Main"}"#);

    tick_solid(&mut filter, &mut device, [1; 4], 16, 9);
    tick_solid(&mut filter, &mut device, [2; 4], 16, 9);
    // Source shrinks; this tick reconfigures before rendering.
    tick_solid(&mut filter, &mut device, [3; 4], 8, 5);
    tick_solid(&mut filter, &mut device, [4; 4], 8, 5);

    // The old sender is fenced before anything is freed, then replaced.
    assert_eq!(
        kinds(&filter),
        [
            "create", "frame", "frame", // 16x9 session
            "flush",   // teardown fence
            "flush", "destroy", "create", // sender replacement
            "frame", "frame", // 8x5 session
        ]
    );
    assert_eq!(
        frame_sizes(&filter),
        [(16, 9), (16, 9), (8, 5), (8, 5)]
    );

    let sent = payloads(&filter);
    // A fresh ring starts over with a zero frame.
    assert_eq!(sent[2].len(), 8 * 5 * 4);
    assert!(sent[2].iter().all(|&b| b == 0));
    assert!(all_pixels(&sent[3], [3; 4]));

    let stats = filter.pipeline().stats();
    assert_eq!(stats.resizes, 1);
    assert_eq!(stats.reconnects, 2);
    // Old ring fully replaced, not leaked.
    assert_eq!(device.texture_count(), 2);
    assert_eq!(device.staging_count(), 2);
    assert!(filter.pipeline().phase().is_stable());
}

// ── Rename ───────────────────────────────────────────────────────

#[test]
fn test_rename_recreates_sender_but_not_surfaces() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter(r#"{"sender_name":"Relay A"}"#);

    tick_solid(&mut filter, &mut device, [1; 4], 16, 9);
    tick_solid(&mut filter, &mut device, [2; 4], 16, 9);
    let surfaces_before = device.texture_ids();

    filter.update_settings(r#"{"sender_name":"Relay B"}"#).unwrap();
    tick_solid(&mut filter, &mut device, [3; 4], 16, 9);

    // Same GPU resources, new sender.
    assert_eq!(device.texture_ids(), surfaces_before);
    assert_eq!(
        kinds(&filter),
        ["create", "frame", "frame", "flush", "destroy", "create", "frame"]
    );
    assert!(matches!(
        filter.pipeline().endpoint().transport().events().iter().rev().find(
            |e| matches!(e, TransportEvent::SenderCreated { .. })
        ),
        Some(TransportEvent::SenderCreated { name, .. }) if name == "Relay B"
    ));

    // The ring kept rolling: the first frame under the new name is the
    // content rendered the tick before the rename landed.
    let sent = payloads(&filter);
    assert!(all_pixels(&sent[2], [2; 4]));

    let stats = filter.pipeline().stats();
    assert_eq!(stats.resizes, 0);
    assert_eq!(stats.reconnects, 2);
}

#[test]
fn test_rename_to_same_name_does_nothing() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter(r#"{"sender_name":"Relay A"}"#);

    tick_solid(&mut filter, &mut device, [1; 4], 16, 9);
    filter.update_settings(r#"{"sender_name":"Relay A"}"#).unwrap();
    tick_solid(&mut filter, &mut device, [2; 4], 16, 9);

    assert_eq!(kinds(&filter), ["create", "frame", "frame"]);
}

#[test]
fn test_rename_before_first_frame_takes_effect() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter(r#"{"sender_name":"Relay A"}"#);

    // Settings applied before the source has rendered a single frame.
    filter.update_settings(r#"{"sender_name":"Relay B"}"#).unwrap();
    tick_solid(&mut filter, &mut device, [2; 4], 16, 9);

    // The birth sender goes away unseen; frames only ever flow under
    // the new name.
    assert_eq!(kinds(&filter), ["create", "flush", "destroy", "create", "frame"]);
    assert!(matches!(
        filter.pipeline().endpoint().transport().events().iter().rev().find(
            |e| matches!(e, TransportEvent::SenderCreated { .. })
        ),
        Some(TransportEvent::SenderCreated { name, .. }) if name == "Relay B"
    ));

    let stats = filter.pipeline().stats();
    assert_eq!(stats.resizes, 0);
    assert_eq!(stats.reconnects, 2);

    // Re-applying the same settings and ticking again adds one frame,
    // nothing else.
    filter.update_settings(r#"{"sender_name":"Relay B"}"#).unwrap();
    tick_solid(&mut filter, &mut device, [3; 4], 16, 9);
    assert_eq!(
        kinds(&filter),
        ["create", "flush", "destroy", "create", "frame", "frame"]
    );

    let sent = payloads(&filter);
    assert!(sent[0].iter().all(|&b| b == 0));
    assert!(all_pixels(&sent[1], [2; 4]));
}

// ── Idle source ──────────────────────────────────────────────────

#[test]
fn test_idle_gap_pauses_publishing_without_losing_state() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter("{}");

    tick_solid(&mut filter, &mut device, [7; 4], 16, 9);
    // Source goes inactive for two ticks.
    tick_solid(&mut filter, &mut device, [8; 4], 0, 0);
    tick_solid(&mut filter, &mut device, [8; 4], 0, 9);
    tick_solid(&mut filter, &mut device, [9; 4], 16, 9);

    assert_eq!(kinds(&filter), ["create", "frame", "frame"]);

    let stats = filter.pipeline().stats();
    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.skipped_idle, 2);
    assert_eq!(stats.published, 2);

    // The tick after the gap picks up where the ring left off: it maps
    // the copy staged before the gap.
    let sent = payloads(&filter);
    assert!(all_pixels(&sent[1], [7; 4]));
}

// ── Degraded transport and readback ──────────────────────────────

#[test]
fn test_sender_failure_runs_unpublished_until_rename() {
    let mut device = SoftwareDevice::new();
    let mut transport = MemoryTransport::new();
    transport.retain_payloads(true);
    // Creation fails at filter birth and again on the first tick's retry.
    transport.fail_next_creates(2);
    let mut filter = RelayFilter::new(transport, r#"{"sender_name":"Relay Out"}"#);

    tick_solid(&mut filter, &mut device, [1; 4], 16, 9);
    tick_solid(&mut filter, &mut device, [2; 4], 16, 9);

    // The relay keeps rendering and ring-cycling, just without a sender.
    assert!(filter.pipeline().is_allocated());
    assert_eq!(filter.pipeline().stats().published, 0);
    assert!(kinds(&filter).is_empty());

    // A rename triggers a reconnect, which now succeeds.
    filter
        .update_settings(r#"{"sender_name":"Relay Recovered"}"#)
        .unwrap();
    tick_solid(&mut filter, &mut device, [3; 4], 16, 9);

    assert_eq!(kinds(&filter), ["create", "frame"]);
    assert_eq!(filter.pipeline().stats().published, 1);
    assert_eq!(filter.pipeline().stats().reconnects, 1);

    // No frames were lost to the outage window: the ring kept advancing,
    // so the first published frame is the content rendered one tick ago.
    let sent = payloads(&filter);
    assert!(all_pixels(&sent[0], [2; 4]));
}

#[test]
fn test_deep_ring_freezes_output_while_maps_fail() {
    let mut device = SoftwareDevice::new();
    let mut filter = recording_filter(r#"{"ring_depth":4}"#);
    assert_eq!(filter.pipeline().ring_depth(), 4);

    for shade in 1..=5u8 {
        tick_solid(&mut filter, &mut device, [shade; 4], 4, 4);
    }

    // Copies queued from here on stall far beyond the ring window. The
    // next tick still reads the last healthy copy, then every map
    // misses.
    device.set_readback_latency(9);
    for shade in 6..=9u8 {
        tick_solid(&mut filter, &mut device, [shade; 4], 4, 4);
    }
    device.set_readback_latency(1);
    tick_solid(&mut filter, &mut device, [10; 4], 4, 4);
    tick_solid(&mut filter, &mut device, [11; 4], 4, 4);

    let sent = payloads(&filter);
    assert_eq!(sent.len(), 11);
    // Warm-up: zeros, then each tick carries the previous render.
    assert!(sent[0].iter().all(|&b| b == 0));
    assert!(all_pixels(&sent[4], [4; 4]));
    // Tick 6 read the last pre-stall copy; ticks 7 through 10 republished
    // it unchanged.
    assert!(all_pixels(&sent[5], [5; 4]));
    for frozen in &sent[6..=9] {
        assert_eq!(frozen, &sent[5]);
    }
    // Recovery: tick 11 maps tick 10's one-frame copy.
    assert!(all_pixels(&sent[10], [10; 4]));

    assert_eq!(filter.pipeline().stats().failed_maps, 4);
    assert_eq!(filter.pipeline().stats().published, 11);
}
