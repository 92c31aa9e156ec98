//! Fuzz target: notification queue accounting
//!
//! Interprets the input as a sequence of operations on a notification
//! queue (record a write, charge a frame, reset) and verifies:
//! - No panics under arbitrary sequences
//! - Queued byte totals always equal recorded minus charged
//! - A failed charge leaves the queue untouched
//!
//! cargo fuzz run fuzz_notification_accounting

#![no_main]

use libfuzzer_sys::fuzz_target;
use rhythmbadge::rpc::notifications::{Notification, NotificationQueue};
use rhythmbadge::rpc::reassembly::consume_notifications;

fn queued_bytes(queue: &NotificationQueue) -> u32 {
    queue.iter().map(|n| u32::from(n.notification_len)).sum()
}

fuzz_target!(|data: &[u8]| {
    let queue: NotificationQueue = NotificationQueue::new();
    let mut expected = 0u32;

    for pair in data.chunks_exact(2) {
        let arg = u16::from(pair[1]);
        match pair[0] % 3 {
            0 if arg > 0 => {
                let accepted = queue.push(Notification {
                    notification_len: arg,
                    ..Notification::default()
                });
                if accepted {
                    expected += u32::from(arg);
                }
            }
            1 => {
                let before: Vec<Notification> = queue.iter().collect();
                match consume_notifications(&queue, arg) {
                    Ok(()) => expected -= u32::from(arg) + 2,
                    Err(_) => assert_eq!(before, queue.iter().collect::<Vec<_>>()),
                }
            }
            2 => {
                queue.clear();
                expected = 0;
            }
            _ => {}
        }
        assert_eq!(queued_bytes(&queue), expected);
    }
});
