//! Control message types for host → audio-thread communication.
//!
//! Messages travel over a lock-free SPSC queue and are applied at the top of
//! the next `process` call, so parameter changes always land on a block
//! boundary.

use crate::store::Param;
use rtrb::{Consumer, Producer, RingBuffer};

/// Capacity for control message queue.
pub const CONTROL_QUEUE_CAPACITY: usize = 256;

/// Creates a new control message queue pair.
///
/// Returns (producer for the host thread, consumer for the engine).
pub fn new_control_queue() -> (Producer<ControlMsg>, Consumer<ControlMsg>) {
    RingBuffer::new(CONTROL_QUEUE_CAPACITY)
}

/// Control messages sent from the host thread to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMsg {
    /// Write one host parameter.
    SetParam {
        param: Param,
        value: f32,
    },

    /// Fire the click port at `level`, restarting the transport.
    Click {
        level: f32,
    },

    /// Reset the telemetry cursor.
    ClearTelemetry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_msg_is_copy() {
        let msg = ControlMsg::SetParam {
            param: Param::Tempo,
            value: 90.0,
        };
        let msg2 = msg; // Copy
        assert_eq!(msg, msg2);
    }

    #[test]
    fn test_control_queue_roundtrip() {
        let (mut tx, mut rx) = new_control_queue();

        tx.push(ControlMsg::Click { level: 1.0 }).unwrap();
        tx.push(ControlMsg::ClearTelemetry).unwrap();

        let msg1 = rx.pop().unwrap();
        let msg2 = rx.pop().unwrap();

        assert!(matches!(msg1, ControlMsg::Click { level } if (level - 1.0).abs() < 0.001));
        assert_eq!(msg2, ControlMsg::ClearTelemetry);
        assert!(rx.pop().is_err());
    }
}
