//! Frame routing between the serial link and the bus
//!
//! The dispatcher looks up each frame's kind in the codec's route table and
//! either swallows it or hands it to the sink for the other side. It is
//! used in both directions: decoded serial frames go to the bus client,
//! frames delivered by the bus go to the serial writer.

use super::FrameSink;
use fgbridge_core::{BridgeEvent, DropReason, Frame, FrameResult, Route, RouteTable};

/// Which way a frame is travelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Decoded from the microcontroller, headed for the coordinator
    SerialToBus,
    /// Delivered by the coordinator, headed for the microcontroller
    BusToSerial,
}

/// What happened to a dispatched frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Control frame, swallowed
    Consumed,
    /// Handed to the sink, which accepted this many bytes
    Forwarded(usize),
}

/// Routes frames by kind
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    routes: RouteTable,
}

impl EventDispatcher {
    /// Create a dispatcher over a route table
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    /// The route table in use
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Route one frame
    pub fn dispatch(
        &self,
        frame: &Frame,
        sink: &dyn FrameSink,
        direction: Direction,
    ) -> FrameResult<Dispatch> {
        match self.routes.route(frame.kind) {
            Route::Consume => {
                tracing::trace!("Consumed control kind {} ({:?})", frame.kind, direction);
                Ok(Dispatch::Consumed)
            }
            Route::Forward => {
                let bytes = sink.send_frame(frame)?;
                tracing::debug!("{} {:?} ({} bytes)", frame, direction, bytes);
                Ok(Dispatch::Forwarded(bytes))
            }
        }
    }
}

/// Diagnostic event describing a dispatch outcome
pub fn outcome_event(
    frame: &Frame,
    direction: Direction,
    outcome: &FrameResult<Dispatch>,
) -> BridgeEvent {
    let kind = frame.kind;
    match (outcome, direction) {
        (Ok(Dispatch::Consumed), _) => BridgeEvent::FrameConsumed { kind },
        (Ok(Dispatch::Forwarded(bytes)), Direction::SerialToBus) => BridgeEvent::FrameForwarded {
            kind,
            bytes: *bytes,
        },
        (Ok(Dispatch::Forwarded(bytes)), Direction::BusToSerial) => {
            BridgeEvent::FrameTransmitted {
                kind,
                bytes: *bytes,
            }
        }
        (Err(e), Direction::SerialToBus) => BridgeEvent::FrameDropped {
            reason: DropReason::SendFailed(e.to_string()),
        },
        (Err(e), Direction::BusToSerial) => BridgeEvent::FrameDropped {
            reason: DropReason::WriteFailed(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgbridge_core::{kinds, FrameError};
    use parking_lot::Mutex;
    use std::io;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<Frame>>,
    }

    impl FrameSink for Recorder {
        fn send_frame(&self, frame: &Frame) -> FrameResult<usize> {
            self.frames.lock().push(frame.clone());
            Ok(frame.encoded_len())
        }
    }

    struct Refusing;

    impl FrameSink for Refusing {
        fn send_frame(&self, _frame: &Frame) -> FrameResult<usize> {
            Err(FrameError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "bus down",
            )))
        }
    }

    #[test]
    fn test_control_kinds_are_consumed() {
        let dispatcher = EventDispatcher::default();
        let sink = Recorder::default();

        for kind in [kinds::ALIVE, kinds::CONFIRMED] {
            let outcome = dispatcher
                .dispatch(&Frame::empty(kind), &sink, Direction::SerialToBus)
                .unwrap();
            assert_eq!(outcome, Dispatch::Consumed);
        }
        assert!(sink.frames.lock().is_empty());
    }

    #[test]
    fn test_application_kinds_are_forwarded_verbatim() {
        let dispatcher = EventDispatcher::default();
        let sink = Recorder::default();
        let frame = Frame::new(5, vec![0x41, 0x42, 0x43]);

        let outcome = dispatcher
            .dispatch(&frame, &sink, Direction::SerialToBus)
            .unwrap();
        assert_eq!(outcome, Dispatch::Forwarded(9));
        assert_eq!(*sink.frames.lock(), vec![frame]);
    }

    #[test]
    fn test_custom_route_table() {
        let dispatcher =
            EventDispatcher::new(RouteTable::new(Route::Consume).with_route(7, Route::Forward));
        let sink = Recorder::default();

        let outcome = dispatcher
            .dispatch(&Frame::empty(5), &sink, Direction::BusToSerial)
            .unwrap();
        assert_eq!(outcome, Dispatch::Consumed);
        let outcome = dispatcher
            .dispatch(&Frame::empty(7), &sink, Direction::BusToSerial)
            .unwrap();
        assert_eq!(outcome, Dispatch::Forwarded(6));
    }

    #[test]
    fn test_outcome_events() {
        let sink = Recorder::default();
        let dispatcher = EventDispatcher::default();

        let alive = Frame::empty(kinds::ALIVE);
        let outcome = dispatcher.dispatch(&alive, &sink, Direction::SerialToBus);
        assert_eq!(
            outcome_event(&alive, Direction::SerialToBus, &outcome),
            BridgeEvent::FrameConsumed { kind: 0 }
        );

        let frame = Frame::empty(5);
        let outcome = dispatcher.dispatch(&frame, &sink, Direction::SerialToBus);
        assert_eq!(
            outcome_event(&frame, Direction::SerialToBus, &outcome),
            BridgeEvent::FrameForwarded { kind: 5, bytes: 6 }
        );
        let outcome = dispatcher.dispatch(&frame, &sink, Direction::BusToSerial);
        assert_eq!(
            outcome_event(&frame, Direction::BusToSerial, &outcome),
            BridgeEvent::FrameTransmitted { kind: 5, bytes: 6 }
        );

        let outcome = dispatcher.dispatch(&frame, &Refusing, Direction::BusToSerial);
        assert!(matches!(
            outcome_event(&frame, Direction::BusToSerial, &outcome),
            BridgeEvent::FrameDropped {
                reason: DropReason::WriteFailed(_)
            }
        ));
        let outcome = dispatcher.dispatch(&frame, &Refusing, Direction::SerialToBus);
        assert!(matches!(
            outcome_event(&frame, Direction::SerialToBus, &outcome),
            BridgeEvent::FrameDropped {
                reason: DropReason::SendFailed(_)
            }
        ));
    }
}
