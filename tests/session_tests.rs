//! Claim, transfer and cleanup behaviour against a scripted device.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use keene_fm::device::{claim_interface, ControlHandle, CONTROL_INTERFACE};
use keene_fm::session::{release, Session};
use keene_fm::{encode, Error, Settings};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Claim(u8),
    Detach(u8),
    Release(u8),
    Write {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: Vec<u8>,
        timeout: Duration,
    },
}

#[derive(Default)]
struct ScriptedHandle {
    calls: Rc<RefCell<Vec<Call>>>,
    claims: VecDeque<rusb::Result<()>>,
    detach: Option<rusb::Error>,
    writes: VecDeque<rusb::Result<usize>>,
    release: Option<rusb::Error>,
}

impl ScriptedHandle {
    fn new() -> (Self, Rc<RefCell<Vec<Call>>>) {
        let handle = ScriptedHandle::default();
        let calls = Rc::clone(&handle.calls);
        (handle, calls)
    }
}

impl ControlHandle for ScriptedHandle {
    fn claim_interface(&mut self, iface: u8) -> rusb::Result<()> {
        self.calls.borrow_mut().push(Call::Claim(iface));
        self.claims.pop_front().unwrap_or(Ok(()))
    }

    fn release_interface(&mut self, iface: u8) -> rusb::Result<()> {
        self.calls.borrow_mut().push(Call::Release(iface));
        match self.release {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn detach_kernel_driver(&mut self, iface: u8) -> rusb::Result<()> {
        self.calls.borrow_mut().push(Call::Detach(iface));
        match self.detach {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.calls.borrow_mut().push(Call::Write {
            request_type,
            request,
            value,
            index,
            data: buf.to_vec(),
            timeout,
        });
        self.writes.pop_front().unwrap_or(Ok(buf.len()))
    }
}

fn count(calls: &[Call], pred: impl Fn(&Call) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}

fn writes(calls: &[Call]) -> Vec<Vec<u8>> {
    calls
        .iter()
        .filter_map(|c| match c {
            Call::Write { data, .. } => Some(data.clone()),
            _ => None,
        })
        .collect()
}

fn settings() -> Settings {
    Settings {
        frequency_mhz: Some(100.0),
        ..Settings::default()
    }
}

// ============================================================================
// Claim
// ============================================================================

#[test]
fn test_claim_first_try() {
    let (mut handle, calls) = ScriptedHandle::new();
    claim_interface(&mut handle, CONTROL_INTERFACE).unwrap();
    assert_eq!(*calls.borrow(), vec![Call::Claim(2)]);
}

#[test]
fn test_busy_interface_recovers_after_detach() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.claims.push_back(Err(rusb::Error::Busy));

    let session = Session::claim(handle, CONTROL_INTERFACE).unwrap();
    assert!(session.is_claimed());

    let calls = calls.borrow();
    assert_eq!(count(&calls, |c| matches!(c, Call::Detach(2))), 1);
    assert_eq!(count(&calls, |c| matches!(c, Call::Claim(2))), 2);
    assert_eq!(*calls, vec![Call::Claim(2), Call::Detach(2), Call::Claim(2)]);
}

#[test]
fn test_failed_detach_is_not_retried() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.claims.push_back(Err(rusb::Error::Busy));
    handle.detach = Some(rusb::Error::Access);

    let result = claim_interface(&mut handle, CONTROL_INTERFACE);
    assert!(matches!(
        result,
        Err(Error::DriverDetachFailed {
            interface: 2,
            source: rusb::Error::Access
        })
    ));
    assert_eq!(*calls.borrow(), vec![Call::Claim(2), Call::Detach(2)]);
}

#[test]
fn test_second_busy_claim_gives_up() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.claims.push_back(Err(rusb::Error::Busy));
    handle.claims.push_back(Err(rusb::Error::Busy));

    let result = claim_interface(&mut handle, CONTROL_INTERFACE);
    assert!(matches!(result, Err(Error::ClaimFailed { interface: 2, .. })));
    assert_eq!(count(&calls.borrow(), |c| matches!(c, Call::Claim(_))), 2);
    assert_eq!(count(&calls.borrow(), |c| matches!(c, Call::Detach(_))), 1);
}

#[test]
fn test_other_claim_errors_skip_recovery() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.claims.push_back(Err(rusb::Error::Access));

    let result = claim_interface(&mut handle, CONTROL_INTERFACE);
    assert!(matches!(
        result,
        Err(Error::ClaimFailed {
            source: rusb::Error::Access,
            ..
        })
    ));
    assert_eq!(*calls.borrow(), vec![Call::Claim(2)]);
}

#[test]
fn test_failed_claim_releases_nothing() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.claims.push_back(Err(rusb::Error::Access));

    assert!(Session::claim(handle, CONTROL_INTERFACE).is_err());
    assert_eq!(count(&calls.borrow(), |c| matches!(c, Call::Release(_))), 0);
}

// ============================================================================
// Transfer
// ============================================================================

#[test]
fn test_frames_sent_in_order_with_hid_request() {
    let (handle, calls) = ScriptedHandle::new();
    let frames = encode(&settings()).unwrap();

    let mut session = Session::claim(handle, CONTROL_INTERFACE).unwrap();
    session.send(&frames).unwrap();
    drop(session);

    let calls = calls.borrow();
    let sent: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, Call::Write { .. }))
        .collect();
    assert_eq!(sent.len(), 2);
    for call in &sent {
        match call {
            Call::Write {
                request_type,
                request,
                value,
                index,
                timeout,
                ..
            } => {
                assert_eq!(*request_type, 0x21);
                assert_eq!(*request, 9);
                assert_eq!(*value, 0x0200);
                assert_eq!(*index, 0x0002);
                assert_eq!(*timeout, Duration::from_millis(1000));
            }
            _ => unreachable!(),
        }
    }
    assert_eq!(
        writes(&calls),
        vec![
            frames.tuning.as_bytes().to_vec(),
            frames.audio.as_bytes().to_vec()
        ]
    );
    assert_eq!(calls.last(), Some(&Call::Release(2)));
}

#[test]
fn test_short_first_write_stops_and_releases() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.writes.push_back(Ok(6));

    let mut session = Session::claim(handle, CONTROL_INTERFACE).unwrap();
    let result = session.configure(&settings());
    match result {
        Err(Error::TransferFailed {
            tag,
            requested,
            actual,
            cause,
        }) => {
            assert_eq!(tag, 0x50);
            assert_eq!(requested, 8);
            assert_eq!(actual, 6);
            assert!(cause.is_none());
        }
        other => panic!("expected TransferFailed, got {other:?}"),
    }
    drop(session);

    let calls = calls.borrow();
    let sent = writes(&calls);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][1], 0x50);
    assert_eq!(count(&calls, |c| matches!(c, Call::Release(2))), 1);
}

#[test]
fn test_error_on_second_frame_fails_operation() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.writes.push_back(Ok(8));
    handle.writes.push_back(Err(rusb::Error::Timeout));

    let mut session = Session::claim(handle, CONTROL_INTERFACE).unwrap();
    let result = session.configure(&settings());
    assert!(matches!(
        result,
        Err(Error::TransferFailed {
            tag: 0x51,
            actual: 0,
            cause: Some(rusb::Error::Timeout),
            ..
        })
    ));
    drop(session);
    assert_eq!(writes(&calls.borrow()).len(), 2);
    assert_eq!(calls.borrow().last(), Some(&Call::Release(2)));
}

#[test]
fn test_invalid_settings_send_nothing_but_still_release() {
    let (handle, calls) = ScriptedHandle::new();
    let mut session = Session::claim(handle, CONTROL_INTERFACE).unwrap();

    let bad = Settings {
        power: 29,
        ..settings()
    };
    assert!(matches!(
        session.configure(&bad),
        Err(Error::OutOfRange { field: "PA", .. })
    ));
    drop(session);

    assert!(writes(&calls.borrow()).is_empty());
    assert_eq!(calls.borrow().last(), Some(&Call::Release(2)));
}

// ============================================================================
// Cleanup
// ============================================================================

#[test]
fn test_release_is_idempotent() {
    let (handle, calls) = ScriptedHandle::new();
    let mut session = Session::claim(handle, CONTROL_INTERFACE).unwrap();
    session.release();
    session.release();
    assert!(!session.is_claimed());
    drop(session);
    assert_eq!(count(&calls.borrow(), |c| matches!(c, Call::Release(_))), 1);
}

#[test]
fn test_release_without_session_is_noop() {
    release::<ScriptedHandle>(None);
}

#[test]
fn test_release_error_is_swallowed() {
    let (mut handle, calls) = ScriptedHandle::new();
    handle.release = Some(rusb::Error::NoDevice);
    let session = Session::claim(handle, CONTROL_INTERFACE).unwrap();
    release(Some(session));
    assert_eq!(count(&calls.borrow(), |c| matches!(c, Call::Release(2))), 1);
}
