use std::time::Duration;

use crate::common::{self, ComEvent, ComEvent::*, Observer, TestCom};
use test_case::test_case;
use timer_harness::communication::{CodecError, Command, CommandId};
use timer_harness::device::{AnalogueSamples, Enables, Status, Thresholds};
use timer_harness::oracle::VerificationError;
use timer_harness::session::{AnalogueReading, DeviceSession};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const TIMEOUT: Duration = Duration::from_secs(2);

fn greeted(events: Vec<ComEvent>) -> (DeviceSession<TestCom>, Observer) {
    common::prepare_logging();
    let (com, observer) = TestCom::new(common::after_greeting(events));
    (DeviceSession::establish(com, TIMEOUT, 10).unwrap(), observer)
}

#[test]
fn handshake_is_retried_until_hello() {
    common::prepare_logging();
    let (com, observer) = TestCom::new(vec![
        Harness("h"),
        Device("\u{0}garbage"),
        Harness("h"),
        Silence,
        Harness("h"),
        Device("Hello"),
    ]);

    let session = DeviceSession::establish(com, TIMEOUT, 10).unwrap();
    assert!(observer.is_complete());
    assert!(!observer.is_released());

    drop(session);
    assert!(observer.is_released());
}

#[test]
fn handshake_gives_up_after_attempt_cap() {
    common::prepare_logging();
    let (com, observer) = TestCom::new(vec![
        Harness("h"),
        Device("Hell"),
        Harness("h"),
        Device("hello"),
        Harness("h"),
        Device("Hellx"),
    ]);

    let err = DeviceSession::establish(com, TIMEOUT, 3).err().unwrap();

    assert!(matches!(
        err,
        VerificationError::HandshakeFailed { attempts: 3, ref last } if last == "Hellx"
    ));
    assert!(observer.is_complete());
    assert!(observer.is_released(), "transport must be released after a failed handshake");
}

#[test]
fn transport_is_released_when_timeout_cannot_be_set() {
    common::prepare_logging();
    let (com, observer) = TestCom::new(vec![]);

    let err = DeviceSession::establish(com.with_failing_timeout(), TIMEOUT, 10).err().unwrap();

    assert!(matches!(err, VerificationError::Communication(_)));
    assert!(observer.is_complete(), "no frame may be sent without a timeout");
    assert!(observer.is_released());
}

#[test]
fn control_commands_expect_ok() -> TestResult {
    let (mut session, observer) = greeted(vec![
        Harness("r"),
        Device("Rok"),
        Harness("f0101"),
        Device("Fok"),
        Harness("u1,2,3,4"),
        Device("Uok"),
        Harness("g"),
        Device("Gok"),
        Harness("s"),
        Device("Sok"),
        Harness("c"),
        Device("Cok"),
    ]);

    session.reset()?;
    session.set_enables(Enables([false, true, false, true]))?;
    session.set_thresholds(Thresholds([1, 2, 3, 4]))?;
    session.start()?;
    session.stop()?;
    session.clear()?;

    assert!(observer.is_complete());
    Ok(())
}

#[test_case("Rfail"; "wrong body")]
#[test_case("Gok"; "wrong tag")]
#[test_case("Rok "; "trailing space")]
#[test_case(""; "timeout")]
fn unexpected_ok_response_is_a_mismatch(response: &'static str) {
    let (mut session, _) = greeted(vec![Harness("r"), Device(response)]);

    let err = session.reset().unwrap_err();

    match err {
        VerificationError::Mismatch { command, expected, actual } => {
            assert_eq!(command, CommandId::Reset);
            assert_eq!(expected, "Rok");
            assert_eq!(actual, response);
        }
        e => panic!("unexpected {e:?}"),
    }
}

#[test]
fn queries_are_parsed() -> TestResult {
    let (mut session, observer) = greeted(vec![
        Harness("e"),
        Device("E1010"),
        Harness("t"),
        Device("T0,32767,0,0"),
        Harness("v"),
        Device("V101,0,102,0"),
        Harness("q"),
        Device("QGTDD"),
        Harness("i"),
        Device("IArduino timer v2"),
    ]);

    assert_eq!(session.enables()?, Enables([true, false, true, false]));
    assert_eq!(session.thresholds()?, Thresholds([0, 32767, 0, 0]));
    assert_eq!(session.elapsed()?.0, [101, 0, 102, 0]);
    assert_eq!(session.status()?, "GTDD".parse::<Status>()?);
    assert_eq!(session.info()?, "Arduino timer v2");

    assert!(observer.is_complete());
    Ok(())
}

#[test]
fn query_with_wrong_tag_is_a_mismatch() {
    let (mut session, _) = greeted(vec![Harness("q"), Device("VDDDD")]);

    assert!(matches!(
        session.status(),
        Err(VerificationError::Mismatch { command: CommandId::GetStatus, .. })
    ));
}

#[test_case("V1,2,3", CodecError::FieldCount { expected: 4, actual: 3 })]
#[test_case("V1,2,3,-4", CodecError::InvalidField("-4".into()))]
#[test_case("", CodecError::Empty)]
fn malformed_query_response_is_reported(response: &'static str, reason: CodecError) {
    let (mut session, _) = greeted(vec![Harness("v"), Device(response)]);

    match session.elapsed().unwrap_err() {
        VerificationError::Malformed { command, line, reason: actual } => {
            assert_eq!(command, CommandId::GetElapsed);
            assert_eq!(line, response);
            assert_eq!(actual, reason);
        }
        e => panic!("unexpected {e:?}"),
    }
}

#[test_case("A1,2,3,1023", AnalogueReading::Samples(AnalogueSamples([1, 2, 3, 1023])))]
#[test_case("Afailed:adc busy", AnalogueReading::Failed("adc busy".into()))]
#[test_case("Afailed:", AnalogueReading::Failed(String::new()))]
fn analogue_failure_is_distinguished_by_prefix(response: &'static str, reading: AnalogueReading) {
    let (mut session, _) = greeted(vec![Harness("a"), Device(response)]);

    assert_eq!(session.analogue().unwrap(), reading);
}

#[test]
fn analogue_with_wrong_shape_is_malformed() {
    let (mut session, _) = greeted(vec![Harness("a"), Device("A1,2,x,4")]);

    assert!(matches!(
        session.analogue(),
        Err(VerificationError::Malformed { command: CommandId::ReadAnalogue, .. })
    ));
}

#[test]
fn timed_round_trip_reports_response_and_latency() -> TestResult {
    let (mut session, _) = greeted(vec![Harness("g"), Device("Gok")]);

    let (response, latency) = session.timed_round_trip(&Command::Start)?;

    assert_eq!(response, "Gok");
    assert!(latency < TIMEOUT);
    Ok(())
}
