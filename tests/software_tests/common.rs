use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io::{Read, Write},
    rc::Rc,
    time::Duration,
};

use timer_harness::communication::{ComResult, CommunicationError, CommunicationHandle};

#[derive(Debug)]
pub enum ComEvent {
    /// The harness shall send exactly this frame
    Harness(&'static str),
    /// The device answers with this line
    Device(&'static str),
    /// The device stays silent, the read times out
    Silence,
}

/// This communication handle plays the device side of a conversation. Any send or receive
/// call is checked against the supplied expected events.
pub struct TestCom {
    expected_events: Rc<RefCell<VecDeque<ComEvent>>>,
    released: Rc<Cell<bool>>,
    timeout_fails: bool,
}

/// Stays with the test after the [`TestCom`] was moved into a session
pub struct Observer {
    expected_events: Rc<RefCell<VecDeque<ComEvent>>>,
    released: Rc<Cell<bool>>,
}

impl Observer {
    pub fn is_complete(&self) -> bool {
        self.expected_events.borrow().is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

impl CommunicationHandle for TestCom {
    fn set_timeout(&mut self, _timeout: &Duration) -> ComResult<()> {
        if self.timeout_fails {
            return Err(CommunicationError::Io(std::io::ErrorKind::Unsupported.into()));
        }
        Ok(())
    }

    fn send_frame(&mut self, frame: &[u8]) -> ComResult<()> {
        let frame = std::str::from_utf8(frame).unwrap();
        println!("Sent {frame:?}");
        match self.next_event() {
            Some(ComEvent::Harness(expected)) => assert_eq!(expected, frame),
            event => panic!("Expected {event:?} instead of send_frame({frame:?})"),
        }
        Ok(())
    }

    fn receive_line(&mut self) -> ComResult<String> {
        match self.next_event() {
            Some(ComEvent::Device(line)) => {
                println!("Received {line:?}");
                Ok(line.to_string())
            }
            Some(ComEvent::Silence) => Ok(String::new()),
            event => panic!("Expected {event:?} instead of receive_line"),
        }
    }

    fn release(&mut self) -> ComResult<()> {
        self.released.set(true);
        Ok(())
    }
}

impl TestCom {
    pub fn new(events: Vec<ComEvent>) -> (Self, Observer) {
        let com = TestCom {
            expected_events: Rc::new(RefCell::new(events.into())),
            released: Rc::default(),
            timeout_fails: false,
        };
        let observer = Observer {
            expected_events: com.expected_events.clone(),
            released: com.released.clone(),
        };
        (com, observer)
    }

    /// The transport refuses to configure its read timeout
    pub fn with_failing_timeout(mut self) -> Self {
        self.timeout_fails = true;
        self
    }

    fn next_event(&mut self) -> Option<ComEvent> {
        self.expected_events.borrow_mut().pop_front()
    }
}

impl Read for TestCom {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }
}
impl Write for TestCom {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Events for a successful first handshake
pub fn greeting() -> Vec<ComEvent> {
    vec![ComEvent::Harness("h"), ComEvent::Device("Hello")]
}

/// Script prefixed with a greeting
pub fn after_greeting(events: Vec<ComEvent>) -> Vec<ComEvent> {
    let mut script = greeting();
    script.extend(events);
    script
}

pub fn prepare_logging() {
    let _ = std::fs::create_dir_all("tests/tmp");
    file_per_thread_logger::allow_uninitialized();
    file_per_thread_logger::initialize("tests/tmp/log-");
}
