use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::*;
use crate::error::FrameError;
use crate::ws::handler::Handler;
use crate::ws::message::Message;

#[derive(Default)]
struct Recorder {
    frames: Mutex<Vec<Frame>>,
    closing: Mutex<Vec<Duration>>,
    closes: Mutex<usize>,
    events: Mutex<Vec<EventKind>>,
}

impl Recorder {
    fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }
    fn events(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().clone()
    }
    fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

impl Transport for Recorder {
    fn write(&self, frame: Vec<u8>, _opcode: Opcode, _fin: bool) -> std::result::Result<(), TransportError> {
        self.frames.lock().unwrap().push(decode_frame(&frame).unwrap());
        Ok(())
    }
    fn closing(&self, timeout: Duration) {
        self.closing.lock().unwrap().push(timeout);
    }
    fn close(&self) {
        *self.closes.lock().unwrap() += 1;
    }
}

impl Handler for Recorder {
    fn on_open(&self, _connection: &Connection) {
        self.events.lock().unwrap().push(EventKind::Open);
    }
    fn on_message(&self, _connection: &Connection, message: Message) {
        self.events.lock().unwrap().push(EventKind::Message(message));
    }
    fn on_binary(&self, _connection: &Connection, message: Message) {
        self.events.lock().unwrap().push(EventKind::Binary(message));
    }
    fn on_error(&self, _connection: &Connection, error: &str) {
        self.events.lock().unwrap().push(EventKind::Error(error.to_string()));
    }
    fn on_close(&self, _connection: &Connection, info: &ClosingInfo) {
        self.events.lock().unwrap().push(EventKind::Close(info.clone()));
    }
}

/// Answers every text message from inside the callback.
struct Replier;

impl Handler for Replier {
    fn on_message(&self, connection: &Connection, message: Message) {
        let text = format!("re: {}", message.as_text().unwrap());
        connection.send_text(&text).unwrap();
        if text.len() > 10 {
            connection.close(CLOSE_NORMAL, "done").unwrap();
        }
    }
}

/// Closes back from inside `on_close`.
#[derive(Default)]
struct ClosesBack {
    closes: Mutex<Vec<ClosingInfo>>,
}

impl Handler for ClosesBack {
    fn on_close(&self, connection: &Connection, info: &ClosingInfo) {
        self.closes.lock().unwrap().push(info.clone());
        connection.close(CLOSE_NORMAL, "me too").unwrap();
    }
}

/// Stalls on the first frame so another thread can race it.
struct Stalling {
    frames: Mutex<Vec<Frame>>,
    entered: Mutex<Option<mpsc::Sender<()>>>,
}

impl Transport for Stalling {
    fn write(&self, frame: Vec<u8>, _opcode: Opcode, _fin: bool) -> std::result::Result<(), TransportError> {
        self.frames.lock().unwrap().push(decode_frame(&frame).unwrap());
        let entered = self.entered.lock().unwrap().take();
        if let Some(entered) = entered {
            entered.send(()).unwrap();
            thread::sleep(Duration::from_millis(100));
        }
        Ok(())
    }
    fn close(&self) {}
}

fn connection_with(role: Role, config: WebSocketConfig) -> (Connection, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let connection = Connection::new(
        role,
        config,
        ConnectionInfo::new("/ws?Room=lobby&user=ann"),
        recorder.clone(),
        recorder.clone(),
    );
    (connection, recorder)
}

fn open_server() -> (Connection, Arc<Recorder>) {
    let (connection, recorder) = connection_with(Role::Server, WebSocketConfig::default());
    assert!(connection.open());
    (connection, recorder)
}

fn close_frame(code: u16, reason: &str) -> Frame {
    Frame::new(Opcode::Close, true, ClosingInfo::new(code, reason).encode())
}

fn close_events(events: &[EventKind]) -> Vec<ClosingInfo> {
    events
        .iter()
        .filter_map(|event| match event {
            EventKind::Close(info) => Some(info.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn opens_once() {
    let (connection, recorder) = connection_with(Role::Server, WebSocketConfig::default());
    assert_eq!(connection.state(), ConnectionState::Connecting);
    assert!(matches!(connection.send_text("early"), Err(Error::NotOpen)));

    assert!(connection.open());
    assert!(!connection.open());
    assert!(connection.is_open());
    assert_eq!(recorder.events(), vec![EventKind::Open]);
    assert!(recorder.frames().is_empty());
}

#[test]
fn query_parameters_are_case_insensitive() {
    let info = ConnectionInfo::new("/ws?Room=lobby&user=ann&flag").with_query_parameters();
    assert_eq!(info.parameter("room"), Some("lobby"));
    assert_eq!(info.parameter("USER"), Some("ann"));
    assert_eq!(info.parameter("flag"), Some(""));
    assert_eq!(info.parameter("missing"), None);

    let mut info = info;
    info.add_header("X-Custom", "1");
    assert_eq!(info.header("x-custom"), Some("1"));
    assert_eq!(info.headers().count(), 1);
}

#[test]
fn server_sends_unmasked_fragments() {
    let mut config = WebSocketConfig::default();
    config.set_fragment_size(0);
    let (connection, recorder) = connection_with(Role::Server, config);
    connection.open();

    let size = connection.config().fragment_size();
    let text = "x".repeat(size * 2 + 1);
    connection.send_text(&text).unwrap();

    let frames = recorder.frames();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.opcode == Opcode::Text && !f.masked()));
    assert_eq!(
        frames.iter().map(Frame::fin).collect::<Vec<_>>(),
        vec![false, false, true]
    );
    let joined: Vec<u8> = frames.into_iter().flat_map(|f| f.payload).collect();
    assert_eq!(joined, text.as_bytes());
}

#[test]
fn client_masks_every_frame() {
    let (connection, recorder) = connection_with(Role::Client, WebSocketConfig::default());
    connection.open();
    connection.send_binary(&[1, 2, 3]).unwrap();
    connection.send_ping().unwrap();

    let frames = recorder.frames();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(Frame::masked));
    assert_eq!(frames[0].payload, vec![1, 2, 3]);
    assert_eq!(frames[1].opcode, Opcode::Ping);
    assert_eq!(frames[1].payload, PING_PAYLOAD);
}

#[test]
fn fragmented_text_is_dispatched_whole() {
    let (connection, recorder) = open_server();
    let pieces: [&[u8]; 3] = [b"one ", b"two ", b"three"];
    for (i, piece) in pieces.iter().enumerate() {
        let opcode = if i == 0 { Opcode::Text } else { Opcode::Continuation };
        connection
            .receive(Frame::new(opcode, i == 2, piece.to_vec()))
            .unwrap();
    }
    assert_eq!(
        recorder.events(),
        vec![
            EventKind::Open,
            EventKind::Message(Message::text(b"one two three".to_vec())),
        ]
    );
}

#[test]
fn binary_fragments_are_dispatched_each() {
    let (connection, recorder) = open_server();
    connection
        .receive(Frame::new(Opcode::Binary, false, vec![1]))
        .unwrap();
    connection
        .receive(Frame::new(Opcode::Continuation, true, vec![2]))
        .unwrap();
    assert_eq!(
        recorder.events()[1..],
        [
            EventKind::Binary(Message::binary(vec![1], false)),
            EventKind::Binary(Message::binary(vec![2], true)),
        ]
    );
}

#[test]
fn ping_is_answered_with_its_payload() {
    let (connection, recorder) = open_server();
    connection
        .receive(Frame::new(Opcode::Ping, true, b"are you there".to_vec()))
        .unwrap();

    let frames = recorder.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode, Opcode::Pong);
    assert_eq!(frames[0].payload, b"are you there");
    assert_eq!(recorder.events(), vec![EventKind::Open]);
}

#[test]
fn pong_marks_the_peer_alive() {
    let (connection, _recorder) = open_server();
    connection.send_ping().unwrap();
    assert!(!connection.is_alive());
    connection
        .receive(Frame::new(Opcode::Pong, true, PING_PAYLOAD.to_vec()))
        .unwrap();
    assert!(connection.is_alive());
}

#[test]
fn remote_close_is_echoed_once() {
    let (connection, recorder) = open_server();
    connection.receive(close_frame(CLOSE_NORMAL, "bye")).unwrap();

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(
        close_events(&recorder.events()),
        vec![ClosingInfo::new(CLOSE_NORMAL, "bye")]
    );
    let frames = recorder.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode, Opcode::Close);
    assert_eq!(ClosingInfo::decode(&frames[0].payload).unwrap().code, CLOSE_NORMAL);
    assert_eq!(recorder.closes(), 1);

    // nothing more goes out once closed
    connection.close(CLOSE_GOING_AWAY, "again").unwrap();
    assert_eq!(recorder.frames().len(), 1);
    assert!(matches!(connection.send_text("late"), Err(Error::NotOpen)));
    assert_eq!(close_events(&recorder.events()).len(), 1);
}

#[test]
fn close_without_status_is_answered_normally() {
    let (connection, recorder) = open_server();
    connection
        .receive(Frame::new(Opcode::Close, true, Vec::new()))
        .unwrap();
    assert_eq!(
        close_events(&recorder.events())[0].code,
        CLOSE_NO_STATUS
    );
    let reply = ClosingInfo::decode(&recorder.frames()[0].payload).unwrap();
    assert_eq!(reply.code, CLOSE_NORMAL);
}

#[test]
fn peer_code_is_echoed() {
    let (connection, recorder) = open_server();
    connection.receive(close_frame(4001, "app")).unwrap();
    let reply = ClosingInfo::decode(&recorder.frames()[0].payload).unwrap();
    assert_eq!(reply.code, 4001);
}

#[test]
fn local_close_waits_for_the_answer() {
    let (connection, recorder) = open_server();
    connection.close(CLOSE_GOING_AWAY, "shutting down").unwrap();

    assert_eq!(connection.state(), ConnectionState::ClosingLocal);
    assert_eq!(
        *recorder.closing.lock().unwrap(),
        vec![connection.config().closing_timeout()]
    );
    assert!(close_events(&recorder.events()).is_empty());
    assert_eq!(recorder.closes(), 0);
    assert!(matches!(connection.send_text("late"), Err(Error::NotOpen)));

    // a second close while waiting is a no-op
    connection.close(CLOSE_NORMAL, "").unwrap();
    assert_eq!(recorder.frames().len(), 1);

    connection.receive(close_frame(CLOSE_GOING_AWAY, "ok")).unwrap();
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(
        close_events(&recorder.events()),
        vec![ClosingInfo::new(CLOSE_GOING_AWAY, "ok")]
    );
    assert_eq!(recorder.frames().len(), 1);
    assert_eq!(recorder.closes(), 1);
}

#[test]
fn unanswered_close_expires() {
    let (connection, recorder) = open_server();
    assert!(!connection.expire_close());
    connection.close(CLOSE_NORMAL, "bye").unwrap();

    assert!(connection.expire_close());
    assert!(!connection.expire_close());
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(
        close_events(&recorder.events()),
        vec![ClosingInfo::new(CLOSE_NORMAL, "bye")]
    );
    assert_eq!(connection.closing_info(), Some(ClosingInfo::new(CLOSE_NORMAL, "bye")));
}

#[test]
fn closing_before_open_is_silent() {
    let (connection, recorder) = connection_with(Role::Server, WebSocketConfig::default());
    connection.close(CLOSE_NORMAL, "").unwrap();
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(recorder.frames().is_empty());
    assert!(recorder.events().is_empty());
    assert!(!connection.open());
}

#[test]
fn protocol_error_fails_without_close_frame() {
    let (connection, recorder) = open_server();
    let result = connection.receive(Frame::new(Opcode::Continuation, true, vec![0]));
    assert!(matches!(
        result,
        Err(Error::Frame(FrameError::UnexpectedContinuation))
    ));

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(recorder.frames().is_empty());
    assert_eq!(recorder.closes(), 1);
    let events = recorder.events();
    assert!(matches!(events[1], EventKind::Error(_)));
    let closes = close_events(&events);
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].code, CLOSE_ABNORMAL);

    // later frames are ignored
    connection
        .receive(Frame::new(Opcode::Text, true, b"ignored".to_vec()))
        .unwrap();
    assert_eq!(recorder.events().len(), events.len());
}

#[test]
fn malformed_bytes_fail_the_connection() {
    let (connection, recorder) = open_server();
    assert!(connection.receive_bytes(&[0x81]).is_err());
    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(close_events(&recorder.events())[0].code, CLOSE_ABNORMAL);
}

#[test]
fn raw_frames_are_accepted() {
    let (connection, recorder) = open_server();
    let bytes = encode_frame(b"hi", Opcode::Text, true, Some([1, 2, 3, 4]));
    connection.receive_bytes(&bytes).unwrap();
    assert_eq!(
        recorder.events()[1],
        EventKind::Message(Message::text(b"hi".to_vec()))
    );
}

#[test]
fn frames_before_open_are_ignored() {
    let (connection, recorder) = connection_with(Role::Server, WebSocketConfig::default());
    connection
        .receive(Frame::new(Opcode::Text, true, b"early".to_vec()))
        .unwrap();
    assert!(recorder.events().is_empty());
}

#[test]
fn handlers_may_send_and_close() {
    let recorder = Arc::new(Recorder::default());
    let connection = Connection::new(
        Role::Server,
        WebSocketConfig::default(),
        ConnectionInfo::new("/ws"),
        recorder.clone(),
        Arc::new(Replier),
    );
    connection.open();
    connection
        .receive(Frame::new(Opcode::Text, true, b"hi".to_vec()))
        .unwrap();
    connection
        .receive(Frame::new(Opcode::Text, true, b"hello there".to_vec()))
        .unwrap();

    let frames = recorder.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].payload, b"re: hi");
    assert_eq!(frames[1].payload, b"re: hello there");
    assert_eq!(frames[2].opcode, Opcode::Close);
    assert_eq!(connection.state(), ConnectionState::ClosingLocal);
}

#[test]
fn closing_from_on_close_still_replies_once() {
    let recorder = Arc::new(Recorder::default());
    let handler = Arc::new(ClosesBack::default());
    let connection = Connection::new(
        Role::Server,
        WebSocketConfig::default(),
        ConnectionInfo::new("/ws"),
        recorder.clone(),
        handler.clone(),
    );
    connection.open();
    connection.receive(close_frame(CLOSE_GOING_AWAY, "bye")).unwrap();

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert_eq!(
        *handler.closes.lock().unwrap(),
        vec![ClosingInfo::new(CLOSE_GOING_AWAY, "bye")]
    );
    let frames = recorder.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].opcode, Opcode::Close);
    assert_eq!(
        ClosingInfo::decode(&frames[0].payload).unwrap().code,
        CLOSE_GOING_AWAY
    );
}

#[test]
fn close_waits_for_the_message_in_flight() {
    let (entered, started) = mpsc::channel();
    let transport = Arc::new(Stalling {
        frames: Mutex::new(Vec::new()),
        entered: Mutex::new(Some(entered)),
    });
    let mut config = WebSocketConfig::default();
    config.set_fragment_size(0);
    let connection = Arc::new(Connection::new(
        Role::Server,
        config,
        ConnectionInfo::new("/ws"),
        transport.clone(),
        Arc::new(Recorder::default()),
    ));
    connection.open();

    let payload = vec![7; connection.config().fragment_size() * 3];
    let sender = {
        let connection = connection.clone();
        thread::spawn(move || connection.send_binary(&payload))
    };
    started.recv().unwrap();
    connection.close(CLOSE_NORMAL, "").unwrap();
    sender.join().unwrap().unwrap();

    let opcodes: Vec<Opcode> = transport
        .frames
        .lock()
        .unwrap()
        .iter()
        .map(|frame| frame.opcode)
        .collect();
    assert_eq!(
        opcodes,
        vec![Opcode::Binary, Opcode::Binary, Opcode::Binary, Opcode::Close]
    );
    assert!(matches!(connection.send_binary(&[1]), Err(Error::NotOpen)));
    assert!(matches!(connection.send_ping(), Err(Error::NotOpen)));
}
