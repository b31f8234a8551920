use std::net::SocketAddr;

use tracing::{debug, info};

use crate::core::{Error, Result, ReceiveReport, ReceiveStatistics, Role, SessionConfig};
use super::filter::GroupFilter;
use super::message::{Datagram, LightControlMessage, TestPacket, TestPacketHeader};

/// Represents the current state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the operator's trigger
    Idle,
    /// Periodically transmitting test packets
    Sending,
    /// Counting incoming test packets
    Receiving,
}

/// What the node must do after a trigger
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Ask the operator for destination, length, interval and attempts
    ConfigureSender,
    /// Ask the operator for a goal count
    ConfigureReceiver,
    /// Sending was stopped by hand after `attempts` transmissions
    Aborted { attempts: i64 },
    /// Receiving was stopped by hand
    Reported(ReceiveReport),
}

/// One transmission produced by the send timer
#[derive(Debug, Clone, PartialEq)]
pub struct SendTick {
    pub packet: TestPacket,
    pub destination: SocketAddr,
    /// Set on the last transmission; the timer must be disarmed
    pub finished: bool,
}

/// What became of an inbound datagram
#[derive(Debug, Clone, PartialEq)]
pub enum DatagramOutcome {
    /// Not interpreted in the current state
    Ignored,
    /// Counted towards the running receive session
    Counted {
        header: TestPacketHeader,
        received: i64,
        /// `received / sequence * 100`, zero when the sequence is zero
        running_rate: f64,
    },
    /// The end-of-session pattern arrived and the session was reported
    Finished {
        header: TestPacketHeader,
        report: ReceiveReport,
    },
    /// A light-control command for our group changed the LED
    LedUpdated { state: bool },
    /// A light-control command for another group
    Filtered { group_id: u16 },
}

/// Indicator owned by the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedState {
    pub on: bool,
}

/// Information about the current session
#[derive(Debug, Clone)]
pub struct StateInfo {
    pub role: Role,
    pub state: SessionState,
    pub send_attempts: i64,
    pub statistics: ReceiveStatistics,
    pub led: LedState,
}

/// Session state machine for one node.
///
/// Owns every piece of mutable application state; the node executor is the
/// only caller, so no locking is involved.
pub struct Session {
    role: Role,
    state: SessionState,
    filter: GroupFilter,
    /// Port test packets are addressed to
    port: u16,
    config: Option<SessionConfig>,
    /// Transmissions in the current send session
    send_attempts: i64,
    statistics: ReceiveStatistics,
    led: LedState,
    /// State re-broadcast by the legacy light-control path
    last_desired_state: bool,
}

impl Session {
    /// Creates a new idle session
    pub fn new(role: Role, filter: GroupFilter, port: u16) -> Self {
        Session {
            role,
            state: SessionState::Idle,
            filter,
            port,
            config: None,
            send_attempts: 0,
            statistics: ReceiveStatistics::default(),
            led: LedState::default(),
            last_desired_state: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn send_attempts(&self) -> i64 {
        self.send_attempts
    }

    pub fn statistics(&self) -> ReceiveStatistics {
        self.statistics
    }

    pub fn led(&self) -> LedState {
        self.led
    }

    pub fn last_desired_state(&self) -> bool {
        self.last_desired_state
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    /// Gets information about the current session
    pub fn get_state_info(&self) -> StateInfo {
        StateInfo {
            role: self.role,
            state: self.state,
            send_attempts: self.send_attempts,
            statistics: self.statistics,
            led: self.led,
        }
    }

    /// Handles the operator's toggle
    pub fn on_trigger(&mut self) -> TriggerOutcome {
        match (self.role, self.state) {
            (Role::Sender, SessionState::Idle) => TriggerOutcome::ConfigureSender,
            (Role::Receiver, SessionState::Idle) => TriggerOutcome::ConfigureReceiver,
            (_, SessionState::Sending) => {
                let attempts = self.send_attempts;
                self.send_attempts = 0;
                self.state = SessionState::Idle;
                info!(attempts, "send session aborted");
                TriggerOutcome::Aborted { attempts }
            }
            (_, SessionState::Receiving) => {
                info!("receive session stopped by operator");
                TriggerOutcome::Reported(self.report())
            }
        }
    }

    /// Enters `Sending` with the operator's parameters
    pub fn start_sending(&mut self, config: SessionConfig) -> Result<()> {
        if self.role != Role::Sender {
            return Err(Error::invalid_state("Only a sender can start sending"));
        }
        if self.state != SessionState::Idle {
            return Err(Error::invalid_state("Can only start sending from Idle state"));
        }

        info!(
            destination = %config.destination,
            payload_length = config.payload_length,
            interval_secs = config.send_interval.as_secs(),
            attempts = config.total_send_attempts,
            "send session started"
        );
        self.send_attempts = 0;
        self.config = Some(config);
        self.state = SessionState::Sending;
        Ok(())
    }

    /// Enters `Receiving` with fresh statistics
    pub fn start_receiving(&mut self, goal_count: i64) -> Result<()> {
        if self.role != Role::Receiver {
            return Err(Error::invalid_state("Only a receiver can start receiving"));
        }
        if self.state != SessionState::Idle {
            return Err(Error::invalid_state("Can only start receiving from Idle state"));
        }

        info!(goal_count, "receive session started");
        self.statistics = ReceiveStatistics::begin(goal_count);
        self.state = SessionState::Receiving;
        Ok(())
    }

    /// Produces the next transmission of the running send session
    pub fn on_send_tick(&mut self) -> Result<SendTick> {
        if self.state != SessionState::Sending {
            return Err(Error::invalid_state("Send tick outside Sending state"));
        }
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::invalid_state("Sending without a session configuration"))?;

        self.send_attempts += 1;
        let packet = TestPacket::new(
            self.send_attempts,
            config.total_send_attempts,
            config.payload_length,
        );
        let destination = config.target(self.port);

        let finished = self.send_attempts >= config.total_send_attempts;
        if finished {
            info!(attempts = self.send_attempts, "send goal reached");
            self.send_attempts = 0;
            self.state = SessionState::Idle;
        }

        Ok(SendTick {
            packet,
            destination,
            finished,
        })
    }

    /// Applies an inbound datagram
    pub fn on_datagram(&mut self, from: SocketAddr, datagram: Datagram) -> DatagramOutcome {
        match datagram {
            Datagram::Test { header, end_marker, len } => {
                if self.state != SessionState::Receiving {
                    debug!(%from, len, "packet outside receive session");
                    return DatagramOutcome::Ignored;
                }

                self.statistics.record();
                let received = self.statistics.received_count;
                debug!(%from, len, received, sequence = header.sequence_number, "test packet");

                if end_marker {
                    info!(%from, "end packet received");
                    let report = self.report();
                    return DatagramOutcome::Finished { header, report };
                }

                let running_rate = if header.sequence_number == 0 {
                    0.0
                } else {
                    received as f64 / header.sequence_number as f64 * 100.0
                };
                DatagramOutcome::Counted {
                    header,
                    received,
                    running_rate,
                }
            }
            Datagram::LightControl(message) => {
                if self.filter.applies(message.group_id) {
                    self.update_state(message.state);
                    DatagramOutcome::LedUpdated { state: message.state }
                } else {
                    debug!(%from, group_id = message.group_id, "light control for another group");
                    DatagramOutcome::Filtered {
                        group_id: message.group_id,
                    }
                }
            }
            Datagram::Unrecognised { len } => {
                debug!(%from, len, "unrecognised datagram");
                DatagramOutcome::Ignored
            }
        }
    }

    /// Closes the receive statistics into a report and returns to `Idle`.
    ///
    /// Calling it again while idle reports zero counts and a zero rate.
    pub fn report(&mut self) -> ReceiveReport {
        let report = self.statistics.report();
        info!(
            goal = report.goal_count,
            received = report.received_count,
            success_rate = report.success_rate,
            "receive report"
        );
        self.statistics.reset();
        if self.state == SessionState::Receiving {
            self.state = SessionState::Idle;
        }
        report
    }

    /// Sets the LED and remembers it as the last desired state
    pub fn update_state(&mut self, on: bool) {
        info!(on, "Turning led {}", if on { "on" } else { "off" });
        self.led.on = on;
        self.last_desired_state = on;
    }

    /// Light-control command re-broadcasting the last desired state
    pub fn light_control_message(&self) -> LightControlMessage {
        LightControlMessage::new(self.filter.local_group(), self.last_desired_state)
    }

    /// Flips the LED and returns the command announcing the new state
    pub fn toggle_led(&mut self) -> LightControlMessage {
        let next = !self.last_desired_state;
        self.update_state(next);
        self.light_control_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{
        decode_light_control, decode_test_packet_header, encode_light_control,
        encode_test_packet, is_end_marker,
    };
    use std::time::Duration;

    fn from() -> SocketAddr {
        "[fd00:db8::ff:fe00:2]:1234".parse().unwrap()
    }

    fn send_config(attempts: i64) -> SessionConfig {
        SessionConfig::from_operator("fd00:db8::ff:fe00:", "1", 20, 1, attempts).unwrap()
    }

    fn test_datagram(sequence: i64, goal: i64) -> Datagram {
        let bytes = encode_test_packet(sequence, goal, b"AAAA");
        Datagram::Test {
            header: decode_test_packet_header(&bytes),
            end_marker: is_end_marker(&bytes),
            len: bytes.len(),
        }
    }

    fn sender() -> Session {
        Session::new(Role::Sender, GroupFilter::default(), 1234)
    }

    fn receiver() -> Session {
        Session::new(Role::Receiver, GroupFilter::default(), 1234)
    }

    #[test]
    fn test_sender_completes_goal() {
        let mut session = sender();
        assert_eq!(session.on_trigger(), TriggerOutcome::ConfigureSender);
        assert_eq!(session.state(), SessionState::Idle);

        session.start_sending(send_config(5)).unwrap();
        assert_eq!(session.state(), SessionState::Sending);
        assert_eq!(session.config().unwrap().send_interval, Duration::from_secs(1));

        for expected in 1..=5 {
            let tick = session.on_send_tick().unwrap();
            assert_eq!(tick.packet.sequence_number, expected);
            assert_eq!(tick.packet.goal_count, 5);
            assert_eq!(tick.destination.to_string(), "[fd00:db8::ff:fe00:1]:1234");
            assert_eq!(tick.finished, expected == 5);
        }

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.send_attempts(), 0);
        assert!(session.on_send_tick().is_err());
    }

    #[test]
    fn test_sender_manual_abort() {
        let mut session = sender();
        session.start_sending(send_config(5)).unwrap();
        session.on_send_tick().unwrap();
        session.on_send_tick().unwrap();
        assert_eq!(session.send_attempts(), 2);

        assert_eq!(session.on_trigger(), TriggerOutcome::Aborted { attempts: 2 });
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.send_attempts(), 0);
        assert!(session.on_send_tick().is_err());

        // The next trigger starts over with configuration.
        assert_eq!(session.on_trigger(), TriggerOutcome::ConfigureSender);
    }

    #[test]
    fn test_sender_non_positive_goal_stops_after_one() {
        let mut session = sender();
        session.start_sending(send_config(0)).unwrap();
        let tick = session.on_send_tick().unwrap();
        assert!(tick.finished);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_receiver_report_after_goal() {
        let mut session = receiver();
        assert_eq!(session.on_trigger(), TriggerOutcome::ConfigureReceiver);
        session.start_receiving(10).unwrap();

        for sequence in [1, 2, 3, 5, 6, 7, 8, 9] {
            match session.on_datagram(from(), test_datagram(sequence, 10)) {
                DatagramOutcome::Counted { received, .. } => {
                    assert_eq!(received, session.statistics().received_count)
                }
                other => panic!("Expected Counted, got {:?}", other),
            }
        }
        assert_eq!(session.statistics().received_count, 8);

        match session.on_trigger() {
            TriggerOutcome::Reported(report) => {
                assert_eq!(report.goal_count, 10);
                assert_eq!(report.received_count, 8);
                assert!((report.success_rate - 80.0).abs() < 1e-9);
            }
            other => panic!("Expected Reported, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.statistics(), ReceiveStatistics::default());
    }

    #[test]
    fn test_receiver_running_rate() {
        let mut session = receiver();
        session.start_receiving(10).unwrap();
        session.on_datagram(from(), test_datagram(1, 10));
        match session.on_datagram(from(), test_datagram(4, 10)) {
            DatagramOutcome::Counted { running_rate, .. } => {
                assert!((running_rate - 50.0).abs() < 1e-9)
            }
            other => panic!("Expected Counted, got {:?}", other),
        }
        match session.on_datagram(from(), test_datagram(0, 10)) {
            DatagramOutcome::Counted { running_rate, .. } => assert_eq!(running_rate, 0.0),
            other => panic!("Expected Counted, got {:?}", other),
        }
    }

    #[test]
    fn test_receiver_end_marker_finishes_early() {
        let mut session = receiver();
        session.start_receiving(10).unwrap();
        session.on_datagram(from(), test_datagram(1, 10));
        session.on_datagram(from(), test_datagram(2, 10));

        match session.on_datagram(from(), test_datagram(10, 10)) {
            DatagramOutcome::Finished { header, report } => {
                assert_eq!(header.sequence_number, 10);
                assert_eq!(report.received_count, 3);
                assert!((report.success_rate - 30.0).abs() < 1e-9);
            }
            other => panic!("Expected Finished, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.statistics(), ReceiveStatistics::default());

        // Packets after the report are not counted.
        assert_eq!(
            session.on_datagram(from(), test_datagram(3, 10)),
            DatagramOutcome::Ignored
        );
    }

    #[test]
    fn test_report_is_idempotent_when_idle() {
        let mut session = receiver();
        let first = session.report();
        let second = session.report();
        assert_eq!(first.success_rate, 0.0);
        assert_eq!(first, second);
        assert_eq!(session.statistics(), ReceiveStatistics::default());
        assert_eq!(session.state(), SessionState::Idle);

        session.start_receiving(0).unwrap();
        session.on_datagram(from(), test_datagram(1, 3));
        let report = session.report();
        assert_eq!(report.received_count, 1);
        assert_eq!(report.success_rate, 0.0);
    }

    #[test]
    fn test_restart_receiving_resets_statistics() {
        let mut session = receiver();
        session.start_receiving(5).unwrap();
        session.on_datagram(from(), test_datagram(1, 5));
        session.on_trigger();

        session.start_receiving(7).unwrap();
        assert_eq!(session.statistics(), ReceiveStatistics::begin(7));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = receiver();
        assert!(session.start_sending(send_config(3)).is_err());
        session.start_receiving(3).unwrap();
        assert!(matches!(session.start_receiving(3), Err(Error::InvalidState(_))));

        let mut session = sender();
        assert!(session.start_receiving(3).is_err());
        session.start_sending(send_config(3)).unwrap();
        assert!(session.start_sending(send_config(3)).is_err());
    }

    #[test]
    fn test_light_control_applies_to_own_and_master_group() {
        let mut session = sender();

        let message = decode_light_control(&encode_light_control(1, true), false).unwrap();
        assert_eq!(
            session.on_datagram(from(), Datagram::LightControl(message)),
            DatagramOutcome::LedUpdated { state: true }
        );
        assert!(session.led().on);
        assert!(session.last_desired_state());

        let message = LightControlMessage::new(0, false);
        session.on_datagram(from(), Datagram::LightControl(message));
        assert!(!session.led().on);

        let message = LightControlMessage::new(5, true);
        assert_eq!(
            session.on_datagram(from(), Datagram::LightControl(message)),
            DatagramOutcome::Filtered { group_id: 5 }
        );
        assert!(!session.led().on);
    }

    #[test]
    fn test_toggle_led_broadcast_message() {
        let mut session = sender();
        let message = session.toggle_led();
        assert_eq!(message, LightControlMessage::new(1, true));
        assert!(session.led().on);

        let message = session.toggle_led();
        assert_eq!(message, LightControlMessage::new(1, false));
        assert_eq!(session.light_control_message(), message);
    }

    #[test]
    fn test_state_info() {
        let mut session = sender();
        let info = session.get_state_info();
        assert_eq!(info.role, Role::Sender);
        assert_eq!(info.state, SessionState::Idle);

        session.start_sending(send_config(2)).unwrap();
        session.on_send_tick().unwrap();
        let info = session.get_state_info();
        assert_eq!(info.state, SessionState::Sending);
        assert_eq!(info.send_attempts, 1);
    }
}
