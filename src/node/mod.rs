//! Node executor
//!
//! [`Node::run`] is the single serialized event loop of the application. The
//! send timer, socket readiness, console lines and posted events are all
//! handled one at a time from one `select!`, so the session is never touched
//! concurrently. Edge sources (signals, buttons) only post an [`Event`]
//! through a [`TriggerHandle`]; prompting happens here in the loop.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, warn};

use crate::console::{Console, ConsoleLine, NUMERIC_INPUT_LIMIT, SUFFIX_INPUT_LIMIT};
use crate::core::{Config, Result, ReceiveReport, Role, SessionConfig};
use crate::network::Transport;
use crate::protocol::{
    DatagramOutcome, GroupFilter, Session, TriggerOutcome, WireCodec, TEST_DATAGRAM_LEN,
};

/// Work posted to the node from outside the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The operator's start/stop toggle
    Trigger,
    /// Flip the LED and broadcast the new state
    ToggleLed,
    Shutdown,
}

/// Cloneable, non-blocking way to post events to a running node
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Event>,
}

impl TriggerHandle {
    /// Posts an event without waiting; false if the queue is full
    pub fn post(&self, event: Event) -> bool {
        self.tx.try_send(event).is_ok()
    }

    pub fn trigger(&self) -> bool {
        self.post(Event::Trigger)
    }

    pub fn toggle_led(&self) -> bool {
        self.post(Event::ToggleLed)
    }

    pub fn shutdown(&self) -> bool {
        self.post(Event::Shutdown)
    }
}

/// Asks the operator which role this process plays
pub async fn select_role<W: AsyncWrite + Unpin>(console: &mut Console<W>) -> Result<Role> {
    let mode = console
        .prompt_number("enter action mode (0=receiver, 1=sender) : ", NUMERIC_INPUT_LIMIT)
        .await?;
    let role = Role::from_mode(mode);
    console
        .write_line(&format!("action mode {} selected ({})", mode, role))
        .await?;
    Ok(role)
}

/// Resolves on the next timer tick, or never when the timer is disarmed
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// The LED control node: session, transport and console on one loop
pub struct Node<T, W> {
    config: Config,
    session: Session,
    codec: WireCodec,
    transport: T,
    console: Console<W>,
    console_open: bool,
    events: mpsc::Receiver<Event>,
    handle: TriggerHandle,
    /// Send timer, armed only while sending
    ticker: Option<Interval>,
    recv_buffer: Vec<u8>,
}

impl<T: Transport, W: AsyncWrite + Unpin> Node<T, W> {
    /// Creates a new node for the given role
    pub fn new(config: Config, role: Role, transport: T, console: Console<W>) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let session = Session::new(role, GroupFilter::new(config.local_group), config.bind_port);
        let recv_buffer = vec![0u8; config.receive_buffer_size];

        Node {
            config,
            session,
            codec: WireCodec::new(role),
            transport,
            console,
            console_open: true,
            events: rx,
            handle: TriggerHandle { tx },
            ticker: None,
            recv_buffer,
        }
    }

    /// Returns a handle for posting events
    pub fn handle(&self) -> TriggerHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn console(&self) -> &Console<W> {
        &self.console
    }

    /// Runs until shutdown.
    ///
    /// Starts with a trigger, so the operator is asked for the session
    /// parameters right away.
    pub async fn run(&mut self) -> Result<()> {
        info!(role = %self.session.role(), "node started");
        self.handle_trigger().await?;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(Event::Trigger) => self.handle_trigger().await?,
                    Some(Event::ToggleLed) => self.broadcast_light_control().await?,
                    Some(Event::Shutdown) | None => break,
                },
                line = self.console.next_line(), if self.console_open => match line {
                    Some(line) => {
                        if !self.handle_command(line).await? {
                            break;
                        }
                    }
                    None => {
                        info!("console closed, commands disabled");
                        self.console_open = false;
                    }
                },
                _ = next_tick(&mut self.ticker) => self.send_tick().await?,
                ready = self.transport.readable() => match ready {
                    Ok(()) => self.drain().await?,
                    Err(e) => error!("socket readiness failed: {}", e),
                },
            }
        }

        self.ticker = None;
        info!("node stopped");
        Ok(())
    }

    /// Interprets an operator line outside of a prompt; false means quit
    async fn handle_command(&mut self, line: ConsoleLine) -> Result<bool> {
        let text = match line {
            ConsoleLine::Text(text) => text,
            ConsoleLine::Overlong { limit } => {
                warn!(limit, "console command too long");
                self.console.write_line("command too long").await?;
                return Ok(true);
            }
        };

        match text.trim() {
            "" | "t" => self.handle_trigger().await?,
            "l" => self.broadcast_light_control().await?,
            "s" => {
                let info = self.session.get_state_info();
                let status = format!(
                    "role {} , state {:?} , sent {} , received {}/{} , led {}",
                    info.role,
                    info.state,
                    info.send_attempts,
                    info.statistics.received_count,
                    info.statistics.goal_count,
                    if info.led.on { "on" } else { "off" },
                );
                self.console.write_line(&status).await?;
            }
            "q" => return Ok(false),
            other => {
                debug!(command = other, "unknown console command");
                self.console
                    .write_line("commands: <enter>/t = start/stop, l = toggle led, s = status, q = quit")
                    .await?;
            }
        }
        Ok(true)
    }

    async fn handle_trigger(&mut self) -> Result<()> {
        match self.session.on_trigger() {
            TriggerOutcome::ConfigureSender => {
                let config = self.configure_sender().await?;
                let period = config.send_interval;
                self.session.start_sending(config)?;
                self.console.write_line("\n\nSTART PING SEND\n").await?;
                self.arm_timer(period);
            }
            TriggerOutcome::ConfigureReceiver => {
                self.console.write_line("report thread active").await?;
                let goal = self
                    .console
                    .prompt_number("Enter goal : ", NUMERIC_INPUT_LIMIT)
                    .await?;
                self.session.start_receiving(goal)?;
                self.console.write_line(&format!("goal : {}", goal)).await?;
            }
            TriggerOutcome::Aborted { attempts } => {
                self.ticker = None;
                self.console
                    .write_line(&format!("send stopped after {} packets", attempts))
                    .await?;
            }
            TriggerOutcome::Reported(report) => {
                self.console.write_line("report thread end").await?;
                self.print_report(&report).await?;
            }
        }
        Ok(())
    }

    async fn configure_sender(&mut self) -> Result<SessionConfig> {
        let prefix = self.config.destination_prefix.clone();

        let suffix = loop {
            let suffix = self
                .console
                .prompt(&format!("enter destination addr : {}", prefix), SUFFIX_INPUT_LIMIT)
                .await?;
            match SessionConfig::parse_destination(&prefix, &suffix) {
                Ok(destination) => {
                    self.console
                        .write_line(&format!(" destination received : {}", destination))
                        .await?;
                    break suffix;
                }
                Err(e) => self.console.write_line(&e.to_string()).await?,
            }
        };

        let payload_length = self
            .console
            .prompt_number("enter send length : 22 + ", NUMERIC_INPUT_LIMIT)
            .await?;
        let interval = self
            .console
            .prompt_number("enter send interval : ", NUMERIC_INPUT_LIMIT)
            .await?;
        let attempts = self
            .console
            .prompt_number("enter goal send try : ", NUMERIC_INPUT_LIMIT)
            .await?;

        let config =
            SessionConfig::from_operator(&prefix, &suffix, payload_length, interval, attempts)?;
        self.console
            .write_line(&format!(
                "length : 22 + {} , interval : {} , send_try : {}",
                config.payload_length,
                config.send_interval.as_secs(),
                config.total_send_attempts
            ))
            .await?;
        Ok(config)
    }

    /// First tick fires one period after arming
    fn arm_timer(&mut self, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    async fn send_tick(&mut self) -> Result<()> {
        let tick = match self.session.on_send_tick() {
            Ok(tick) => tick,
            Err(e) => {
                debug!("stale send tick: {}", e);
                self.ticker = None;
                return Ok(());
            }
        };

        let mut frame = BytesMut::with_capacity(TEST_DATAGRAM_LEN);
        self.codec.encode(&tick.packet, &mut frame)?;

        let interval = self
            .session
            .config()
            .map(|config| config.send_interval.as_secs())
            .unwrap_or_default();
        self.console
            .write_line(&format!(
                " seq : {:>10}/{:>10} , len : {} , interval : {} , Tx to : {}",
                tick.packet.sequence_number,
                tick.packet.goal_count,
                tick.packet.formatted_len(),
                interval,
                tick.destination.ip()
            ))
            .await?;

        if let Err(e) = self.transport.send_to(&frame, tick.destination).await {
            warn!(sequence = tick.packet.sequence_number, "{}", e);
        }

        if tick.finished {
            self.ticker = None;
            self.console.write_line("send goal reached").await?;
        }
        Ok(())
    }

    /// Reads datagrams until the socket would block
    async fn drain(&mut self) -> Result<()> {
        loop {
            self.recv_buffer.fill(0);
            let capacity = self.recv_buffer.len() - 1;
            let (len, from) = match self.transport.try_receive_from(&mut self.recv_buffer[..capacity]) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(e) => {
                    error!("Error happened when receiving: {}", e);
                    break;
                }
            };

            let mut frame = BytesMut::from(&self.recv_buffer[..len]);
            self.codec.set_carry_state(self.session.last_desired_state());
            let Some(datagram) = self.codec.decode(&mut frame)? else {
                debug!(%from, "empty datagram");
                continue;
            };

            let outcome = self.session.on_datagram(from, datagram);
            self.show_outcome(from, len, outcome).await?;
        }
        Ok(())
    }

    async fn show_outcome(&mut self, from: SocketAddr, len: usize, outcome: DatagramOutcome) -> Result<()> {
        match outcome {
            DatagramOutcome::Ignored | DatagramOutcome::Filtered { .. } => {
                self.console.write_line(&format!("Packet from {}", from.ip())).await?;
            }
            DatagramOutcome::LedUpdated { state } => {
                self.console.write_line(&format!("Packet from {}", from.ip())).await?;
                let text = if state { "Turning led on\n" } else { "Turning led off\n" };
                self.console.write_line(text).await?;
            }
            DatagramOutcome::Counted { header, received, running_rate } => {
                self.console
                    .write_line(&format!(
                        "RX from {}, len {} , count {} , seq {:>10} , psr {:.1}",
                        from.ip(),
                        len,
                        received,
                        header.sequence_number,
                        running_rate
                    ))
                    .await?;
            }
            DatagramOutcome::Finished { header, report } => {
                self.console
                    .write_line(&format!(
                        "RX from {}, len {} , count {} , seq {:>10}",
                        from.ip(),
                        len,
                        report.received_count,
                        header.sequence_number
                    ))
                    .await?;
                self.console.write_line("receive end packet report thread end").await?;
                self.print_report(&report).await?;
            }
        }
        Ok(())
    }

    async fn print_report(&mut self, report: &ReceiveReport) -> Result<()> {
        self.console.write_line("\n\n\nEnd Receiver mode - Report ").await?;
        self.console.write_line(&format!("  {}", report)).await
    }

    /// Legacy path: toggle the LED and tell the group about it
    async fn broadcast_light_control(&mut self) -> Result<()> {
        let message = self.session.toggle_led();
        let mut frame = BytesMut::new();
        self.codec.encode(&message, &mut frame)?;

        let text = String::from_utf8_lossy(&frame[..frame.len() - 1]).into_owned();
        self.console
            .write_line(&format!("Sending lightcontrol message, {} bytes: {}", frame.len(), text))
            .await?;

        let target = self.config.multicast_target();
        if let Err(e) = self.transport.send_to(&frame, target).await {
            warn!(%target, "{}", e);
        }
        Ok(())
    }
}
