use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::bot::{BotDecisionEngine, TickContext};
use crate::chat::ChatQueue;
use crate::config::ClientConfig;
use crate::events::{ClientEvent, DisconnectReason};
use crate::map::{MapError, TileGridProvider};
use crate::net::{
    ClientMessage, ClientState, Connection, DownloadStep, InputDispatcher, MapDownload,
    NET_VERSION, SERVER_TICK_SPEED, ServerMessage, SnapPart, Transport, TransportError,
    TransportState,
};
use crate::physics::{MapGrid, TuningParams};
use crate::snapshot::{SnapOutcome, SnapshotCodec};
use crate::timing::TickClock;
use crate::world::WorldModel;

const LOOP_SLEEP: Duration = Duration::from_millis(1);

/// Drives one bot through connect, map load, game entry and the per-tick
/// decide-and-send loop. All core state has this single mutator.
pub struct GameClient<T, M> {
    config: ClientConfig,
    transport: T,
    maps: M,

    connection: Connection,
    codec: SnapshotCodec,
    clock: TickClock,
    world: WorldModel,
    tuning: TuningParams,
    grid: Option<MapGrid>,
    map: Option<(String, i32)>,
    download: Option<MapDownload>,

    bot: BotDecisionEngine,
    input: InputDispatcher,
    pred_tick: i32,
    applied_tick: Option<i32>,
    force_input: bool,

    chat: Option<ChatQueue>,
    replies: mpsc::Receiver<(u64, String)>,
    reply_sender: mpsc::Sender<(u64, String)>,
    epoch: u64,

    shutdown: Arc<AtomicBool>,
    events: VecDeque<ClientEvent>,
    start: Instant,
}

impl<T: Transport, M: TileGridProvider> GameClient<T, M> {
    pub fn new(config: ClientConfig, transport: T, maps: M) -> Self {
        let (reply_sender, replies) = mpsc::channel();
        Self {
            connection: Connection::new(),
            codec: SnapshotCodec::new(),
            clock: TickClock::new(SERVER_TICK_SPEED, config.clock),
            world: WorldModel::new(),
            tuning: TuningParams::default(),
            grid: None,
            map: None,
            download: None,
            bot: BotDecisionEngine::new(config.bot.clone(), config.rng_seed),
            input: InputDispatcher::new(config.input_refresh),
            pred_tick: 0,
            applied_tick: None,
            force_input: false,
            chat: None,
            replies,
            reply_sender,
            epoch: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
            events: VecDeque::new(),
            start: Instant::now(),
            config,
            transport,
            maps,
        }
    }

    /// Chat prompts addressed to the bot are forwarded to this queue.
    pub fn set_chat_queue(&mut self, queue: ChatQueue) {
        self.chat = Some(queue);
    }

    pub fn state(&self) -> ClientState {
        self.connection.state()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn codec(&self) -> &SnapshotCodec {
        &self.codec
    }

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    pub fn bot(&self) -> &BotDecisionEngine {
        &self.bot
    }

    pub fn input(&self) -> &InputDispatcher {
        &self.input
    }

    pub fn tuning(&self) -> &TuningParams {
        &self.tuning
    }

    pub fn grid(&self) -> Option<&MapGrid> {
        self.grid.as_ref()
    }

    pub fn map(&self) -> Option<(&str, i32)> {
        self.map.as_ref().map(|(name, crc)| (name.as_str(), *crc))
    }

    pub fn download(&self) -> Option<&MapDownload> {
        self.download.as_ref()
    }

    pub fn pred_tick(&self) -> i32 {
        self.pred_tick
    }

    /// Bumped on every disconnect and game entry. Chat replies tagged with
    /// an older epoch are dropped.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn maps(&self) -> &M {
        &self.maps
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    /// Client time in microseconds.
    pub fn now(&self) -> i64 {
        self.start.elapsed().as_micros() as i64
    }

    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        if self.connection.state() == ClientState::Quitting {
            return Ok(());
        }
        if self.connection.state() != ClientState::Offline {
            self.disconnect(DisconnectReason::Requested);
        }

        log::info!("Connecting to {}", addr);
        self.transport.connect(addr)?;
        self.connection.reset();
        self.connection.remote_addr = Some(addr);
        self.connection.set_state(ClientState::Connecting);
        Ok(())
    }

    pub fn disconnect(&mut self, reason: DisconnectReason) {
        if matches!(
            self.connection.state(),
            ClientState::Offline | ClientState::Quitting
        ) {
            return;
        }
        log::info!("Disconnecting: {}", reason.as_str());
        self.transport.disconnect(reason.as_str());
        self.go_offline(reason);
    }

    /// Runs until the client quits or the connection drops.
    pub fn run(&mut self) {
        self.run_with(|_| {});
    }

    pub fn run_with(&mut self, mut on_event: impl FnMut(ClientEvent)) {
        loop {
            let running = self.update();
            while let Some(event) = self.events.pop_front() {
                on_event(event);
            }
            if !running {
                break;
            }
            thread::sleep(LOOP_SLEEP);
        }
        if let Some(chat) = &mut self.chat {
            chat.shutdown();
        }
    }

    pub fn update(&mut self) -> bool {
        let now = self.now();
        self.update_at(now)
    }

    /// One loop iteration at client time `now`. Returns false once there is
    /// nothing left to drive.
    pub fn update_at(&mut self, now: i64) -> bool {
        if self.shutdown.load(Ordering::Acquire) {
            if self.connection.state() != ClientState::Quitting {
                self.disconnect(DisconnectReason::Requested);
                self.connection.set_state(ClientState::Quitting);
                if let Some(chat) = &mut self.chat {
                    chat.shutdown();
                }
            }
            return false;
        }

        if self.connection.state() == ClientState::Offline {
            return false;
        }

        self.pump_transport(now);
        self.tick(now);
        self.drain_replies();

        !matches!(
            self.connection.state(),
            ClientState::Offline | ClientState::Quitting
        )
    }

    fn pump_transport(&mut self, now: i64) {
        if let Err(err) = self.transport.update() {
            self.disconnect(DisconnectReason::Transport(err.to_string()));
            return;
        }

        match self.transport.state() {
            TransportState::Offline => {
                let reason = self
                    .transport
                    .error_reason()
                    .unwrap_or("connection lost")
                    .to_string();
                log::warn!("Lost connection: {}", reason);
                self.go_offline(DisconnectReason::Transport(reason));
                return;
            }
            TransportState::Online if self.connection.state() == ClientState::Connecting => {
                self.connection.set_state(ClientState::Loading);
                self.send(ClientMessage::Info {
                    version: NET_VERSION.to_string(),
                    password: self.config.password.clone(),
                });
                if let Some(addr) = self.connection.remote_addr {
                    self.events.push_back(ClientEvent::Connected { addr });
                }
            }
            _ => {}
        }

        while let Some(chunk) = self.transport.recv() {
            match ServerMessage::decode(&chunk) {
                Ok(message) => self.handle_message(message, now),
                Err(err) => log::debug!("Dropping malformed message: {}", err),
            }
            if self.connection.state() == ClientState::Offline {
                break;
            }
        }
    }

    fn handle_message(&mut self, message: ServerMessage, now: i64) {
        match message {
            ServerMessage::MapChange { name, crc, size } => self.on_map_change(name, crc, size),
            ServerMessage::MapData {
                last,
                crc,
                chunk,
                data,
            } => self.on_map_data(last, crc, chunk, &data),
            ServerMessage::ConReady => {
                self.send(ClientMessage::StartInfo(self.config.identity.start_info()));
            }
            ServerMessage::ReadyToEnter => self.enter_game(now),
            ServerMessage::Snap(part) => self.on_snapshot(&part, now),
            ServerMessage::InputTiming {
                input_pred_tick,
                time_left,
            } => {
                if let Some(target) = self.input.timing_target(input_pred_tick, time_left, now) {
                    self.clock.on_input_timing(target, time_left, now);
                }
            }
            ServerMessage::Ping => self.send(ClientMessage::PingReply),
            ServerMessage::TuneParams(values) => match TuningParams::from_network(&values) {
                Some(tuning) => {
                    log::debug!("Received tuning parameters");
                    self.tuning = tuning;
                }
                None => log::debug!("Dropping tuning message with {} values", values.len()),
            },
            ServerMessage::Chat {
                client_id, message, ..
            } => self.on_chat(client_id, message),
            ServerMessage::Broadcast { message } => {
                if !message.is_empty() {
                    log::info!("[broadcast] {}", message);
                    self.events.push_back(ClientEvent::Broadcast { message });
                }
            }
            ServerMessage::Motd { message } => {
                if !message.is_empty() {
                    log::info!("[motd] {}", message);
                    self.events.push_back(ClientEvent::Motd { message });
                }
            }
            ServerMessage::Unrecognized { id, system } => {
                log::debug!("Ignoring message {} (system: {})", id, system);
            }
        }
    }

    fn on_map_change(&mut self, name: String, crc: i32, size: i32) {
        if name.contains(['/', '\\']) || size < 0 {
            log::warn!("Rejecting map {:?} ({} bytes)", name, size);
            self.disconnect(DisconnectReason::Rejected(format!("invalid map {}", name)));
            return;
        }

        if self.connection.state() == ClientState::Online {
            self.connection.set_state(ClientState::Loading);
            self.codec.reset();
            self.applied_tick = None;
        }
        self.download = None;

        match self.maps.load(&name, crc) {
            Ok(grid) => self.map_ready(name, crc, grid, false),
            Err(MapError::NotFound(_)) => {
                log::info!("Downloading map {} ({} bytes)", name, size);
                self.download = Some(MapDownload::new(&name, crc, size));
                self.send(ClientMessage::RequestMapData { chunk: 0 });
            }
            Err(err) => {
                log::warn!("Could not load map {}: {}", name, err);
                self.disconnect(DisconnectReason::MapFailed(err.to_string()));
            }
        }
    }

    fn on_map_data(&mut self, last: bool, crc: i32, chunk: i32, data: &[u8]) {
        let Some(download) = &mut self.download else {
            log::debug!("Map chunk {} without a download in progress", chunk);
            return;
        };

        match download.accept(last, crc, chunk, data) {
            DownloadStep::Ignored => {}
            DownloadStep::RequestNext(next) => {
                self.send(ClientMessage::RequestMapData { chunk: next });
            }
            DownloadStep::Complete(bytes) => {
                let (name, crc) = (download.name.clone(), download.crc);
                self.download = None;
                match self.maps.install(&name, crc, &bytes) {
                    Ok(grid) => self.map_ready(name, crc, grid, true),
                    Err(err) => {
                        log::warn!("Downloaded map {} is unusable: {}", name, err);
                        self.disconnect(DisconnectReason::MapFailed(err.to_string()));
                    }
                }
            }
        }
    }

    fn map_ready(&mut self, name: String, crc: i32, grid: MapGrid, downloaded: bool) {
        log::info!("Loaded map {} ({}x{})", name, grid.width(), grid.height());
        self.bot.set_map(&grid);
        self.grid = Some(grid);
        self.map = Some((name.clone(), crc));
        self.events.push_back(ClientEvent::MapLoaded {
            name,
            crc,
            downloaded,
        });
        self.send(ClientMessage::Ready);
    }

    fn enter_game(&mut self, now: i64) {
        log::info!("Entering game");
        self.send(ClientMessage::EnterGame);

        self.codec.reset();
        self.world.reset();
        self.input.reset();
        self.clock = TickClock::new(SERVER_TICK_SPEED, self.config.clock);
        self.pred_tick = 0;
        self.applied_tick = None;
        self.force_input = false;
        self.bot.reset(now);
        self.epoch += 1;

        for command in self.config.enter_commands.clone() {
            self.send(ClientMessage::Say {
                team: false,
                message: command,
            });
        }
    }

    fn on_snapshot(&mut self, part: &SnapPart, now: i64) {
        if !self.connection.state().accepts_snapshots() {
            return;
        }

        match self.codec.receive(part, &mut self.connection, now) {
            SnapOutcome::Stored { tick, received } => {
                if received == 2 {
                    self.clock.init(tick, now);
                    if self.connection.state() == ClientState::Loading {
                        self.connection.set_state(ClientState::Online);
                        self.connection.record_crc_ok();
                        self.events.push_back(ClientEvent::Online { game_tick: tick });
                    }
                } else if received > 2 {
                    self.clock.on_snapshot(tick, now);
                }
            }
            SnapOutcome::CrcMismatch { resync: true } | SnapOutcome::MissingBase => {
                self.force_input = true;
            }
            _ => {}
        }
    }

    fn on_chat(&mut self, client_id: i32, message: String) {
        if client_id < 0 {
            log::info!("[chat] *** {}", message);
        } else {
            let name = usize::try_from(client_id)
                .ok()
                .and_then(|slot| self.world.find(slot))
                .map(|entry| entry.name.as_str())
                .unwrap_or("?");
            log::info!("[chat] {}: {}", name, message);
        }

        if let Some(prompt) = self.bot.on_chat(&self.world, client_id, &message) {
            self.submit_prompt(prompt);
        }
        self.events
            .push_back(ClientEvent::Chat { client_id, message });
    }

    fn submit_prompt(&self, prompt: String) {
        let Some(chat) = &self.chat else {
            return;
        };
        let replies = self.reply_sender.clone();
        let epoch = self.epoch;
        chat.submit(
            prompt,
            self.config.chat_timeout,
            Box::new(move |reply| {
                let _ = replies.send((epoch, reply));
            }),
        );
    }

    fn drain_replies(&mut self) {
        while let Ok((epoch, reply)) = self.replies.try_recv() {
            if epoch != self.epoch || self.connection.state() != ClientState::Online {
                log::debug!("Discarding chat reply from epoch {}", epoch);
                continue;
            }
            let line = reply.lines().next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            self.send(ClientMessage::Say {
                team: false,
                message: line.to_string(),
            });
        }
    }

    fn tick(&mut self, now: i64) {
        if self.connection.state() != ClientState::Online
            || self.codec.received() < self.config.min_buffered_snapshots
        {
            return;
        }

        let game_time = self.clock.game_time(now);
        while let Some(tick) = self.codec.ring().current().map(|holder| holder.tick) {
            if self.clock.tick_start(tick) >= game_time || !self.codec.ring_mut().advance() {
                break;
            }
        }

        let Some(current) = self.codec.ring().current() else {
            return;
        };
        let current_tick = current.tick;
        if self.applied_tick != Some(current_tick) {
            self.world.apply_snapshot(
                &current.snapshot,
                current_tick,
                &self.tuning,
                self.grid.as_ref(),
                self.config.max_catchup_ticks,
            );
            self.applied_tick = Some(current_tick);
        }

        let mut pred_tick = self.clock.predicted_tick(now);
        let prev_tick = self.codec.ring().prev().map_or(current_tick, |holder| holder.tick);
        if pred_tick.abs_diff(prev_tick) > SERVER_TICK_SPEED as u32 {
            log::debug!("Predicted tick {} drifted, resetting", pred_tick);
            self.clock.reset_predicted(current_tick, now);
            pred_tick = self.clock.predicted_tick(now);
        }

        if pred_tick <= self.pred_tick && !self.force_input {
            return;
        }
        self.pred_tick = pred_tick;

        let ctx = TickContext {
            now,
            tuning: &self.tuning,
            grid: self.grid.as_ref(),
        };
        let outcome = self.bot.tick(&mut self.world, &ctx);
        if let Some(team) = outcome.set_team {
            self.send(ClientMessage::SetTeam { team });
        }

        let force = std::mem::take(&mut self.force_input);
        if let Some(message) = self.input.dispatch(
            outcome.input,
            self.connection.ack_tick,
            pred_tick,
            self.clock.predicted_time(now),
            now,
            force,
        ) {
            self.send(message);
        }
    }

    fn send(&mut self, message: ClientMessage) {
        if let Err(err) = self.transport.send(message.to_chunk()) {
            log::debug!("Failed to send message {}: {}", message.id(), err);
        }
    }

    fn go_offline(&mut self, reason: DisconnectReason) {
        self.connection.reset();
        self.connection.set_state(ClientState::Offline);
        self.codec.reset();
        self.world.reset();
        self.input.reset();
        self.clock = TickClock::new(SERVER_TICK_SPEED, self.config.clock);
        self.download = None;
        self.pred_tick = 0;
        self.applied_tick = None;
        self.force_input = false;
        self.epoch += 1;
        self.events.push_back(ClientEvent::Disconnected { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MapCache, MemoryStore, RawGridDecoder, crc32};
    use crate::net::{Chunk, MemoryTransport};

    type TestClient = GameClient<MemoryTransport, MapCache<MemoryStore, RawGridDecoder>>;

    fn addr() -> SocketAddr {
        "127.0.0.1:8303".parse().unwrap()
    }

    fn client() -> TestClient {
        GameClient::new(
            ClientConfig::default(),
            MemoryTransport::new(),
            MapCache::new(MemoryStore::new(), RawGridDecoder),
        )
    }

    fn sent(client: &mut TestClient) -> Vec<ClientMessage> {
        client
            .transport_mut()
            .take_sent()
            .iter()
            .map(|chunk: &Chunk| ClientMessage::decode(chunk).unwrap())
            .collect()
    }

    fn push(client: &mut TestClient, message: ServerMessage) {
        client.transport_mut().push_incoming(message.to_chunk());
    }

    fn grid_bytes() -> Vec<u8> {
        RawGridDecoder::encode(&MapGrid::from_rows(&["####", "#..#", "####"]).unwrap())
    }

    fn loading_client() -> TestClient {
        let mut client = client();
        client.connect(addr()).unwrap();
        client.update_at(0);
        sent(&mut client);
        client.drain_events();
        client
    }

    #[test]
    fn test_handshake_sends_info() {
        let mut client = client();
        assert!(!client.update_at(0));

        client.connect(addr()).unwrap();
        assert_eq!(client.state(), ClientState::Connecting);
        assert!(client.update_at(0));
        assert_eq!(client.state(), ClientState::Loading);

        assert_eq!(
            sent(&mut client),
            vec![ClientMessage::Info {
                version: NET_VERSION.to_string(),
                password: String::new(),
            }]
        );
        assert_eq!(client.poll_event(), Some(ClientEvent::Connected { addr: addr() }));
    }

    #[test]
    fn test_waits_for_transport() {
        let mut client: TestClient = GameClient::new(
            ClientConfig::default(),
            MemoryTransport::manual_accept(),
            MapCache::new(MemoryStore::new(), RawGridDecoder),
        );
        client.connect(addr()).unwrap();
        client.update_at(0);
        assert_eq!(client.state(), ClientState::Connecting);
        assert!(sent(&mut client).is_empty());

        client.transport_mut().accept();
        client.update_at(1000);
        assert_eq!(client.state(), ClientState::Loading);
    }

    #[test]
    fn test_rejects_map_with_path() {
        let mut client = loading_client();
        push(
            &mut client,
            ServerMessage::MapChange {
                name: "../etc/passwd".into(),
                crc: 1,
                size: 10,
            },
        );
        assert!(!client.update_at(0));
        assert_eq!(client.state(), ClientState::Offline);
        assert!(matches!(
            client.poll_event(),
            Some(ClientEvent::Disconnected {
                reason: DisconnectReason::Rejected(_)
            })
        ));
    }

    #[test]
    fn test_download_then_ready() {
        let mut client = loading_client();
        let data = grid_bytes();
        let crc = crc32(&data) as i32;

        push(
            &mut client,
            ServerMessage::MapChange {
                name: "arena".into(),
                crc,
                size: data.len() as i32,
            },
        );
        client.update_at(0);
        assert_eq!(sent(&mut client), vec![ClientMessage::RequestMapData { chunk: 0 }]);
        assert!(client.download().is_some());

        let (head, tail) = data.split_at(8);
        push(
            &mut client,
            ServerMessage::MapData {
                last: false,
                crc,
                chunk: 0,
                data: head.to_vec(),
            },
        );
        client.update_at(0);
        assert_eq!(sent(&mut client), vec![ClientMessage::RequestMapData { chunk: 1 }]);

        push(
            &mut client,
            ServerMessage::MapData {
                last: true,
                crc,
                chunk: 1,
                data: tail.to_vec(),
            },
        );
        client.update_at(0);
        assert_eq!(sent(&mut client), vec![ClientMessage::Ready]);
        assert_eq!(client.map(), Some(("arena", crc)));
        assert!(client.grid().is_some());
        assert!(client.download().is_none());
        assert_eq!(
            client.poll_event(),
            Some(ClientEvent::MapLoaded {
                name: "arena".into(),
                crc,
                downloaded: true,
            })
        );
    }

    #[test]
    fn test_start_info_and_enter() {
        let mut client = loading_client();
        push(&mut client, ServerMessage::ConReady);
        push(&mut client, ServerMessage::ReadyToEnter);
        let epoch = client.epoch();
        client.update_at(0);

        let messages = sent(&mut client);
        assert!(matches!(&messages[0], ClientMessage::StartInfo(info) if info.name == "nameless tee"));
        assert_eq!(messages[1], ClientMessage::EnterGame);
        assert_eq!(
            messages[2],
            ClientMessage::Say {
                team: false,
                message: "/alwaysrandom 1".into(),
            }
        );
        assert_eq!(client.epoch(), epoch + 1);
    }

    #[test]
    fn test_ping_and_tuning() {
        let mut client = loading_client();
        let mut tuning = TuningParams::default();
        tuning.gravity = 1.0;

        push(&mut client, ServerMessage::Ping);
        push(&mut client, ServerMessage::TuneParams(tuning.to_network()));
        push(&mut client, ServerMessage::TuneParams(vec![1, 2, 3]));
        client.update_at(0);

        assert_eq!(sent(&mut client), vec![ClientMessage::PingReply]);
        assert_eq!(client.tuning().gravity, 1.0);
    }

    #[test]
    fn test_transport_failure_goes_offline() {
        let mut client = loading_client();
        let epoch = client.epoch();
        client.transport_mut().fail("Timeout");

        assert!(!client.update_at(0));
        assert_eq!(client.state(), ClientState::Offline);
        assert_eq!(client.epoch(), epoch + 1);
        assert_eq!(
            client.poll_event(),
            Some(ClientEvent::Disconnected {
                reason: DisconnectReason::Transport("Timeout".into())
            })
        );
    }

    #[test]
    fn test_shutdown_flag_quits() {
        let mut client = loading_client();
        client.shutdown_handle().store(true, Ordering::Release);

        assert!(!client.update_at(0));
        assert_eq!(client.state(), ClientState::Quitting);
        assert_eq!(client.transport().state(), TransportState::Offline);

        client.connect(addr()).unwrap();
        assert_eq!(client.state(), ClientState::Quitting);
    }

    #[test]
    fn test_snapshots_ignored_before_loading() {
        let mut client = client();
        let part = SnapPart {
            kind: crate::net::SnapKind::Empty,
            game_tick: 10,
            delta_tick: -1,
            num_parts: 1,
            part: 0,
            crc: 0,
            data: Vec::new(),
        };
        client.on_snapshot(&part, 0);
        assert_eq!(client.codec().received(), 0);
    }
}
