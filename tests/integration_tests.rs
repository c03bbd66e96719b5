//! Integration tests for the relay server
//!
//! These tests run a real server on a loopback socket and talk to it through
//! plain UDP clients, the same way game clients do.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assert_approx_eq::assert_approx_eq;
use protocol::{Packet, PacketType, KILLING_BLOW_DAMAGE};
use server::config::ServerConfig;
use server::lobby::{Lobby, Phase};
use server::network::Server;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(2);

/// Starts a server on an ephemeral port
async fn start_server(config: ServerConfig) -> (SocketAddr, Arc<Lobby>) {
    let config = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        seed: Some(1),
        ..config
    };
    let mut server = assert_ok!(Server::bind(config).await);
    let addr = assert_ok!(server.local_addr());
    let lobby = server.lobby();
    tokio::spawn(async move { server.run().await });
    (addr, lobby)
}

/// Polls lobby state until `condition` holds
async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        sleep(Duration::from_millis(5)).await;
    }
}

struct TestClient {
    socket: UdpSocket,
    server: SocketAddr,
    steam_id: u64,
}

impl TestClient {
    async fn new(server: SocketAddr, steam_id: u64) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        Self {
            socket,
            server,
            steam_id,
        }
    }

    async fn send(&self, packet_type: PacketType, body: Vec<u8>) {
        let packet = Packet::with_body(packet_type, 2, self.steam_id, body);
        self.socket
            .send_to(&packet.to_bytes(), self.server)
            .await
            .unwrap();
    }

    async fn recv(&self) -> Option<Packet> {
        let mut buf = vec![0u8; 2048];
        let (len, from) = timeout(WAIT, self.socket.recv_from(&mut buf)).await.ok()?.ok()?;
        Some(Packet::from_datagram(&buf[..len], from).expect("valid datagram from server"))
    }

    /// Skips packets until one matches
    async fn expect(&self, what: &str, matches: impl Fn(&Packet) -> bool) -> Packet {
        loop {
            match self.recv().await {
                Some(packet) if matches(&packet) => return packet,
                Some(_) => continue,
                None => panic!("never received {}", what),
            }
        }
    }

    async fn join(&self) -> u8 {
        self.send(PacketType::ClientRequestingAccepting, vec![]).await;
        let accepted = self
            .expect("ClientAccepted", |p| p.packet_type == PacketType::ClientAccepted)
            .await;
        accepted.body()[0]
    }
}

fn damage(attacker: u8, amount: f32) -> Vec<u8> {
    let mut body = vec![attacker];
    body.extend_from_slice(&amount.to_le_bytes());
    body.push(0);
    body
}

/// CONNECTION TESTS
mod connection_tests {
    use super::*;

    /// Tests that joining clients fill slots in order over real UDP
    #[tokio::test]
    async fn clients_get_consecutive_slots() {
        let (addr, lobby) = start_server(ServerConfig::default()).await;

        let a = TestClient::new(addr, 100).await;
        let b = TestClient::new(addr, 200).await;
        assert_eq!(a.join().await, 0);
        assert_eq!(b.join().await, 1);

        b.send(PacketType::ClientRequestingIndex, vec![]).await;
        let index = b
            .expect("index reply", |p| p.packet_type == PacketType::ClientRequestingIndex)
            .await;
        assert_eq!(index.body(), &[1]);

        assert_eq!(lobby.host_slot().unwrap(), 0);
        assert_eq!(lobby.player(1).unwrap().steam_id, 200);
    }

    /// Tests that a full lobby answers a join with a kick
    #[tokio::test]
    async fn full_lobby_turns_clients_away() {
        let config = ServerConfig {
            lobby: server::LobbySettings {
                max_players: 1,
                ..Default::default()
            },
            ..ServerConfig::default()
        };
        let (addr, _) = start_server(config).await;

        let a = TestClient::new(addr, 1).await;
        let b = TestClient::new(addr, 2).await;
        assert_eq!(a.join().await, 0);

        b.send(PacketType::ClientRequestingAccepting, vec![]).await;
        let reply = b.recv().await.expect("reply to a full lobby");
        assert_eq!(reply.packet_type, PacketType::KickPlayer);
    }

    /// Tests that malformed datagrams are dropped and the server keeps serving
    #[tokio::test]
    async fn garbage_does_not_stop_the_server() {
        let (addr, _) = start_server(ServerConfig::default()).await;
        let client = TestClient::new(addr, 5).await;

        client.socket.send_to(&[1, 2, 3], addr).await.unwrap();
        client.socket.send_to(&[250; 12], addr).await.unwrap();
        client.send(PacketType::Ping, vec![42]).await;

        let pong = client.recv().await.expect("ping reply");
        assert_eq!(pong.packet_type, PacketType::PingResponse);
        assert_eq!(pong.body(), &[42]);
    }

    /// Tests that a client that stops sending loses its slot
    #[tokio::test]
    async fn silent_clients_time_out() {
        let config = ServerConfig {
            idle_timeout_secs: 1,
            ..ServerConfig::default()
        };
        let (addr, lobby) = start_server(config).await;

        let a = TestClient::new(addr, 1).await;
        a.join().await;
        assert_eq!(lobby.occupants_excluding(None), 1);

        let deadline = Instant::now() + Duration::from_secs(4);
        while lobby.occupants_excluding(None) > 0 {
            assert!(Instant::now() < deadline, "slot was never released");
            sleep(Duration::from_millis(50)).await;
        }
    }
}

/// RELAY TESTS
mod relay_tests {
    use super::*;

    /// Tests that relayed packets carry the bound identity, not the forged one
    #[tokio::test]
    async fn relayed_packets_carry_sender_identity() {
        let (addr, _) = start_server(ServerConfig::default()).await;
        let a = TestClient::new(addr, 111).await;
        let b = TestClient::new(addr, 222).await;
        a.join().await;
        b.join().await;

        // Forged header identity is replaced by the bound one
        let forged = Packet::with_body(PacketType::WeaponThrown, 7, 999, vec![9, 9]);
        a.socket.send_to(&forged.to_bytes(), addr).await.unwrap();

        let relayed = b
            .expect("relayed weapon", |p| p.packet_type == PacketType::WeaponThrown)
            .await;
        assert_eq!(relayed.steam_id, 111);
        assert_eq!(relayed.channel, 7);
        assert_eq!(relayed.body(), &[9, 9]);
    }

    /// Tests that host chat commands are relayed and answered to the host
    #[tokio::test]
    async fn host_commands_reply_to_host_only() {
        let (addr, _) = start_server(ServerConfig::default()).await;
        let host = TestClient::new(addr, 10).await;
        let guest = TestClient::new(addr, 20).await;
        host.join().await;
        guest.join().await;

        host.send(PacketType::PlayerTalked, b"/echo hello world".to_vec()).await;

        let relayed = guest
            .expect("relayed chat", |p| p.packet_type == PacketType::PlayerTalked)
            .await;
        assert_eq!(relayed.body(), b"/echo hello world");

        let reply = host
            .expect("command reply", |p| p.packet_type == PacketType::PlayerTalked)
            .await;
        assert_eq!(reply.body(), b"hello world");
        assert_eq!(reply.steam_id, 10);
    }
}

/// MATCH LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// Tests waiting room, map change, match start and a killing blow end to end
    #[tokio::test]
    async fn full_match_cycle() {
        let (addr, lobby) = start_server(ServerConfig::default()).await;
        let a = TestClient::new(addr, 1).await;
        let b = TestClient::new(addr, 2).await;
        a.join().await;
        b.join().await;

        // Everyone ready in the waiting room picks a map
        a.send(PacketType::ClientReadyUp, vec![]).await;
        wait_until("first ready", || lobby.player(0).unwrap().status.ready).await;
        b.send(PacketType::ClientReadyUp, vec![]).await;

        let change = a
            .expect("map change", |p| p.packet_type == PacketType::MapChange)
            .await;
        assert_eq!(change.body()[0], 0);
        wait_until("spawns", || {
            lobby.player(0).unwrap().status.spawned && lobby.player(1).unwrap().status.spawned
        })
        .await;
        assert_eq!(lobby.phase(), Phase::Starting);

        // Readying up on the map starts the match
        a.send(PacketType::ClientReadyUp, vec![]).await;
        wait_until("second ready", || lobby.player(0).unwrap().status.ready).await;
        b.send(PacketType::ClientReadyUp, vec![]).await;
        wait_until("match start", || lobby.in_match()).await;

        // Slot 1 lands a killing blow on slot 0 and wins
        a.send(PacketType::PlayerTookDamage, damage(1, KILLING_BLOW_DAMAGE))
            .await;
        let next_map = b
            .expect("winner map change", |p| {
                p.packet_type == PacketType::MapChange && p.body()[0] == 1
            })
            .await;
        assert_eq!(next_map.body()[1], 0);

        assert_eq!(lobby.last_winner(), 1);
        assert_eq!(lobby.player(1).unwrap().stats.kills, 1);
        assert_eq!(lobby.player(0).unwrap().stats.deaths, 1);
        wait_until("back to starting", || lobby.phase() == Phase::Starting).await;
    }

    /// Tests that leaving mid-match crowns the last player standing
    #[tokio::test]
    async fn leaving_mid_match_crowns_remaining_player() {
        let (addr, lobby) = start_server(ServerConfig::default()).await;
        let a = TestClient::new(addr, 1).await;
        let b = TestClient::new(addr, 2).await;
        a.join().await;
        b.join().await;

        assert_ok!(lobby.change_map(0));
        assert_ok!(lobby.ready_up(0));
        assert_ok!(lobby.ready_up(1));
        assert!(lobby.in_match());

        a.send(PacketType::ClientLeft, vec![]).await;
        b.expect("left relay", |p| p.packet_type == PacketType::ClientLeft)
            .await;
        wait_until("winner", || !lobby.in_match()).await;
        assert_eq!(lobby.last_winner(), 1);
        assert_eq!(lobby.occupants_excluding(None), 1);
    }

    /// Tests that a non-lethal hit lowers the victim's health and is relayed
    #[tokio::test]
    async fn damage_lowers_health_mid_match() {
        let (addr, lobby) = start_server(ServerConfig::default()).await;
        let a = TestClient::new(addr, 1).await;
        let b = TestClient::new(addr, 2).await;
        a.join().await;
        b.join().await;

        assert_ok!(lobby.change_map(0));
        assert_ok!(lobby.ready_up(0));
        assert_ok!(lobby.ready_up(1));
        assert!(lobby.in_match());

        a.send(PacketType::PlayerTookDamage, damage(1, 12.5)).await;
        b.expect("damage relay", |p| p.packet_type == PacketType::PlayerTookDamage)
            .await;
        wait_until("health drop", || {
            lobby.player(0).unwrap().status.health < 100.0
        })
        .await;

        assert_approx_eq!(lobby.player(0).unwrap().status.health, 87.5);
        assert!(lobby.in_match());
    }

    /// Tests that the host kicking the only opponent ends the match
    #[tokio::test]
    async fn kicking_mid_match_crowns_host() {
        let (addr, lobby) = start_server(ServerConfig::default()).await;
        let host = TestClient::new(addr, 1).await;
        let guest = TestClient::new(addr, 2).await;
        host.join().await;
        guest.join().await;

        assert_ok!(lobby.change_map(0));
        assert_ok!(lobby.ready_up(0));
        assert_ok!(lobby.ready_up(1));
        assert!(lobby.in_match());

        host.send(PacketType::PlayerTalked, b"/kick 2".to_vec()).await;
        guest
            .expect("kick", |p| p.packet_type == PacketType::KickPlayer)
            .await;
        wait_until("winner", || !lobby.in_match()).await;
        assert_eq!(lobby.last_winner(), 0);
        assert_eq!(lobby.occupants_excluding(None), 1);
    }
}
