use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use battleship_server::protocol::{ClientId, ServerMessage, SessionId, ShipSpec, Verdict};
use battleship_server::{
    DisconnectPolicy, Orientation, Server, ServerConfig, ServerDirectory, ShipKind,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(config: ServerConfig) -> anyhow::Result<(SocketAddr, Arc<ServerDirectory>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let server = Server::with_listener(listener, config);
    let addr = server.local_addr()?;
    let directory = server.directory();
    tokio::spawn(server.run());
    Ok((addr, directory))
}

fn seeded() -> ServerConfig {
    ServerConfig {
        seed: Some(42),
        ..ServerConfig::default()
    }
}

struct TestClient {
    id: ClientId,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let (read, writer) = TcpStream::connect(addr).await?.into_split();
        let mut client = TestClient {
            id: ClientId(0),
            reader: BufReader::new(read),
            writer,
        };
        match client.recv().await? {
            Some(ServerMessage::ClientId(id)) => client.id = id,
            other => anyhow::bail!("expected CLIENT_ID, got {:?}", other),
        }
        Ok(client)
    }

    async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.send_raw(format!("{}\n", line).as_bytes()).await
    }

    async fn send_raw(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        Ok(())
    }

    /// Next message, or `None` once the server closed the connection.
    async fn recv(&mut self) -> anyhow::Result<Option<ServerMessage>> {
        let mut line = String::new();
        let n = timeout(WAIT, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(ServerMessage::parse_line(&line)?))
    }

    /// Next message that is not a roster update.
    async fn next(&mut self) -> anyhow::Result<ServerMessage> {
        loop {
            match self.recv().await? {
                Some(ServerMessage::ClientList(_)) => continue,
                Some(msg) => return Ok(msg),
                None => anyhow::bail!("client {} was disconnected", self.id),
            }
        }
    }

    /// Skip until a roster matching `expected` arrives.
    async fn roster(&mut self, expected: &[ClientId]) -> anyhow::Result<()> {
        loop {
            match self.recv().await? {
                Some(ServerMessage::ClientList(ids)) if ids == expected => return Ok(()),
                Some(_) => continue,
                None => anyhow::bail!("client {} was disconnected", self.id),
            }
        }
    }

    /// Read until the server hangs up. A reset counts as hung up.
    async fn expect_closed(&mut self) -> anyhow::Result<()> {
        loop {
            let mut line = String::new();
            match timeout(WAIT, self.reader.read_line(&mut line)).await? {
                Ok(0) | Err(_) => return Ok(()),
                Ok(_) => continue,
            }
        }
    }
}

/// Invite, accept and wait for both `GAME_STARTED`s.
async fn start_match(a: &mut TestClient, b: &mut TestClient) -> anyhow::Result<SessionId> {
    a.send(&format!("INVITE|{}", b.id)).await?;
    assert_eq!(b.next().await?, ServerMessage::GameInvite { from: a.id });
    b.send(&format!("INVITE_RESPONSE|{}|true", a.id)).await?;
    let ServerMessage::GameStarted { session, player_number: 1 } = a.next().await? else {
        anyhow::bail!("inviter should be player 1");
    };
    assert_eq!(b.next().await?, ServerMessage::GameStarted { session, player_number: 2 });
    Ok(session)
}

/// Both players place one destroyer at the top-left corner.
/// Returns `true` if `a` fires first.
async fn place_destroyers(a: &mut TestClient, b: &mut TestClient) -> anyhow::Result<bool> {
    place_fleets(a, b, "SHIPS_READY|0,0,2,H").await
}

/// Both players submit `fleet`. Returns `true` if `a` fires first.
async fn place_fleets(a: &mut TestClient, b: &mut TestClient, fleet: &str) -> anyhow::Result<bool> {
    a.send(fleet).await?;
    assert_eq!(a.next().await?, ServerMessage::WaitOpponent);
    b.send(fleet).await?;
    for client in [&mut *a, &mut *b] {
        assert!(matches!(client.next().await?, ServerMessage::MyShips(_)));
        assert!(matches!(client.next().await?, ServerMessage::OpponentShips(_)));
        assert_eq!(client.next().await?, ServerMessage::GameReady);
    }
    let a_turn = a.next().await?;
    let b_turn = b.next().await?;
    match (a_turn, b_turn) {
        (ServerMessage::YourTurn, ServerMessage::WaitTurn) => Ok(true),
        (ServerMessage::WaitTurn, ServerMessage::YourTurn) => Ok(false),
        other => anyhow::bail!("unexpected turn messages {:?}", other),
    }
}

/// Play a short game to the end. Returns (winner, loser).
async fn play_out<'a>(
    a: &'a mut TestClient,
    b: &'a mut TestClient,
) -> anyhow::Result<(&'a mut TestClient, &'a mut TestClient)> {
    let a_first = place_destroyers(a, b).await?;
    let (first, second) = if a_first { (a, b) } else { (b, a) };

    first.send("FIRE|0,0").await?;
    assert_eq!(first.next().await?.to_line(), "SHOT_RESULT|HIT|00|DESTROYER");
    assert_eq!(first.next().await?, ServerMessage::WaitTurn);
    assert_eq!(second.next().await?.to_line(), "OPPONENT_SHOT|00|HIT|DESTROYER");
    assert_eq!(second.next().await?, ServerMessage::YourTurn);

    second.send("FIRE|9,9").await?;
    assert_eq!(second.next().await?.to_line(), "SHOT_RESULT|MISS|99");
    assert_eq!(second.next().await?, ServerMessage::WaitTurn);
    assert_eq!(first.next().await?.to_line(), "OPPONENT_SHOT|99|MISS");
    assert_eq!(first.next().await?, ServerMessage::YourTurn);

    first.send("FIRE|0,1").await?;
    assert_eq!(first.next().await?.to_line(), "SHOT_RESULT|HIT|01|DESTROYER|SUNK");
    assert_eq!(first.next().await?, ServerMessage::GameOver(Verdict::Win));
    assert_eq!(second.next().await?.to_line(), "OPPONENT_SHOT|01|HIT|DESTROYER|SUNK");
    assert_eq!(second.next().await?, ServerMessage::GameOver(Verdict::Lose));
    Ok((first, second))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ids_and_roster() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    assert_eq!(a.id, ClientId(1));
    a.roster(&[ClientId(1)]).await?;

    let mut b = TestClient::connect(addr).await?;
    assert_eq!(b.id, ClientId(2));
    b.roster(&[ClientId(1), ClientId(2)]).await?;
    a.roster(&[ClientId(1), ClientId(2)]).await?;

    drop(b);
    a.roster(&[ClientId(1)]).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_game_returns_players_to_lobby() -> anyhow::Result<()> {
    let (addr, dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    let mut c = TestClient::connect(addr).await?;
    c.roster(&[a.id, b.id, c.id]).await?;

    let session = start_match(&mut a, &mut b).await?;
    assert_eq!(session, SessionId(1));
    c.roster(&[c.id]).await?;
    assert_eq!(dir.session_of(a.id).await, Some(session));

    play_out(&mut a, &mut b).await?;
    c.roster(&[a.id, b.id, c.id]).await?;
    assert_eq!(dir.lobby_roster().await, vec![a.id, b.id, c.id]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invite_declined_and_errors() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;

    a.send(&format!("INVITE|{}", a.id)).await?;
    assert!(matches!(a.next().await?, ServerMessage::InviteError(_)));
    a.send("INVITE|99").await?;
    assert!(matches!(a.next().await?, ServerMessage::InviteError(_)));

    a.send(&format!("INVITE|{}", b.id)).await?;
    assert_eq!(b.next().await?, ServerMessage::GameInvite { from: a.id });
    b.send(&format!("INVITE_RESPONSE|{}|false", a.id)).await?;
    assert_eq!(a.next().await?, ServerMessage::InviteDeclined { by: b.id });

    a.send(&format!("INVITE|{}", b.id)).await?;
    assert_eq!(b.next().await?, ServerMessage::GameInvite { from: a.id });
    a.send("INVITE_STATE_CANCELED|").await?;
    assert!(matches!(b.next().await?, ServerMessage::InviteCanceled(_)));
    b.send(&format!("INVITE_RESPONSE|{}|true", a.id)).await?;
    assert!(matches!(b.next().await?, ServerMessage::InviteError(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bad_input_gets_error_and_connection_survives() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;

    a.send("garbage").await?;
    assert!(matches!(a.next().await?, ServerMessage::Error(_)));
    a.send("LAUNCH|1,2").await?;
    assert!(matches!(a.next().await?, ServerMessage::Error(_)));
    a.send("FIRE|1,1").await?;
    assert_eq!(a.next().await?, ServerMessage::Error("not in a game".into()));
    a.send("SHIPS_READY|0,0,2,H").await?;
    assert_eq!(a.next().await?, ServerMessage::Error("not in a game".into()));

    a.send("INVITE|1").await?;
    assert!(matches!(a.next().await?, ServerMessage::InviteError(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_utf8_line_gets_error() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;

    a.send_raw(b"INVITE|\xff\xfe\n").await?;
    assert!(matches!(a.next().await?, ServerMessage::Error(_)));
    a.send_raw(b"\xc3\x28|1\n").await?;
    assert!(matches!(a.next().await?, ServerMessage::Error(_)));
    a.send("FIRE|0,0").await?;
    assert_eq!(a.next().await?, ServerMessage::Error("not in a game".into()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_off_board_ship_is_skipped_not_fatal() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;

    a.send("SHIPS_READY|0,0,2,H;12,0,3,H").await?;
    assert_eq!(a.next().await?, ServerMessage::WaitOpponent);
    b.send("SHIPS_READY|0,0,2,H;4,4,3,V,FRIGATE").await?;
    let destroyer =
        vec![ShipSpec::new(0, 0, 2, Orientation::Horizontal).with_kind(ShipKind::Destroyer)];
    assert_eq!(a.next().await?, ServerMessage::MyShips(destroyer.clone()));
    assert_eq!(b.next().await?, ServerMessage::MyShips(destroyer));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shooter {
    Me,
    Opponent,
}

/// Read until the reply to this client's own `FIRE`. Opponent shots seen on
/// the way are logged. Returns whether the shot was accepted.
async fn fire_reply(client: &mut TestClient, log: &mut Vec<Shooter>) -> anyhow::Result<bool> {
    loop {
        match client.next().await? {
            ServerMessage::ShotResult(_) => {
                log.push(Shooter::Me);
                return Ok(true);
            }
            ServerMessage::Error(text) => {
                assert_eq!(text, "not your turn");
                return Ok(false);
            }
            ServerMessage::OpponentShot(_) => log.push(Shooter::Opponent),
            ServerMessage::YourTurn | ServerMessage::WaitTurn => continue,
            other => anyhow::bail!("unexpected {:?}", other),
        }
    }
}

/// Read until `expected` opponent shots have been logged in total.
async fn catch_up(
    client: &mut TestClient,
    log: &mut Vec<Shooter>,
    expected: usize,
) -> anyhow::Result<()> {
    while log.iter().filter(|s| **s == Shooter::Opponent).count() < expected {
        match client.next().await? {
            ServerMessage::OpponentShot(_) => log.push(Shooter::Opponent),
            ServerMessage::YourTurn | ServerMessage::WaitTurn => continue,
            other => anyhow::bail!("unexpected {:?}", other),
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_simultaneous_fire_keeps_turns_alternating() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;
    // The carrier sits on row 9 and every shot below lands on rows 0..4.
    let a_first = place_fleets(&mut a, &mut b, "SHIPS_READY|9,5,5,H").await?;

    let (mut a_log, mut b_log) = (Vec::new(), Vec::new());
    let (mut a_hits, mut b_hits) = (0, 0);
    for round in 0..40 {
        let fire = format!("FIRE|{},{}", round / 10, round % 10);
        let (sent_a, sent_b) = tokio::join!(a.send(&fire), b.send(&fire));
        sent_a?;
        sent_b?;

        let a_accepted = fire_reply(&mut a, &mut a_log).await?;
        let b_accepted = fire_reply(&mut b, &mut b_log).await?;
        assert!(a_accepted || b_accepted, "round {round}: both shots refused");
        a_hits += usize::from(a_accepted);
        b_hits += usize::from(b_accepted);
        catch_up(&mut a, &mut a_log, b_hits).await?;
        catch_up(&mut b, &mut b_log, a_hits).await?;
    }

    let expected_first = if a_first { Shooter::Me } else { Shooter::Opponent };
    assert_eq!(a_log.first(), Some(&expected_first));
    for log in [&a_log, &b_log] {
        assert_eq!(log.len(), a_hits + b_hits);
        assert!(log.windows(2).all(|w| w[0] != w[1]), "same player fired twice: {log:?}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_out_of_turn_and_repeat_shots() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;
    let a_first = place_destroyers(&mut a, &mut b).await?;
    let (first, second) = if a_first { (&mut a, &mut b) } else { (&mut b, &mut a) };

    second.send("FIRE|5,5").await?;
    assert!(matches!(second.next().await?, ServerMessage::Error(_)));

    first.send("FIRE|5,5").await?;
    assert_eq!(first.next().await?.to_line(), "SHOT_RESULT|MISS|55");
    assert_eq!(first.next().await?, ServerMessage::WaitTurn);
    assert_eq!(second.next().await?.to_line(), "OPPONENT_SHOT|55|MISS");
    assert_eq!(second.next().await?, ServerMessage::YourTurn);

    second.send("FIRE|5,5").await?;
    assert_eq!(second.next().await?.to_line(), "SHOT_RESULT|MISS|55");
    second.next().await?;
    first.next().await?;
    first.next().await?;

    first.send("FIRE|5,5").await?;
    assert!(matches!(first.next().await?, ServerMessage::Error(_)));
    first.send("FIRE|3,12").await?;
    assert!(matches!(first.next().await?, ServerMessage::Error(_)));
    // still first's turn
    first.send("FIRE|6,6").await?;
    assert_eq!(first.next().await?.to_line(), "SHOT_RESULT|MISS|66");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_closes_survivor_by_default() -> anyhow::Result<()> {
    let (addr, dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;

    drop(a);
    assert!(matches!(b.next().await?, ServerMessage::OpponentDisconnected(_)));
    b.expect_closed().await?;

    let mut c = TestClient::connect(addr).await?;
    c.roster(&[c.id]).await?;
    assert_eq!(dir.session_count().await, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_returns_survivor_to_lobby() -> anyhow::Result<()> {
    let config = ServerConfig {
        on_opponent_disconnect: DisconnectPolicy::Lobby,
        ..seeded()
    };
    let (addr, dir) = start_server(config).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;
    b.send("SHIPS_READY|0,0,2,H").await?;
    assert_eq!(b.next().await?, ServerMessage::WaitOpponent);

    drop(a);
    assert!(matches!(b.next().await?, ServerMessage::OpponentDisconnected(_)));
    b.roster(&[b.id]).await?;
    assert_eq!(dir.session_of(b.id).await, None);

    b.send("FIRE|0,0").await?;
    assert_eq!(b.next().await?, ServerMessage::Error("not in a game".into()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rematch_starts_new_session() -> anyhow::Result<()> {
    let (addr, dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    let first_session = start_match(&mut a, &mut b).await?;
    play_out(&mut a, &mut b).await?;

    a.send("REMATCH_REQUEST|").await?;
    assert_eq!(b.next().await?, ServerMessage::RematchOffer { from: a.id });
    b.send(&format!("REMATCH_RESPONSE|{}|true", a.id)).await?;

    let expected = SessionId(first_session.0 + 1);
    for client in [&mut a, &mut b] {
        assert_eq!(client.next().await?, ServerMessage::RematchAccepted { session: expected });
    }
    assert_eq!(
        a.next().await?,
        ServerMessage::GameStarted { session: expected, player_number: 1 }
    );
    assert_eq!(
        b.next().await?,
        ServerMessage::GameStarted { session: expected, player_number: 2 }
    );
    assert_eq!(dir.session_count().await, 1);
    assert!(dir.lobby_roster().await.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rematch_declined() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;
    play_out(&mut a, &mut b).await?;

    b.send("REMATCH_REQUEST|").await?;
    assert_eq!(a.next().await?, ServerMessage::RematchOffer { from: b.id });
    a.send(&format!("REMATCH_RESPONSE|{}|false", b.id)).await?;
    assert!(matches!(b.next().await?, ServerMessage::RematchRejected(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rematch_rejected_when_opponent_busy() -> anyhow::Result<()> {
    let (addr, _dir) = start_server(seeded()).await?;
    let mut a = TestClient::connect(addr).await?;
    let mut b = TestClient::connect(addr).await?;
    let mut c = TestClient::connect(addr).await?;
    start_match(&mut a, &mut b).await?;
    play_out(&mut a, &mut b).await?;

    start_match(&mut b, &mut c).await?;
    a.send("REMATCH_REQUEST|").await?;
    assert!(matches!(a.next().await?, ServerMessage::RematchRejected(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_overlong_line_closes_connection() -> anyhow::Result<()> {
    let config = ServerConfig {
        max_line_length: 64,
        ..seeded()
    };
    let (addr, _dir) = start_server(config).await?;
    let mut a = TestClient::connect(addr).await?;
    a.send(&format!("INVITE|{}", "1".repeat(200))).await?;
    a.expect_closed().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_idle_connection_is_dropped() -> anyhow::Result<()> {
    let config = ServerConfig {
        idle_timeout_secs: Some(1),
        ..seeded()
    };
    let (addr, _dir) = start_server(config).await?;
    let mut a = TestClient::connect(addr).await?;
    a.expect_closed().await?;
    Ok(())
}
