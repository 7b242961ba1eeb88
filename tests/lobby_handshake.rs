//! Reservation handshake over real loopback sockets

use std::sync::Arc;
use std::time::Duration;

use artillery_server::config::HostSlotPolicy;
use artillery_server::lobby::{ClientState, HostSettings, PlayerLobbyInfo};
use artillery_server::metrics::Metrics;
use artillery_server::net::{spawn_beacon_client, BeaconHost, LobbySnapshot};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn host(max_slots: u32, room_unit_count: i32, slot_policy: HostSlotPolicy) -> BeaconHost {
    let settings = HostSettings {
        max_slots,
        room_unit_count,
        slot_policy,
    };
    BeaconHost::bind("127.0.0.1:0".parse().unwrap(), settings, Arc::new(Metrics::new()))
        .await
        .unwrap()
}

async fn wait_for(host: &BeaconHost, pred: impl Fn(&LobbySnapshot) -> bool) -> LobbySnapshot {
    for _ in 0..200 {
        let snapshot = host.snapshot().await.unwrap();
        if pred(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("lobby never reached the expected state");
}

#[tokio::test]
async fn two_slot_room_denies_third_player() {
    let host = host(2, 1, HostSlotPolicy::Handshake).await;
    let addr = host.local_addr();

    let (a, a_events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("A").with_id(1), TIMEOUT);
    assert_eq!(a_events.reservation.await, Ok(true));
    assert_eq!(host.snapshot().await.unwrap().reserved_slots, 1);

    let (b, b_events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("B").with_id(2), TIMEOUT);
    assert_eq!(b_events.reservation.await, Ok(true));
    assert_eq!(host.snapshot().await.unwrap().reserved_slots, 2);

    let (c, c_events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("C").with_id(3), TIMEOUT);
    assert_eq!(c_events.reservation.await, Ok(false));
    assert_eq!(c.join().await, ClientState::ReservationDenied);

    let snapshot = wait_for(&host, |s| s.roster.len() == 2).await;
    assert_eq!(snapshot.reserved_slots, 2);
    let ids: Vec<_> = snapshot.roster.iter().map(|p| p.player_id).collect();
    assert_eq!(ids, vec![1, 2]);

    a.disconnect();
    b.disconnect();
}

#[tokio::test]
async fn n_requests_fill_the_room() {
    let max = 4;
    let host = host(max, 1, HostSlotPolicy::Handshake).await;
    let addr = host.local_addr();

    let mut handles = Vec::new();
    for id in 1..=max as i32 {
        let (handle, events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("P").with_id(id), TIMEOUT);
        assert_eq!(events.reservation.await, Ok(true));
        handles.push(handle);
    }

    let (_extra, events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("Late").with_id(99), TIMEOUT);
    assert_eq!(events.reservation.await, Ok(false));
    assert_eq!(host.snapshot().await.unwrap().reserved_slots, max);
}

#[tokio::test]
async fn host_self_connect_gets_room_unit_count() {
    let host = host(4, 3, HostSlotPolicy::Handshake).await;
    let info = PlayerLobbyInfo {
        unit_count: 5,
        ..PlayerLobbyInfo::new("Host").with_id(777)
    };

    let (handle, mut events) = spawn_beacon_client(host.local_addr(), info, TIMEOUT);
    assert_eq!(events.reservation.await, Ok(true));

    let snapshot = wait_for(&host, |s| !s.roster.is_empty()).await;
    assert_eq!(snapshot.roster.len(), 1);
    assert_eq!(snapshot.roster[0].player_id, 777);
    assert_eq!(snapshot.roster[0].unit_count, 3);

    // The client sees the same roster: empty on connect, then with itself
    let mut last = Vec::new();
    while last.is_empty() {
        last = events.roster.recv().await.unwrap();
    }
    assert_eq!(last[0].unit_count, 3);
    handle.disconnect();
}

#[tokio::test]
async fn unregister_frees_slot_for_next_player() {
    let host = host(1, 1, HostSlotPolicy::Handshake).await;
    let addr = host.local_addr();

    let (first, events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("A").with_id(10), TIMEOUT);
    assert_eq!(events.reservation.await, Ok(true));
    wait_for(&host, |s| s.roster.len() == 1).await;

    assert!(first.unregister());
    let snapshot = wait_for(&host, |s| s.roster.is_empty()).await;
    assert_eq!(snapshot.reserved_slots, 0);

    let (_second, events) = spawn_beacon_client(addr, PlayerLobbyInfo::new("B").with_id(11), TIMEOUT);
    assert_eq!(events.reservation.await, Ok(true));
}

#[tokio::test]
async fn pre_reserved_host_slot_counts_once() {
    let host = host(2, 1, HostSlotPolicy::PreReserved).await;
    assert_eq!(host.snapshot().await.unwrap().reserved_slots, 1);

    let (_guest, events) = spawn_beacon_client(host.local_addr(), PlayerLobbyInfo::new("G").with_id(2), TIMEOUT);
    assert_eq!(events.reservation.await, Ok(true));

    let (_late, events) = spawn_beacon_client(host.local_addr(), PlayerLobbyInfo::new("L").with_id(3), TIMEOUT);
    assert_eq!(events.reservation.await, Ok(false));
}
